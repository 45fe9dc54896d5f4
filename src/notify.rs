//! Alert delivery to Telegram.
//!
//! The watch loop hands the notifier a path to an encoded JPEG and a
//! caption; the notifier owns the wire format. `sendPhoto` takes a
//! multipart/form-data body with `chat_id`, `caption`, and the `photo`
//! file, and replies with JSON whose `ok` field is authoritative.
//!
//! The caller guarantees the file exists at call time and deletes it
//! after the call returns, whatever the outcome.

use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::config::TelegramSettings;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Accepts an alert image and caption and delivers it.
pub trait Notifier {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<()> {
        (**self).send_photo(path, caption)
    }
}

/// Telegram Bot API client.
pub struct TelegramNotifier {
    settings: TelegramSettings,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Self {
        Self {
            settings,
            agent: ureq::Agent::new(),
        }
    }

    fn send_photo_url(&self) -> String {
        format!(
            "{}/bot{}/sendPhoto",
            TELEGRAM_API_BASE, self.settings.token
        )
    }
}

impl Notifier for TelegramNotifier {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<()> {
        let photo = std::fs::read(path)
            .with_context(|| format!("read alert snapshot {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("snapshot.jpg");

        let boundary = format!("snapwatch{:016x}", rand::random::<u64>());
        let body = multipart_body(
            &boundary,
            &[
                ("chat_id", &self.settings.chat_id.to_string()),
                ("caption", caption),
            ],
            filename,
            &photo,
        )?;

        let response = self
            .agent
            .post(&self.send_photo_url())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .context("send photo to telegram")?;

        let reply: ApiReply = serde_json::from_reader(response.into_reader())
            .context("parse telegram response")?;
        if !reply.ok {
            return Err(anyhow!(
                "telegram rejected sendPhoto: {}",
                reply.description.as_deref().unwrap_or("no description")
            ));
        }
        Ok(())
    }
}

fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    filename: &str,
    photo: &[u8],
) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(photo.len() + 512);
    for (name, value) in fields {
        write!(body, "--{}\r\n", boundary)?;
        write!(
            body,
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            name
        )?;
        write!(body, "{}\r\n", value)?;
    }
    write!(body, "--{}\r\n", boundary)?;
    write!(
        body,
        "Content-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\n",
        filename
    )?;
    write!(body, "Content-Type: image/jpeg\r\n\r\n")?;
    body.extend_from_slice(photo);
    write!(body, "\r\n--{}--\r\n", boundary)?;
    Ok(body)
}
