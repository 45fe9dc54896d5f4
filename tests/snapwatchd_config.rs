use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use snapwatch::WatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SNAPWATCH_CONFIG",
        "SNAPWATCH_TELEGRAM_TOKEN",
        "SNAPWATCH_TELEGRAM_CHAT_ID",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(toml.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        [telegram]
        token = "file-token"
        chat_id = 77

        [detection]
        poll_interval_ms = 500
        fetch_timeout_s = 4
        channel_delta = 300
        min_events = 5
        multiplier = 1.2
        annotate = false

        [[camera]]
        name = "front"
        snapshot_url = "http://cam.local/shot.jpg"
        threshold_percent = 20.0
        min_threshold_percent = 5.0
        cooldown_s = 30
        enabled = false

        [[camera]]
        name = "back"
        snapshot_url = "stub://back"
        threshold_percent = 35.0
        "#,
    );

    std::env::set_var("SNAPWATCH_TELEGRAM_TOKEN", "env-token");
    std::env::set_var("SNAPWATCH_TELEGRAM_CHAT_ID", "-100200300");

    let cfg = WatchConfig::load(file.path()).expect("load config");

    assert_eq!(cfg.telegram.token, "env-token");
    assert_eq!(cfg.telegram.chat_id, -100200300);

    assert_eq!(cfg.detection.poll_interval, Duration::from_millis(500));
    assert_eq!(cfg.detection.fetch_timeout, Duration::from_secs(4));
    assert_eq!(cfg.detection.channel_delta, 300);
    assert_eq!(cfg.detection.min_events, 5);
    assert_eq!(cfg.detection.multiplier, 1.2);
    assert!(!cfg.detection.annotate);
    // Untouched tunables keep their defaults.
    assert_eq!(cfg.detection.fetch_backoff, Duration::from_millis(1000));
    assert_eq!(cfg.detection.history_cap, 100);
    assert_eq!(cfg.detection.min_region_area, 0);

    assert_eq!(cfg.cameras.len(), 2);
    let front = &cfg.cameras[0];
    assert_eq!(front.name, "front");
    assert_eq!(front.snapshot_url, "http://cam.local/shot.jpg");
    assert_eq!(front.threshold_percent, 20.0);
    assert_eq!(front.min_threshold_percent, 5.0);
    assert_eq!(front.cooldown, Duration::from_secs(30));
    assert!(!front.enabled);

    let back = &cfg.cameras[1];
    assert_eq!(back.min_threshold_percent, 0.0);
    assert_eq!(back.cooldown, Duration::from_secs(10));
    assert!(back.enabled);

    clear_env();
}

#[test]
fn rejects_config_without_cameras() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        [telegram]
        token = "t"
        chat_id = 1
        "#,
    );
    let err = WatchConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("at least one [[camera]]"));

    clear_env();
}

#[test]
fn rejects_missing_telegram_credentials() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        [[camera]]
        name = "front"
        snapshot_url = "http://cam.local/shot.jpg"
        threshold_percent = 20.0
        "#,
    );
    let err = WatchConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("telegram token"));

    clear_env();
}

#[test]
fn rejects_unsupported_snapshot_scheme() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        [telegram]
        token = "t"
        chat_id = 1

        [[camera]]
        name = "front"
        snapshot_url = "rtsp://cam.local/stream"
        threshold_percent = 20.0
        "#,
    );
    let err = WatchConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("unsupported snapshot scheme"));

    clear_env();
}

#[test]
fn rejects_noise_floor_above_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        [telegram]
        token = "t"
        chat_id = 1

        [[camera]]
        name = "front"
        snapshot_url = "http://cam.local/shot.jpg"
        threshold_percent = 10.0
        min_threshold_percent = 15.0
        "#,
    );
    let err = WatchConfig::load(file.path()).unwrap_err();
    assert!(err
        .to_string()
        .contains("min_threshold_percent exceeds threshold_percent"));

    clear_env();
}

#[test]
fn rejects_duplicate_camera_names() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        [telegram]
        token = "t"
        chat_id = 1

        [[camera]]
        name = "front"
        snapshot_url = "http://cam-a.local/shot.jpg"
        threshold_percent = 20.0

        [[camera]]
        name = "front"
        snapshot_url = "http://cam-b.local/shot.jpg"
        threshold_percent = 20.0
        "#,
    );
    let err = WatchConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("duplicate camera name"));

    clear_env();
}
