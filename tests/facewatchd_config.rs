use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use facewatch::config::FacewatchdConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FACEWATCH_CONFIG",
        "FACEWATCH_CAMERA_URL",
        "FACEWATCH_CLIP_DIR",
        "FACEWATCH_WINDOW_SECS",
        "FACEWATCH_DETECTION_THRESHOLD",
        "FACEWATCH_CLIP_CAPACITY",
        "FACEWATCH_SWEEP_PERIOD_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FacewatchdConfig::load().expect("load config");

    assert_eq!(cfg.camera.url, "stub://front-door");
    assert_eq!(cfg.camera.target_fps, 10);
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.announce.window, Duration::from_secs(3));
    assert_eq!(cfg.announce.threshold, 5);
    assert_eq!(cfg.announce.sweep_period, Duration::from_millis(1000));
    assert_eq!(cfg.announce.fallback_label, "unknown");
    assert_eq!(cfg.clip.dir, PathBuf::from("clips"));
    assert_eq!(cfg.clip.capacity, 100);
    assert_eq!(cfg.clip.max_width, 640);
    assert_eq!(cfg.clip.max_height, 480);
    assert_eq!(cfg.clip.jpeg_quality, 50);
    assert_eq!(cfg.clip.frame_delay, Duration::from_millis(100));
    assert!(cfg.clip.loop_forever);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
            "camera": {
                "url": "rtsp://camera-1",
                "target_fps": 12,
                "width": 800,
                "height": 600
            },
            "announce": {
                "window_secs": 5,
                "detection_threshold": 8,
                "sweep_period_ms": 250,
                "fallback_label": "stranger"
            },
            "clip": {
                "dir": "exported",
                "capacity": 40,
                "max_width": 320,
                "max_height": 240,
                "jpeg_quality": 70,
                "frame_delay_ms": 80,
                "loop_forever": false
            }
        }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FACEWATCH_CONFIG", file.path());
    std::env::set_var("FACEWATCH_WINDOW_SECS", "7");
    std::env::set_var("FACEWATCH_CLIP_DIR", "overridden_clips");
    std::env::set_var("FACEWATCH_CLIP_CAPACITY", "25");

    let cfg = FacewatchdConfig::load().expect("load config");

    assert_eq!(cfg.camera.url, "rtsp://camera-1");
    assert_eq!(cfg.camera.target_fps, 12);
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.announce.window, Duration::from_secs(7));
    assert_eq!(cfg.announce.threshold, 8);
    assert_eq!(cfg.announce.sweep_period, Duration::from_millis(250));
    assert_eq!(cfg.announce.fallback_label, "stranger");
    assert_eq!(cfg.clip.dir, PathBuf::from("overridden_clips"));
    assert_eq!(cfg.clip.capacity, 25);
    assert_eq!(cfg.clip.max_width, 320);
    assert_eq!(cfg.clip.max_height, 240);
    assert_eq!(cfg.clip.jpeg_quality, 70);
    assert_eq!(cfg.clip.frame_delay, Duration::from_millis(80));
    assert!(!cfg.clip.loop_forever);

    clear_env();
}

#[test]
fn partial_file_keeps_defaults_for_missing_sections() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "announce": { "detection_threshold": 2 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FACEWATCH_CONFIG", file.path());

    let cfg = FacewatchdConfig::load().expect("load config");

    assert_eq!(cfg.announce.threshold, 2);
    assert_eq!(cfg.announce.window, Duration::from_secs(3));
    assert_eq!(cfg.camera.url, "stub://front-door");
    assert_eq!(cfg.clip.capacity, 100);

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FACEWATCH_DETECTION_THRESHOLD", "0");
    assert!(FacewatchdConfig::load().is_err());
    clear_env();

    std::env::set_var("FACEWATCH_CLIP_CAPACITY", "0");
    assert!(FacewatchdConfig::load().is_err());
    clear_env();

    std::env::set_var("FACEWATCH_WINDOW_SECS", "not-a-number");
    assert!(FacewatchdConfig::load().is_err());
    clear_env();

    // A frame delay below one GIF tick cannot be encoded.
    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "clip": { "frame_delay_ms": 5 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("FACEWATCH_CONFIG", file.path());
    assert!(FacewatchdConfig::load().is_err());

    clear_env();
}
