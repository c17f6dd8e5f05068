//! facewatchd - face watch daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured camera (stub or RTSP)
//! 2. Runs the recognizer on each frame
//! 3. Keeps recent footage in the bounded clip buffer
//! 4. Feeds matches through the announcement gate (debounced per identity)
//! 5. Triggers a clip export whenever an identity is announced
//! 6. Writes finished GIF clips to the clip directory

use anyhow::Result;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use facewatch::{
    AnnouncementGate, AnnouncementSweeper, CameraSource, ClipAssembler, ClipBuffer, ClipExporter,
    FacewatchdConfig, FilesystemClipStore, RecognizerBackend, StubRecognizer,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = FacewatchdConfig::load()?;

    let mut source = CameraSource::new(cfg.camera_config())?;
    source.connect()?;

    let mut recognizer = StubRecognizer::new();
    recognizer.warm_up()?;

    let gate = Arc::new(AnnouncementGate::new(cfg.gate_config()));
    let sweeper = AnnouncementSweeper::spawn(Arc::clone(&gate), cfg.announce.sweep_period);

    let buffer = Arc::new(ClipBuffer::new(cfg.clip.capacity));
    let assembler = ClipAssembler::new(cfg.clip_params());
    let store = FilesystemClipStore::new(&cfg.clip.dir)?;
    let exporter = ClipExporter::spawn(Arc::clone(&buffer), assembler, Box::new(store));

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    let frame_period = Duration::from_millis(1000 / u64::from(cfg.camera.target_fps));
    let mut last_health_log = Instant::now();
    let mut announcement_count = 0u64;

    log::info!(
        "facewatchd running. recognizer={} clips under {}",
        recognizer.name(),
        cfg.clip.dir.display()
    );
    log::info!(
        "announce window={}s threshold={} sweep={}ms",
        cfg.announce.window.as_secs(),
        cfg.announce.threshold,
        cfg.announce.sweep_period.as_millis()
    );
    log::info!("clip buffer capacity: {} frames", cfg.clip.capacity);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            log::info!("shutdown signal received");
            break;
        }

        let frame = source.next_frame()?;
        let matches = recognizer.recognize(&frame)?;
        buffer.push_frame(frame);

        for face in &matches {
            let announced = gate.record_detection(
                Some(face.label.as_str()),
                Some(face.confidence),
                Instant::now(),
            );
            if announced {
                announcement_count += 1;
                log::info!(
                    "announcement #{}: {} (confidence {:.1})",
                    announcement_count,
                    face.label,
                    face.confidence
                );
                buffer.trigger_export();
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            log::info!(
                "camera health={} frames={} url={} buffered={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.url,
                buffer.len()
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(frame_period);
    }

    exporter.stop()?;
    sweeper.stop()?;
    log::info!("facewatchd stopped after {} announcements", announcement_count);
    Ok(())
}
