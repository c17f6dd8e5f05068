//! demo - end-to-end synthetic run of the face watch pipeline
//!
//! Drives the real components (camera, gate, sweeper, buffer, exporter)
//! with a scripted recognizer: a visitor appears, leaves long enough for
//! the gate to re-arm, then returns. The return is announced and the
//! export worker writes an animated clip of the buffered footage.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use facewatch::recognize::Region;
use facewatch::{
    AnnouncementGate, AnnouncementSweeper, CameraConfig, CameraSource, ClipAssembler, ClipBuffer,
    ClipExporter, ClipParams, FaceMatch, FilesystemClipStore, GateConfig, RecognizerBackend,
    StubRecognizer, UNKNOWN_LABEL,
};

const DEMO_WINDOW: Duration = Duration::from_secs(1);
const DEMO_THRESHOLD: usize = 3;
const DEMO_SWEEP_PERIOD: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration in seconds for the synthetic run.
    #[arg(long, default_value_t = 6)]
    seconds: u64,
    /// Frames per second for the synthetic camera.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Output directory for exported clips.
    #[arg(long, default_value = "demo_clips")]
    out: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 || args.fps > 100 {
        return Err(anyhow!("fps must be between 1 and 100"));
    }
    if args.seconds < 6 {
        return Err(anyhow!(
            "seconds must be >= 6 so the visitor can leave and return"
        ));
    }

    let out_dir = PathBuf::from(&args.out);

    stage("configure pipeline");
    let total_frames = args.seconds.saturating_mul(u64::from(args.fps));
    // Visitor script in thirds: in view, away, back in view. The away leg
    // outlasts the gate window, so the return is announced.
    let visit_a_end = total_frames / 3;
    let gap_end = 2 * total_frames / 3;
    let mut recognizer = StubRecognizer::with_pattern(move |call| {
        if call < visit_a_end || call >= gap_end {
            vec![FaceMatch {
                label: "visitor".to_string(),
                confidence: 12.0,
                region: Region {
                    x: 120,
                    y: 60,
                    width: 80,
                    height: 120,
                },
            }]
        } else {
            Vec::new()
        }
    });

    let mut source = CameraSource::new(CameraConfig {
        url: "stub://demo".to_string(),
        target_fps: args.fps,
        width: 320,
        height: 240,
    })?;
    source.connect()?;

    let gate = Arc::new(AnnouncementGate::new(GateConfig {
        window: DEMO_WINDOW,
        threshold: DEMO_THRESHOLD,
        fallback_label: UNKNOWN_LABEL.to_string(),
    }));
    let sweeper = AnnouncementSweeper::spawn(Arc::clone(&gate), DEMO_SWEEP_PERIOD);

    // One second of footage per clip.
    let buffer = Arc::new(ClipBuffer::new(args.fps as usize));
    let assembler = ClipAssembler::new(ClipParams {
        max_width: 320,
        max_height: 240,
        frame_delay: Duration::from_millis(u64::from(1000 / args.fps)),
        ..ClipParams::default()
    });
    let store = FilesystemClipStore::new(&out_dir)?;
    let exporter = ClipExporter::spawn(Arc::clone(&buffer), assembler, Box::new(store));

    stage("run synthetic camera");
    let frame_period = Duration::from_millis(u64::from(1000 / args.fps));
    let mut matches_total = 0u64;
    let mut announcement_count = 0u64;

    for _ in 0..total_frames {
        let frame = source.next_frame()?;
        let matches = recognizer.recognize(&frame)?;
        buffer.push_frame(frame);

        matches_total += matches.len() as u64;
        for face in &matches {
            let announced = gate.record_detection(
                Some(face.label.as_str()),
                Some(face.confidence),
                Instant::now(),
            );
            if announced {
                announcement_count += 1;
                buffer.trigger_export();
            }
        }

        std::thread::sleep(frame_period);
    }

    stage("wait for export worker");
    let deadline = Instant::now() + Duration::from_secs(3);
    while count_gifs(&out_dir) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    exporter.stop()?;
    sweeper.stop()?;

    let clip_count = count_gifs(&out_dir);
    println!("demo summary:");
    println!("  frames processed: {}", total_frames);
    println!("  matches produced: {}", matches_total);
    println!("  announcements: {}", announcement_count);
    println!("  clips written: {}", clip_count);
    println!("  clip dir: {}", out_dir.display());
    println!("next steps:");
    println!("  ls -la {}", out_dir.display());

    if announcement_count == 0 {
        return Err(anyhow!("visitor return was never announced"));
    }
    if clip_count == 0 {
        return Err(anyhow!("no clip was exported; expected at least one"));
    }
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}

fn count_gifs(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext == "gif")
                .unwrap_or(false)
        })
        .count()
}
