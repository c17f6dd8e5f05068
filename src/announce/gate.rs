//! Sliding-window detection tally and the per-identity announcement gate.
//!
//! Every classification result is appended to the window of the identity it
//! names. A periodic sweep then ages each window and flips the identity's
//! armed flag:
//!
//! - fewer than `threshold` recent records: the identity has left the scene.
//!   Arm the flag (one announcement per appear-then-disappear cycle) and
//!   clear the window.
//! - `threshold` or more: the identity is still being seen. Disarm and keep
//!   accumulating.
//!
//! The reserved fallback label is special-cased: it never arms while any
//! other identity is tracked, so "unrecognized face" announcements cannot
//! fire just because a known face dipped below threshold for one sweep.
//!
//! Producers calling [`AnnouncementGate::record_detection`] only ever read
//! the flag the last sweep left behind. The map is guarded by a `RwLock`,
//! each window by its own `Mutex`, so unrelated identities never serialize
//! against each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::recognize::UNKNOWN_LABEL;

/// Default trailing window over which detections are counted.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3);

/// Default number of in-window detections that counts as "still present".
pub const DEFAULT_THRESHOLD: usize = 5;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Records older than this are evicted at sweep time.
    pub window: Duration,
    /// Minimum recent records for an identity to count as present.
    pub threshold: usize,
    /// Label the classifier uses when it has no confident match.
    pub fallback_label: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            threshold: DEFAULT_THRESHOLD,
            fallback_label: UNKNOWN_LABEL.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Records and per-identity state
// ----------------------------------------------------------------------------

/// One classification result, immutable once recorded.
#[derive(Clone, Debug)]
pub struct DetectionRecord {
    pub label: String,
    pub confidence: f32,
    pub at: Instant,
}

/// Window + armed flag for one identity. Entries are created lazily on the
/// first sighting and persist for the process lifetime; sweeps empty windows
/// but never remove the entry itself.
struct IdentityTrack {
    window: Mutex<Vec<DetectionRecord>>,
    armed: AtomicBool,
}

impl IdentityTrack {
    fn new() -> Self {
        Self {
            window: Mutex::new(Vec::new()),
            armed: AtomicBool::new(false),
        }
    }
}

/// Flag transitions performed by one sweep, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Identities with a map entry at sweep time.
    pub tracked: usize,
    /// Flags that flipped false -> true.
    pub opened: usize,
    /// Flags that flipped true -> false.
    pub closed: usize,
    /// Fallback arm decisions vetoed by another tracked identity.
    pub suppressed: usize,
}

// ----------------------------------------------------------------------------
// AnnouncementGate
// ----------------------------------------------------------------------------

pub struct AnnouncementGate {
    tracks: RwLock<HashMap<String, IdentityTrack>>,
    window: Duration,
    threshold: usize,
    fallback_label: String,
}

impl AnnouncementGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            tracks: RwLock::new(HashMap::new()),
            window: config.window,
            threshold: config.threshold,
            fallback_label: config.fallback_label,
        }
    }

    /// Append a detection and report whether the last sweep armed this
    /// identity. The result is not influenced by the record just added.
    ///
    /// A missing label or confidence is a defined no-op returning `false`,
    /// mirroring classifiers that emit partial results.
    pub fn record_detection(
        &self,
        label: Option<&str>,
        confidence: Option<f32>,
        now: Instant,
    ) -> bool {
        let (label, confidence) = match (label, confidence) {
            (Some(label), Some(confidence)) => (label, confidence),
            _ => return false,
        };

        let record = DetectionRecord {
            label: label.to_string(),
            confidence,
            at: now,
        };

        // Fast path: the identity is already tracked. Shared map lock,
        // private window lock.
        {
            let tracks = self.tracks.read().unwrap();
            if let Some(track) = tracks.get(label) {
                track.window.lock().unwrap().push(record);
                return track.armed.load(Ordering::SeqCst);
            }
        }

        // First sighting: insert under the write lock. Another producer may
        // have won the race, so go through the entry API.
        let mut tracks = self.tracks.write().unwrap();
        let track = tracks
            .entry(label.to_string())
            .or_insert_with(IdentityTrack::new);
        track.window.lock().unwrap().push(record);
        track.armed.load(Ordering::SeqCst)
    }

    /// Run one sweep with `now` as the reference instant.
    ///
    /// Holds the map's read lock for the whole pass so the "any other
    /// identity tracked" check and the per-identity decisions see one
    /// consistent set of entries. Producers appending to existing windows
    /// proceed concurrently; brand-new identities wait until the sweep ends
    /// and are handled on the next one.
    pub fn sweep_at(&self, now: Instant) -> SweepStats {
        let tracks = self.tracks.read().unwrap();
        let mut stats = SweepStats {
            tracked: tracks.len(),
            ..SweepStats::default()
        };

        // Presence of an entry, not its record count, is what suppresses the
        // fallback label. Entries are never removed, so a known face seen
        // once keeps outranking "unknown" from then on.
        let other_tracked = tracks.keys().any(|label| label != &self.fallback_label);

        for (label, track) in tracks.iter() {
            let mut window = track.window.lock().unwrap();
            window.retain(|record| now.saturating_duration_since(record.at) <= self.window);
            let recent = window.len();

            if recent < self.threshold {
                let suppress = label == &self.fallback_label && other_tracked;
                if suppress {
                    // Keep the previous flag value; only the clear applies.
                    stats.suppressed += 1;
                } else if !track.armed.swap(true, Ordering::SeqCst) {
                    stats.opened += 1;
                }
                window.clear();
            } else if track.armed.swap(false, Ordering::SeqCst) {
                stats.closed += 1;
            }
        }

        stats
    }

    /// Sweep against the current instant.
    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(Instant::now())
    }

    /// Current armed flag for an identity. Untracked identities read false.
    pub fn armed(&self, label: &str) -> bool {
        let tracks = self.tracks.read().unwrap();
        tracks
            .get(label)
            .map(|track| track.armed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Number of identities with a map entry.
    pub fn tracked_identities(&self) -> usize {
        self.tracks.read().unwrap().len()
    }

    /// Window length for an identity, `None` if never seen.
    pub fn window_len(&self, label: &str) -> Option<usize> {
        let tracks = self.tracks.read().unwrap();
        tracks
            .get(label)
            .map(|track| track.window.lock().unwrap().len())
    }
}

impl Default for AnnouncementGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn gate(window: Duration, threshold: usize) -> AnnouncementGate {
        AnnouncementGate::new(GateConfig {
            window,
            threshold,
            fallback_label: UNKNOWN_LABEL.to_string(),
        })
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn partial_results_are_noops() {
        let gate = AnnouncementGate::default();
        let now = Instant::now();
        assert!(!gate.record_detection(None, Some(12.0), now));
        assert!(!gate.record_detection(Some("alice"), None, now));
        assert!(!gate.record_detection(None, None, now));
        assert_eq!(gate.tracked_identities(), 0);
    }

    #[test]
    fn present_identity_stays_disarmed_then_arms_after_leaving() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();

        // Six sightings inside one second: still present at the sweep.
        for i in 0..6 {
            let at = t0 + Duration::from_millis(i * 150);
            assert!(!gate.record_detection(Some("alice"), Some(34.5), at));
        }
        let stats = gate.sweep_at(t0 + secs(1));
        assert!(!gate.armed("alice"));
        assert_eq!(stats.closed, 0); // was already false
        assert_eq!(gate.window_len("alice"), Some(6));

        // Silence for longer than the window: everything ages out, the gate
        // opens, and the window is cleared.
        let stats = gate.sweep_at(t0 + secs(5));
        assert!(gate.armed("alice"));
        assert_eq!(stats.opened, 1);
        assert_eq!(gate.window_len("alice"), Some(0));
    }

    #[test]
    fn record_reports_last_sweep_value_not_this_call() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();

        // Crossing the threshold mid-burst must not change what producers
        // see; only a sweep updates the flag.
        for i in 0..8 {
            let armed =
                gate.record_detection(Some("alice"), Some(20.0), t0 + Duration::from_millis(i * 50));
            assert!(!armed);
        }

        gate.sweep_at(t0 + secs(4)); // silence -> armed
        assert!(gate.record_detection(Some("alice"), Some(20.0), t0 + secs(4)));
    }

    #[test]
    fn sweep_evicts_only_aged_records_while_present() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();
        for i in 0..5 {
            gate.record_detection(Some("alice"), Some(10.0), t0 + Duration::from_millis(i));
        }
        for i in 0..5 {
            gate.record_detection(Some("alice"), Some(10.0), t0 + secs(2) + Duration::from_millis(i));
        }

        // First burst is 4s old, second 2s old: the first ages out, the
        // second keeps alice present so the window is retained, not cleared.
        gate.sweep_at(t0 + secs(4));
        assert!(!gate.armed("alice"));
        assert_eq!(gate.window_len("alice"), Some(5));
    }

    #[test]
    fn record_aged_exactly_window_is_retained() {
        let gate = gate(secs(3), 1);
        let t0 = Instant::now();
        gate.record_detection(Some("alice"), Some(10.0), t0);

        gate.sweep_at(t0 + secs(3));
        assert!(!gate.armed("alice"));
        assert_eq!(gate.window_len("alice"), Some(1));

        gate.sweep_at(t0 + secs(3) + Duration::from_millis(1));
        assert!(gate.armed("alice"));
    }

    #[test]
    fn fallback_arms_when_alone() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();
        gate.record_detection(Some(UNKNOWN_LABEL), Some(70.0), t0);
        gate.record_detection(Some(UNKNOWN_LABEL), Some(71.0), t0);

        let stats = gate.sweep_at(t0 + secs(1));
        assert!(gate.armed(UNKNOWN_LABEL));
        assert_eq!(stats.suppressed, 0);
    }

    #[test]
    fn fallback_is_suppressed_by_any_other_tracked_identity() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();

        // One bob record is enough; suppression does not require bob to meet
        // the threshold.
        gate.record_detection(Some("bob"), Some(22.0), t0);
        gate.record_detection(Some(UNKNOWN_LABEL), Some(70.0), t0);
        gate.record_detection(Some(UNKNOWN_LABEL), Some(72.0), t0);

        let stats = gate.sweep_at(t0 + secs(1));
        assert!(!gate.armed(UNKNOWN_LABEL));
        assert!(gate.armed("bob"));
        assert_eq!(stats.suppressed, 1);
        // The clear still applies on the suppressed path.
        assert_eq!(gate.window_len(UNKNOWN_LABEL), Some(0));
    }

    #[test]
    fn fallback_suppression_outlives_other_identitys_records() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();

        // Bob appears once and ages out entirely; his empty entry remains.
        gate.record_detection(Some("bob"), Some(22.0), t0);
        gate.sweep_at(t0 + secs(1));
        assert_eq!(gate.window_len("bob"), Some(0));

        gate.record_detection(Some(UNKNOWN_LABEL), Some(70.0), t0 + secs(2));
        gate.sweep_at(t0 + secs(3));
        assert!(!gate.armed(UNKNOWN_LABEL));
    }

    #[test]
    fn suppressed_fallback_keeps_previously_armed_flag() {
        let gate = gate(secs(3), 5);
        let t0 = Instant::now();

        // Arm the fallback while it is alone.
        gate.record_detection(Some(UNKNOWN_LABEL), Some(70.0), t0);
        gate.sweep_at(t0 + secs(1));
        assert!(gate.armed(UNKNOWN_LABEL));

        // Bob shows up; the next fallback decision is vetoed but the flag is
        // left as it was, not forced false.
        gate.record_detection(Some("bob"), Some(22.0), t0 + secs(2));
        gate.record_detection(Some(UNKNOWN_LABEL), Some(70.0), t0 + secs(2));
        gate.sweep_at(t0 + secs(3));
        assert!(gate.armed(UNKNOWN_LABEL));
    }

    #[test]
    fn rearms_once_per_appearance_cycle() {
        let gate = gate(secs(3), 5);
        let mut t = Instant::now();

        for _cycle in 0..3 {
            for i in 0..6 {
                gate.record_detection(Some("alice"), Some(18.0), t + Duration::from_millis(i * 100));
            }
            gate.sweep_at(t + secs(1));
            assert!(!gate.armed("alice"));

            let stats = gate.sweep_at(t + secs(5));
            assert!(gate.armed("alice"));
            assert_eq!(stats.opened, 1);

            // A second quiet sweep keeps the flag armed without another
            // opening transition.
            let stats = gate.sweep_at(t + secs(6));
            assert_eq!(stats.opened, 0);
            t += secs(10);
        }
    }

    #[test]
    fn concurrent_producers_and_sweeps_do_not_serialize_or_deadlock() {
        let gate = Arc::new(gate(Duration::from_millis(50), 3));
        let mut handles = Vec::new();

        for worker in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                let label = format!("person-{}", worker);
                for _ in 0..200 {
                    gate.record_detection(Some(&label), Some(30.0), Instant::now());
                }
            }));
        }

        let sweeper = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                for _ in 0..50 {
                    gate.sweep();
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        sweeper.join().unwrap();

        assert_eq!(gate.tracked_identities(), 8);
    }
}
