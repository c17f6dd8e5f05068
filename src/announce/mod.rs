//! Detection debouncing.
//!
//! Converts the classifier's noisy per-frame output into discrete
//! announcement events:
//! - [`gate::AnnouncementGate`] keeps a sliding detection window per
//!   identity plus an armed flag that only the periodic sweep mutates.
//! - [`sweeper::AnnouncementSweeper`] owns the sweep schedule as a
//!   supervised background task.
//!
//! The gate has no side effects of its own. Callers read the boolean from
//! `record_detection` and decide what an announcement means operationally.

pub mod gate;
pub mod sweeper;

pub use gate::{AnnouncementGate, DetectionRecord, GateConfig, SweepStats};
pub use sweeper::{AnnouncementSweeper, SweeperHandle, DEFAULT_SWEEP_PERIOD};
