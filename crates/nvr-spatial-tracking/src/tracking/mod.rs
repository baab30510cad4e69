//! Cross-camera tracking engine.
//!
//! [`TrackManager`] turns per-camera detections and exits into global tracks,
//! opening a pending handoff whenever a track leaves a camera with a known
//! route. Handoffs are resolved by a [`HandoffMatcher`]; writes to the store
//! go through [`WriteBehind`] so a failing database never stalls ingestion.

pub mod manager;
pub mod matcher;
pub mod persistence;

pub use manager::{SweepReport, TrackManager};
pub use matcher::{HandoffMatcher, HeuristicMatcher};
pub use persistence::{PersistenceStats, WriteBehind};
