//! Write-behind persistence policy for the track engine.
//!
//! The in-memory model is the system of record for liveness; durable storage
//! is a history log. Engine writes therefore never fail the caller: each write
//! is attempted, retried a bounded number of times, then dropped with a
//! warning. Outcomes are counted so the trade-off stays observable.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::store::StoreError;

/// Counters exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceStats {
    /// Writes that eventually succeeded
    pub writes_ok: u64,
    /// Attempts that failed and were retried
    pub retried_writes: u64,
    /// Writes abandoned after exhausting retries
    pub dropped_writes: u64,
}

/// Bounded-retry, log-and-count write policy.
#[derive(Debug)]
pub struct WriteBehind {
    retries: u32,
    writes_ok: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

impl WriteBehind {
    /// Policy that retries each failed write `retries` extra times
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            writes_ok: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Run a write. Returns whether it was eventually applied.
    pub fn write<F>(&self, op: &'static str, mut write: F) -> bool
    where
        F: FnMut() -> Result<(), StoreError>,
    {
        let mut attempt = 0;
        loop {
            match write() {
                Ok(()) => {
                    self.writes_ok.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(err) if attempt < self.retries && is_transient(&err) => {
                    attempt += 1;
                    self.retried.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(op, attempt, error = %err, "Retrying write");
                }
                Err(err) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(op, attempts = attempt + 1, error = %err, "Dropped write");
                    return false;
                }
            }
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> PersistenceStats {
        PersistenceStats {
            writes_ok: self.writes_ok.load(Ordering::Relaxed),
            retried_writes: self.retried.load(Ordering::Relaxed),
            dropped_writes: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for WriteBehind {
    fn default() -> Self {
        Self::new(1)
    }
}

fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Database(_) | StoreError::Io(_))
}
