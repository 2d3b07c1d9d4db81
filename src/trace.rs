//! Execution tracing.
//!
//! Every execution opens a [`Tracer`] when it is created and drops it when
//! its future finishes, emitting indented `START` / `END` lines under the
//! `kasync::trace` target. Purely observational.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
static DEPTH: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct Tracer {
    id: usize,
    name: String,
}

impl Tracer {
    pub(crate) fn new(name: &str) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let depth = DEPTH.fetch_add(1, Ordering::Relaxed);
        trace!(
            target: "kasync::trace",
            "{}START {} {}",
            " ".repeat(depth * 2),
            id,
            name
        );
        Self {
            id,
            name: name.to_string(),
        }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        let depth = DEPTH
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        trace!(
            target: "kasync::trace",
            "{}END   {} {}",
            " ".repeat(depth * 2),
            self.id,
            self.name
        );
    }
}
