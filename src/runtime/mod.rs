//! Driving a [`ModuleManager`] against a [`ResourceLoader`].
//!
//! The manager never touches a loader itself. It emits
//! [`ResourceRequest`](crate::resolve::ResourceRequest)s; the driver starts
//! one fetch per request, polls them all on the current thread, and feeds
//! each completion back as a queued task. Driving ends when no task is queued
//! and no fetch is in flight.

use std::path::PathBuf;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use crate::error::LoadError;
use crate::loader::ResourceLoader;
use crate::resolve::{ModuleDescriptor, ModuleManager, Phase};

// ─── Types ─────────────────────────────────────────────────────────

/// What one call to [`drive`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveSummary {
    /// Fetches started.
    pub fetched: usize,
    pub phase: Phase,
    /// Nodes still unsolved, in registration order.
    pub unsolved: Vec<String>,
}

impl DriveSummary {
    pub fn is_complete(&self) -> bool {
        self.unsolved.is_empty()
    }
}

type Completion = (PathBuf, Result<Vec<ModuleDescriptor>, LoadError>);

// ─── Driver ────────────────────────────────────────────────────────

/// Run the manager until it stalls: every task handled, every fetch settled.
pub async fn drive<L>(manager: &mut ModuleManager, loader: &L) -> DriveSummary
where
    L: ResourceLoader + ?Sized,
{
    let mut inflight = FuturesUnordered::new();
    let mut fetched = 0;

    loop {
        manager.run_pending();

        for request in manager.take_requests() {
            debug!(
                path = %request.path.display(),
                origin = %request.origin,
                "starting fetch"
            );
            let fut = loader.load(&request.path);
            let path = request.path;
            inflight.push(async move {
                let done: Completion = (path, fut.await);
                done
            });
            fetched += 1;
        }

        if manager.has_pending_tasks() {
            continue;
        }
        match inflight.next().await {
            Some((path, outcome)) => manager.complete_resource(path, outcome),
            None => break,
        }
    }

    let summary = DriveSummary {
        fetched,
        phase: manager.phase(),
        unsolved: manager.unsolved(),
    };
    info!(
        fetched = summary.fetched,
        solved = manager.solved_order().len(),
        unsolved = summary.unsolved.len(),
        "resolution stalled"
    );
    summary
}
