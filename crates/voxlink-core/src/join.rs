//! Bringing a newly subscribed client up to the shared session state.
//!
//! On every (re)subscription the client becomes `New` and asks its peers for
//! a snapshot. The first snapshot received while `New` is applied and the
//! client becomes `Synced`; later snapshots are ignored. Only `Synced` clients
//! answer snapshot requests. A client that hears nothing before the join wait
//! expires is alone on the channel and promotes itself to `Synced`.

use crate::engine::{DrawingEngine, SliceType};
use crate::protocol::{SyncRequest, SyncSnapshot};
use crate::replay::replay_stroke;
use crate::stroke::{DrawHistory, Stroke};

#[cfg(target_arch = "wasm32")]
pub use web_time::{Duration, Instant};
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant};

/// Default wait for a snapshot after subscribing.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinState {
    /// No snapshot applied since the last subscription.
    #[default]
    New,
    Synced,
}

/// Result of offering a snapshot to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Snapshot applied; `replayed` strokes were drawn.
    Applied { replayed: usize },
    /// Already synced, nothing done.
    Ignored,
}

/// Result of the join wait running out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTimeout {
    /// No snapshot arrived; this client now holds the session state.
    Promoted,
    /// A snapshot had already been applied.
    AlreadySynced,
}

#[derive(Debug, Clone)]
pub struct JoinSynchronizer {
    state: JoinState,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Default for JoinSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_JOIN_TIMEOUT)
    }
}

impl JoinSynchronizer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: JoinState::New,
            timeout,
            deadline: None,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state == JoinState::Synced
    }

    /// Reset to `New` after a subscription and build the snapshot request.
    pub fn on_subscribed(&mut self, now: Instant) -> SyncRequest {
        self.state = JoinState::New;
        self.deadline = Some(now + self.timeout);
        SyncRequest { is_needed: true }
    }

    /// Whether to answer a peer's snapshot request.
    pub fn should_answer(&self, request: &SyncRequest) -> bool {
        request.is_needed && self.is_synced()
    }

    /// Build the snapshot this client shares with joining peers.
    pub fn snapshot<E: DrawingEngine + ?Sized>(
        engine: &E,
        history: &DrawHistory,
        view: SliceType,
    ) -> SyncSnapshot {
        SyncSnapshot {
            current_draw_data: history.to_vec(),
            view: Some(view),
            this_mm: Some(engine.frac_to_mm(engine.crosshair_frac())),
        }
    }

    /// Apply a peer's snapshot if this client is still `New`.
    ///
    /// When the snapshot holds more strokes than the local history, the
    /// history becomes the snapshot's strokes in order followed by any local
    /// strokes the snapshot lacks. Empty snapshot strokes are dropped.
    pub fn apply_snapshot<E: DrawingEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        history: &mut DrawHistory,
        view: &mut SliceType,
        snapshot: &SyncSnapshot,
    ) -> SnapshotOutcome {
        if self.is_synced() {
            return SnapshotOutcome::Ignored;
        }

        if let Some(slice) = snapshot.view {
            engine.set_slice_type(slice);
            *view = slice;
        }

        let mut replayed = 0;
        if snapshot.current_draw_data.len() > history.len() {
            let shared: Vec<&Stroke> = snapshot
                .current_draw_data
                .iter()
                .filter(|stroke| {
                    if stroke.is_empty() {
                        log::warn!("Dropping empty stroke from snapshot");
                    }
                    !stroke.is_empty()
                })
                .collect();
            replayed = merge_history(engine, history, &shared);
        }

        if let Some(mm) = snapshot.this_mm {
            let frac = engine.mm_to_frac(mm);
            engine.set_crosshair_frac(frac);
        }
        engine.draw_scene();

        self.state = JoinState::Synced;
        self.deadline = None;
        log::info!(
            "Applied snapshot: {} strokes replayed, history now {}",
            replayed,
            history.len()
        );
        SnapshotOutcome::Applied { replayed }
    }

    /// Check the join wait. Fires once per subscription.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<JoinTimeout> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        if self.is_synced() {
            return Some(JoinTimeout::AlreadySynced);
        }
        self.state = JoinState::Synced;
        log::info!("No snapshot received; continuing as first peer");
        Some(JoinTimeout::Promoted)
    }
}

/// Merge snapshot strokes into `history`, keeping one engine undo unit per
/// history entry. Returns the number of strokes drawn.
fn merge_history<E: DrawingEngine + ?Sized>(
    engine: &mut E,
    history: &mut DrawHistory,
    shared: &[&Stroke],
) -> usize {
    let known = history.len();
    let is_prefix = known <= shared.len() && history.iter().zip(shared).all(|(local, remote)| local == *remote);
    if is_prefix {
        for stroke in &shared[known..] {
            replay_stroke(engine, stroke);
            history.push((*stroke).clone());
        }
        return shared.len() - known;
    }

    // Strokes landed while joining: match them by content and redraw the lot.
    let mut leftover = history.to_vec();
    let mut merged: Vec<Stroke> = Vec::with_capacity(shared.len() + leftover.len());
    for stroke in shared {
        if let Some(pos) = leftover.iter().position(|local| local == *stroke) {
            leftover.remove(pos);
        }
        merged.push((*stroke).clone());
    }
    merged.extend(leftover);

    let units = history.iter().filter(|stroke| !stroke.is_empty()).count();
    for _ in 0..units {
        engine.draw_undo();
    }
    for stroke in &merged {
        replay_stroke(engine, stroke);
    }

    let replayed = merged.len();
    *history = DrawHistory::from(merged);
    replayed
}
