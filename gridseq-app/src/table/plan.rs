#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    /// One cell changed; structure untouched.
    SingleCell { step: usize, column: usize },
    /// Row count, sound grids or sections changed.
    Structural,
}

/// How an edit reaches the engine's flat grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPlan {
    /// Write the touched cell only.
    InPlaceWrite { step: usize, column: usize },
    /// Reconfigure columns and steps while playing and rewrite every cell in
    /// place. The native table is never cleared, so playback keeps running.
    LiveReconfigure,
    /// Clear the native table and rebuild it from the model.
    Rebuild,
}

pub fn plan_edit(state: PlayState, kind: EditKind) -> SyncPlan {
    match (state, kind) {
        (_, EditKind::SingleCell { step, column }) => SyncPlan::InPlaceWrite { step, column },
        (PlayState::Playing, EditKind::Structural) => SyncPlan::LiveReconfigure,
        (PlayState::Stopped, EditKind::Structural) => SyncPlan::Rebuild,
    }
}
