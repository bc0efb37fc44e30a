use bytemuck::{Pod, Zeroable};

/// A game event communicated from Rust to JS by pointer.
/// Generic container: `kind` identifies the event, `a/b/c` carry payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GameEvent {
    pub kind: f32,
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl GameEvent {
    pub const FLOATS: usize = 4;

    pub fn new(kind: EventKind, a: f32, b: f32, c: f32) -> Self {
        Self {
            kind: kind as u32 as f32,
            a,
            b,
            c,
        }
    }
}

/// Event kinds (Rust → JS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventKind {
    /// a = new phase, b = previous phase.
    PhaseChanged = 1,
    /// a = upgrade index, b = new level.
    Purchased = 2,
    /// a = relics gained, b = new build.
    Rite = 3,
    /// a = seconds credited, b = signal gained, c = 1 when capped.
    OfflineGain = 4,
    /// a = 0 local / 1 remote / 2 downgraded to guest.
    Synced = 5,
    /// a = 1 when the local write landed.
    Saved = 6,
}
