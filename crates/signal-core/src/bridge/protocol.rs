//! HUD record layout shared with JS.
//! Must stay in sync with the TypeScript `hud.ts` reader.
//!
//! Layout (all values f64 / 8 bytes, read through a `Float64Array` view):
//! ```text
//! [0]  protocol version
//! [1]  signal            [2]  total            [3]  relics
//! [4]  corruption        [5]  phase            [6]  build
//! [7]  click             [8]  bandwidth        [9]  passive rate
//! [10] auto rate         [11] prestige gain    [12] rite ready (0/1)
//! [13] sync mode         [14] updated-at ms    [15] comms status
//! [16..16+N] next cost per upgrade, in `UpgradeId::ALL` order
//! [16+N..16+2N] level per upgrade
//! ```

use crate::comms::CommsStatus;
use crate::economy::formulas::{can_rite, cost, prestige_gain, Derived};
use crate::economy::upgrades::UpgradeId;
use crate::save::SaveState;

/// Protocol version written at index 0.
pub const HUD_VERSION: f64 = 1.0;

pub const HUD_VERSION_IDX: usize = 0;
pub const HUD_SIGNAL: usize = 1;
pub const HUD_TOTAL: usize = 2;
pub const HUD_RELICS: usize = 3;
pub const HUD_CORRUPTION: usize = 4;
pub const HUD_PHASE: usize = 5;
pub const HUD_BUILD: usize = 6;
pub const HUD_CLICK: usize = 7;
pub const HUD_BANDWIDTH: usize = 8;
pub const HUD_PASSIVE: usize = 9;
pub const HUD_AUTO: usize = 10;
pub const HUD_PRESTIGE_GAIN: usize = 11;
pub const HUD_RITE_READY: usize = 12;
pub const HUD_SYNC_MODE: usize = 13;
pub const HUD_UPDATED_AT: usize = 14;
pub const HUD_COMMS: usize = 15;

/// Number of fixed fields before the per-upgrade sections.
pub const HUD_HEADER: usize = 16;
pub const HUD_COSTS: usize = HUD_HEADER;
pub const HUD_LEVELS: usize = HUD_HEADER + UpgradeId::COUNT;
pub const HUD_LEN: usize = HUD_HEADER + 2 * UpgradeId::COUNT;

/// Where saves are going right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Guest = 0,
    Reconciling = 1,
    Cloud = 2,
}

/// Flat snapshot of everything the HUD renders.
#[derive(Debug, Clone, PartialEq)]
pub struct HudSnapshot {
    values: [f64; HUD_LEN],
}

impl Default for HudSnapshot {
    fn default() -> Self {
        let mut values = [0.0; HUD_LEN];
        values[HUD_VERSION_IDX] = HUD_VERSION;
        Self { values }
    }
}

impl HudSnapshot {
    pub fn capture(state: &SaveState, derived: &Derived, sync: SyncMode, comms: CommsStatus) -> Self {
        let mut hud = Self::default();
        let v = &mut hud.values;
        v[HUD_SIGNAL] = state.signal;
        v[HUD_TOTAL] = state.total;
        v[HUD_RELICS] = state.relics;
        v[HUD_CORRUPTION] = state.corruption;
        v[HUD_PHASE] = f64::from(state.phase);
        v[HUD_BUILD] = f64::from(state.build);
        v[HUD_CLICK] = derived.click;
        v[HUD_BANDWIDTH] = derived.bandwidth;
        v[HUD_PASSIVE] = derived.passive_rate;
        v[HUD_AUTO] = derived.auto_rate;
        v[HUD_PRESTIGE_GAIN] = f64::from(prestige_gain(state));
        v[HUD_RITE_READY] = if can_rite(state) { 1.0 } else { 0.0 };
        v[HUD_SYNC_MODE] = sync as u8 as f64;
        v[HUD_UPDATED_AT] = state.meta.updated_at_ms as f64;
        v[HUD_COMMS] = comms as u8 as f64;
        for (i, id) in UpgradeId::ALL.into_iter().enumerate() {
            v[HUD_COSTS + i] = cost(state, id);
            v[HUD_LEVELS + i] = f64::from(state.level(id));
        }
        hud
    }

    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn as_ptr(&self) -> *const f64 {
        self.values.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::formulas::recompute;

    #[test]
    fn sections_do_not_overlap() {
        assert_eq!(HUD_COSTS, 16);
        assert_eq!(HUD_LEVELS, HUD_COSTS + UpgradeId::COUNT);
        assert_eq!(HUD_LEN, HUD_LEVELS + UpgradeId::COUNT);
    }

    #[test]
    fn capture_fills_fields() {
        let mut s = SaveState::default();
        s.total = 13000.0;
        s.signal = 20.0;
        s.sync_phase();
        s.upgrades.set_level(UpgradeId::Tap, 3);
        let hud = HudSnapshot::capture(&s, &recompute(&s), SyncMode::Cloud, CommsStatus::Failed);

        assert_eq!(hud.get(HUD_VERSION_IDX), HUD_VERSION);
        assert_eq!(hud.get(HUD_PHASE), 5.0);
        assert_eq!(hud.get(HUD_RITE_READY), 1.0);
        assert_eq!(hud.get(HUD_SYNC_MODE), 2.0);
        assert_eq!(hud.get(HUD_CLICK), 4.0);
        assert_eq!(hud.get(HUD_LEVELS), 3.0);
        assert_eq!(hud.get(HUD_COSTS), cost(&s, UpgradeId::Tap));
        assert_eq!(hud.get(HUD_LEN + 5), 0.0);
    }
}
