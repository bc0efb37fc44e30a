use std::collections::BTreeMap;

use serde::Serialize;

use crate::economy::formulas::phase_for_total;
use crate::economy::upgrades::UpgradeId;

/// Current save schema version. Every sanitized state carries it.
pub const SAVE_VERSION: u32 = 1;

/// Display name used when the player has not picked one.
pub const DEFAULT_NAME: &str = "GUEST";
/// Maximum display name length, in characters.
pub const MAX_NAME_CHARS: usize = 18;

pub const MIN_BUILD: u32 = 1;
pub const MAX_BUILD: u32 = 1_000_000;
pub const MAX_RELICS: f64 = 1e12;
pub const MAX_RESOURCE: f64 = 1e18;
pub const MIN_PHASE: u8 = 1;
pub const MAX_PHASE: u8 = 6;
/// Largest epoch-millisecond value a JS `Date` can represent.
pub const MAX_TIMESTAMP_MS: u64 = 8_640_000_000_000_000;

/// Player profile block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub name: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
        }
    }
}

/// Cooldown stamps for the comms collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timers {
    pub last_ai_at: u64,
    pub last_ambient_at: u64,
}

/// Bookkeeping that never drives gameplay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Epoch ms of the last persisted mutation. Authority for offline gain
    /// and for local-vs-remote recency.
    pub updated_at_ms: u64,
    /// Epoch ms of the last remote write attempt from this device.
    pub last_cloud_write_ms: u64,
    /// Set by mutations, cleared by `touch`. Never stored.
    #[serde(rename = "_dirty")]
    pub dirty: bool,
}

/// Upgrade levels keyed by identifier. Absent entries are level 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Upgrades(BTreeMap<UpgradeId, u32>);

impl Upgrades {
    pub fn level(&self, id: UpgradeId) -> u32 {
        self.0.get(&id).copied().unwrap_or(0)
    }

    /// Set a level, clamped to the upgrade's maximum. Level 0 removes the entry.
    pub fn set_level(&mut self, id: UpgradeId, level: u32) {
        let level = level.min(id.def().max_level);
        if level == 0 {
            self.0.remove(&id);
        } else {
            self.0.insert(id, level);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (UpgradeId, u32)> + '_ {
        self.0.iter().map(|(id, lvl)| (*id, *lvl))
    }

    /// Zero every level except `keep`.
    pub fn reset_except(&mut self, keep: UpgradeId) {
        self.0.retain(|id, _| *id == keep);
    }
}

/// The single persisted aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveState {
    pub version: u32,
    pub profile: Profile,
    pub build: u32,
    pub relics: f64,
    pub signal: f64,
    pub total: f64,
    pub corruption: f64,
    pub phase: u8,
    pub upgrades: Upgrades,
    pub timers: Timers,
    pub meta: Meta,
}

impl Default for SaveState {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            profile: Profile::default(),
            build: MIN_BUILD,
            relics: 0.0,
            signal: 0.0,
            total: 0.0,
            corruption: 0.0,
            phase: MIN_PHASE,
            upgrades: Upgrades::default(),
            timers: Timers::default(),
            meta: Meta::default(),
        }
    }
}

impl SaveState {
    pub fn level(&self, id: UpgradeId) -> u32 {
        self.upgrades.level(id)
    }

    /// Flag an in-memory mutation that has not been persisted yet.
    pub fn mark_dirty(&mut self) {
        self.meta.dirty = true;
    }

    /// Stamp the state as persisted at `now_ms`.
    pub fn touch(&mut self, now_ms: u64) {
        self.meta.updated_at_ms = now_ms.min(MAX_TIMESTAMP_MS);
        self.meta.dirty = false;
    }

    /// Re-derive `phase` from `total`. Must follow every change to `total`.
    pub fn sync_phase(&mut self) {
        self.phase = phase_for_total(self.total);
    }

    /// Pull `corruption` back into [0, 1].
    pub fn clamp_corruption(&mut self) {
        self.corruption = if self.corruption.is_finite() {
            self.corruption.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}

/// Normalize a display name: trimmed, uppercased, length-capped, never empty.
pub fn normalize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .flat_map(char::to_uppercase)
        .take(MAX_NAME_CHARS)
        .collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name
    }
}
