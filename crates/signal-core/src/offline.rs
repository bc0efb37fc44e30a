use crate::config::GameConfig;
use crate::economy::formulas::{add_gain, recompute};
use crate::save::SaveState;

/// What the offline calculator decided, for the "welcome back" line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OfflineReport {
    /// Seconds credited, after the cap.
    pub elapsed_secs: f64,
    /// Whether the absence was longer than the cap.
    pub capped: bool,
    pub gained: f64,
}

/// Seconds of absence worth crediting, or `None` when nothing should be granted.
fn creditable_secs(state: &SaveState, now_ms: u64, config: &GameConfig) -> Option<(f64, bool)> {
    let since = state.meta.updated_at_ms;
    if since == 0 || now_ms < since {
        return None;
    }
    let elapsed = (now_ms - since) as f64 / 1000.0;
    if !elapsed.is_finite() || elapsed < config.offline_floor_secs {
        return None;
    }
    let capped = elapsed > config.offline_cap_secs;
    Some((elapsed.min(config.offline_cap_secs), capped))
}

/// Credit passive generation for the time since the last persisted mutation.
///
/// Offline gain deliberately ignores corruption: only live gain is penalized.
/// Call once per load and stamp `meta.updated_at_ms` right after; a second
/// call against the same stamp grants the same absence twice.
pub fn offline_report(state: &mut SaveState, now_ms: u64, config: &GameConfig) -> OfflineReport {
    let Some((elapsed_secs, capped)) = creditable_secs(state, now_ms, config) else {
        return OfflineReport::default();
    };
    let rate = recompute(state).passive_rate;
    let gained = add_gain(state, rate * elapsed_secs);
    if gained > 0.0 {
        log::info!("offline: {:.0}s away, +{:.1} signal{}", elapsed_secs, gained, if capped { " (capped)" } else { "" });
    }
    OfflineReport {
        elapsed_secs,
        capped,
        gained,
    }
}

pub fn apply_offline(state: &mut SaveState, now_ms: u64, config: &GameConfig) -> f64 {
    offline_report(state, now_ms, config).gained
}
