use crate::economy::upgrades::{Currency, UpgradeId, PERMANENT_UPGRADE};
use crate::economy::EconomyError;
use crate::save::state::{SaveState, MAX_BUILD, MAX_RELICS, MAX_RESOURCE};

/// Activation thresholds on `total` for phases 1..=6.
pub const PHASE_THRESHOLDS: [f64; 6] = [0.0, 500.0, 1800.0, 9000.0, 12000.0, 35000.0];

/// Lifetime total required to perform a Rite.
pub const RITE_THRESHOLD: f64 = 12000.0;
/// Divisor inside the prestige square root.
pub const RITE_STEP: f64 = 6000.0;
/// Fraction of corruption kept through a Rite.
pub const RITE_CORRUPTION_KEEP: f64 = 0.25;

/// Bandwidth growth per `band` level.
const BAND_BASE: f64 = 1.12;
/// Bandwidth bonus per `resonance` level.
const RESONANCE_STEP: f64 = 0.25;
const OVERCLOCK_STEP: f64 = 0.25;
const RELAY_RATE: f64 = 0.6;
const SIPHON_STEP: f64 = 0.2;
const AUTO_RATE: f64 = 0.5;
const AUTO_TAP_SYNERGY: f64 = 0.08;

/// Strongest gain suppression at full corruption.
const CORRUPTION_PENALTY: f64 = 0.65;
const CORRUPTION_LOG_GROWTH: f64 = 2e-5;
const CORRUPTION_RISK_GROWTH: f64 = 8e-5;
const STABILIZER_STEP: f64 = 0.06;
const STABILIZER_FLOOR: f64 = 0.25;

/// Rates derived from upgrade levels. Recomputed after any purchase or load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    /// Signal per tap, before the corruption penalty.
    pub click: f64,
    pub bandwidth: f64,
    /// Signal per second from relays.
    pub passive_rate: f64,
    /// Signal per second from autotap.
    pub auto_rate: f64,
}

impl Default for Derived {
    fn default() -> Self {
        recompute(&SaveState::default())
    }
}

pub fn recompute(state: &SaveState) -> Derived {
    let lvl = |id| f64::from(state.level(id));

    let bandwidth = BAND_BASE.powf(lvl(UpgradeId::Band)) * (1.0 + RESONANCE_STEP * lvl(UpgradeId::Resonance));
    let click = (1.0 + lvl(UpgradeId::Tap)) * (1.0 + OVERCLOCK_STEP * lvl(UpgradeId::Overclock)) * bandwidth;
    let passive_rate =
        RELAY_RATE * lvl(UpgradeId::Relay) * (1.0 + SIPHON_STEP * lvl(UpgradeId::Siphon)) * bandwidth;
    let auto_rate = if state.level(UpgradeId::Auto) == 0 {
        0.0
    } else {
        AUTO_RATE * lvl(UpgradeId::Auto) * (1.0 + AUTO_TAP_SYNERGY * lvl(UpgradeId::Tap)) * bandwidth
    };

    Derived {
        click,
        bandwidth,
        passive_rate,
        auto_rate,
    }
}

/// Multiplier applied to live gain (taps and per-frame accrual).
pub fn corruption_penalty(corruption: f64) -> f64 {
    1.0 - CORRUPTION_PENALTY * corruption.clamp(0.0, 1.0)
}

/// Credit `amount` to both `signal` and `total`, then re-derive phase.
/// Returns what was actually credited after clamping.
pub fn add_gain(state: &mut SaveState, amount: f64) -> f64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0.0;
    }
    let before = state.total;
    state.signal = (state.signal + amount).min(MAX_RESOURCE);
    state.total = (state.total + amount).min(MAX_RESOURCE);
    state.sync_phase();
    state.mark_dirty();
    state.total - before
}

/// One manual tap.
pub fn tap(state: &mut SaveState, derived: &Derived) -> f64 {
    add_gain(state, derived.click * corruption_penalty(state.corruption))
}

/// Live passive and auto gain over `dt` seconds.
pub fn accrue(state: &mut SaveState, derived: &Derived, dt: f64) -> f64 {
    if dt <= 0.0 {
        return 0.0;
    }
    let rate = (derived.passive_rate + derived.auto_rate) * corruption_penalty(state.corruption);
    add_gain(state, rate * dt)
}

/// Price of the next level of `id`.
pub fn cost(state: &SaveState, id: UpgradeId) -> f64 {
    let def = id.def();
    (def.base_cost * def.cost_mult.powf(f64::from(state.level(id)))).floor()
}

fn balance(state: &SaveState, currency: Currency) -> f64 {
    match currency {
        Currency::Signal => state.signal,
        Currency::Relics => state.relics,
    }
}

fn check_purchase(state: &SaveState, id: UpgradeId) -> Result<f64, EconomyError> {
    let def = id.def();
    if state.total < def.unlock_total {
        return Err(EconomyError::Locked {
            id,
            unlock: def.unlock_total,
        });
    }
    if state.level(id) >= def.max_level {
        return Err(EconomyError::MaxLevel { id });
    }
    let price = cost(state, id);
    let have = balance(state, def.currency);
    if have < price {
        return Err(EconomyError::Insufficient { id, cost: price, have });
    }
    Ok(price)
}

pub fn can_afford(state: &SaveState, id: UpgradeId) -> bool {
    check_purchase(state, id).is_ok()
}

/// Buy one level of `id`. Debits and increments together, or not at all.
pub fn buy(state: &mut SaveState, id: UpgradeId) -> Result<f64, EconomyError> {
    let price = check_purchase(state, id)?;
    match id.def().currency {
        Currency::Signal => state.signal = (state.signal - price).max(0.0),
        Currency::Relics => state.relics = (state.relics - price).max(0.0),
    }
    let level = state.level(id);
    state.upgrades.set_level(id, level + 1);
    state.mark_dirty();
    Ok(price)
}

/// Per-second corruption growth before `dt` scaling.
pub fn corruption_growth(state: &SaveState) -> f64 {
    let risky: u32 = UpgradeId::ALL
        .into_iter()
        .filter(|id| id.is_risky())
        .map(|id| state.level(id))
        .sum();
    let base = CORRUPTION_LOG_GROWTH * state.total.max(0.0).ln_1p() + CORRUPTION_RISK_GROWTH * f64::from(risky);
    let damp = (1.0 - STABILIZER_STEP * f64::from(state.level(UpgradeId::Stabilizer))).max(STABILIZER_FLOOR);
    base * damp
}

pub fn corruption_tick(state: &mut SaveState, dt: f64) {
    if dt <= 0.0 || !dt.is_finite() {
        return;
    }
    let before = state.corruption;
    state.corruption += corruption_growth(state) * dt;
    state.clamp_corruption();
    if state.corruption != before {
        state.mark_dirty();
    }
}

/// Highest phase whose threshold does not exceed `total`.
pub fn phase_for_total(total: f64) -> u8 {
    let reached = PHASE_THRESHOLDS.iter().take_while(|&&t| total >= t).count();
    reached.max(1) as u8
}

pub fn prestige_gain(state: &SaveState) -> u32 {
    let excess = (state.total - RITE_THRESHOLD).max(0.0);
    1 + (excess / RITE_STEP).sqrt().floor() as u32
}

pub fn can_rite(state: &SaveState) -> bool {
    state.total >= RITE_THRESHOLD
}

/// Perform a Rite. Returns the relics credited.
pub fn do_rite(state: &mut SaveState) -> Result<u32, EconomyError> {
    if !can_rite(state) {
        return Err(EconomyError::RiteLocked {
            total: state.total,
            required: RITE_THRESHOLD,
        });
    }
    let gained = prestige_gain(state);

    state.relics = (state.relics + f64::from(gained)).min(MAX_RELICS);
    state.build = state.build.saturating_add(1).min(MAX_BUILD);
    state.signal = 0.0;
    state.total = 0.0;
    state.corruption *= RITE_CORRUPTION_KEEP;
    state.clamp_corruption();
    state.upgrades.reset_except(PERMANENT_UPGRADE);
    state.sync_phase();
    state.mark_dirty();

    log::info!("rite complete: build {} (+{} relics)", state.build, gained);
    Ok(gained)
}
