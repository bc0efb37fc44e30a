pub mod formulas;
pub mod upgrades;

use thiserror::Error;

use upgrades::UpgradeId;

/// Why a purchase or Rite was refused. The state is untouched in every case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EconomyError {
    #[error("{id:?} unlocks at total {unlock}")]
    Locked { id: UpgradeId, unlock: f64 },
    #[error("{id:?} costs {cost}, balance is {have}")]
    Insufficient { id: UpgradeId, cost: f64, have: f64 },
    #[error("{id:?} is already at max level")]
    MaxLevel { id: UpgradeId },
    #[error("rite needs total {required}, have {total}")]
    RiteLocked { total: f64, required: f64 },
}
