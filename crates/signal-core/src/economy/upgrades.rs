use serde::{Deserialize, Serialize};

/// Which balance an upgrade is paid from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Signal,
    Relics,
}

/// Static description of an upgrade track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeDef {
    pub id: UpgradeId,
    pub label: &'static str,
    pub currency: Currency,
    pub base_cost: f64,
    pub cost_mult: f64,
    /// Lifetime `total` required before the upgrade can be bought.
    pub unlock_total: f64,
    pub max_level: u32,
}

/// Upgrade identifiers. The serialized names are the save-file keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeId {
    Tap,
    Relay,
    Band,
    Auto,
    Overclock,
    Stabilizer,
    Siphon,
    Resonance,
}

/// The upgrade whose level survives a Rite.
pub const PERMANENT_UPGRADE: UpgradeId = UpgradeId::Resonance;

const UPGRADES: [UpgradeDef; UpgradeId::COUNT] = [
    UpgradeDef {
        id: UpgradeId::Tap,
        label: "Tap Gain",
        currency: Currency::Signal,
        base_cost: 15.0,
        cost_mult: 1.15,
        unlock_total: 0.0,
        max_level: 500,
    },
    UpgradeDef {
        id: UpgradeId::Relay,
        label: "Relay",
        currency: Currency::Signal,
        base_cost: 40.0,
        cost_mult: 1.17,
        unlock_total: 60.0,
        max_level: 500,
    },
    UpgradeDef {
        id: UpgradeId::Band,
        label: "Bandwidth",
        currency: Currency::Signal,
        base_cost: 60.0,
        cost_mult: 1.22,
        unlock_total: 150.0,
        max_level: 200,
    },
    UpgradeDef {
        id: UpgradeId::Auto,
        label: "Autotap",
        currency: Currency::Signal,
        base_cost: 250.0,
        cost_mult: 1.30,
        unlock_total: 900.0,
        max_level: 100,
    },
    UpgradeDef {
        id: UpgradeId::Overclock,
        label: "Overclock",
        currency: Currency::Signal,
        base_cost: 500.0,
        cost_mult: 1.35,
        unlock_total: 1800.0,
        max_level: 50,
    },
    UpgradeDef {
        id: UpgradeId::Stabilizer,
        label: "Stabilizer",
        currency: Currency::Signal,
        base_cost: 800.0,
        cost_mult: 1.30,
        unlock_total: 1800.0,
        max_level: 40,
    },
    UpgradeDef {
        id: UpgradeId::Siphon,
        label: "Siphon",
        currency: Currency::Signal,
        base_cost: 1200.0,
        cost_mult: 1.40,
        unlock_total: 9000.0,
        max_level: 50,
    },
    UpgradeDef {
        id: UpgradeId::Resonance,
        label: "Resonance",
        currency: Currency::Relics,
        base_cost: 1.0,
        cost_mult: 1.60,
        unlock_total: 0.0,
        max_level: 100,
    },
];

impl UpgradeId {
    pub const COUNT: usize = 8;

    pub const ALL: [UpgradeId; UpgradeId::COUNT] = [
        UpgradeId::Tap,
        UpgradeId::Relay,
        UpgradeId::Band,
        UpgradeId::Auto,
        UpgradeId::Overclock,
        UpgradeId::Stabilizer,
        UpgradeId::Siphon,
        UpgradeId::Resonance,
    ];

    pub fn def(self) -> &'static UpgradeDef {
        &UPGRADES[self as usize]
    }

    /// Save-file key for this upgrade.
    pub fn key(self) -> &'static str {
        match self {
            UpgradeId::Tap => "tap",
            UpgradeId::Relay => "relay",
            UpgradeId::Band => "band",
            UpgradeId::Auto => "auto",
            UpgradeId::Overclock => "overclock",
            UpgradeId::Stabilizer => "stabilizer",
            UpgradeId::Siphon => "siphon",
            UpgradeId::Resonance => "resonance",
        }
    }

    pub fn from_key(key: &str) -> Option<UpgradeId> {
        UpgradeId::ALL.into_iter().find(|id| id.key() == key)
    }

    /// Upgrades that feed corruption growth.
    pub fn is_risky(self) -> bool {
        matches!(self, UpgradeId::Overclock | UpgradeId::Siphon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_discriminant() {
        for id in UpgradeId::ALL {
            assert_eq!(id.def().id, id);
        }
    }

    #[test]
    fn keys_round_trip() {
        for id in UpgradeId::ALL {
            assert_eq!(UpgradeId::from_key(id.key()), Some(id));
            assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(id.key()));
        }
        assert_eq!(UpgradeId::from_key("warp"), None);
    }

    #[test]
    fn only_resonance_is_paid_in_relics() {
        let relic_funded: Vec<_> = UpgradeId::ALL
            .into_iter()
            .filter(|id| id.def().currency == Currency::Relics)
            .collect();
        assert_eq!(relic_funded, vec![PERMANENT_UPGRADE]);
    }
}
