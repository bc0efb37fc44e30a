pub mod admin;
pub mod api;
pub mod auth;
pub mod bridge;
pub mod comms;
pub mod config;
pub mod core;
pub mod economy;
pub mod input;
pub mod offline;
pub mod persist;
pub mod save;

// Re-export key types at crate root for convenience
pub use admin::{authorize, AdminError, AdminRequest, Caller};
pub use api::types::{EventKind, GameEvent};
pub use auth::{AuthError, Credentials};
pub use bridge::protocol::{HudSnapshot, SyncMode};
pub use comms::{CommsLine, CommsRequest, CommsStatus};
pub use config::{ConfigError, GameConfig};
pub use core::game_loop::{GameLoop, TickReport};
pub use core::time::FixedTimestep;
pub use economy::formulas::{recompute, Derived};
pub use economy::upgrades::{Currency, UpgradeDef, UpgradeId};
pub use economy::EconomyError;
pub use input::queue::{GameInput, InputQueue};
pub use offline::{apply_offline, offline_report, OfflineReport};
pub use persist::{
    Coordinator, Identity, LocalError, LocalStore, MemoryRemote, MemoryStore, Outbox, RemoteError, RemoteRow,
    RemoteStore, RemoteWrite, SaveSource,
};
pub use save::{sanitize, SaveState};
