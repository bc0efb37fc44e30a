pub mod protocol;

pub use protocol::{HudSnapshot, SyncMode, HUD_LEN, HUD_VERSION};
