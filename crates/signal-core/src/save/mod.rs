pub mod sanitize;
pub mod state;

pub use sanitize::{sanitize, sanitize_str, strip_transient, to_storage_string, to_storage_value};
pub use state::{normalize_name, Meta, Profile, SaveState, Timers, Upgrades, SAVE_VERSION};
