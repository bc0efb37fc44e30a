pub mod queue;

pub use queue::{GameInput, InputQueue};
