pub mod game_loop;
pub mod time;

pub use game_loop::{GameLoop, TickReport};
pub use time::{clamp_frame_dt, FixedTimestep};
