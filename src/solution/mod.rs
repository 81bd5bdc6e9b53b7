//! Solution state, moves and initial construction.

mod construct;
mod moves;
mod state;

pub use construct::{construct, greedy, random, repair};
pub use moves::Move;
pub(crate) use moves::Footprint;
pub use state::{Assignment, Solution};
pub(crate) use state::Grids;
