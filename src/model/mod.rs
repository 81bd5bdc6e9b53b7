//! Problem model.
//!
//! Immutable instance data consumed read-only by every search component:
//! wards (beds, specializations, operating time), patients (specialization,
//! admission window, length of stay, operating time) and the horizon.

mod instance;
mod types;

pub use instance::{Instance, PlacementOptions};
pub use types::{Patient, Ward};
