//! Session module - Pose catalogue, session state, and the store that changes it

pub mod pose;
pub mod state;
pub mod store;

pub use pose::{Pose, PoseKind};
pub use state::{BackgroundOrigin, SessionState, Slot, Ticket, ViewerTarget};
pub use store::{Action, Completion, Effect, SessionStore};
