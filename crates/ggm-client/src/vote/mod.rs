//! Optimistic vote controls.

mod clock;
mod engine;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ObserverId, ToggleOutcome, VoteBackend, VoteSnapshot, VoteStore};
pub use state::{RemoteOp, VoteState, VoteTally};
