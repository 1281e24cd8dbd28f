//! Per-grant vote state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::VoteAction;

/// Local vote value. Positive and negative are mutually exclusive by
/// construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    #[default]
    None,
    Positive,
    Negative,
}

/// Remote call that reconciles a local transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Set(VoteAction),
    Remove,
}

impl VoteState {
    /// Apply a toggle. Toggling the current side un-votes; toggling the
    /// other side switches directly with a single `Set`.
    pub fn toggle(self, action: VoteAction) -> (VoteState, RemoteOp) {
        let target = VoteState::from(action);
        if self == target {
            (VoteState::None, RemoteOp::Remove)
        } else {
            (target, RemoteOp::Set(action))
        }
    }

    pub fn action(self) -> Option<VoteAction> {
        match self {
            Self::None => None,
            Self::Positive => Some(VoteAction::Positive),
            Self::Negative => Some(VoteAction::Negative),
        }
    }
}

impl From<VoteAction> for VoteState {
    fn from(action: VoteAction) -> Self {
        match action {
            VoteAction::Positive => Self::Positive,
            VoteAction::Negative => Self::Negative,
        }
    }
}

impl From<Option<VoteAction>> for VoteState {
    fn from(action: Option<VoteAction>) -> Self {
        action.map(Self::from).unwrap_or_default()
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Positive => f.write_str("positive"),
            Self::Negative => f.write_str("negative"),
        }
    }
}

/// Display counters shown next to a vote control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub positive: u32,
    pub negative: u32,
}

impl VoteTally {
    pub fn new(positive: u32, negative: u32) -> Self {
        Self { positive, negative }
    }

    /// Counters after moving the local vote from `from` to `to`.
    pub fn shift(self, from: VoteState, to: VoteState) -> Self {
        let mut tally = self;
        match from {
            VoteState::Positive => tally.positive = tally.positive.saturating_sub(1),
            VoteState::Negative => tally.negative = tally.negative.saturating_sub(1),
            VoteState::None => {}
        }
        match to {
            VoteState::Positive => tally.positive = tally.positive.saturating_add(1),
            VoteState::Negative => tally.negative = tally.negative.saturating_add(1),
            VoteState::None => {}
        }
        tally
    }
}
