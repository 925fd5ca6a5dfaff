//! Plugin lifecycle states

use std::fmt;

/// Lifecycle state of a [`PluginSpec`](super::PluginSpec)
///
/// States only move forward, one step at a time:
///
/// `Read -> Resolved -> Loaded -> Initialized -> Running -> Stopped -> Deleted`
///
/// `Invalid` is the error sink and can be entered from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginState {
    Invalid,
    Read,
    Resolved,
    Loaded,
    Initialized,
    Running,
    Stopped,
    Deleted,
}

impl PluginState {
    /// The only state a spec may be in right before entering `self`
    ///
    /// `Invalid` has no predecessor since it is reachable from anywhere, and
    /// `Read` is only ever assigned by the descriptor parser.
    pub fn predecessor(self) -> Option<PluginState> {
        match self {
            PluginState::Invalid | PluginState::Read => None,
            PluginState::Resolved => Some(PluginState::Read),
            PluginState::Loaded => Some(PluginState::Resolved),
            PluginState::Initialized => Some(PluginState::Loaded),
            PluginState::Running => Some(PluginState::Initialized),
            PluginState::Stopped => Some(PluginState::Running),
            PluginState::Deleted => Some(PluginState::Stopped),
        }
    }

    /// Whether `self -> next` is a legal step of the lifecycle
    pub fn can_advance_to(self, next: PluginState) -> bool {
        next == PluginState::Invalid || next.predecessor() == Some(self)
    }

    /// All states in lifecycle order
    pub fn all() -> [PluginState; 8] {
        [
            PluginState::Invalid,
            PluginState::Read,
            PluginState::Resolved,
            PluginState::Loaded,
            PluginState::Initialized,
            PluginState::Running,
            PluginState::Stopped,
            PluginState::Deleted,
        ]
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Invalid => write!(f, "Invalid"),
            PluginState::Read => write!(f, "Read"),
            PluginState::Resolved => write!(f, "Resolved"),
            PluginState::Loaded => write!(f, "Loaded"),
            PluginState::Initialized => write!(f, "Initialized"),
            PluginState::Running => write!(f, "Running"),
            PluginState::Stopped => write!(f, "Stopped"),
            PluginState::Deleted => write!(f, "Deleted"),
        }
    }
}
