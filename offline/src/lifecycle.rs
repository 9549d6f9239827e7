//! Worker Lifecycle Management
//!
//! Handles the worker's state transitions and dispatches lifecycle events
//! to host-registered listeners.

use std::fmt;

use crate::error::WorkerError;

/// Worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet installed
    Parsed,
    /// Install in progress
    Installing,
    /// Installed, waiting to activate
    Installed,
    /// Activation in progress
    Activating,
    /// Activated and serving requests
    Activated,
    /// Replaced or torn down
    Redundant,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Parsed
    }
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    /// Whether fetch interception runs in this state.
    pub fn is_serving(&self) -> bool {
        *self == Self::Activated
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Install started
    Install,
    /// Activation started
    Activate,
    /// State change
    StateChange(StateChangeEvent),
}

/// State change event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeEvent {
    /// Old state
    pub old_state: WorkerState,
    /// New state
    pub new_state: WorkerState,
}

/// Lifecycle listener callback
pub type LifecycleListener = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Lifecycle manager
pub struct LifecycleManager {
    /// Current state
    state: WorkerState,
    /// Event listeners
    listeners: Vec<LifecycleListener>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl LifecycleManager {
    /// Create new lifecycle manager
    pub fn new() -> Self {
        Self {
            state: WorkerState::Parsed,
            listeners: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Add event listener
    pub fn add_listener(&mut self, listener: LifecycleListener) {
        self.listeners.push(listener);
    }

    /// Dispatch an event
    fn dispatch(&self, event: LifecycleEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Transition to `new_state`, notifying listeners.
    pub fn transition(&mut self, new_state: WorkerState) -> Result<(), WorkerError> {
        let old_state = self.state;

        if !is_valid_transition(old_state, new_state) {
            return Err(WorkerError::InvalidStateTransition {
                from: old_state,
                to: new_state,
            });
        }

        self.state = new_state;
        log::info!("[SW Lifecycle] {} -> {}", old_state, new_state);

        self.dispatch(LifecycleEvent::StateChange(StateChangeEvent {
            old_state,
            new_state,
        }));

        match new_state {
            WorkerState::Installing => self.dispatch(LifecycleEvent::Install),
            WorkerState::Activating => self.dispatch(LifecycleEvent::Activate),
            _ => {}
        }

        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a state transition is valid
fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        // Normal lifecycle
        (Parsed, Installing) |
        (Installing, Installed) |
        (Installed, Activating) |
        (Activating, Activated) |
        // Failed steps go back so the host can retry
        (Installing, Parsed) |
        (Activating, Installed) |
        // Torn down
        (Parsed, Redundant) |
        (Installed, Redundant) |
        (Activated, Redundant)
    )
}
