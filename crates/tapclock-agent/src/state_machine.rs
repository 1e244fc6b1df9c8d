//! Agent state machine.
//!
//! # States
//!
//! - `Idle`: no card being handled, no directive pending
//! - `StampProcessing`: reading, punching and writing back a presented card
//! - `AwaitingRemoval`: the card in the field has been handled already
//! - `ProgramArmed`: a program directive arrived; waiting for an empty field
//! - `ProgramActive`: waiting for a card to program, bounded by a deadline
//!
//! # Valid Transitions
//!
//! - Idle → StampProcessing → AwaitingRemoval | Idle
//! - AwaitingRemoval → Idle
//! - Idle | AwaitingRemoval → ProgramArmed → ProgramActive → Idle
//!
//! # Examples
//!
//! ```
//! use tapclock_agent::{AgentState, StateMachine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut machine = StateMachine::new();
//! machine.transition_to(AgentState::StampProcessing).unwrap();
//! machine.transition_to(AgentState::AwaitingRemoval).unwrap();
//! assert!(machine.transition_to(AgentState::ProgramActive).is_err());
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapclock_core::{Error, Result};
use tokio::time::Instant;
use tracing::debug;

/// Maximum number of state transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    StampProcessing,
    /// Card still present after a completed stamp; not processed again.
    AwaitingRemoval,
    /// Directive received; the field must be empty before programming.
    ProgramArmed,
    ProgramActive,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            AgentState::Idle => "Idle",
            AgentState::StampProcessing => "StampProcessing",
            AgentState::AwaitingRemoval => "AwaitingRemoval",
            AgentState::ProgramArmed => "ProgramArmed",
            AgentState::ProgramActive => "ProgramActive",
        };
        f.write_str(state_str)
    }
}

impl AgentState {
    /// Check if transition to `target` is valid from this state.
    ///
    /// ```
    /// use tapclock_agent::AgentState;
    ///
    /// assert!(AgentState::Idle.can_transition_to(&AgentState::ProgramArmed));
    /// assert!(!AgentState::ProgramArmed.can_transition_to(&AgentState::StampProcessing));
    /// ```
    pub fn can_transition_to(&self, target: &AgentState) -> bool {
        matches!(
            (self, target),
            (AgentState::Idle, AgentState::StampProcessing | AgentState::ProgramArmed)
                | (
                    AgentState::StampProcessing,
                    AgentState::AwaitingRemoval | AgentState::Idle
                )
                | (
                    AgentState::AwaitingRemoval,
                    AgentState::Idle | AgentState::ProgramArmed
                )
                | (AgentState::ProgramArmed, AgentState::ProgramActive)
                | (AgentState::ProgramActive, AgentState::Idle)
        )
    }

    /// Returns `true` while a program directive is being handled.
    ///
    /// The command queue is not polled in these states.
    pub fn is_programming(&self) -> bool {
        matches!(self, AgentState::ProgramArmed | AgentState::ProgramActive)
    }
}

/// A single state transition with timestamp.
#[derive(Debug, Clone, Copy)]
pub struct StateTransition {
    pub from: AgentState,
    pub to: AgentState,
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: AgentState, to: AgentState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// Tracks the agent state and enforces valid transitions.
///
/// Owned by the single agent loop; not shared between tasks.
#[derive(Debug)]
pub struct StateMachine {
    current_state: AgentState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in the `Idle` state.
    pub fn new() -> Self {
        Self {
            current_state: AgentState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> AgentState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied().collect()
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// valid from the current state. The state is left unchanged.
    pub fn transition_to(&mut self, new_state: AgentState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(transition);
        Ok(transition)
    }

    /// Force the machine back to `Idle`, for error recovery.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition::new(self.current_state, AgentState::Idle);
        self.perform_state_change(transition);
        transition
    }

    fn perform_state_change(&mut self, transition: StateTransition) {
        debug!(from = %transition.from, to = %transition.to, "State transition");
        self.current_state = transition.to;
        self.state_entered_at = transition.timestamp;

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
    }
}
