use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// High-level lifecycle of the championship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Registration is open; no schedule exists yet.
    Waiting,
    /// The scheduler is driving rounds.
    InProgress,
    /// Every round completed; standings are final until a reset.
    Finished,
}

/// Events that can be applied to the lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Operator starts the championship.
    Start,
    /// The scheduler ran every round to completion.
    RoundsCompleted,
    /// Reset or restart returns the system to the waiting room. Valid from
    /// any phase so the halt operations stay idempotent.
    Halt,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub event: PhaseEvent,
}

/// Lifecycle machine guarding the operator-facing transitions.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            phase: Phase::Waiting,
        }
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        let next = match (self.phase, event) {
            (Phase::Waiting, PhaseEvent::Start) => Phase::InProgress,
            (Phase::InProgress, PhaseEvent::RoundsCompleted) => Phase::Finished,
            (_, PhaseEvent::Halt) => Phase::Waiting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        self.phase = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_is_waiting() {
        assert_eq!(PhaseMachine::new().phase(), Phase::Waiting);
    }

    #[test]
    fn full_happy_path_through_a_championship() {
        let mut machine = PhaseMachine::new();
        assert_eq!(machine.apply(PhaseEvent::Start), Ok(Phase::InProgress));
        assert_eq!(
            machine.apply(PhaseEvent::RoundsCompleted),
            Ok(Phase::Finished)
        );
        assert_eq!(machine.apply(PhaseEvent::Halt), Ok(Phase::Waiting));
    }

    #[test]
    fn start_is_rejected_once_running() {
        let mut machine = PhaseMachine::new();
        machine.apply(PhaseEvent::Start).unwrap();
        assert_eq!(
            machine.apply(PhaseEvent::Start),
            Err(InvalidTransition {
                from: Phase::InProgress,
                event: PhaseEvent::Start,
            })
        );
    }

    #[test]
    fn halt_is_valid_from_every_phase() {
        for setup in [
            Vec::new(),
            vec![PhaseEvent::Start],
            vec![PhaseEvent::Start, PhaseEvent::RoundsCompleted],
        ] {
            let mut machine = PhaseMachine::new();
            for event in setup {
                machine.apply(event).unwrap();
            }
            assert_eq!(machine.apply(PhaseEvent::Halt), Ok(Phase::Waiting));
        }
    }

    #[test]
    fn rounds_completed_requires_a_running_championship() {
        let mut machine = PhaseMachine::new();
        assert!(machine.apply(PhaseEvent::RoundsCompleted).is_err());
    }
}
