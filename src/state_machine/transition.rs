//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result; the runtime performs the returned effects.

use super::{CoordContext, CoordState, Effect, Event, StopReason};
use crate::termination::Verdict;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: CoordState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: CoordState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn terminated(reason: StopReason) -> Self {
        Self::new(CoordState::Terminated { reason }).with_effect(Effect::Finish)
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Conversation has terminated, no further turns accepted")]
    AlreadyTerminated,
    #[error("No participants to select from")]
    NoParticipants,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &CoordState,
    context: &CoordContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (CoordState::Terminated { .. }, _) => Err(TransitionError::AlreadyTerminated),

        // ============================================================
        // Selection: strict round robin
        // ============================================================
        (CoordState::Idle, Event::Select) => select(context, 0),
        (CoordState::Selecting { turn }, Event::Select) => select(context, *turn),

        // ============================================================
        // Invocation
        // ============================================================
        (CoordState::Invoking { turn, participant }, Event::OutputDrained { messages }) => {
            Ok(TransitionResult::new(CoordState::Appending {
                turn: *turn,
                participant: *participant,
            })
            .with_effect(Effect::Append {
                participant: *participant,
                messages,
            }))
        }

        (CoordState::Invoking { participant, .. }, Event::ParticipantFailed { message }) => {
            Ok(TransitionResult::terminated(StopReason::ParticipantFailure {
                participant: context.name(*participant).to_string(),
                message,
            }))
        }

        // ============================================================
        // Appending
        // ============================================================
        (CoordState::Appending { turn, participant }, Event::Appended { .. }) => {
            let candidate = context
                .select(turn + 1)
                .ok_or(TransitionError::NoParticipants)?;
            Ok(TransitionResult::new(CoordState::Evaluating {
                turn: *turn,
                participant: *participant,
            })
            .with_effect(Effect::Evaluate {
                speaker: *participant,
                candidate,
            }))
        }

        (CoordState::Appending { participant, .. }, Event::AppendRejected { error }) => {
            Ok(TransitionResult::terminated(StopReason::InvalidMessage {
                participant: context.name(*participant).to_string(),
                error,
            }))
        }

        // ============================================================
        // Evaluation
        // ============================================================
        (CoordState::Evaluating { turn, participant }, Event::Verdict { verdict }) => {
            let speaker = context.name(*participant).to_string();
            match verdict {
                Verdict::Continue => Ok(TransitionResult::new(CoordState::Selecting {
                    turn: turn + 1,
                })),
                Verdict::Complete => {
                    Ok(TransitionResult::terminated(StopReason::Policy { speaker }))
                }
                Verdict::Exhausted => {
                    Ok(TransitionResult::terminated(StopReason::TurnLimit { speaker }))
                }
            }
        }

        (CoordState::Evaluating { .. }, Event::PolicyFailed { error }) => {
            Ok(TransitionResult::terminated(StopReason::PolicyError(error)))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (CoordState::Invoking { .. }, Event::Cancel) => {
            Ok(TransitionResult::terminated(StopReason::Cancelled)
                .with_effect(Effect::AbortInvocation))
        }

        (_, Event::Cancel) => Ok(TransitionResult::terminated(StopReason::Cancelled)),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {event:?}",
            state.name()
        ))),
    }
}

fn select(context: &CoordContext, turn: usize) -> Result<TransitionResult, TransitionError> {
    let participant = context
        .select(turn)
        .ok_or(TransitionError::NoParticipants)?;
    Ok(
        TransitionResult::new(CoordState::Invoking { turn, participant })
            .with_effect(Effect::Invoke { participant }),
    )
}
