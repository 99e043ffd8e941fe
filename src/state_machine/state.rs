//! Coordinator state types

use crate::conversation::MessageError;
use crate::termination::PolicyError;
use std::fmt;

/// Static facts about a conversation that transitions may read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordContext {
    /// Participant names in round-robin order
    pub participants: Vec<String>,
}

impl CoordContext {
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            participants: participants.into_iter().map(Into::into).collect(),
        }
    }

    /// Index of the participant that acts on `turn`
    pub fn select(&self, turn: usize) -> Option<usize> {
        (!self.participants.is_empty()).then(|| turn % self.participants.len())
    }

    pub fn name(&self, index: usize) -> &str {
        self.participants.get(index).map_or("", String::as_str)
    }
}

/// Why a conversation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The termination policy judged the conversation complete after
    /// `speaker`'s turn
    Policy { speaker: String },
    /// A turn limit ran out after `speaker`'s turn without completion
    TurnLimit { speaker: String },
    /// The caller cancelled; the interrupted turn left no trace
    Cancelled,
    ParticipantFailure { participant: String, message: String },
    InvalidMessage { participant: String, error: MessageError },
    PolicyError(PolicyError),
}

impl StopReason {
    /// True only when the policy judged the conversation complete
    pub fn is_complete(&self) -> bool {
        matches!(self, StopReason::Policy { .. })
    }

    /// The policy ended the conversation, complete or not
    pub fn is_policy_stop(&self) -> bool {
        matches!(self, StopReason::Policy { .. } | StopReason::TurnLimit { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Policy { speaker } => write!(f, "completed after {speaker}"),
            StopReason::TurnLimit { speaker } => write!(f, "turn limit reached after {speaker}"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::ParticipantFailure {
                participant,
                message,
            } => write!(f, "{participant} failed: {message}"),
            StopReason::InvalidMessage { participant, error } => {
                write!(f, "{participant} produced an invalid message: {error}")
            }
            StopReason::PolicyError(e) => write!(f, "policy error: {e}"),
        }
    }
}

/// Coordinator state.
///
/// `turn` counts completed turns; the participant acting on turn `t` is
/// `t % k` for `k` participants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CoordState {
    /// Constructed, no turn started yet
    #[default]
    Idle,
    /// Ready to pick the participant for `turn`
    Selecting { turn: usize },
    /// Waiting for `participant` to drain its output
    Invoking { turn: usize, participant: usize },
    /// Output is being appended to the log
    Appending { turn: usize, participant: usize },
    /// Waiting for the termination verdict
    Evaluating { turn: usize, participant: usize },
    Terminated { reason: StopReason },
}

impl CoordState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordState::Terminated { .. })
    }

    /// Between turns: no participant is running and more turns are accepted
    pub fn is_ready(&self) -> bool {
        matches!(self, CoordState::Idle | CoordState::Selecting { .. })
    }

    /// Number of turns completed so far, if still running
    pub fn turn(&self) -> Option<usize> {
        match self {
            CoordState::Idle => Some(0),
            CoordState::Selecting { turn }
            | CoordState::Invoking { turn, .. }
            | CoordState::Appending { turn, .. }
            | CoordState::Evaluating { turn, .. } => Some(*turn),
            CoordState::Terminated { .. } => None,
        }
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        match self {
            CoordState::Terminated { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CoordState::Idle => "idle",
            CoordState::Selecting { .. } => "selecting",
            CoordState::Invoking { .. } => "invoking",
            CoordState::Appending { .. } => "appending",
            CoordState::Evaluating { .. } => "evaluating",
            CoordState::Terminated { .. } => "terminated",
        }
    }
}
