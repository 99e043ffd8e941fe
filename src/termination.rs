//! Termination policies
//!
//! A policy is a predicate evaluated once per completed turn, after the turn's
//! output is in the log and before the next participant is selected. Policies
//! are stateless: everything they need arrives in the [`EvaluationContext`],
//! including the per-participant turn ledger.

mod policies;

pub use policies::{AllOf, AnyOf, ContentMatch, IterationCap, MinimumTurns, Never, Predicate, Scoped};

use crate::conversation::LogSnapshot;
use std::collections::HashMap;
use thiserror::Error;

/// Outcome of evaluating a policy after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    #[default]
    Continue,
    /// Stop: the conversation reached its goal
    Complete,
    /// Stop: a limit ran out before the goal was reached
    Exhausted,
}

impl Verdict {
    pub fn is_stop(self) -> bool {
        !matches!(self, Verdict::Continue)
    }
}

/// A policy failed to reach a verdict
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{policy}: {message}")]
pub struct PolicyError {
    pub policy: String,
    pub message: String,
}

impl PolicyError {
    pub fn new(policy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            message: message.into(),
        }
    }
}

/// Number of completed turns per participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnLedger {
    counts: HashMap<String, u32>,
    total: u32,
}

impl TurnLedger {
    pub fn record(&mut self, participant: &str) {
        *self.counts.entry(participant.to_string()).or_default() += 1;
        self.total += 1;
    }

    pub fn turns_by(&self, participant: &str) -> u32 {
        self.counts.get(participant).copied().unwrap_or_default()
    }

    pub fn turns_by_any<S: AsRef<str>>(&self, participants: &[S]) -> u32 {
        participants
            .iter()
            .map(|p| self.turns_by(p.as_ref()))
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Everything a policy may inspect
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Participant whose turn just completed
    pub speaker: &'a str,
    /// Participant that would be selected next
    pub candidate: &'a str,
    pub log: &'a LogSnapshot,
    pub turns: &'a TurnLedger,
}

/// Decides whether the conversation stops after a turn, and why
pub trait TerminationPolicy: Send + Sync {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError>;

    fn should_stop(&self, ctx: &EvaluationContext<'_>) -> Result<bool, PolicyError> {
        Ok(self.verdict(ctx)?.is_stop())
    }
}

impl<T: TerminationPolicy + ?Sized> TerminationPolicy for Box<T> {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        (**self).verdict(ctx)
    }
}

impl<T: TerminationPolicy + ?Sized> TerminationPolicy for std::sync::Arc<T> {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        (**self).verdict(ctx)
    }
}

/// Evaluate a policy. An empty log never stops.
pub fn evaluate(
    policy: &dyn TerminationPolicy,
    ctx: &EvaluationContext<'_>,
) -> Result<Verdict, PolicyError> {
    if ctx.log.is_empty() {
        return Ok(Verdict::Continue);
    }
    policy.verdict(ctx)
}

/// Combinators available on every policy
pub trait TerminationPolicyExt: TerminationPolicy + Sized + 'static {
    /// Only evaluate after turns taken by the named participants
    fn scoped_to<I, S>(self, participants: I) -> Scoped
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scoped::new(self, participants)
    }

    /// Stop when either policy says so
    fn or(self, other: impl TerminationPolicy + 'static) -> AnyOf {
        AnyOf::new().with(self).with(other)
    }

    /// Stop only when both policies say so
    fn and(self, other: impl TerminationPolicy + 'static) -> AllOf {
        AllOf::new().with(self).with(other)
    }

    /// Suppress stopping until the named participants have taken `min` turns
    fn min_turns<I, S>(self, min: u32, participants: I) -> MinimumTurns
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MinimumTurns::new(self, min, participants)
    }
}

impl<T: TerminationPolicy + Sized + 'static> TerminationPolicyExt for T {}
