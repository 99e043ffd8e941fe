//! Built-in termination primitives

use super::{EvaluationContext, PolicyError, TerminationPolicy, Verdict};
use std::collections::HashSet;

/// Never stops; the conversation ends only by cancellation or error
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl TerminationPolicy for Never {
    fn verdict(&self, _ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        Ok(Verdict::Continue)
    }
}

/// Completes when the latest message contains a marker, ignoring case
#[derive(Debug, Clone)]
pub struct ContentMatch {
    marker: String,
}

impl ContentMatch {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl TerminationPolicy for ContentMatch {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        // An empty marker would match every message
        if self.marker.trim().is_empty() {
            return Err(PolicyError::new("content_match", "marker is empty"));
        }
        let matched = ctx
            .log
            .latest()
            .is_some_and(|message| message.mentions(&self.marker));
        Ok(if matched {
            Verdict::Complete
        } else {
            Verdict::Continue
        })
    }
}

/// Stops once the counted participants have taken `max` turns in total. The
/// stop is [`Verdict::Exhausted`]: running out of turns is not completion.
///
/// Counts every participant's turns unless restricted with
/// [`IterationCap::counting`].
#[derive(Debug, Clone)]
pub struct IterationCap {
    max: u32,
    counted: Option<Vec<String>>,
}

impl IterationCap {
    pub fn new(max: u32) -> Self {
        Self { max, counted: None }
    }

    #[must_use]
    pub fn counting<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.counted = Some(participants.into_iter().map(Into::into).collect());
        self
    }
}

impl TerminationPolicy for IterationCap {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        if ctx.turns.total() == 0 {
            return Ok(Verdict::Continue);
        }
        let taken = match &self.counted {
            Some(names) => ctx.turns.turns_by_any(names),
            None => ctx.turns.total(),
        };
        Ok(if taken >= self.max {
            Verdict::Exhausted
        } else {
            Verdict::Continue
        })
    }
}

/// Evaluates the inner policy only after turns by the named participants;
/// every other turn passes through without stopping.
pub struct Scoped {
    inner: Box<dyn TerminationPolicy>,
    participants: HashSet<String>,
}

impl Scoped {
    pub fn new<I, S>(inner: impl TerminationPolicy + 'static, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Box::new(inner),
            participants: participants.into_iter().map(Into::into).collect(),
        }
    }
}

impl TerminationPolicy for Scoped {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        if !self.participants.contains(ctx.speaker) {
            return Ok(Verdict::Continue);
        }
        self.inner.verdict(ctx)
    }
}

/// Suppresses stopping until the named participants have taken `min` turns
pub struct MinimumTurns {
    inner: Box<dyn TerminationPolicy>,
    min: u32,
    participants: Vec<String>,
}

impl MinimumTurns {
    pub fn new<I, S>(inner: impl TerminationPolicy + 'static, min: u32, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Box::new(inner),
            min,
            participants: participants.into_iter().map(Into::into).collect(),
        }
    }
}

impl TerminationPolicy for MinimumTurns {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        if ctx.turns.turns_by_any(&self.participants) < self.min {
            return Ok(Verdict::Continue);
        }
        self.inner.verdict(ctx)
    }
}

/// Logical OR. The first member that stops decides the verdict; the first
/// error wins.
#[derive(Default)]
pub struct AnyOf {
    policies: Vec<Box<dyn TerminationPolicy>>,
}

impl AnyOf {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, policy: impl TerminationPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }
}

impl TerminationPolicy for AnyOf {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        for policy in &self.policies {
            let verdict = policy.verdict(ctx)?;
            if verdict.is_stop() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Continue)
    }
}

/// Logical AND. An empty set never stops. The stop counts as complete when
/// any member completed.
#[derive(Default)]
pub struct AllOf {
    policies: Vec<Box<dyn TerminationPolicy>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, policy: impl TerminationPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }
}

impl TerminationPolicy for AllOf {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        if self.policies.is_empty() {
            return Ok(Verdict::Continue);
        }
        let mut combined = Verdict::Exhausted;
        for policy in &self.policies {
            match policy.verdict(ctx)? {
                Verdict::Continue => return Ok(Verdict::Continue),
                Verdict::Complete => combined = Verdict::Complete,
                Verdict::Exhausted => {}
            }
        }
        Ok(combined)
    }
}

type PredicateFn = dyn Fn(&EvaluationContext<'_>) -> Result<bool, PolicyError> + Send + Sync;

/// Caller-supplied predicate; a `true` result completes the conversation
pub struct Predicate {
    name: String,
    check: Box<PredicateFn>,
}

impl Predicate {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&EvaluationContext<'_>) -> Result<bool, PolicyError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TerminationPolicy for Predicate {
    fn verdict(&self, ctx: &EvaluationContext<'_>) -> Result<Verdict, PolicyError> {
        Ok(if (self.check)(ctx)? {
            Verdict::Complete
        } else {
            Verdict::Continue
        })
    }
}
