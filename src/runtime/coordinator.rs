//! Turn-taking coordinator
//!
//! Drives the pure state machine: feeds it events, performs the effects it
//! returns and suspends only while a participant is producing output.

use crate::conversation::{ConversationLog, LogSnapshot, Message};
use crate::error::{ConversationError, ParticipantError};
use crate::participant::Participant;
use crate::state_machine::{transition, CoordContext, CoordState, Effect, Event, StopReason};
use crate::termination::{evaluate, EvaluationContext, Never, TerminationPolicy, TurnLedger};
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of one completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Zero-based index of the turn
    pub turn: usize,
    pub participant: String,
    /// Messages appended by this turn, in order
    pub messages: Vec<Message>,
    /// The termination policy ended the conversation after this turn, with or
    /// without completing it
    pub stop: bool,
}

pub struct CoordinatorBuilder {
    participants: Vec<Arc<dyn Participant>>,
    policy: Box<dyn TerminationPolicy>,
    seed: Vec<Message>,
    cancel: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    /// Add a participant; round-robin order is insertion order
    #[must_use]
    pub fn participant(mut self, participant: impl Participant + 'static) -> Self {
        self.participants.push(Arc::new(participant));
        self
    }

    #[must_use]
    pub fn shared_participant(mut self, participant: Arc<dyn Participant>) -> Self {
        self.participants.push(participant);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: impl TerminationPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Seed the log before the first turn
    #[must_use]
    pub fn seed(mut self, message: Message) -> Self {
        self.seed.push(message);
        self
    }

    /// Use an existing token so outside code can cancel the conversation
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Coordinator, ConversationError> {
        if self.participants.is_empty() {
            return Err(ConversationError::NoParticipants);
        }

        let mut seen = HashSet::new();
        for participant in &self.participants {
            if !seen.insert(participant.name()) {
                return Err(ConversationError::DuplicateParticipant(
                    participant.name().to_string(),
                ));
            }
        }

        let mut log = ConversationLog::new();
        log.append_all(self.seed)?;

        Ok(Coordinator {
            context: CoordContext::new(self.participants.iter().map(|p| p.name().to_string())),
            participants: self.participants,
            policy: self.policy,
            log,
            ledger: TurnLedger::default(),
            state: CoordState::Idle,
            cancel: self.cancel.unwrap_or_default(),
            failure: None,
        })
    }
}

/// Runs one conversation: strict round robin over its participants, one turn
/// at a time, until the termination policy, a failure or cancellation ends it.
pub struct Coordinator {
    context: CoordContext,
    participants: Vec<Arc<dyn Participant>>,
    policy: Box<dyn TerminationPolicy>,
    log: ConversationLog,
    ledger: TurnLedger,
    state: CoordState,
    cancel: CancellationToken,
    /// Error behind a `ParticipantFailure` stop, handed to the caller once
    failure: Option<ParticipantError>,
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder {
            participants: Vec::new(),
            policy: Box::new(Never),
            seed: Vec::new(),
            cancel: None,
        }
    }

    /// Token that cancels this conversation, including an in-flight turn
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> &CoordState {
        &self.state
    }

    pub fn log(&self) -> LogSnapshot {
        self.log.snapshot()
    }

    pub fn turns(&self) -> &TurnLedger {
        &self.ledger
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.state.stop_reason()
    }

    /// The policy judged the conversation complete. False after a turn limit,
    /// failure or cancellation.
    pub fn is_complete(&self) -> bool {
        self.stop_reason().is_some_and(StopReason::is_complete)
    }

    /// Append a message between turns, e.g. console input
    pub fn add_message(&mut self, message: Message) -> Result<(), ConversationError> {
        if self.state.is_terminal() {
            return Err(ConversationError::AlreadyTerminated);
        }
        self.log.append(message)?;
        Ok(())
    }

    /// Run exactly one turn: select, invoke, append, evaluate.
    ///
    /// On any error the log is left as it was after the last successful append
    /// and the coordinator is terminated.
    pub async fn step(&mut self) -> Result<TurnOutcome, ConversationError> {
        if self.state.is_terminal() {
            return Err(ConversationError::AlreadyTerminated);
        }

        let first = if self.cancel.is_cancelled() {
            Event::Cancel
        } else {
            Event::Select
        };

        let mut outcome = TurnOutcome {
            turn: self.state.turn().unwrap_or_default(),
            participant: String::new(),
            messages: Vec::new(),
            stop: false,
        };

        let mut events = vec![first];
        while let Some(event) = events.pop() {
            let result = transition(&self.state, &self.context, event)?;
            self.state = result.new_state;

            for effect in result.effects {
                if let Some(next) = self.execute_effect(effect, &mut outcome).await {
                    events.push(next);
                }
            }
        }

        match &self.state {
            CoordState::Selecting { .. } => Ok(outcome),
            CoordState::Terminated { reason } => match reason.clone() {
                StopReason::Policy { .. } | StopReason::TurnLimit { .. } => {
                    outcome.stop = true;
                    Ok(outcome)
                }
                StopReason::Cancelled => Err(ConversationError::Cancelled),
                StopReason::ParticipantFailure {
                    participant,
                    message,
                } => Err(ConversationError::ParticipantFailure {
                    participant,
                    source: self
                        .failure
                        .take()
                        .unwrap_or(ParticipantError::Other(message)),
                }),
                StopReason::InvalidMessage { error, .. } => {
                    Err(ConversationError::InvalidMessage(error))
                }
                StopReason::PolicyError(e) => Err(ConversationError::Policy(e)),
            },
            other => Err(ConversationError::InvalidTransition(format!(
                "turn ended in {} state",
                other.name()
            ))),
        }
    }

    /// Run turns until the conversation terminates.
    ///
    /// Cancellation is a normal way to end a conversation and is reported as
    /// `Ok(StopReason::Cancelled)`; failures are returned as errors.
    pub async fn run(&mut self) -> Result<StopReason, ConversationError> {
        self.run_with(|_| {}).await
    }

    /// Like [`Coordinator::run`], calling `on_turn` after every completed turn
    pub async fn run_with(
        &mut self,
        mut on_turn: impl FnMut(&TurnOutcome) + Send,
    ) -> Result<StopReason, ConversationError> {
        loop {
            match self.step().await {
                Ok(outcome) => {
                    on_turn(&outcome);
                    if outcome.stop {
                        break;
                    }
                }
                Err(ConversationError::Cancelled) => break,
                Err(e) => return Err(e),
            }
        }
        self.stop_reason()
            .cloned()
            .ok_or_else(|| ConversationError::InvalidTransition("run ended without a stop reason".into()))
    }

    async fn execute_effect(&mut self, effect: Effect, outcome: &mut TurnOutcome) -> Option<Event> {
        match effect {
            Effect::Invoke { participant } => {
                let participant = Arc::clone(&self.participants[participant]);
                outcome.participant = participant.name().to_string();
                tracing::debug!(
                    turn = outcome.turn,
                    participant = %outcome.participant,
                    log_len = self.log.len(),
                    "Invoking participant"
                );
                Some(self.invoke(participant.as_ref()).await)
            }

            Effect::AbortInvocation => {
                tracing::info!(participant = %outcome.participant, "Turn cancelled, output discarded");
                None
            }

            Effect::Append {
                participant,
                messages,
            } => {
                let count = messages.len();
                match self.log.append_all(messages.clone()) {
                    Ok(()) => {
                        self.ledger.record(self.context.name(participant));
                        tracing::debug!(
                            turn = outcome.turn,
                            participant = %outcome.participant,
                            produced = count,
                            "Turn appended"
                        );
                        outcome.messages = messages;
                        Some(Event::Appended { count })
                    }
                    Err(error) => {
                        tracing::error!(participant = %outcome.participant, %error, "Rejected participant output");
                        Some(Event::AppendRejected { error })
                    }
                }
            }

            Effect::Evaluate { speaker, candidate } => {
                let snapshot = self.log.snapshot();
                let ctx = EvaluationContext {
                    speaker: self.context.name(speaker),
                    candidate: self.context.name(candidate),
                    log: &snapshot,
                    turns: &self.ledger,
                };
                match evaluate(self.policy.as_ref(), &ctx) {
                    Ok(verdict) => Some(Event::Verdict { verdict }),
                    Err(error) => {
                        tracing::error!(%error, "Termination policy failed");
                        Some(Event::PolicyFailed { error })
                    }
                }
            }

            Effect::Finish => {
                if let Some(reason) = self.state.stop_reason() {
                    if reason.is_policy_stop() || matches!(reason, StopReason::Cancelled) {
                        tracing::info!(
                            %reason,
                            turns = self.ledger.total(),
                            log_len = self.log.len(),
                            "Conversation terminated"
                        );
                    } else {
                        tracing::error!(%reason, log_len = self.log.len(), "Conversation halted");
                    }
                }
                None
            }
        }
    }

    /// Drain the participant's output, racing it against cancellation
    async fn invoke(&mut self, participant: &dyn Participant) -> Event {
        let snapshot = self.log.snapshot();
        let cancel = self.cancel.clone();
        let stream = participant.produce(snapshot, cancel.child_token());

        let drained: Result<Vec<Message>, ParticipantError> = tokio::select! {
            biased;

            () = cancel.cancelled() => return Event::Cancel,

            result = stream.try_collect::<Vec<Message>>() => result,
        };

        // A participant may cancel the conversation itself (console exit)
        if cancel.is_cancelled() {
            return Event::Cancel;
        }

        match drained {
            Ok(messages) => Event::OutputDrained { messages },
            Err(e) => {
                tracing::error!(participant = %participant.name(), error = %e, "Participant failed");
                let message = e.to_string();
                self.failure = Some(e);
                Event::ParticipantFailed { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::runtime::testing::{FailingParticipant, ScriptedParticipant, StalledParticipant};
    use crate::termination::{ContentMatch, IterationCap, Predicate, PolicyError, TerminationPolicyExt};
    use std::time::Duration;

    fn writer_critic_policy(max: u32) -> impl TerminationPolicy {
        ContentMatch::new("approve")
            .scoped_to(["CriticAgent"])
            .or(IterationCap::new(max).counting(["CriticAgent"]))
    }

    #[tokio::test]
    async fn test_writer_critic_stops_on_approval() {
        let writer = ScriptedParticipant::new("WriterAgent").replies(["draft 1", "draft 2", "draft 3"]);
        let critic = ScriptedParticipant::new("CriticAgent").replies([
            "Needs more detail",
            "Better, but shorten it",
            "I Approve this post",
        ]);

        let mut coordinator = Coordinator::builder()
            .participant(writer)
            .participant(critic)
            .policy(writer_critic_policy(10))
            .seed(Message::user("Write about Rust"))
            .build()
            .unwrap();

        let reason = coordinator.run().await.unwrap();

        assert_eq!(reason, StopReason::Policy { speaker: "CriticAgent".into() });
        assert!(coordinator.is_complete());
        let log = coordinator.log();
        assert_eq!(log.len(), 1 + 2 * 3);
        assert_eq!(log.latest().unwrap().content, "I Approve this post");
        assert_eq!(coordinator.turns().turns_by("CriticAgent"), 3);
    }

    #[tokio::test]
    async fn test_iteration_cap_bounds_critic() {
        let writer = ScriptedParticipant::new("WriterAgent").repeating("draft");
        let critic = ScriptedParticipant::new("CriticAgent").repeating("not yet");

        let mut coordinator = Coordinator::builder()
            .participant(writer)
            .participant(critic)
            .policy(writer_critic_policy(4))
            .seed(Message::user("topic"))
            .build()
            .unwrap();

        let reason = coordinator.run().await.unwrap();
        assert_eq!(reason, StopReason::TurnLimit { speaker: "CriticAgent".into() });
        assert!(!coordinator.is_complete());
        assert_eq!(coordinator.turns().turns_by("CriticAgent"), 4);
        assert_eq!(coordinator.log().len(), 1 + 8);
    }

    #[tokio::test]
    async fn test_writer_approval_does_not_stop() {
        let writer = ScriptedParticipant::new("WriterAgent").replies(["I approve of myself"]);
        let critic = ScriptedParticipant::new("CriticAgent").replies(["approved"]);

        let mut coordinator = Coordinator::builder()
            .participant(writer)
            .participant(critic)
            .policy(writer_critic_policy(10))
            .build()
            .unwrap();

        let first = coordinator.step().await.unwrap();
        assert!(!first.stop);
        assert_eq!(first.participant, "WriterAgent");
        let second = coordinator.step().await.unwrap();
        assert!(second.stop);
        assert_eq!(second.turn, 1);
    }

    #[tokio::test]
    async fn test_round_robin_with_multiple_messages_per_turn() {
        let a = ScriptedParticipant::new("A").turns([vec!["a1", "a2"], vec![]]);
        let b = ScriptedParticipant::new("B").turns([vec!["b1"]]);

        let mut coordinator = Coordinator::builder()
            .participant(a)
            .participant(b)
            .build()
            .unwrap();

        let t0 = coordinator.step().await.unwrap();
        let t1 = coordinator.step().await.unwrap();
        let t2 = coordinator.step().await.unwrap();

        assert_eq!((t0.participant.as_str(), t0.messages.len()), ("A", 2));
        assert_eq!((t1.participant.as_str(), t1.messages.len()), ("B", 1));
        assert_eq!((t2.participant.as_str(), t2.messages.len()), ("A", 0));
        let contents: Vec<_> = coordinator.log().iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["a1", "a2", "b1"]);
        assert_eq!(coordinator.state(), &CoordState::Selecting { turn: 3 });
    }

    #[tokio::test]
    async fn test_each_invocation_sees_full_log() {
        let a = Arc::new(ScriptedParticipant::new("A").repeating("a"));
        let b = Arc::new(ScriptedParticipant::new("B").turns([vec!["b1", "b2"]]));

        let mut coordinator = Coordinator::builder()
            .shared_participant(a.clone())
            .shared_participant(b.clone())
            .policy(IterationCap::new(3))
            .seed(Message::user("start"))
            .build()
            .unwrap();
        coordinator.run().await.unwrap();

        assert_eq!(*a.seen.lock().unwrap(), vec![1, 4]);
        assert_eq!(*b.seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_participant_failure_freezes_log() {
        let writer = ScriptedParticipant::new("WriterAgent").replies(["draft"]);
        let critic = FailingParticipant::new("CriticAgent", "connection reset");

        let mut coordinator = Coordinator::builder()
            .participant(writer)
            .participant(critic)
            .seed(Message::user("topic"))
            .build()
            .unwrap();

        let err = coordinator.run().await.unwrap_err();
        match err {
            ConversationError::ParticipantFailure { participant, source } => {
                assert_eq!(participant, "CriticAgent");
                assert!(source.to_string().contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(coordinator.log().len(), 2);
        assert!(!coordinator.is_complete());
        assert!(matches!(
            coordinator.step().await,
            Err(ConversationError::AlreadyTerminated)
        ));
    }

    #[tokio::test]
    async fn test_partial_output_discarded_on_failure() {
        let flaky = FailingParticipant::new("Flaky", "mid-stream").after(["partial"]);
        let mut coordinator = Coordinator::builder()
            .participant(flaky)
            .seed(Message::user("go"))
            .build()
            .unwrap();

        assert!(coordinator.step().await.is_err());
        assert_eq!(coordinator.log().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_message_rejected() {
        let bad = ScriptedParticipant::new("Bad").raw([Message::new(Role::Agent, None, "anonymous")]);
        let mut coordinator = Coordinator::builder()
            .participant(bad)
            .seed(Message::user("hi"))
            .build()
            .unwrap();

        let err = coordinator.step().await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidMessage(_)));
        assert_eq!(coordinator.log().len(), 1);
        assert!(matches!(
            coordinator.stop_reason(),
            Some(StopReason::InvalidMessage { participant, .. }) if participant == "Bad"
        ));
    }

    #[tokio::test]
    async fn test_policy_error_is_fatal() {
        let agent = ScriptedParticipant::new("Agent").repeating("hello");
        let broken = Predicate::new("broken", |_| Err(PolicyError::new("broken", "boom")));

        let mut coordinator = Coordinator::builder()
            .participant(agent)
            .policy(broken)
            .seed(Message::user("hi"))
            .build()
            .unwrap();

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, ConversationError::Policy(ref e) if e.message == "boom"));
        // The turn's output was appended before evaluation failed
        assert_eq!(coordinator.log().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_invoke_leaves_log_unchanged() {
        let writer = ScriptedParticipant::new("WriterAgent").replies(["draft"]);
        let slow = StalledParticipant::new("CriticAgent", Duration::from_secs(3600));

        let mut coordinator = Coordinator::builder()
            .participant(writer)
            .participant(slow)
            .seed(Message::user("topic"))
            .build()
            .unwrap();

        coordinator.step().await.unwrap();
        let before = coordinator.log().to_vec();

        let token = coordinator.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let err = coordinator.step().await.unwrap_err();
        assert!(matches!(err, ConversationError::Cancelled));
        assert_eq!(coordinator.log().to_vec(), before);
        assert_eq!(coordinator.stop_reason(), Some(&StopReason::Cancelled));
        assert!(!coordinator.is_complete());
    }

    #[tokio::test]
    async fn test_run_reports_cancellation_as_stop_reason() {
        let agent = ScriptedParticipant::new("Agent").repeating("hi");
        let mut coordinator = Coordinator::builder().participant(agent).build().unwrap();
        coordinator.cancel();

        assert_eq!(coordinator.run().await.unwrap(), StopReason::Cancelled);
        assert!(coordinator.log().is_empty());
    }

    #[tokio::test]
    async fn test_add_message_between_turns() {
        let agent = ScriptedParticipant::new("Agent").replies(["first", "second"]);
        let mut coordinator = Coordinator::builder()
            .participant(agent)
            .policy(IterationCap::new(1))
            .build()
            .unwrap();

        coordinator.add_message(Message::user("hello")).unwrap();
        assert!(coordinator.add_message(Message::new(Role::Agent, None, "x")).is_err());
        assert_eq!(coordinator.log().len(), 1);

        let outcome = coordinator.step().await.unwrap();
        assert!(outcome.stop);
        assert!(matches!(
            coordinator.add_message(Message::user("too late")),
            Err(ConversationError::AlreadyTerminated)
        ));
    }

    #[tokio::test]
    async fn test_builder_validation() {
        assert!(matches!(
            Coordinator::builder().build(),
            Err(ConversationError::NoParticipants)
        ));
        let dup = Coordinator::builder()
            .participant(ScriptedParticipant::new("Same"))
            .participant(ScriptedParticipant::new("Same"))
            .build();
        assert!(matches!(dup, Err(ConversationError::DuplicateParticipant(ref n)) if n == "Same"));
    }

    #[tokio::test]
    async fn test_independent_conversations_run_concurrently() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                tokio::spawn(async move {
                    let mut coordinator = Coordinator::builder()
                        .participant(ScriptedParticipant::new("Writer").repeating("draft"))
                        .participant(ScriptedParticipant::new("Critic").repeating("meh"))
                        .policy(IterationCap::new(i + 1).counting(["Critic"]))
                        .seed(Message::user(format!("topic {i}")))
                        .build()
                        .unwrap();
                    coordinator.run().await.unwrap();
                    coordinator.log().len()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), 1 + 2 * (i + 1));
        }
    }

    #[tokio::test]
    async fn test_run_with_observes_every_turn() {
        let mut coordinator = Coordinator::builder()
            .participant(ScriptedParticipant::new("A").repeating("x"))
            .policy(IterationCap::new(3))
            .build()
            .unwrap();

        let mut seen = Vec::new();
        coordinator.run_with(|outcome| seen.push(outcome.turn)).await.unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
