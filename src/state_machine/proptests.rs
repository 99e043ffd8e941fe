//! Property-based tests for the coordinator state machine
//!
//! A synchronous driver pumps events through `transition` the same way the
//! runtime does, using the real termination policies.

use super::*;
use crate::conversation::{ConversationLog, Message};
use crate::termination::{
    evaluate, ContentMatch, EvaluationContext, IterationCap, Never, TerminationPolicy,
    TerminationPolicyExt, TurnLedger, Verdict,
};
use proptest::prelude::*;

// ============================================================================
// Test Driver
// ============================================================================

struct Driver {
    context: CoordContext,
    state: CoordState,
    log: ConversationLog,
    ledger: TurnLedger,
    /// Participant index selected on each turn, in order
    selected: Vec<usize>,
}

impl Driver {
    fn new(k: usize, seed: usize) -> Self {
        let mut log = ConversationLog::new();
        for i in 0..seed {
            log.append(Message::user(format!("seed {i}"))).unwrap();
        }
        Self {
            context: CoordContext::new((0..k).map(|i| format!("p{i}"))),
            state: CoordState::Idle,
            log,
            ledger: TurnLedger::default(),
            selected: Vec::new(),
        }
    }

    /// Run one turn where the selected participant produces `output`
    fn turn(&mut self, policy: &dyn TerminationPolicy, output: impl Fn(&str) -> Vec<Message>) {
        let mut pending = vec![Event::Select];
        while let Some(event) = pending.pop() {
            let result = transition(&self.state, &self.context, event).unwrap();
            self.state = result.new_state;
            for effect in result.effects {
                match effect {
                    Effect::Invoke { participant } => {
                        self.selected.push(participant);
                        let messages = output(self.context.name(participant));
                        pending.push(Event::OutputDrained { messages });
                    }
                    Effect::Append {
                        participant,
                        messages,
                    } => {
                        let count = messages.len();
                        self.log.append_all(messages).unwrap();
                        self.ledger.record(self.context.name(participant));
                        pending.push(Event::Appended { count });
                    }
                    Effect::Evaluate { speaker, candidate } => {
                        let snapshot = self.log.snapshot();
                        let ctx = EvaluationContext {
                            speaker: self.context.name(speaker),
                            candidate: self.context.name(candidate),
                            log: &snapshot,
                            turns: &self.ledger,
                        };
                        let verdict = evaluate(policy, &ctx).unwrap();
                        pending.push(Event::Verdict { verdict });
                    }
                    Effect::AbortInvocation | Effect::Finish => {}
                }
            }
        }
    }
}

fn says(content: &'static str) -> impl Fn(&str) -> Vec<Message> {
    move |name| vec![Message::agent(name, content)]
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Select),
        (0usize..3).prop_map(|n| Event::OutputDrained {
            messages: (0..n).map(|i| Message::agent("p0", format!("m{i}"))).collect()
        }),
        "[a-z ]{1,20}".prop_map(|message| Event::ParticipantFailed { message }),
        (0usize..3).prop_map(|count| Event::Appended { count }),
        prop_oneof![
            Just(Verdict::Continue),
            Just(Verdict::Complete),
            Just(Verdict::Exhausted),
        ]
        .prop_map(|verdict| Event::Verdict { verdict }),
        Just(Event::Cancel),
    ]
}

/// Structural invariant: a running state's participant is always `turn % k`
fn is_valid_state(state: &CoordState, k: usize) -> bool {
    match state {
        CoordState::Invoking { turn, participant }
        | CoordState::Appending { turn, participant }
        | CoordState::Evaluating { turn, participant } => *participant == turn % k,
        _ => true,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: participant i acts on turns i, i+k, i+2k, ...
    #[test]
    fn prop_round_robin_fairness(k in 1usize..6, turns in 0usize..30) {
        let mut driver = Driver::new(k, 1);
        for _ in 0..turns {
            driver.turn(&Never, says("hello"));
        }
        prop_assert_eq!(driver.selected.len(), turns);
        for (turn, participant) in driver.selected.iter().enumerate() {
            prop_assert_eq!(*participant, turn % k);
        }
        if turns > 0 {
            prop_assert_eq!(driver.state.clone(), CoordState::Selecting { turn: turns });
        }
    }

    // Invariant 2: log length is the seed plus everything produced
    #[test]
    fn prop_log_growth_is_exact(
        k in 1usize..4,
        seed in 0usize..3,
        produced in proptest::collection::vec(0usize..4, 0..20),
    ) {
        let mut driver = Driver::new(k, seed);
        for &n in &produced {
            driver.turn(&Never, move |name| {
                (0..n).map(|i| Message::agent(name, format!("msg {i}"))).collect()
            });
        }
        prop_assert_eq!(driver.log.len(), seed + produced.iter().sum::<usize>());
    }

    // Invariant 3: a cap of M on one participant stops on or before its M-th turn
    #[test]
    fn prop_iteration_cap_bound(k in 1usize..4, capped in 0usize..4, max in 1u32..8) {
        let capped = capped % k;
        let mut driver = Driver::new(k, 1);
        let name = driver.context.name(capped).to_string();
        let policy = IterationCap::new(max).counting([name.clone()]);

        let limit = usize::try_from(max).unwrap() * k + k;
        for _ in 0..limit {
            if driver.state.is_terminal() {
                break;
            }
            driver.turn(&policy, says("never approves"));
        }

        prop_assert!(driver.state.is_terminal(), "cap never fired: {:?}", driver.state);
        prop_assert_eq!(driver.ledger.turns_by(&name), max);
        prop_assert_eq!(
            driver.state.stop_reason(),
            Some(&StopReason::TurnLimit { speaker: name })
        );
    }

    // Invariant 4: a scoped content match stops exactly at the first approving critic turn
    #[test]
    fn prop_content_match_stops_at_first_approval(
        rounds in 1usize..8,
        upper in any::<bool>(),
    ) {
        let mut driver = Driver::new(2, 1);
        let policy = ContentMatch::new("approve").scoped_to(["p1"]);
        let approval = if upper { "I APPROVE" } else { "approved!" };

        for round in 1..=rounds {
            let critic_says = if round == rounds { approval } else { "revise it" };
            driver.turn(&policy, says("draft"));
            driver.turn(&policy, move |name| vec![Message::agent(name, critic_says)]);
        }

        prop_assert!(driver.state.stop_reason().is_some_and(StopReason::is_complete));
        prop_assert_eq!(driver.log.len(), 1 + 2 * rounds);
    }

    // Invariant 5: arbitrary event sequences never break state structure
    #[test]
    fn prop_transitions_preserve_validity(
        k in 1usize..4,
        events in proptest::collection::vec(arb_event(), 0..30),
    ) {
        let context = CoordContext::new((0..k).map(|i| format!("p{i}")));
        let mut state = CoordState::Idle;
        for event in events {
            let was_terminal = state.is_terminal();
            match transition(&state, &context, event) {
                Ok(result) => {
                    prop_assert!(!was_terminal, "terminated state accepted an event");
                    prop_assert!(is_valid_state(&result.new_state, k), "Invalid state: {:?}", result.new_state);
                    if result.new_state.is_terminal() {
                        prop_assert!(result.effects.contains(&Effect::Finish));
                    }
                    state = result.new_state;
                }
                Err(e) => {
                    if was_terminal {
                        prop_assert_eq!(e, TransitionError::AlreadyTerminated);
                    }
                }
            }
        }
    }

    // Invariant 6: cancel from any running state terminates as cancelled
    #[test]
    fn prop_cancel_always_terminates(turn in 0usize..50, k in 1usize..4, phase in 0u8..5) {
        let participant = turn % k;
        let state = match phase {
            0 => CoordState::Idle,
            1 => CoordState::Selecting { turn },
            2 => CoordState::Invoking { turn, participant },
            3 => CoordState::Appending { turn, participant },
            _ => CoordState::Evaluating { turn, participant },
        };
        let context = CoordContext::new((0..k).map(|i| format!("p{i}")));
        let result = transition(&state, &context, Event::Cancel).unwrap();
        prop_assert_eq!(result.new_state.stop_reason(), Some(&StopReason::Cancelled));
    }
}
