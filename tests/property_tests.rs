//! Property-based tests for the transition engine and persistence contract.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use futures::FutureExt;
use proptest::prelude::*;
use statecraft::core::GuardExpr;
use statecraft::machine::{
    provide, Machine, MachineDefinition, SlotHandlers, Transition, TransitionHandler,
};
use statecraft::persistence::{InMemoryAdapter, PersistenceAdapter, StoredSnapshot};
use statecraft::simulate::simulate;
use statecraft::{event_enum, state_enum};
use std::collections::HashMap;
use std::future::Future;

state_enum! {
    enum Counter {
        At { n: u32 },
        Zero,
    }
}

event_enum! {
    enum CounterEvent {
        Inc,
        Dec,
        Reset,
    }
}

state_enum! {
    enum Choice {
        Choosing,
        Picked(usize),
    }
}

event_enum! {
    enum Never {
        Never,
    }
}

const CATCH_ALL: usize = 99;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn counter() -> Machine<Counter, CounterEvent> {
    let definition = MachineDefinition::new(Counter::At { n: 0 })
        .on("At", "Inc", |s, _| match s {
            Counter::At { n } => Counter::At { n: n + 1 },
            Counter::Zero => Counter::Zero,
        })
        .add_transition(
            Transition::new(
                "At",
                "Dec",
                TransitionHandler::sync(|s: &Counter, _: &CounterEvent| match s {
                    Counter::At { n } => Counter::At { n: n - 1 },
                    Counter::Zero => Counter::Zero,
                }),
            )
            .with_guard("positive"),
        )
        .on("At", "Reset", |_, _| Counter::Zero)
        .always("Zero", None, |_| Counter::At { n: 0 });

    provide(
        definition,
        SlotHandlers::new().guard("positive", |s: &Counter, _| {
            matches!(s, Counter::At { n } if *n > 0)
        }),
    )
    .unwrap()
}

fn chooser(flags: &[bool]) -> Machine<Choice, Never> {
    let mut definition = MachineDefinition::new(Choice::Choosing);
    let mut handlers = SlotHandlers::new();
    for (i, flag) in flags.iter().copied().enumerate() {
        let name = format!("g{}", i);
        definition = definition.always("Choosing", Some(GuardExpr::slot(name.clone())), move |_| {
            Choice::Picked(i)
        });
        handlers = handlers.guard(name, move |_, _| flag);
    }
    definition = definition.always("Choosing", None, |_| Choice::Picked(CATCH_ALL));
    provide(definition, handlers).unwrap()
}

fn reference_eval(expr: &GuardExpr, values: &HashMap<String, bool>) -> bool {
    match expr {
        GuardExpr::Slot(name) => values.get(name).copied().unwrap_or(false),
        GuardExpr::And(children) => children.iter().all(|c| reference_eval(c, values)),
        GuardExpr::Or(children) => children.iter().any(|c| reference_eval(c, values)),
        GuardExpr::Not(inner) => !reference_eval(inner, values),
    }
}

prop_compose! {
    fn arbitrary_event()(variant in 0..3u8) -> CounterEvent {
        match variant {
            0 => CounterEvent::Inc,
            1 => CounterEvent::Dec,
            _ => CounterEvent::Reset,
        }
    }
}

fn arbitrary_guard() -> impl Strategy<Value = GuardExpr> {
    let leaf = prop_oneof![Just("a"), Just("b"), Just("c"), Just("d")].prop_map(|name| GuardExpr::slot(name));
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(GuardExpr::And),
            prop::collection::vec(inner.clone(), 0..4).prop_map(GuardExpr::Or),
            inner.prop_map(|g| GuardExpr::Not(Box::new(g))),
        ]
    })
}

proptest! {
    #[test]
    fn simulation_is_deterministic(events in prop::collection::vec(arbitrary_event(), 0..30)) {
        let machine = counter();
        let first = block_on(simulate(&machine, events.clone()));
        let second = block_on(simulate(&machine, events));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn simulation_matches_reference_model(events in prop::collection::vec(arbitrary_event(), 0..30)) {
        let machine = counter();
        let trace = block_on(simulate(&machine, events.clone()));

        let mut n = 0u32;
        let mut commits = 0usize;
        for event in &events {
            match event {
                CounterEvent::Inc => {
                    n += 1;
                    commits += 1;
                }
                CounterEvent::Dec if n > 0 => {
                    n -= 1;
                    commits += 1;
                }
                CounterEvent::Dec => {}
                CounterEvent::Reset => {
                    n = 0;
                    commits += 2;
                }
            }
        }

        prop_assert_eq!(trace.last(), &Counter::At { n });
        prop_assert_eq!(trace.transitions(), commits);
    }

    #[test]
    fn first_passing_always_guard_wins(flags in prop::collection::vec(any::<bool>(), 0..6)) {
        let machine = chooser(&flags);
        let settled = block_on(machine.settle(Choice::Choosing, 10));

        let expected = flags.iter().position(|f| *f).unwrap_or(CATCH_ALL);
        prop_assert_eq!(settled.state, Choice::Picked(expected));
        prop_assert_eq!(settled.steps.len(), 1);
    }

    #[test]
    fn guard_evaluation_matches_boolean_semantics(
        expr in arbitrary_guard(),
        values in prop::collection::hash_map("[a-d]", any::<bool>(), 0..4),
    ) {
        let lookup = values.clone();
        let leaf = move |name: &str| {
            let value = lookup.get(name).copied().unwrap_or(false);
            futures::future::ready(value).boxed()
        };
        let evaluated = block_on(expr.evaluate(&leaf));
        prop_assert_eq!(evaluated, reference_eval(&expr, &values));
    }

    #[test]
    fn missing_slot_always_fails(name in "[a-z]{1,8}", others in prop::collection::vec("[A-Z]{1,8}", 0..4)) {
        let definition = MachineDefinition::<Counter, CounterEvent>::new(Counter::Zero)
            .always("Zero", Some(GuardExpr::slot(name.clone())), |_| Counter::At { n: 0 });
        let mut handlers = SlotHandlers::new();
        for other in &others {
            handlers = handlers.guard(other.clone(), |_, _| true);
        }

        let error = provide(definition, handlers).err().unwrap();
        prop_assert!(error.missing().contains(&name.as_str()));
    }

    #[test]
    fn snapshot_writes_never_go_backwards(versions in prop::collection::vec(0..20u64, 1..20)) {
        let adapter = InMemoryAdapter::new();
        let mut stored: Option<u64> = None;

        for version in versions {
            let snapshot = StoredSnapshot {
                data: vec![],
                version,
                timestamp: Utc::now(),
            };
            let result = block_on(adapter.save_snapshot("actor", snapshot));
            match stored {
                Some(current) if version < current => {
                    prop_assert!(result.err().map(|e| e.is_version_conflict()).unwrap_or(false));
                }
                _ => {
                    prop_assert!(result.is_ok());
                    stored = Some(version);
                }
            }
        }

        prop_assert_eq!(adapter.snapshot_version("actor"), stored);
    }
}
