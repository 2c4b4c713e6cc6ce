//! Property-based tests for idlgen
//!
//! Layouts, expansions and assembled trees are checked against the
//! invariants every backend must keep, over randomly generated operations.

mod proptest_strategies;

use std::collections::HashSet;

use idl_rt::round_up;
use idlgen::assemble::{verify, Region};
use idlgen::error::GenerateError;
use idlgen::step::Phase;
use idlgen::*;
use proptest::prelude::*;
use proptest_strategies::*;

fn options() -> AssembleOptions<'static> {
    AssembleOptions {
        interface: "prop",
        naming: &DefaultNaming,
        error_hook: None,
    }
}

fn reply_and_wait() -> CallPatternVariant {
    CallPatternVariant::ReplyToThenWaitAny(step::Target::Caller)
}

// ════════════════════════════════════════════════════════════
// Layout Properties
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Fixed-only directions have no tail and a fixed region that is the
    /// sum of the word-rounded parameter sizes
    #[test]
    fn fixed_only_layout_sums_sizes(
        op in fixed_only_operation(),
        dir in message_direction(),
        backend in backend()
    ) {
        let wire = layout(&op, dir, &backend).unwrap();
        prop_assert!(wire.variable_tail.is_empty());

        let word = backend.layout.word_bytes as usize;
        let expected: usize = op
            .parameters_for(dir)
            .map(|p| match p.kind {
                ParamKind::Fixed { size_bits } => round_up(size_bits.div_ceil(8) as usize, word),
                _ => 0,
            })
            .sum();
        prop_assert_eq!(wire.fixed_bytes as usize, expected);
        prop_assert_eq!(wire.max_bytes, Some(wire.min_bytes));
    }

    /// A lone sequence always lands in the tail, wherever it was declared
    #[test]
    fn lone_sequence_goes_to_tail(
        (op, name) in one_sequence_operation(),
        backend in backend()
    ) {
        let dir = if op.parameters[0].direction == Direction::Out {
            MessageDirection::Reply
        } else {
            MessageDirection::Request
        };
        let wire = layout(&op, dir, &backend).unwrap();
        prop_assert_eq!(wire.variable_tail.len(), 1);
        prop_assert_eq!(&wire.variable_tail[0].param.name, &name);
        prop_assert!(wire.fixed_region.iter().all(|slot| slot.param.name != name));
    }

    /// Walking fixed region, tail and resource slots yields the direction's
    /// parameters exactly once each
    #[test]
    fn layout_round_trips_parameters(
        op in operation_with_resources(),
        dir in message_direction(),
        backend in backend()
    ) {
        let wire = match layout(&op, dir, &backend) {
            Ok(wire) => wire,
            Err(GenerateError::Operation(_)) => return Ok(()),
            Err(GenerateError::Internal(violation)) => {
                return Err(TestCaseError::fail(violation.to_string()))
            }
        };
        let placed: Vec<&str> = wire.parameters().map(|p| p.name.as_str()).collect();
        let unique: HashSet<&str> = placed.iter().copied().collect();
        prop_assert_eq!(placed.len(), unique.len());

        let declared: HashSet<&str> = op.parameters_for(dir).map(|p| p.name.as_str()).collect();
        prop_assert_eq!(unique, declared);
    }

    /// Fixed slots never overlap and all sit before the tail
    #[test]
    fn fixed_region_precedes_tail(
        op in operation(),
        dir in message_direction(),
        backend in backend()
    ) {
        let Ok(wire) = layout(&op, dir, &backend) else { return Ok(()) };
        let mut end = wire.header.offset.get() + wire.header.size;
        for slot in &wire.fixed_region {
            prop_assert!(slot.offset.get() >= end);
            end = slot.offset.get() + slot.size;
        }
        prop_assert!(wire.tail_start.get() >= end);
    }
}

// ════════════════════════════════════════════════════════════
// Expansion and Assembly Properties
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// One invoke with a combined primitive, two invokes around exactly one
    /// buffer clear without
    #[test]
    fn combined_primitive_selection(op in operation(), backend in backend()) {
        let func = match assemble(&op, &reply_and_wait(), &backend, &options()) {
            Ok(func) => func,
            Err(GenerateError::Operation(_)) => return Ok(()),
            Err(GenerateError::Internal(violation)) => {
                return Err(TestCaseError::fail(violation.to_string()))
            }
        };
        let steps = &func.steps;
        if backend.capabilities.combined_reply_wait {
            prop_assert_eq!(steps.count("Invoke"), 1);
            prop_assert_eq!(steps.count("ClearBuffer"), 0);
        } else {
            prop_assert_eq!(steps.count("Invoke"), 2);
            let order = steps.preorder();
            let invokes: Vec<usize> = order.iter().filter(|(_, s)| s.is_invoke()).map(|(i, _)| *i).collect();
            let clears = order
                .iter()
                .filter(|(i, s)| s.kind.name() == "ClearBuffer" && *i > invokes[0] && *i < invokes[1])
                .count();
            prop_assert_eq!(clears, 1);
        }
    }

    /// The send error check comes before anything of the receive phase
    #[test]
    fn send_check_precedes_receive(op in operation(), backend in backend()) {
        let Ok(func) = assemble(&op, &reply_and_wait(), &backend, &options()) else { return Ok(()) };
        let order = func.steps.preorder();
        let send_invoke = order.iter().position(|(_, s)| s.is_invoke()).unwrap();
        let check = order
            .iter()
            .skip(send_invoke + 1)
            .find(|(_, s)| s.is_check())
            .map(|(i, _)| *i)
            .unwrap();
        for (i, step) in &order {
            if step.phase == Phase::Receive {
                prop_assert!(*i > check, "receive step {} before send check {}", i, check);
            }
        }
        prop_assert!(verify(&func.steps, &reply_and_wait(), &backend).is_ok());
    }

    /// Same inputs, same tree
    #[test]
    fn assembly_is_deterministic(op in operation(), backend in backend()) {
        for variant in [CallPatternVariant::Call, CallPatternVariant::WaitAny, reply_and_wait()] {
            let first = assemble(&op, &variant, &backend, &options());
            let second = assemble(&op, &variant, &backend, &options());
            prop_assert_eq!(first, second);
        }
    }

    /// Once a transfer's cursor is runtime it never becomes constant again
    #[test]
    fn cursor_never_returns_to_constant(op in operation(), backend in backend()) {
        let Ok(func) = assemble(&op, &CallPatternVariant::Call, &backend, &options()) else { return Ok(()) };
        for (_, step) in func.steps.preorder() {
            let transfer = match &step.kind {
                StepKind::Marshal(t) | StepKind::Unmarshal(t) => t,
                _ => continue,
            };
            let mut seen_runtime = false;
            for field in &transfer.fields {
                if seen_runtime {
                    prop_assert!(field.at.is_runtime());
                }
                if field.region == Region::Tail && field.update.is_some() {
                    seen_runtime = true;
                }
            }
        }
    }
}
