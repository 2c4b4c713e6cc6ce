//! Proptest strategies for generating operations and backends
//!
//! Parameter names are `p0`, `p1`, ... in declaration order, so every
//! generated operation has unique names.

#![allow(dead_code)]

use idlgen::{
    Backend, Direction, MessageDirection, Operation, ParamKind, Parameter, SequenceLength, NATIVE_V2, NATIVE_V4,
    SOCKET,
};
use idlgen::model::ElementKind;
use proptest::prelude::*;

// ════════════════════════════════════════════════════════════
// Basic Strategies
// ════════════════════════════════════════════════════════════

pub fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::In), Just(Direction::Out), Just(Direction::InOut)]
}

pub fn message_direction() -> impl Strategy<Value = MessageDirection> {
    prop_oneof![Just(MessageDirection::Request), Just(MessageDirection::Reply)]
}

pub fn backend() -> impl Strategy<Value = Backend> {
    prop_oneof![Just(NATIVE_V2), Just(NATIVE_V4), Just(SOCKET)]
}

/// Mostly the usual widths, sometimes odd bit counts
pub fn fixed_bits() -> impl Strategy<Value = u32> {
    prop_oneof![
        4 => prop_oneof![Just(8u32), Just(16), Just(32), Just(64)],
        1 => 1u32..=128,
    ]
}

pub fn sequence_length() -> impl Strategy<Value = SequenceLength> {
    prop_oneof![
        (0u32..16).prop_map(SequenceLength::Constant),
        proptest::option::of(1u32..64).prop_map(|max| SequenceLength::Runtime { max }),
    ]
}

pub fn element() -> impl Strategy<Value = ElementKind> {
    (prop_oneof![Just(8u32), Just(16), Just(32)], sequence_length())
        .prop_map(|(size_bits, length)| ElementKind { size_bits, length })
}

// ════════════════════════════════════════════════════════════
// Composite Strategies
// ════════════════════════════════════════════════════════════

pub fn fixed_kind() -> impl Strategy<Value = ParamKind> {
    fixed_bits().prop_map(|size_bits| ParamKind::Fixed { size_bits })
}

/// Fixed parameters and sequences, no resource pages
pub fn plain_kind() -> impl Strategy<Value = ParamKind> {
    prop_oneof![
        3 => fixed_kind(),
        1 => element().prop_map(ParamKind::VariableSequence),
    ]
}

fn named(specs: Vec<(Direction, ParamKind)>) -> Vec<Parameter> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, (direction, kind))| Parameter {
            name: format!("p{i}"),
            direction,
            kind,
        })
        .collect()
}

fn build(params: Vec<Parameter>, id: u32) -> Operation {
    let mut op = Operation::new(format!("op{id}"), id);
    op.parameters = params;
    op
}

/// Any two-way operation without resource pages
pub fn operation() -> impl Strategy<Value = Operation> {
    (prop::collection::vec((direction(), plain_kind()), 0..8), 1u32..1000)
        .prop_map(|(specs, id)| build(named(specs), id))
}

/// Two-way operation whose parameters are all fixed
pub fn fixed_only_operation() -> impl Strategy<Value = Operation> {
    (prop::collection::vec((direction(), fixed_kind()), 0..10), 1u32..1000)
        .prop_map(|(specs, id)| build(named(specs), id))
}

/// Fixed parameters with exactly one sequence at `position` (clamped), all
/// travelling in `direction`
pub fn one_sequence_operation() -> impl Strategy<Value = (Operation, String)> {
    (
        prop::collection::vec(fixed_kind(), 0..6),
        element(),
        0usize..8,
        direction(),
    )
        .prop_map(|(fixed, element, position, direction)| {
            let mut kinds: Vec<ParamKind> = fixed;
            let at = position.min(kinds.len());
            kinds.insert(at, ParamKind::VariableSequence(element));
            let params = named(kinds.into_iter().map(|k| (direction, k)).collect());
            let name = params[at].name.clone();
            (build(params, 7), name)
        })
}

/// Operation that may carry one resource page in each direction
pub fn operation_with_resources() -> impl Strategy<Value = Operation> {
    (operation(), prop::option::of(direction()))
        .prop_map(|(mut op, resource)| {
            if let Some(direction) = resource {
                let name = format!("p{}", op.parameters.len());
                op.parameters.insert(0, Parameter::resource(name, direction));
            }
            op
        })
}
