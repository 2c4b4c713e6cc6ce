//! Generated-Function Assembler
//!
//! Combines a call-pattern variant, a backend and the operation's wire
//! layouts into a verified step tree. Every transfer in the result has its
//! offsets threaded through one [`OffsetCursor`] per message, so an emitter
//! never sees an unresolved layout.

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::backend::{Backend, BackendKind};
use crate::error::{GenerateError, InvariantViolation, OperationErrorKind};
use crate::layout::{
    layout, ConstOffset, CursorUpdate, HeaderSlot, LengthField, OffsetCursor, Reserved, WireLayout,
};
use crate::model::{MessageDirection, Operation};
use crate::naming::Naming;
use crate::pattern::{expand, CallPatternVariant, FileTarget};
use crate::step::{Phase, StepKind, StepTree, TransferLabel};

// ═══════════════════════════════════════════════════════════════════════════
// Resolved Transfers
// ═══════════════════════════════════════════════════════════════════════════

/// Where in the message a field lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Fixed,
    Resource,
    Tail,
}

/// One parameter's read or write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldAccess {
    pub param: String,
    pub region: Region,
    pub at: OffsetCursor,
    /// Bytes occupied, when known when generating
    pub bytes: Option<u32>,
    /// Element count of a tail sequence
    pub length: Option<LengthField>,
    /// Bytes of the length word in front of a tail payload
    pub length_prefix_bytes: u32,
    /// Offset variable update performed after this field
    pub update: Option<CursorUpdate>,
}

/// Size of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageExtent {
    Constant(u32),
    Runtime(OffsetCursor),
}

/// A marshal or unmarshal with every offset threaded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedTransfer {
    pub direction: MessageDirection,
    pub header: HeaderSlot,
    pub resource_terminator: Option<Reserved>,
    pub fields: Vec<FieldAccess>,
    pub extent: MessageExtent,
}

impl ResolvedTransfer {
    pub fn field(&self, param: &str) -> Option<&FieldAccess> {
        self.fields.iter().find(|f| f.param == param)
    }
}

impl TransferLabel for WireLayout {
    fn label(&self) -> String {
        let names: Vec<&str> = self.parameters().map(|p| p.name.as_str()).collect();
        names.join(", ")
    }
}

impl TransferLabel for ResolvedTransfer {
    fn label(&self) -> String {
        let names: Vec<&str> = self.fields.iter().map(|f| f.param.as_str()).collect();
        names.join(", ")
    }
}

/// Thread a cursor through `wire` in wire order.
pub fn resolve_transfer(wire: &WireLayout, offset_var: &str) -> Result<ResolvedTransfer, InvariantViolation> {
    // Everything ahead of the tail sits at a constant offset
    let mut placed: Vec<(ConstOffset, u32, Option<(&str, Region)>)> = Vec::new();
    placed.push((wire.header.offset, wire.header.size, None));
    if let Some(term) = wire.resource_terminator {
        placed.push((term.offset, term.size, None));
    }
    for slot in &wire.fixed_region {
        placed.push((slot.offset, slot.size, Some((slot.param.name.as_str(), Region::Fixed))));
    }
    for slot in &wire.resource_slots {
        placed.push((slot.offset, slot.size, Some((slot.param.name.as_str(), Region::Resource))));
    }
    placed.sort_by_key(|(offset, _, _)| *offset);

    let mut fields = Vec::with_capacity(placed.len() + wire.variable_tail.len());
    for (offset, size, field) in placed {
        let name = field.map_or("header", |(name, _)| name);
        // Past the start of a runtime-sized tail an offset is no longer constant
        let end = u64::from(offset.get()) + u64::from(size);
        if wire.is_variable_sized() && end > u64::from(wire.tail_start.get()) {
            return Err(InvariantViolation::UnresolvedCursor {
                param: name.to_string(),
                var: offset_var.to_string(),
            });
        }
        if let Some((param, region)) = field {
            fields.push(FieldAccess {
                param: param.to_string(),
                region,
                at: OffsetCursor::Constant(offset),
                bytes: Some(size),
                length: None,
                length_prefix_bytes: 0,
                update: None,
            });
        }
    }

    let mut cursor = OffsetCursor::Constant(wire.tail_start);
    for slot in &wire.variable_tail {
        let at = cursor.clone();
        let (next, update) = cursor.advance(slot.advance(), offset_var)?;
        fields.push(FieldAccess {
            param: slot.param.name.clone(),
            region: Region::Tail,
            at,
            bytes: slot.max_bytes.filter(|_| !slot.is_runtime_sized()),
            length: Some(slot.length),
            length_prefix_bytes: slot.length_prefix_bytes,
            update,
        });
        cursor = next;
    }

    let extent = match cursor {
        OffsetCursor::Constant(end) => MessageExtent::Constant(end.get()),
        runtime => MessageExtent::Runtime(runtime),
    };

    Ok(ResolvedTransfer {
        direction: wire.direction,
        header: wire.header.clone(),
        resource_terminator: wire.resource_terminator,
        fields,
        extent,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Generated Functions
// ═══════════════════════════════════════════════════════════════════════════

/// A function ready for emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFunction {
    pub name: String,
    pub operation: String,
    pub discriminator: u32,
    pub variant: CallPatternVariant,
    pub backend: BackendKind,
    pub file: FileTarget,
    pub buffer_var: String,
    pub offset_var: String,
    /// Largest message in either direction; `None` when unbounded
    pub buffer_capacity: Option<u32>,
    pub steps: StepTree<ResolvedTransfer>,
}

impl fmt::Display for GeneratedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capacity = match self.buffer_capacity {
            Some(bytes) => format!("{bytes} bytes"),
            None => "unbounded".to_string(),
        };
        writeln!(
            f,
            "{} ({:?}, {}, buffer {})",
            self.name, self.file, self.backend, capacity
        )?;
        write!(f, "{}", self.steps)
    }
}

/// Inputs the assembler takes besides the operation itself
#[derive(Clone, Copy)]
pub struct AssembleOptions<'a> {
    pub interface: &'a str,
    pub naming: &'a dyn Naming,
    /// Function called on every error path, if any
    pub error_hook: Option<&'a str>,
}

/// Assemble `variant` of `operation` for `backend`.
pub fn assemble(
    operation: &Operation,
    variant: &CallPatternVariant,
    backend: &Backend,
    options: &AssembleOptions<'_>,
) -> Result<GeneratedFunction, GenerateError> {
    if operation.oneway && variant.sends_reply() {
        return Err(OperationErrorKind::NoReplyForOneway(variant.as_str().to_string()).into());
    }

    let send = variant
        .send_direction()
        .map(|dir| layout(operation, dir, backend))
        .transpose()?;
    let recv = variant
        .receive_direction()
        .filter(|dir| !(operation.oneway && *dir == MessageDirection::Reply))
        .map(|dir| layout(operation, dir, backend))
        .transpose()?;

    let buffer_capacity = send
        .iter()
        .chain(recv.iter())
        .map(|wire| wire.max_bytes)
        .try_fold(0, |acc, max| max.map(|m| acc.max(m)));

    let offset_var = options.naming.offset_var();
    let tree = expand(variant, send, recv, backend, options.error_hook)?;
    let steps = tree.try_map(|wire| resolve_transfer(&wire, &offset_var))?;
    verify(&steps, variant, backend)?;

    let name = options
        .naming
        .function_name(options.interface, &operation.name, variant);
    debug!("assembled {} ({} steps)", name, steps.len());

    Ok(GeneratedFunction {
        name,
        operation: operation.name.clone(),
        discriminator: operation.id,
        variant: variant.clone(),
        backend: backend.kind,
        file: variant.file(),
        buffer_var: options.naming.buffer_var(),
        offset_var,
        buffer_capacity,
        steps,
    })
}

/// Check the ordering invariants of an assembled tree.
///
/// The first error check after the first sending invoke precedes every
/// receive-phase step. A split reply and receive has exactly one buffer
/// clear between its two invokes when the backend requires one.
pub fn verify<T>(
    tree: &StepTree<T>,
    variant: &CallPatternVariant,
    backend: &Backend,
) -> Result<(), InvariantViolation> {
    let order = tree.preorder();
    let caps = &backend.capabilities;

    let combined = caps.combined_reply_wait;
    let expected = match variant {
        CallPatternVariant::ReplyToThenWaitAny(_) if !combined => 2,
        _ => 1,
    };
    let invokes: Vec<usize> = order
        .iter()
        .filter(|(_, step)| step.is_invoke())
        .map(|(i, _)| *i)
        .collect();
    if invokes.len() != expected {
        return Err(InvariantViolation::InvokeCount {
            variant: variant.as_str().to_string(),
            found: invokes.len(),
            expected,
        });
    }

    let send_invoke = order.iter().find_map(|(i, step)| match &step.kind {
        StepKind::Invoke(op) if op.sends() => Some(*i),
        _ => None,
    });
    if let Some(send_invoke) = send_invoke {
        let check = order
            .iter()
            .find(|(i, step)| *i > send_invoke && step.is_check())
            .map_or(order.len(), |(i, _)| *i);
        if let Some((receive, _)) = order
            .iter()
            .find(|(i, step)| step.phase == Phase::Receive && *i < check)
        {
            return Err(InvariantViolation::ReceiveBeforeSendCheck {
                receive: *receive,
                check,
            });
        }
    }

    if expected == 2 {
        let (first, second) = (invokes[0], invokes[1]);
        let clears = order
            .iter()
            .filter(|(i, step)| *i > first && *i < second && matches!(step.kind, StepKind::ClearBuffer(_)))
            .count();
        let wanted = usize::from(caps.requires_buffer_clear_between_phases);
        if clears != wanted {
            return Err(InvariantViolation::BufferClearCount(clears));
        }
    }

    Ok(())
}
