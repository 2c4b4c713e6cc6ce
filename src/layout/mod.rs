//! Message Layout Engine
//!
//! Computes the wire layout of one direction of one operation on one
//! backend. The result is immutable; a changed operation or backend gets a
//! freshly computed layout.
//!
//! Wire order is always: leading resource slots (native v2), header word,
//! fixed region, trailing resource slots (native v4), variable tail.

pub mod cursor;
pub mod order;

use log::trace;
use serde::Serialize;

use idl_rt::LengthEncoding;

use crate::backend::{Backend, BackendKind, ResourcePlacement};
use crate::error::{GenerateError, InvariantViolation, OperationErrorKind};
use crate::model::{ElementKind, MessageDirection, Operation, ParamKind, Parameter, SequenceLength};

pub use cursor::{Advance, ConstOffset, CursorUpdate, OffsetCursor, RuntimeExtent};
pub use order::SortPolicy;

// ═══════════════════════════════════════════════════════════════════════════
// Layout Types
// ═══════════════════════════════════════════════════════════════════════════

/// What the header word carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderWord {
    /// Operation discriminator (requests)
    Discriminator(u32),
    /// Server return code (replies)
    ReturnCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HeaderSlot {
    pub word: HeaderWord,
    pub offset: ConstOffset,
    pub size: u32,
}

/// A fixed-size parameter at a constant offset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FixedSlot {
    pub param: Parameter,
    pub offset: ConstOffset,
    /// Bytes occupied, padding included
    pub size: u32,
}

/// A backend-mandated resource-page slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceSlot {
    pub param: Parameter,
    pub offset: ConstOffset,
    pub size: u32,
}

/// A reserved span that carries no parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Reserved {
    pub offset: ConstOffset,
    pub size: u32,
}

/// Element count of a tail sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthField {
    /// Computed when generating
    Constant(u32),
    /// Deferred to runtime
    Runtime { max: Option<u32> },
}

/// A sequence in the variable tail
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TailSlot {
    pub param: Parameter,
    pub element: ElementKind,
    pub length: LengthField,
    /// Bytes of the length word in front of the payload (0 when implicit)
    pub length_prefix_bytes: u32,
    /// Payload is padded to a multiple of this
    pub pad_to: u32,
    /// Encoded size with a constant length, or with an empty runtime sequence
    pub min_bytes: u32,
    /// Largest encoded size; `None` when the runtime length is unbounded
    pub max_bytes: Option<u32>,
}

impl TailSlot {
    /// How far the cursor moves past this slot
    pub fn advance(&self) -> Advance {
        match self.length {
            LengthField::Constant(_) => Advance::Bytes(self.min_bytes),
            LengthField::Runtime { .. } => Advance::Runtime(RuntimeExtent {
                param: self.param.name.clone(),
                element_bytes: self.element.element_bytes(),
                header_bytes: self.length_prefix_bytes,
                pad_to: self.pad_to,
            }),
        }
    }

    pub fn is_runtime_sized(&self) -> bool {
        matches!(self.length, LengthField::Runtime { .. })
    }

}

/// `prefix + round_up(count * element_bytes, pad_to)`, which cannot overflow
/// in 64 bits for 32-bit inputs
fn encoded_bytes(count: u32, element_bytes: u32, prefix: u32, pad_to: u32) -> u64 {
    let payload = u64::from(count) * u64::from(element_bytes);
    u64::from(prefix) + payload.next_multiple_of(u64::from(pad_to.max(1)))
}

/// Wire layout of one direction of one operation on one backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WireLayout {
    pub direction: MessageDirection,
    pub backend: BackendKind,
    pub word_bytes: u32,
    pub header: HeaderSlot,
    pub fixed_region: Vec<FixedSlot>,
    pub variable_tail: Vec<TailSlot>,
    pub resource_slots: Vec<ResourceSlot>,
    /// Zero slot closing leading resource slots
    pub resource_terminator: Option<Reserved>,
    pub tail_start: ConstOffset,
    /// Size of the fixed region alone
    pub fixed_bytes: u32,
    /// Message size with every runtime sequence empty
    pub min_bytes: u32,
    /// Largest message size; `None` when a runtime sequence is unbounded
    pub max_bytes: Option<u32>,
}

impl WireLayout {
    /// Is the message size only known at runtime?
    pub fn is_variable_sized(&self) -> bool {
        self.variable_tail.iter().any(TailSlot::is_runtime_sized)
    }

    /// Every placed parameter: fixed region, then tail, then resource slots
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.fixed_region
            .iter()
            .map(|s| &s.param)
            .chain(self.variable_tail.iter().map(|s| &s.param))
            .chain(self.resource_slots.iter().map(|s| &s.param))
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_region.is_empty() && self.variable_tail.is_empty() && self.resource_slots.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Layout Computation
// ═══════════════════════════════════════════════════════════════════════════

/// Compute the wire layout of `direction` of `operation` on `backend`.
pub fn layout(
    operation: &Operation,
    direction: MessageDirection,
    backend: &Backend,
) -> Result<WireLayout, GenerateError> {
    let rules = &backend.layout;
    let word = rules.word_bytes;
    let limit = rules.max_message_bytes;

    let mut fixed = Vec::new();
    let mut sequences = Vec::new();
    let mut resources = Vec::new();
    for param in operation.parameters_for(direction) {
        match param.kind {
            ParamKind::Fixed { size_bits } => {
                if size_bits == 0 {
                    return Err(invalid(param, "fixed parameter has no bits").into());
                }
                fixed.push(param);
            }
            ParamKind::VariableSequence(element) => {
                if element.size_bits == 0 {
                    return Err(invalid(param, "sequence element has no bits").into());
                }
                sequences.push((param, element));
            }
            ParamKind::ResourcePage => resources.push(param),
        }
    }

    if let Some(first) = resources.first() {
        if !backend.capabilities.transfers_resource_pages {
            return Err(OperationErrorKind::UnsupportedParameterKind {
                param: first.name.clone(),
                backend: backend.name().to_string(),
            }
            .into());
        }
        if resources.len() > rules.max_resource_pages {
            return Err(OperationErrorKind::TooManyResourcePages {
                count: resources.len(),
                max: rules.max_resource_pages,
            }
            .into());
        }
    }

    let mut offset = ConstOffset::ZERO;
    let mut resource_slots = Vec::new();
    let mut resource_terminator = None;

    // Leading slots and their terminator open the message
    if let ResourcePlacement::Leading {
        slot_bytes,
        terminator_bytes,
    } = rules.resource_placement
    {
        if !resources.is_empty() {
            offset = place_resources(&resources, offset, slot_bytes, &mut resource_slots, limit)?;
            resource_terminator = Some(Reserved {
                offset,
                size: terminator_bytes,
            });
            offset = grow(offset, terminator_bytes, limit)?;
        }
    }

    let header = HeaderSlot {
        word: match direction {
            MessageDirection::Request => HeaderWord::Discriminator(operation.id),
            MessageDirection::Reply => HeaderWord::ReturnCode,
        },
        offset: align(offset, word, limit)?,
        size: word,
    };
    offset = grow(header.offset, word, limit)?;

    rules.sort_policy.sort(&mut fixed);
    let fixed_start = offset;
    let mut fixed_region = Vec::with_capacity(fixed.len());
    for param in fixed {
        let bytes = match param.kind {
            ParamKind::Fixed { size_bits } => size_bits.div_ceil(8),
            _ => continue,
        };
        let alignment = bytes.next_power_of_two().min(word);
        let at = align(offset, alignment, limit)?;
        let size = bytes.next_multiple_of(word);
        fixed_region.push(FixedSlot {
            param: param.clone(),
            offset: at,
            size,
        });
        offset = grow(at, size, limit)?;
    }
    let fixed_bytes = offset.get() - fixed_start.get();

    if let ResourcePlacement::AfterFixed { slot_bytes } = rules.resource_placement {
        offset = place_resources(&resources, offset, slot_bytes, &mut resource_slots, limit)?;
    }

    let tail_start = align(offset, word, limit)?;
    let variable_tail = place_tail(&sequences, rules.tail_length, word, limit)?;

    let mut end = tail_start;
    let mut max_end = Some(tail_start);
    for slot in &variable_tail {
        end = grow(end, slot.min_bytes, limit)?;
        max_end = match (max_end, slot.max_bytes) {
            (Some(at), Some(bytes)) => Some(grow(at, bytes, limit)?),
            _ => None,
        };
    }
    let min_bytes = end.get();
    let max_bytes = max_end.map(ConstOffset::get);

    let wire = WireLayout {
        direction,
        backend: backend.kind,
        word_bytes: word,
        header,
        fixed_region,
        variable_tail,
        resource_slots,
        resource_terminator,
        tail_start,
        fixed_bytes,
        min_bytes,
        max_bytes,
    };

    verify_resource_slots(&wire)?;
    verify_unique_placement(&wire)?;

    if min_bytes > rules.max_message_bytes {
        return Err(too_large(u64::from(min_bytes), limit));
    }

    trace!(
        "{} {:?} on {}: fixed {} bytes, tail {} entries, min {} bytes",
        operation.name,
        direction,
        backend.name(),
        wire.fixed_bytes,
        wire.variable_tail.len(),
        wire.min_bytes
    );

    Ok(wire)
}

fn invalid(param: &Parameter, reason: &str) -> OperationErrorKind {
    OperationErrorKind::InvalidParameterType {
        param: param.name.clone(),
        reason: reason.to_string(),
    }
}

fn too_large(size: u64, max: u32) -> GenerateError {
    OperationErrorKind::MessageTooLarge { size, max }.into()
}

/// Offset arithmetic for a message of at most `limit` bytes. Anything past
/// 32 bits is necessarily past the limit.
fn grow(offset: ConstOffset, bytes: u32, limit: u32) -> Result<ConstOffset, GenerateError> {
    offset
        .checked_add(bytes)
        .ok_or_else(|| too_large(u64::from(offset.get()) + u64::from(bytes), limit))
}

fn align(offset: ConstOffset, to: u32, limit: u32) -> Result<ConstOffset, GenerateError> {
    offset
        .checked_align_to(to)
        .ok_or_else(|| too_large(u64::from(offset.get()), limit))
}

fn place_resources(
    resources: &[&Parameter],
    mut offset: ConstOffset,
    slot_bytes: u32,
    slots: &mut Vec<ResourceSlot>,
    limit: u32,
) -> Result<ConstOffset, GenerateError> {
    for param in resources {
        slots.push(ResourceSlot {
            param: (*param).clone(),
            offset,
            size: slot_bytes,
        });
        offset = grow(offset, slot_bytes, limit)?;
    }
    Ok(offset)
}

/// Tail entries in declaration order. With implicit lengths only the last
/// entry may be runtime sized, since its length comes from the message size.
fn place_tail(
    sequences: &[(&Parameter, ElementKind)],
    encoding: LengthEncoding,
    word: u32,
    limit: u32,
) -> Result<Vec<TailSlot>, GenerateError> {
    let mut tail = Vec::with_capacity(sequences.len());
    for (index, (param, element)) in sequences.iter().enumerate() {
        let is_last = index + 1 == sequences.len();
        let length = match element.length {
            SequenceLength::Constant(n) => LengthField::Constant(n),
            SequenceLength::Runtime { max } => LengthField::Runtime { max },
        };

        let (length_prefix_bytes, pad_to) = match (encoding, length) {
            (LengthEncoding::Prefixed, _) => (word, word),
            (LengthEncoding::Implicit, LengthField::Constant(_)) => (0, word),
            (LengthEncoding::Implicit, LengthField::Runtime { .. }) => {
                if !is_last {
                    return Err(OperationErrorKind::AmbiguousVariableTail {
                        first: param.name.clone(),
                        second: sequences[index + 1].0.name.clone(),
                    }
                    .into());
                }
                (0, 1)
            }
        };

        let element_bytes = element.element_bytes();
        let fits = |count: u32| {
            let bytes = encoded_bytes(count, element_bytes, length_prefix_bytes, pad_to);
            u32::try_from(bytes).map_err(|_| too_large(bytes, limit))
        };
        let (min_bytes, max_bytes) = match length {
            LengthField::Constant(count) => {
                let bytes = fits(count)?;
                (bytes, Some(bytes))
            }
            LengthField::Runtime { max } => (length_prefix_bytes, max.map(fits).transpose()?),
        };

        tail.push(TailSlot {
            param: (*param).clone(),
            element: *element,
            length,
            length_prefix_bytes,
            pad_to,
            min_bytes,
            max_bytes,
        });
    }
    Ok(tail)
}

fn verify_resource_slots(wire: &WireLayout) -> Result<(), InvariantViolation> {
    let mut regions: Vec<(String, u32, u32)> = vec![(
        "the header".to_string(),
        wire.header.offset.get(),
        wire.header.offset.get() + wire.header.size,
    )];
    if let Some(term) = wire.resource_terminator {
        regions.push((
            "the resource terminator".to_string(),
            term.offset.get(),
            term.offset.get() + term.size,
        ));
    }
    for slot in &wire.fixed_region {
        regions.push((
            format!("fixed parameter '{}'", slot.param.name),
            slot.offset.get(),
            slot.offset.get() + slot.size,
        ));
    }
    if !wire.variable_tail.is_empty() {
        let end = if wire.is_variable_sized() { u32::MAX } else { wire.min_bytes };
        regions.push(("the variable tail".to_string(), wire.tail_start.get(), end));
    }

    for (i, slot) in wire.resource_slots.iter().enumerate() {
        let (start, end) = (slot.offset.get(), slot.offset.get() + slot.size);
        let others = wire.resource_slots.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, other)| {
            (
                format!("resource slot '{}'", other.param.name),
                other.offset.get(),
                other.offset.get() + other.size,
            )
        });
        for (region, r_start, r_end) in regions.iter().cloned().chain(others) {
            if start < r_end && r_start < end {
                return Err(InvariantViolation::ResourceSlotCollision {
                    param: slot.param.name.clone(),
                    offset: start,
                    end,
                    region,
                });
            }
        }
    }
    Ok(())
}

fn verify_unique_placement(wire: &WireLayout) -> Result<(), InvariantViolation> {
    let mut seen = std::collections::HashSet::new();
    for param in wire.parameters() {
        if !seen.insert(param.name.as_str()) {
            return Err(InvariantViolation::DuplicatePlacement(param.name.clone()));
        }
    }
    Ok(())
}
