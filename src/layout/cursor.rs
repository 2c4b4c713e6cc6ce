//! Offset cursor threaded through marshal and unmarshal steps
//!
//! A cursor is a value. Advancing returns a new cursor and, when a runtime
//! offset variable has to change, the update generated code must perform.
//! A constant cursor becomes a runtime cursor at the first runtime-sized
//! sequence and never becomes constant again.

use serde::Serialize;

use crate::error::InvariantViolation;

/// A byte offset known when generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConstOffset(pub u32);

impl ConstOffset {
    pub const ZERO: ConstOffset = ConstOffset(0);

    pub fn get(self) -> u32 {
        self.0
    }

    /// `None` when the sum does not fit in a 32-bit offset
    pub fn checked_add(self, bytes: u32) -> Option<ConstOffset> {
        self.0.checked_add(bytes).map(ConstOffset)
    }

    /// Round up to a multiple of `align`
    pub fn checked_align_to(self, align: u32) -> Option<ConstOffset> {
        if align <= 1 {
            return Some(self);
        }
        self.0.checked_next_multiple_of(align).map(ConstOffset)
    }
}

/// Size of a tail element whose element count is only known at runtime:
/// `header_bytes + round_up(count(param) * element_bytes, pad_to)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuntimeExtent {
    pub param: String,
    pub element_bytes: u32,
    pub header_bytes: u32,
    pub pad_to: u32,
}

/// How far a cursor moves past one element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advance {
    Bytes(u32),
    Runtime(RuntimeExtent),
}

/// Assignment generated code performs: `var = from + by`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CursorUpdate {
    pub var: String,
    pub from: OffsetCursor,
    pub by: RuntimeExtent,
}

/// Current read or write position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetCursor {
    Constant(ConstOffset),
    /// The value of offset variable `var`, plus `plus` bytes
    Runtime { var: String, plus: u32 },
}

impl OffsetCursor {
    pub fn at(offset: u32) -> Self {
        OffsetCursor::Constant(ConstOffset(offset))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, OffsetCursor::Runtime { .. })
    }

    /// The only way to get a constant offset out of a cursor.
    ///
    /// `param` names the parameter that needed it, for the report.
    pub fn resolve(&self, param: &str) -> Result<ConstOffset, InvariantViolation> {
        match self {
            OffsetCursor::Constant(offset) => Ok(*offset),
            OffsetCursor::Runtime { var, .. } => Err(InvariantViolation::UnresolvedCursor {
                param: param.to_string(),
                var: var.clone(),
            }),
        }
    }

    /// Move past one element. `var` names the runtime offset variable used
    /// if this is the first runtime-sized move.
    pub fn advance(&self, by: Advance, var: &str) -> Result<(OffsetCursor, Option<CursorUpdate>), InvariantViolation> {
        let overflow = |at: u32, by: u32| InvariantViolation::OffsetOverflow { at, by };
        let next = match (self, by) {
            (OffsetCursor::Constant(offset), Advance::Bytes(n)) => {
                let next = offset.checked_add(n).ok_or_else(|| overflow(offset.get(), n))?;
                (OffsetCursor::Constant(next), None)
            }
            (OffsetCursor::Runtime { var, plus }, Advance::Bytes(n)) => (
                OffsetCursor::Runtime {
                    var: var.clone(),
                    plus: plus.checked_add(n).ok_or_else(|| overflow(*plus, n))?,
                },
                None,
            ),
            (OffsetCursor::Constant(_), Advance::Runtime(extent)) => {
                let update = CursorUpdate {
                    var: var.to_string(),
                    from: self.clone(),
                    by: extent,
                };
                (
                    OffsetCursor::Runtime {
                        var: var.to_string(),
                        plus: 0,
                    },
                    Some(update),
                )
            }
            (OffsetCursor::Runtime { var: current, .. }, Advance::Runtime(extent)) => {
                let update = CursorUpdate {
                    var: current.clone(),
                    from: self.clone(),
                    by: extent,
                };
                (
                    OffsetCursor::Runtime {
                        var: current.clone(),
                        plus: 0,
                    },
                    Some(update),
                )
            }
        };
        Ok(next)
    }
}
