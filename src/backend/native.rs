//! Native kernel IPC backends
//!
//! Both generations reply and wait in one primitive and transfer resource
//! pages. They differ in word width and in where resource-page slots go:
//! generation 2 opens the message with them (closed by a zero terminator
//! slot), generation 4 appends them after the fixed words as typed items.
//! Generation 2 derives the length of the trailing sequence from the
//! message size instead of sending a length word.

use idl_rt::{LengthEncoding, TransportErrorKind};

use super::{Backend, BackendCapabilities, BackendKind, LayoutRules, ResourcePlacement};
use crate::layout::SortPolicy;

const NATIVE_CAPABILITIES: BackendCapabilities = BackendCapabilities {
    combined_reply_wait: true,
    transfers_resource_pages: true,
    requires_buffer_clear_between_phases: false,
    wildcard_sender_field: None,
};

/// Kernel cancellation surfaces as `Cancelled` on the blocked primitive.
const NATIVE_ERRORS: &[TransportErrorKind] = &[
    TransportErrorKind::SendFailed,
    TransportErrorKind::ReceiveFailed,
    TransportErrorKind::Cancelled,
    TransportErrorKind::PeerGone,
    TransportErrorKind::TimedOut,
];

/// Native ABI, generation 2 (32-bit words)
pub const NATIVE_V2: Backend = Backend {
    kind: BackendKind::NativeV2,
    capabilities: NATIVE_CAPABILITIES,
    layout: LayoutRules {
        word_bytes: 4,
        resource_placement: ResourcePlacement::Leading {
            slot_bytes: 8,
            terminator_bytes: 8,
        },
        tail_length: LengthEncoding::Implicit,
        max_resource_pages: 1,
        max_message_bytes: 4096,
        sort_policy: SortPolicy::AscendingSize,
    },
    reported_errors: NATIVE_ERRORS,
};

/// Native ABI, generation 4 (64-bit words)
pub const NATIVE_V4: Backend = Backend {
    kind: BackendKind::NativeV4,
    capabilities: NATIVE_CAPABILITIES,
    layout: LayoutRules {
        word_bytes: 8,
        resource_placement: ResourcePlacement::AfterFixed { slot_bytes: 16 },
        tail_length: LengthEncoding::Prefixed,
        max_resource_pages: 1,
        max_message_bytes: 8192,
        sort_policy: SortPolicy::AscendingSize,
    },
    reported_errors: NATIVE_ERRORS,
};
