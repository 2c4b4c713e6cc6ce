//! Datagram socket emulation backend
//!
//! Sockets have no combined reply-and-receive primitive, so a reply followed
//! by a wait is a `sendto`, a buffer clear and a `recvfrom`. The peer address
//! left over from the reply must be reset to the wildcard before the receive.
//! There is no kernel cancellation and no resource-page transfer.

use idl_rt::{LengthEncoding, TransportErrorKind};

use super::{Backend, BackendCapabilities, BackendKind, FieldRef, LayoutRules, ResourcePlacement};
use crate::layout::SortPolicy;

/// Address of the peer a datagram was last received from or sent to
pub const SENDER_ADDRESS_FIELD: FieldRef = FieldRef::new("peer.sin_addr");

const SOCKET_ERRORS: &[TransportErrorKind] = &[
    TransportErrorKind::SendFailed,
    TransportErrorKind::ReceiveFailed,
    TransportErrorKind::PeerGone,
];

/// Largest UDP payload
const MAX_DATAGRAM: u32 = 65507;

pub const SOCKET: Backend = Backend {
    kind: BackendKind::Socket,
    capabilities: BackendCapabilities {
        combined_reply_wait: false,
        transfers_resource_pages: false,
        requires_buffer_clear_between_phases: true,
        wildcard_sender_field: Some(SENDER_ADDRESS_FIELD),
    },
    layout: LayoutRules {
        word_bytes: 4,
        resource_placement: ResourcePlacement::Unsupported,
        tail_length: LengthEncoding::Prefixed,
        max_resource_pages: 0,
        max_message_bytes: MAX_DATAGRAM,
        sort_policy: SortPolicy::Declaration,
    },
    reported_errors: SOCKET_ERRORS,
};
