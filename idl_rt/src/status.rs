//! Raw transport status classification
//!
//! Each backend reports failures in its own encoding: the native v2 ABI
//! returns a message dope with an error nibble, the native v4 ABI an error
//! word with a phase bit, and the socket emulation an errno. Generated code
//! funnels all of them through the functions here so that its error checks
//! only ever see a [`TransportErrorKind`].

use crate::error::TransportErrorKind;

/// Half of a transport operation that produced a status
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferPhase {
    /// Sending (or replying)
    Send,
    /// Receiving (or waiting)
    Receive,
}

// ════════════════════════════════════════════════════════════
// Native ABI, generation 2
// ════════════════════════════════════════════════════════════

/// Native v2 status codes (error nibble of the result dope)
pub mod native_v2 {
    use super::TransportErrorKind;

    /// Mask selecting the error nibble
    pub const ERROR_MASK: u32 = 0xF0;

    /// Destination or source does not exist
    pub const ENOT_EXISTENT: u32 = 0x10;
    /// Timeout during receive
    pub const RETIMEOUT: u32 = 0x20;
    /// Timeout during send
    pub const SETIMEOUT: u32 = 0x30;
    /// Receive cancelled
    pub const RECANCELED: u32 = 0x40;
    /// Send cancelled
    pub const SECANCELED: u32 = 0x50;
    /// Mapping a resource page failed in receive
    pub const REMAPFAILED: u32 = 0x60;
    /// Mapping a resource page failed in send
    pub const SEMAPFAILED: u32 = 0x70;
    /// Send-pagefault timeout in receive
    pub const RESNDPFTO: u32 = 0x80;
    /// Send-pagefault timeout in send
    pub const SESNDPFTO: u32 = 0x90;
    /// Receive-pagefault timeout in receive
    pub const RERCVPFTO: u32 = 0xA0;
    /// Receive-pagefault timeout in send
    pub const SERCVPFTO: u32 = 0xB0;
    /// Receive aborted
    pub const REABORTED: u32 = 0xC0;
    /// Send aborted
    pub const SEABORTED: u32 = 0xD0;
    /// Received message was cut
    pub const REMSGCUT: u32 = 0xE0;
    /// Sent message was cut
    pub const SEMSGCUT: u32 = 0xF0;

    /// Classify a result dope. `None` means success.
    pub fn classify(dope: u32) -> Option<TransportErrorKind> {
        let code = dope & ERROR_MASK;
        let kind = match code {
            0 => return None,
            ENOT_EXISTENT => TransportErrorKind::PeerGone,
            RETIMEOUT | SETIMEOUT => TransportErrorKind::TimedOut,
            RECANCELED | SECANCELED | REABORTED | SEABORTED => TransportErrorKind::Cancelled,
            // the remaining codes alternate receive (even nibble) and send (odd nibble)
            c if (c >> 4) % 2 == 0 => TransportErrorKind::ReceiveFailed,
            _ => TransportErrorKind::SendFailed,
        };
        Some(kind)
    }
}

// ════════════════════════════════════════════════════════════
// Native ABI, generation 4
// ════════════════════════════════════════════════════════════

/// Native v4 error words: bit 0 is the phase (set for receive), bits 1-3
/// hold the reason.
pub mod native_v4 {
    use super::{TransferPhase, TransportErrorKind};

    /// Timeout
    pub const TIMEOUT: u64 = 1;
    /// Non-existing partner
    pub const NOT_EXISTENT: u64 = 2;
    /// Cancelled by another thread
    pub const CANCELED: u64 = 3;
    /// Message overflow
    pub const OVERFLOW: u64 = 4;
    /// Transfer timeout in the invoker
    pub const XFER_TIMEOUT_INVOKER: u64 = 5;
    /// Transfer timeout in the partner
    pub const XFER_TIMEOUT_PARTNER: u64 = 6;
    /// Aborted by another thread
    pub const ABORTED: u64 = 7;

    /// Phase encoded in an error word
    pub fn phase(error: u64) -> TransferPhase {
        if error & 1 == 1 {
            TransferPhase::Receive
        } else {
            TransferPhase::Send
        }
    }

    /// Classify an error word. `None` means success.
    pub fn classify(error: u64) -> Option<TransportErrorKind> {
        let kind = match (error >> 1) & 0x7 {
            0 => return None,
            TIMEOUT | XFER_TIMEOUT_INVOKER | XFER_TIMEOUT_PARTNER => TransportErrorKind::TimedOut,
            NOT_EXISTENT => TransportErrorKind::PeerGone,
            CANCELED | ABORTED => TransportErrorKind::Cancelled,
            _ => match phase(error) {
                TransferPhase::Send => TransportErrorKind::SendFailed,
                TransferPhase::Receive => TransportErrorKind::ReceiveFailed,
            },
        };
        Some(kind)
    }
}

// ════════════════════════════════════════════════════════════
// Socket emulation
// ════════════════════════════════════════════════════════════

/// Datagram socket errno values
pub mod socket {
    use super::{TransferPhase, TransportErrorKind};

    /// Connection refused (no listener at the peer address)
    pub const ECONNREFUSED: i32 = 111;
    /// Peer host unreachable
    pub const EHOSTUNREACH: i32 = 113;
    /// Socket not connected
    pub const ENOTCONN: i32 = 107;

    /// Classify the errno of a failed `sendto`/`recvfrom`. `None` means
    /// success.
    pub fn classify(errno: i32, phase: TransferPhase) -> Option<TransportErrorKind> {
        match errno {
            0 => None,
            ECONNREFUSED | EHOSTUNREACH | ENOTCONN => Some(TransportErrorKind::PeerGone),
            _ => Some(match phase {
                TransferPhase::Send => TransportErrorKind::SendFailed,
                TransferPhase::Receive => TransportErrorKind::ReceiveFailed,
            }),
        }
    }

    /// Classify a short datagram: fewer bytes than the message size is a
    /// failure of the phase that moved it.
    pub fn classify_size(transferred: isize, expected: usize, phase: TransferPhase) -> Option<TransportErrorKind> {
        if transferred >= 0 && transferred as usize >= expected {
            return None;
        }
        Some(match phase {
            TransferPhase::Send => TransportErrorKind::SendFailed,
            TransferPhase::Receive => TransportErrorKind::ReceiveFailed,
        })
    }
}

// ════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_v2_classification() {
        assert_eq!(native_v2::classify(0), None);
        assert_eq!(native_v2::classify(native_v2::ENOT_EXISTENT), Some(TransportErrorKind::PeerGone));
        assert_eq!(native_v2::classify(native_v2::RECANCELED), Some(TransportErrorKind::Cancelled));
        assert_eq!(native_v2::classify(native_v2::SETIMEOUT), Some(TransportErrorKind::TimedOut));
        assert_eq!(native_v2::classify(native_v2::REMSGCUT), Some(TransportErrorKind::ReceiveFailed));
        assert_eq!(native_v2::classify(native_v2::SEMSGCUT), Some(TransportErrorKind::SendFailed));
        // low bits carry the dope, not the error
        assert_eq!(native_v2::classify(0x0F), None);
    }

    #[test]
    fn test_native_v4_classification() {
        assert_eq!(native_v4::classify(0), None);
        assert_eq!(native_v4::classify(native_v4::CANCELED << 1 | 1), Some(TransportErrorKind::Cancelled));
        assert_eq!(native_v4::classify(native_v4::OVERFLOW << 1), Some(TransportErrorKind::SendFailed));
        assert_eq!(native_v4::classify(native_v4::OVERFLOW << 1 | 1), Some(TransportErrorKind::ReceiveFailed));
        assert_eq!(native_v4::phase(native_v4::NOT_EXISTENT << 1 | 1), TransferPhase::Receive);
    }

    #[test]
    fn test_socket_classification() {
        assert_eq!(socket::classify(0, TransferPhase::Send), None);
        assert_eq!(
            socket::classify(socket::ECONNREFUSED, TransferPhase::Send),
            Some(TransportErrorKind::PeerGone)
        );
        assert_eq!(socket::classify(4, TransferPhase::Receive), Some(TransportErrorKind::ReceiveFailed));
        assert_eq!(socket::classify_size(-1, 8, TransferPhase::Send), Some(TransportErrorKind::SendFailed));
        assert_eq!(socket::classify_size(8, 8, TransferPhase::Send), None);
    }
}
