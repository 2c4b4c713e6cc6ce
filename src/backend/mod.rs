//! Backend capability descriptors
//!
//! A backend is a static value, not a subtype. [`BackendCapabilities`]
//! answers what the transport can do in one step; [`LayoutRules`] fixes how
//! messages are laid out on it. Register and slot assignment details belong
//! to the emission adapter and are not described here.

pub mod native;
pub mod socket;

use std::fmt;
use std::str::FromStr;

use idl_rt::{LengthEncoding, TransportErrorKind};
use serde::Serialize;

use crate::error::ConfigError;
use crate::layout::SortPolicy;

pub use native::{NATIVE_V2, NATIVE_V4};
pub use socket::SOCKET;

/// The closed set of targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    NativeV2,
    NativeV4,
    Socket,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::NativeV2, BackendKind::NativeV4, BackendKind::Socket];

    pub const fn as_str(&self) -> &'static str {
        match self {
            BackendKind::NativeV2 => "native-v2",
            BackendKind::NativeV4 => "native-v4",
            BackendKind::Socket => "socket",
        }
    }

    /// The descriptor for this backend
    pub fn descriptor(self) -> Backend {
        match self {
            BackendKind::NativeV2 => NATIVE_V2,
            BackendKind::NativeV4 => NATIVE_V4,
            BackendKind::Socket => SOCKET,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native-v2" | "v2" => Ok(BackendKind::NativeV2),
            "native-v4" | "v4" => Ok(BackendKind::NativeV4),
            "socket" | "sock" => Ok(BackendKind::Socket),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// A field of the transport's addressing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldRef {
    pub name: &'static str,
}

impl FieldRef {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// What a transport can and cannot do in one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BackendCapabilities {
    /// A single primitive replies to one caller and waits for anyone
    pub combined_reply_wait: bool,
    /// Resource pages can be transferred
    pub transfers_resource_pages: bool,
    /// The message buffer must be cleared between a send and a receive
    pub requires_buffer_clear_between_phases: bool,
    /// Field to reset so a receive accepts any sender, if the transport
    /// keeps one
    pub wildcard_sender_field: Option<FieldRef>,
}

/// Where resource-page slots sit in a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePlacement {
    /// No resource pages on this transport
    Unsupported,
    /// Slots open the message and are closed by an all-zero terminator slot
    Leading { slot_bytes: u32, terminator_bytes: u32 },
    /// Slots follow the fixed region
    AfterFixed { slot_bytes: u32 },
}

/// Layout conventions of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LayoutRules {
    /// Wire word width; fixed parameters occupy whole words
    pub word_bytes: u32,
    pub resource_placement: ResourcePlacement,
    /// How tail sequence lengths travel
    pub tail_length: LengthEncoding,
    /// Resource pages allowed per message direction
    pub max_resource_pages: usize,
    /// Largest message the primitive accepts
    pub max_message_bytes: u32,
    /// Fixed-region ordering used unless configuration overrides it
    pub sort_policy: SortPolicy,
}

/// A complete backend descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Backend {
    pub kind: BackendKind,
    pub capabilities: BackendCapabilities,
    pub layout: LayoutRules,
    /// Error kinds the backend's primitives can report
    pub reported_errors: &'static [TransportErrorKind],
}

impl Backend {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Can this backend report `kind`?
    pub fn reports(&self, kind: TransportErrorKind) -> bool {
        self.reported_errors.contains(&kind)
    }

    /// Same backend with a different fixed-region ordering
    pub fn with_sort_policy(mut self, policy: SortPolicy) -> Self {
        self.layout.sort_policy = policy;
        self
    }
}
