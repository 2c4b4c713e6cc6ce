//! idlgen: communication-function backend of an IDL compiler
//!
//! Given an operation's parameters, idlgen decides how they are laid out on
//! the wire, which transport steps implement each call pattern, and in which
//! order errors are checked, for three incompatible targets: two generations
//! of a native kernel IPC ABI and a datagram socket emulation.
//!
//! Pipeline: [`model`] → [`layout`] (per direction) → [`pattern::expand`] →
//! [`assemble`] → [`emit`].
//!
//! ```
//! use idlgen::{driver, Config, Direction, Interface, Operation, Parameter, SequenceLength};
//!
//! let echo = Operation::new("echo", 1)
//!     .with_param(Parameter::fixed("x", Direction::In, 32))
//!     .with_param(Parameter::sequence("payload", Direction::Out, 8, SequenceLength::Runtime { max: None }));
//! let interface = Interface { name: "demo".into(), base: 1, operations: vec![echo] };
//!
//! let output = driver::generate_interface(&interface, &Config::default()).unwrap();
//! assert!(output.function("demo_echo_reply_and_wait").is_some());
//! ```

#![allow(clippy::large_enum_variant)]

pub mod assemble;
pub mod backend;
pub mod config;
pub mod driver;
pub mod emit;
pub mod error;
pub mod harness;
pub mod layout;
pub mod model;
pub mod naming;
pub mod pattern;
pub mod server_loop;
pub mod step;

// Re-export main types
pub use assemble::{assemble, AssembleOptions, GeneratedFunction, ResolvedTransfer};
pub use backend::{Backend, BackendCapabilities, BackendKind, NATIVE_V2, NATIVE_V4, SOCKET};
pub use config::{Config, ConfigOverrides};
pub use driver::{generate_interface, InterfaceOutput};
pub use error::*;
pub use layout::{layout, OffsetCursor, SortPolicy, WireLayout};
pub use model::description::InterfaceDescription;
pub use model::{Direction, Interface, MessageDirection, Operation, ParamKind, Parameter, SequenceLength};
pub use naming::{DefaultNaming, Naming};
pub use pattern::{expand, CallPatternVariant};
pub use step::{Step, StepKind, StepTree};
