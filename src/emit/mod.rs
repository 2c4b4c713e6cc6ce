//! Emission adapters
//!
//! The core decides what to emit and in which order; an [`Emitter`] turns
//! that into files. Client functions are handed over first, then server
//! functions, then the server loop plan.

pub mod json;
pub mod outline;

use std::path::PathBuf;

use crate::assemble::GeneratedFunction;
use crate::backend::BackendKind;
use crate::driver::InterfaceOutput;
use crate::error::EmitError;
use crate::server_loop::ServerLoopPlan;

pub use json::JsonEmitter;
pub use outline::OutlineEmitter;

/// Receives the generated functions of one interface
pub trait Emitter {
    fn begin(&mut self, interface: &str, backend: BackendKind) -> Result<(), EmitError>;

    /// Called once per function; `function.file` says where it belongs
    fn function(&mut self, function: &GeneratedFunction) -> Result<(), EmitError>;

    fn server_loop(&mut self, plan: &ServerLoopPlan) -> Result<(), EmitError>;

    /// Flush everything; returns the files written
    fn finish(&mut self) -> Result<Vec<PathBuf>, EmitError>;
}

/// Feed `output` through `emitter`
pub fn emit(output: &InterfaceOutput, emitter: &mut dyn Emitter) -> Result<Vec<PathBuf>, EmitError> {
    emitter.begin(&output.interface, output.backend)?;
    for function in output.client.iter().chain(&output.server) {
        emitter.function(function)?;
    }
    emitter.server_loop(&output.server_loop)?;
    emitter.finish()
}
