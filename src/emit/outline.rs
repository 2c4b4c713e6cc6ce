//! Human-readable outline of generated step trees (`--dump`)

use std::fmt::Write;
use std::path::PathBuf;

use super::Emitter;
use crate::assemble::GeneratedFunction;
use crate::backend::BackendKind;
use crate::error::EmitError;
use crate::server_loop::{LoopAction, ServerLoopPlan};

/// Collects an outline in memory
#[derive(Debug, Default)]
pub struct OutlineEmitter {
    text: String,
}

impl OutlineEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Emitter for OutlineEmitter {
    fn begin(&mut self, interface: &str, backend: BackendKind) -> Result<(), EmitError> {
        writeln!(self.text, "interface {interface} ({backend})")?;
        Ok(())
    }

    fn function(&mut self, function: &GeneratedFunction) -> Result<(), EmitError> {
        writeln!(self.text)?;
        write!(self.text, "{function}")?;
        Ok(())
    }

    fn server_loop(&mut self, plan: &ServerLoopPlan) -> Result<(), EmitError> {
        writeln!(self.text)?;
        writeln!(self.text, "server loop: {}", plan.initial_wait)?;
        for arm in &plan.arms {
            let then = match arm.then {
                LoopAction::Dispatch => "dispatch",
                LoopAction::Wait => "wait",
            };
            writeln!(
                self.text,
                "  {:#x} {} => {}, then {}",
                arm.discriminator, arm.operation, arm.handler, then
            )?;
        }
        writeln!(self.text, "  _ => {:?}", plan.default_outcome)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, EmitError> {
        Ok(Vec::new())
    }
}
