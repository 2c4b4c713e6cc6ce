//! JSON hand-off files for an external source emitter
//!
//! Writes `<interface>.client.json` and `<interface>.server.json` into the
//! output directory. Both carry the interface name, the backend and the
//! functions in generation order; the server file also carries the loop
//! plan.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use serde_json::Value;

use super::Emitter;
use crate::assemble::GeneratedFunction;
use crate::backend::BackendKind;
use crate::error::EmitError;
use crate::pattern::FileTarget;
use crate::server_loop::ServerLoopPlan;

/// Hand-off format version
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct HandOff<'a> {
    format: u32,
    interface: &'a str,
    backend: BackendKind,
    functions: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    server_loop: Option<&'a Value>,
}

#[derive(Debug)]
pub struct JsonEmitter {
    out_dir: PathBuf,
    interface: String,
    backend: BackendKind,
    client: Vec<Value>,
    server: Vec<Value>,
    server_loop: Option<Value>,
}

impl JsonEmitter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            interface: String::new(),
            backend: BackendKind::NativeV4,
            client: Vec::new(),
            server: Vec::new(),
            server_loop: None,
        }
    }

    pub fn client_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.client.json", self.interface))
    }

    pub fn server_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.server.json", self.interface))
    }

    fn write(&self, path: &Path, functions: &[Value], server_loop: Option<&Value>) -> Result<(), EmitError> {
        let doc = HandOff {
            format: FORMAT_VERSION,
            interface: &self.interface,
            backend: self.backend,
            functions,
            server_loop,
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!("wrote {}", path.display());
        Ok(())
    }
}

impl Emitter for JsonEmitter {
    fn begin(&mut self, interface: &str, backend: BackendKind) -> Result<(), EmitError> {
        self.interface = interface.to_string();
        self.backend = backend;
        self.client.clear();
        self.server.clear();
        self.server_loop = None;
        Ok(())
    }

    fn function(&mut self, function: &GeneratedFunction) -> Result<(), EmitError> {
        let value = serde_json::to_value(function)?;
        match function.file {
            FileTarget::Client => self.client.push(value),
            FileTarget::Server => self.server.push(value),
        }
        Ok(())
    }

    fn server_loop(&mut self, plan: &ServerLoopPlan) -> Result<(), EmitError> {
        self.server_loop = Some(serde_json::to_value(plan)?);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, EmitError> {
        fs::create_dir_all(&self.out_dir)?;
        let client = self.client_path();
        let server = self.server_path();
        self.write(&client, &self.client, None)?;
        self.write(&server, &self.server, self.server_loop.as_ref())?;
        Ok(vec![client, server])
    }
}
