//! Test-harness manifest
//!
//! The harness generator builds a standalone test server and test client
//! from the generated functions without looking inside them. It only needs
//! to know which function to call per operation and which function the
//! server loop answers with; this module writes exactly that to
//! `<interface>.harness.json`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::backend::BackendKind;
use crate::driver::InterfaceOutput;
use crate::error::EmitError;
use crate::pattern::CallPatternVariant;

/// One operation as the harness sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessEntry {
    pub operation: String,
    pub discriminator: u32,
    /// Client function
    pub call: String,
    /// Server function answering the request; `None` for oneway operations
    pub reply_and_wait: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessManifest {
    pub interface: String,
    pub backend: BackendKind,
    pub entries: Vec<HarnessEntry>,
    pub buffer_capacity: Option<u32>,
}

/// Build the manifest for every operation with a client function
pub fn manifest(output: &InterfaceOutput) -> HarnessManifest {
    let entries = output
        .client
        .iter()
        .filter(|f| f.variant == CallPatternVariant::Call)
        .map(|call| HarnessEntry {
            operation: call.operation.clone(),
            discriminator: call.discriminator,
            call: call.name.clone(),
            reply_and_wait: output
                .server
                .iter()
                .find(|f| {
                    f.operation == call.operation && matches!(f.variant, CallPatternVariant::ReplyToThenWaitAny(_))
                })
                .map(|f| f.name.clone()),
        })
        .collect();

    HarnessManifest {
        interface: output.interface.clone(),
        backend: output.backend,
        entries,
        buffer_capacity: output.server_loop.buffer_capacity,
    }
}

/// Write `<interface>.harness.json` into `out_dir`
pub fn write_manifest(output: &InterfaceOutput, out_dir: &Path) -> Result<PathBuf, EmitError> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{}.harness.json", output.interface));
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, &manifest(output))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::generate_interface;
    use crate::model::{Direction, Interface, Operation, Parameter};

    fn output() -> InterfaceOutput {
        let interface = Interface {
            name: "log".to_string(),
            base: 1,
            operations: vec![
                Operation::new("write", 1).with_param(Parameter::fixed("level", Direction::In, 8)),
                Operation::new("flush", 2).oneway(),
            ],
        };
        generate_interface(&interface, &Config::default()).unwrap()
    }

    #[test]
    fn test_manifest_entries() {
        let manifest = manifest(&output());
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].call, "log_write_call");
        assert_eq!(
            manifest.entries[0].reply_and_wait.as_deref(),
            Some("log_write_reply_and_wait")
        );
        assert_eq!(manifest.entries[1].reply_and_wait, None);
    }

    #[test]
    fn test_write_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(&output(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("log.harness.json"));
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["interface"], "log");
        assert_eq!(json["backend"], "native-v4");
        assert_eq!(json["entries"][1]["operation"], "flush");
    }
}
