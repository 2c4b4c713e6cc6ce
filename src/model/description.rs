//! Interface description documents
//!
//! The IDL front-end is not part of this crate; interfaces reach the backend
//! as TOML documents with resolved structure but unresolved type names:
//!
//! ```toml
//! [interface]
//! name = "echo"
//! base = 0x100
//!
//! [types.bytes]
//! sequence = "u8"
//! max = 4096
//!
//! [[operation]]
//! name = "echo"
//! param = [
//!     { name = "x", dir = "in", type = "u32" },
//!     { name = "payload", dir = "out", type = "bytes" },
//! ]
//! ```
//!
//! Type resolution happens per operation. An operation with a bad parameter
//! is reported and left out; the rest of the interface is still usable.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use super::{Direction, ElementKind, Interface, Operation, ParamKind, Parameter, SequenceLength};
use crate::error::{DescriptionError, OperationError, OperationErrorKind};

/// A whole description document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDescription {
    pub interface: InterfaceHeader,
    #[serde(default)]
    pub types: BTreeMap<String, TypeSpec>,
    #[serde(default, rename = "operation")]
    pub operations: Vec<OperationDescription>,
}

/// `[interface]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceHeader {
    pub name: String,
    #[serde(default)]
    pub base: u32,
}

/// Type of a parameter or named type: exactly one of `type`, `sequence` or
/// `resource` must be given
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeSpec {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Element type name of a sequence
    pub sequence: Option<String>,
    /// Constant element count of a sequence
    pub length: Option<u32>,
    /// Upper bound of a runtime-sized sequence
    pub max: Option<u32>,
    #[serde(default)]
    pub resource: bool,
}

/// `[[operation]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationDescription {
    pub name: String,
    pub id: Option<u32>,
    #[serde(default)]
    pub oneway: bool,
    #[serde(default, rename = "param")]
    pub params: Vec<ParamDescription>,
}

/// One parameter of an operation
#[derive(Debug, Clone, Deserialize)]
pub struct ParamDescription {
    pub name: String,
    pub dir: Direction,
    #[serde(flatten)]
    pub spec: TypeSpec,
}

/// Fixed-size types every description can use
const BUILTIN_FIXED: &[(&str, u32)] = &[
    ("bool", 8),
    ("char", 8),
    ("byte", 8),
    ("u8", 8),
    ("i8", 8),
    ("u16", 16),
    ("i16", 16),
    ("u32", 32),
    ("i32", 32),
    ("f32", 32),
    ("u64", 64),
    ("i64", 64),
    ("f64", 64),
];

/// Builtin name for a resource page
const BUILTIN_RESOURCE: &str = "fpage";

/// Alias chains longer than this are treated as cycles
const MAX_ALIAS_DEPTH: usize = 32;

impl InterfaceDescription {
    /// Parse a description document
    pub fn from_toml_str(input: &str) -> Result<Self, DescriptionError> {
        let description: InterfaceDescription = toml::from_str(input)?;
        let name = &description.interface.name;
        if name.trim().is_empty() {
            return Err(DescriptionError::MissingName);
        }
        // The name becomes part of every output file name
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DescriptionError::InvalidName(name.clone()));
        }
        Ok(description)
    }

    /// Read and parse a description file
    pub fn load(path: &Path) -> Result<Self, DescriptionError> {
        let input = fs::read_to_string(path).map_err(|source| DescriptionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Resolve type names and discriminators.
    ///
    /// Returns the interface made of every operation that resolved, plus one
    /// error per operation that did not.
    pub fn resolve(&self) -> (Interface, Vec<OperationError>) {
        let base = self.interface.base;
        let mut operations = Vec::new();
        let mut errors = Vec::new();
        let mut used_ids: BTreeMap<u32, String> = BTreeMap::new();

        for (index, desc) in self.operations.iter().enumerate() {
            let assigned = u32::try_from(index).ok().and_then(|index| base.checked_add(index));
            let id = match desc.id.or(assigned) {
                Some(id) => id,
                None => {
                    errors.push(OperationError::new(
                        &desc.name,
                        OperationErrorKind::DiscriminatorOverflow { base, index },
                    ));
                    continue;
                }
            };
            if let Some(other) = used_ids.get(&id) {
                errors.push(OperationError::new(
                    &desc.name,
                    OperationErrorKind::DuplicateDiscriminator {
                        id,
                        other: other.clone(),
                    },
                ));
                continue;
            }
            match self.resolve_operation(desc, id) {
                Ok(op) => {
                    debug!("resolved operation {} (id {:#x})", op.name, op.id);
                    used_ids.insert(id, op.name.clone());
                    operations.push(op);
                }
                Err(kind) => errors.push(OperationError::new(&desc.name, kind)),
            }
        }

        let interface = Interface {
            name: self.interface.name.clone(),
            base,
            operations,
        };
        (interface, errors)
    }

    fn resolve_operation(&self, desc: &OperationDescription, id: u32) -> Result<Operation, OperationErrorKind> {
        let mut seen = BTreeSet::new();
        let mut op = Operation::new(&desc.name, id);
        op.oneway = desc.oneway;

        for param in &desc.params {
            if !seen.insert(param.name.as_str()) {
                return Err(OperationErrorKind::DuplicateParameter(param.name.clone()));
            }
            let kind = self.resolve_spec(&param.name, &param.spec, 0)?;
            op.parameters.push(Parameter {
                name: param.name.clone(),
                direction: param.dir,
                kind,
            });
        }
        Ok(op)
    }

    fn resolve_spec(&self, param: &str, spec: &TypeSpec, depth: usize) -> Result<ParamKind, OperationErrorKind> {
        let invalid = |reason: &str| OperationErrorKind::InvalidParameterType {
            param: param.to_string(),
            reason: reason.to_string(),
        };

        let forms = [spec.type_name.is_some(), spec.sequence.is_some(), spec.resource]
            .iter()
            .filter(|set| **set)
            .count();
        if forms != 1 {
            return Err(invalid("exactly one of `type`, `sequence` or `resource` is required"));
        }

        if spec.resource {
            if spec.length.is_some() || spec.max.is_some() {
                return Err(invalid("a resource page has no length"));
            }
            return Ok(ParamKind::ResourcePage);
        }

        if let Some(element) = &spec.sequence {
            let size_bits = match self.resolve_name(param, element, depth)? {
                ParamKind::Fixed { size_bits } => size_bits,
                _ => return Err(invalid("sequence elements must be fixed-size")),
            };
            let length = match (spec.length, spec.max) {
                (Some(_), Some(_)) => return Err(invalid("`length` and `max` are exclusive")),
                (Some(n), None) => SequenceLength::Constant(n),
                (None, max) => SequenceLength::Runtime { max },
            };
            return Ok(ParamKind::VariableSequence(ElementKind { size_bits, length }));
        }

        if spec.length.is_some() || spec.max.is_some() {
            return Err(invalid("`length` and `max` only apply to sequences"));
        }
        match &spec.type_name {
            Some(name) => self.resolve_name(param, name, depth),
            None => Err(invalid("missing type")),
        }
    }

    fn resolve_name(&self, param: &str, name: &str, depth: usize) -> Result<ParamKind, OperationErrorKind> {
        if let Some((_, bits)) = BUILTIN_FIXED.iter().find(|(builtin, _)| *builtin == name) {
            return Ok(ParamKind::Fixed { size_bits: *bits });
        }
        if name == BUILTIN_RESOURCE {
            return Ok(ParamKind::ResourcePage);
        }
        if let Some(bits) = name.strip_prefix("bits").and_then(|n| n.parse::<u32>().ok()) {
            if bits == 0 {
                return Err(OperationErrorKind::InvalidParameterType {
                    param: param.to_string(),
                    reason: "zero-sized type".to_string(),
                });
            }
            return Ok(ParamKind::Fixed { size_bits: bits });
        }
        let spec = self
            .types
            .get(name)
            .ok_or_else(|| OperationErrorKind::UnresolvedType {
                param: param.to_string(),
                type_name: name.to_string(),
            })?;
        if depth >= MAX_ALIAS_DEPTH {
            return Err(OperationErrorKind::RecursiveType(name.to_string()));
        }
        self.resolve_spec(param, spec, depth + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageDirection;

    const ECHO: &str = r#"
[interface]
name = "echo"
base = 256

[types.bytes]
sequence = "u8"
max = 4096

[[operation]]
name = "echo"
param = [
    { name = "x", dir = "in", type = "u32" },
    { name = "payload", dir = "out", type = "bytes" },
]

[[operation]]
name = "notify"
oneway = true
param = [{ name = "code", dir = "in", type = "u16" }]
"#;

    #[test]
    fn test_resolve_echo() {
        let desc = InterfaceDescription::from_toml_str(ECHO).unwrap();
        let (iface, errors) = desc.resolve();
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(iface.name, "echo");
        assert_eq!(iface.operations.len(), 2);

        let echo = &iface.operations[0];
        assert_eq!(echo.id, 256);
        assert_eq!(echo.parameters[0].kind, ParamKind::Fixed { size_bits: 32 });
        assert_eq!(
            echo.parameters[1].kind,
            ParamKind::VariableSequence(ElementKind {
                size_bits: 8,
                length: SequenceLength::Runtime { max: Some(4096) },
            })
        );
        assert_eq!(echo.parameters_for(MessageDirection::Reply).count(), 1);

        let notify = &iface.operations[1];
        assert_eq!(notify.id, 257);
        assert!(notify.oneway);
    }

    #[test]
    fn test_unresolved_type_only_drops_its_operation() {
        let input = r#"
[interface]
name = "broken"

[[operation]]
name = "good"
param = [{ name = "a", dir = "in", type = "u32" }]

[[operation]]
name = "bad"
param = [{ name = "b", dir = "in", type = "nosuch_t" }]
"#;
        let (iface, errors) = InterfaceDescription::from_toml_str(input).unwrap().resolve();
        assert_eq!(iface.operations.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].operation, "bad");
        assert!(matches!(errors[0].kind, OperationErrorKind::UnresolvedType { .. }));
    }

    #[test]
    fn test_alias_cycle_is_reported() {
        let input = r#"
[interface]
name = "cyclic"

[types.a]
type = "b"

[types.b]
type = "a"

[[operation]]
name = "loop"
param = [{ name = "v", dir = "in", type = "a" }]
"#;
        let (_, errors) = InterfaceDescription::from_toml_str(input).unwrap().resolve();
        assert!(matches!(errors[0].kind, OperationErrorKind::RecursiveType(_)));
    }

    #[test]
    fn test_duplicate_discriminator() {
        let input = r#"
[interface]
name = "dup"

[[operation]]
name = "first"
id = 7

[[operation]]
name = "second"
id = 7
"#;
        let (iface, errors) = InterfaceDescription::from_toml_str(input).unwrap().resolve();
        assert_eq!(iface.operations.len(), 1);
        assert_eq!(
            errors[0].kind,
            OperationErrorKind::DuplicateDiscriminator {
                id: 7,
                other: "first".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_specs() {
        let input = r#"
[interface]
name = "specs"

[[operation]]
name = "both"
param = [{ name = "v", dir = "in", type = "u32", sequence = "u8" }]

[[operation]]
name = "seq_of_seq"
param = [{ name = "v", dir = "in", sequence = "bytes" }]

[[operation]]
name = "dup_param"
param = [
    { name = "v", dir = "in", type = "u8" },
    { name = "v", dir = "out", type = "u8" },
]

[[operation]]
name = "page"
param = [{ name = "p", dir = "in", resource = true }, { name = "q", dir = "out", type = "fpage" }]

[types.bytes]
sequence = "u8"
"#;
        let (iface, errors) = InterfaceDescription::from_toml_str(input).unwrap().resolve();
        assert_eq!(iface.operations.len(), 1);
        assert_eq!(iface.operations[0].parameters[1].kind, ParamKind::ResourcePage);
        let names: Vec<_> = errors.iter().map(|e| e.operation.as_str()).collect();
        assert_eq!(names, ["both", "seq_of_seq", "dup_param"]);
    }

    #[test]
    fn test_missing_name() {
        let err = InterfaceDescription::from_toml_str("[interface]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, DescriptionError::MissingName));
    }
    #[test]
    fn test_name_must_be_a_plain_file_name() {
        for name in ["../x", "a/b", "a\\\\b", ".."] {
            let input = format!("[interface]\nname = \"{name}\"\n");
            let err = InterfaceDescription::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, DescriptionError::InvalidName(_)), "{name}");
        }
    }

    #[test]
    fn test_discriminator_past_u32_only_drops_its_operation() {
        let input = r#"
[interface]
name = "edge"
base = 4294967295

[[operation]]
name = "a"

[[operation]]
name = "b"
id = 5

[[operation]]
name = "c"
"#;
        let (iface, errors) = InterfaceDescription::from_toml_str(input).unwrap().resolve();
        let ids: Vec<_> = iface.operations.iter().map(|op| (op.name.as_str(), op.id)).collect();
        assert_eq!(ids, [("a", u32::MAX), ("b", 5)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].operation, "c");
        assert_eq!(
            errors[0].kind,
            OperationErrorKind::DiscriminatorOverflow {
                base: u32::MAX,
                index: 2
            }
        );
    }
}
