//! Batch driver
//!
//! Generates every function of an interface. A per-operation error drops
//! that operation and generation continues with the next one; an internal
//! invariant violation aborts the whole interface.

use log::{debug, error, info};

use crate::assemble::{assemble, AssembleOptions, GeneratedFunction};
use crate::backend::BackendKind;
use crate::config::Config;
use crate::error::{GenerateError, IdlError, OperationError};
use crate::model::description::InterfaceDescription;
use crate::model::{Interface, Operation};
use crate::naming::{DefaultNaming, Naming};
use crate::pattern::{CallPatternVariant, FileTarget};
use crate::server_loop::{self, ServerLoopPlan};
use crate::step::Target;

/// Everything generated for one interface
#[derive(Debug, Clone)]
pub struct InterfaceOutput {
    pub interface: String,
    pub backend: BackendKind,
    pub client: Vec<GeneratedFunction>,
    pub server: Vec<GeneratedFunction>,
    pub server_loop: ServerLoopPlan,
    /// Operations that were reported and left out
    pub errors: Vec<OperationError>,
}

impl InterfaceOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Look up a generated function by name
    pub fn function(&self, name: &str) -> Option<&GeneratedFunction> {
        self.client.iter().chain(&self.server).find(|f| f.name == name)
    }
}

/// Variants generated for `operation`
pub fn variants_for(operation: &Operation) -> Vec<CallPatternVariant> {
    let mut variants = vec![CallPatternVariant::Call, CallPatternVariant::WaitAny];
    if !operation.oneway {
        variants.push(CallPatternVariant::ReplyTo(Target::Caller));
        variants.push(CallPatternVariant::ReplyToThenWaitAny(Target::Caller));
    }
    variants
}

/// Generate `interface` with the default naming.
pub fn generate_interface(interface: &Interface, config: &Config) -> Result<InterfaceOutput, IdlError> {
    generate_with(interface, config, &DefaultNaming)
}

/// Generate `interface` with a custom naming service.
pub fn generate_with(
    interface: &Interface,
    config: &Config,
    naming: &dyn Naming,
) -> Result<InterfaceOutput, IdlError> {
    let backend = config.backend_descriptor();
    let options = AssembleOptions {
        interface: &interface.name,
        naming,
        error_hook: config.error_hook.as_deref(),
    };
    info!(
        "generating {} operation(s) of '{}' for {}",
        interface.operations.len(),
        interface.name,
        backend.name()
    );

    let mut client = Vec::new();
    let mut server = Vec::new();
    let mut errors = Vec::new();

    'operations: for operation in &interface.operations {
        let mut generated = Vec::new();
        for variant in variants_for(operation) {
            match assemble(operation, &variant, &backend, &options) {
                Ok(func) => generated.push(func),
                Err(GenerateError::Operation(kind)) => {
                    let err = OperationError::new(&operation.name, kind);
                    error!("{}", err);
                    errors.push(err);
                    continue 'operations;
                }
                Err(GenerateError::Internal(violation)) => {
                    return Err(IdlError::Internal {
                        operation: operation.name.clone(),
                        violation,
                    });
                }
            }
        }
        debug!("{}: {} function(s)", operation.name, generated.len());
        for func in generated {
            match func.file {
                FileTarget::Client => client.push(func),
                FileTarget::Server => server.push(func),
            }
        }
    }

    let server_loop = server_loop::plan(&interface.name, &backend, &server);
    Ok(InterfaceOutput {
        interface: interface.name.clone(),
        backend: backend.kind,
        client,
        server,
        server_loop,
        errors,
    })
}

/// Resolve `description` and generate it. Operations the description could
/// not resolve are reported first, in declaration order.
pub fn generate_description(
    description: &InterfaceDescription,
    config: &Config,
) -> Result<InterfaceOutput, IdlError> {
    let (interface, mut errors) = description.resolve();
    for err in &errors {
        error!("{}", err);
    }
    let mut output = generate_interface(&interface, config)?;
    errors.append(&mut output.errors);
    output.errors = errors;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationErrorKind;
    use crate::model::{Direction, Parameter, SequenceLength};

    fn interface() -> Interface {
        Interface {
            name: "pager".to_string(),
            base: 400,
            operations: vec![
                Operation::new("read", 400)
                    .with_param(Parameter::fixed("offset", Direction::In, 64))
                    .with_param(Parameter::sequence(
                        "data",
                        Direction::Out,
                        8,
                        SequenceLength::Runtime { max: Some(512) },
                    )),
                Operation::new("map", 401).with_param(Parameter::resource("page", Direction::Out)),
                Operation::new("flush", 402).oneway(),
            ],
        }
    }

    #[test]
    fn test_native_generates_everything() {
        let output = generate_interface(&interface(), &Config::default()).unwrap();
        assert!(!output.has_errors());
        assert_eq!(output.client.len(), 3);
        // wait_any for all, reply and reply_and_wait for the two-way ones
        assert_eq!(output.server.len(), 3 + 2 + 2);
        assert!(output.function("pager_flush_call").is_some());
        assert!(output.function("pager_flush_reply").is_none());
        assert_eq!(output.server_loop.arms.len(), 3);
    }

    #[test]
    fn test_socket_skips_only_the_broken_operation() {
        let config = Config {
            backend: BackendKind::Socket,
            ..Config::default()
        };
        let output = generate_interface(&interface(), &config).unwrap();
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].operation, "map");
        assert!(matches!(
            output.errors[0].kind,
            OperationErrorKind::UnsupportedParameterKind { .. }
        ));
        assert!(output.client.iter().all(|f| f.operation != "map"));
        assert!(output.server.iter().all(|f| f.operation != "map"));
        assert_eq!(output.client.len(), 2);
        assert!(output.server_loop.arm(401).is_none());
    }

    #[test]
    fn test_error_hook_reaches_functions() {
        let config = Config {
            error_hook: Some("ipc_failed".to_string()),
            ..Config::default()
        };
        let output = generate_interface(&interface(), &config).unwrap();
        let func = output.function("pager_read_call").unwrap();
        assert!(func.to_string().contains("Cleanup(call ipc_failed)"));
    }

    #[test]
    fn test_description_errors_are_merged() {
        let description = InterfaceDescription::from_toml_str(
            r#"
            [interface]
            name = "mixed"

            [[operation]]
            name = "good"
            param = [{ name = "x", dir = "in", type = "u32" }]

            [[operation]]
            name = "bad"
            param = [{ name = "y", dir = "in", type = "nosuch" }]
            "#,
        )
        .unwrap();
        let output = generate_description(&description, &Config::default()).unwrap();
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].operation, "bad");
        assert!(output.function("mixed_good_call").is_some());
    }
}
