//! Server loop and dispatch plan
//!
//! A server thread waits for any request, dispatches on the header
//! discriminator and answers with the operation's reply-and-wait function,
//! which leaves the next request in the buffer. Oneway operations have no
//! reply, so their arm only unmarshals and the loop waits again. Unknown
//! discriminators are dropped and the loop waits again.

use serde::Serialize;

use crate::assemble::GeneratedFunction;
use crate::backend::{Backend, BackendKind};
use crate::pattern::CallPatternVariant;
use crate::step::{Outcome, Source, TransportOp};

/// What the loop does after an arm returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAction {
    /// The next request is already in the buffer
    Dispatch,
    /// Block for the next request
    Wait,
}

/// One `match` arm of the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchArm {
    pub discriminator: u32,
    pub operation: String,
    /// Function that unmarshals the request and, for two-way operations,
    /// replies and waits
    pub handler: String,
    pub then: LoopAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerLoopPlan {
    pub interface: String,
    pub backend: BackendKind,
    /// Wait performed on entry and whenever an arm yields `Wait`
    pub initial_wait: TransportOp,
    pub arms: Vec<DispatchArm>,
    /// Outcome for a discriminator no arm matches
    pub default_outcome: Outcome,
    /// Largest buffer any handler needs; `None` when unbounded
    pub buffer_capacity: Option<u32>,
}

impl ServerLoopPlan {
    pub fn arm(&self, discriminator: u32) -> Option<&DispatchArm> {
        self.arms.iter().find(|arm| arm.discriminator == discriminator)
    }
}

/// Plan the server loop over the generated server functions.
///
/// Operations whose handler failed to generate get no arm, so their
/// requests fall through to the default arm.
pub fn plan(interface: &str, backend: &Backend, server: &[GeneratedFunction]) -> ServerLoopPlan {
    let mut arms: Vec<DispatchArm> = Vec::new();

    for func in server {
        let then = match func.variant {
            CallPatternVariant::ReplyToThenWaitAny(_) => LoopAction::Dispatch,
            _ => continue,
        };
        arms.push(DispatchArm {
            discriminator: func.discriminator,
            operation: func.operation.clone(),
            handler: func.name.clone(),
            then,
        });
    }

    // Oneway operations only have a wait function
    for func in server {
        if func.variant != CallPatternVariant::WaitAny || arms.iter().any(|a| a.operation == func.operation) {
            continue;
        }
        let two_way = server.iter().any(|other| {
            other.operation == func.operation && matches!(other.variant, CallPatternVariant::ReplyTo(_))
        });
        if two_way {
            continue;
        }
        arms.push(DispatchArm {
            discriminator: func.discriminator,
            operation: func.operation.clone(),
            handler: func.name.clone(),
            then: LoopAction::Wait,
        });
    }
    arms.sort_by_key(|arm| arm.discriminator);

    let buffer_capacity = server
        .iter()
        .map(|f| f.buffer_capacity)
        .try_fold(0, |acc, cap| cap.map(|c| acc.max(c)));

    ServerLoopPlan {
        interface: interface.to_string(),
        backend: backend.kind,
        initial_wait: TransportOp::Receive {
            from: Source::wildcard(backend.capabilities.wildcard_sender_field),
        },
        arms,
        default_outcome: Outcome::ContinueLoop,
        buffer_capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{assemble, AssembleOptions};
    use crate::backend::{NATIVE_V4, SOCKET};
    use crate::model::{Direction, Operation, Parameter};
    use crate::naming::DefaultNaming;
    use crate::step::Target;

    fn server_functions(backend: &Backend, ops: &[Operation]) -> Vec<GeneratedFunction> {
        let options = AssembleOptions {
            interface: "svc",
            naming: &DefaultNaming,
            error_hook: None,
        };
        let mut out = Vec::new();
        for op in ops {
            let mut variants = vec![CallPatternVariant::WaitAny];
            if !op.oneway {
                variants.push(CallPatternVariant::ReplyTo(Target::Caller));
                variants.push(CallPatternVariant::ReplyToThenWaitAny(Target::Caller));
            }
            for variant in variants {
                out.push(assemble(op, &variant, backend, &options).unwrap());
            }
        }
        out
    }

    fn ops() -> Vec<Operation> {
        vec![
            Operation::new("get", 201).with_param(Parameter::fixed("value", Direction::Out, 32)),
            Operation::new("notify", 200)
                .oneway()
                .with_param(Parameter::fixed("event", Direction::In, 32)),
        ]
    }

    #[test]
    fn test_arms_by_discriminator() {
        let server = server_functions(&NATIVE_V4, &ops());
        let plan = plan("svc", &NATIVE_V4, &server);
        assert_eq!(plan.arms.len(), 2);
        assert_eq!(plan.arms[0].discriminator, 200);

        let notify = plan.arm(200).unwrap();
        assert_eq!(notify.handler, "svc_notify_wait_any");
        assert_eq!(notify.then, LoopAction::Wait);

        let get = plan.arm(201).unwrap();
        assert_eq!(get.handler, "svc_get_reply_and_wait");
        assert_eq!(get.then, LoopAction::Dispatch);

        assert_eq!(plan.default_outcome, Outcome::ContinueLoop);
        assert_eq!(plan.buffer_capacity, Some(16));
    }

    #[test]
    fn test_socket_wait_resets_sender() {
        let server = server_functions(&SOCKET, &ops());
        let plan = plan("svc", &SOCKET, &server);
        assert_eq!(
            plan.initial_wait,
            TransportOp::Receive {
                from: Source::wildcard(SOCKET.capabilities.wildcard_sender_field)
            }
        );
    }

    #[test]
    fn test_failed_handlers_get_no_arm() {
        let server = server_functions(&NATIVE_V4, &ops());
        let without_reply_and_wait: Vec<_> = server
            .into_iter()
            .filter(|f| !matches!(f.variant, CallPatternVariant::ReplyToThenWaitAny(_)))
            .collect();
        let plan = plan("svc", &NATIVE_V4, &without_reply_and_wait);
        assert!(plan.arm(201).is_none());
        assert!(plan.arm(200).is_some());
    }
}
