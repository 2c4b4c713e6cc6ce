//! Abstract steps of a generated function
//!
//! A step tree is an ordered list of steps. `CheckError` steps hold one arm
//! per transport error kind, and each arm holds its own cleanup steps. Tree
//! positions are preorder positions: a check, then the cleanup steps of its
//! arms in arm order, then the next top-level step.
//!
//! Steps are generic over the transfer description: the call-pattern
//! expansion produces `StepTree<WireLayout>`, the assembler maps that into
//! `StepTree<ResolvedTransfer>` once every offset is threaded.

use std::fmt;

use idl_rt::TransportErrorKind;
use serde::Serialize;

use crate::backend::FieldRef;

/// Which half of the exchange a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Send,
    Receive,
    /// A single primitive that sends and receives
    Combined,
}

/// Peer a message is sent to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The server the client is bound to
    Server,
    /// Whoever sent the request being answered
    Caller,
    /// A reply port held in a named variable
    Named(String),
}

/// Peer a message is received from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Accept a message from any sender, resetting `reset` first if the
    /// transport keeps the last peer's address there
    Wildcard { reset: Option<FieldRef> },
}

impl Source {
    pub fn wildcard(reset: Option<FieldRef>) -> Self {
        Source::Wildcard { reset }
    }
}

/// One transport primitive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportOp {
    /// Send a request and block for its reply
    Call,
    Send { to: Target },
    Receive { from: Source },
    /// Answer one peer and wait for the next message in one primitive
    ReplyAndReceive { reply_to: Target, from: Source },
}

impl TransportOp {
    pub fn sends(&self) -> bool {
        !matches!(self, TransportOp::Receive { .. })
    }

    pub fn receives(&self) -> bool {
        !matches!(self, TransportOp::Send { .. })
    }
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOp::Call => write!(f, "call"),
            TransportOp::Send { to } => write!(f, "send to {}", target_name(to)),
            TransportOp::Receive { from } => write!(f, "receive from {}", source_name(from)),
            TransportOp::ReplyAndReceive { reply_to, from } => {
                write!(f, "reply to {} and receive from {}", target_name(reply_to), source_name(from))
            }
        }
    }
}

fn target_name(target: &Target) -> &str {
    match target {
        Target::Server => "server",
        Target::Caller => "caller",
        Target::Named(name) => name,
    }
}

fn source_name(source: &Source) -> String {
    match source {
        Source::Wildcard { reset: None } => "any".to_string(),
        Source::Wildcard { reset: Some(field) } => format!("any (reset {})", field.name),
    }
}

/// How much of the message buffer a `ClearBuffer` zeroes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearExtent {
    Whole,
    /// The bytes of the message just sent
    Sent,
}

/// Side effect performed on an error path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupAction {
    /// Drop the message that could not be delivered
    DiscardMessage,
    /// Put the runtime offset variable back to the start of the tail
    ResetCursor,
    /// Call the configured error function with the error kind
    InvokeErrorHook(String),
}

/// What happens after an error arm's cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Return the error kind to the caller
    Propagate,
    /// Go back to waiting for the next request
    ContinueLoop,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorArm<T> {
    pub kind: TransportErrorKind,
    pub cleanup: Vec<Step<T>>,
    pub outcome: Outcome,
}

/// Branch on the error kind of the preceding invoke
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorCheck<T> {
    pub arms: Vec<ErrorArm<T>>,
}

impl<T> ErrorCheck<T> {
    pub fn arm(&self, kind: TransportErrorKind) -> Option<&ErrorArm<T>> {
        self.arms.iter().find(|arm| arm.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind<T> {
    Marshal(T),
    Invoke(TransportOp),
    Unmarshal(T),
    ClearBuffer(ClearExtent),
    CheckError(ErrorCheck<T>),
    Cleanup(CleanupAction),
}

impl<T> StepKind<T> {
    /// Variant name, as used in outlines
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Marshal(_) => "Marshal",
            StepKind::Invoke(_) => "Invoke",
            StepKind::Unmarshal(_) => "Unmarshal",
            StepKind::ClearBuffer(_) => "ClearBuffer",
            StepKind::CheckError(_) => "CheckError",
            StepKind::Cleanup(_) => "Cleanup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Step<T> {
    pub phase: Phase,
    pub kind: StepKind<T>,
}

impl<T> Step<T> {
    pub fn new(phase: Phase, kind: StepKind<T>) -> Self {
        Self { phase, kind }
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self.kind, StepKind::Invoke(_))
    }

    pub fn is_check(&self) -> bool {
        matches!(self.kind, StepKind::CheckError(_))
    }

    /// Rebuild the step with every transfer mapped through `f`
    pub fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Step<U>, E> {
        let kind = match self.kind {
            StepKind::Marshal(t) => StepKind::Marshal(f(t)?),
            StepKind::Unmarshal(t) => StepKind::Unmarshal(f(t)?),
            StepKind::Invoke(op) => StepKind::Invoke(op),
            StepKind::ClearBuffer(extent) => StepKind::ClearBuffer(extent),
            StepKind::Cleanup(action) => StepKind::Cleanup(action),
            StepKind::CheckError(check) => {
                let mut arms = Vec::with_capacity(check.arms.len());
                for arm in check.arms {
                    let cleanup = arm
                        .cleanup
                        .into_iter()
                        .map(|step| step.try_map(f))
                        .collect::<Result<Vec<_>, E>>()?;
                    arms.push(ErrorArm {
                        kind: arm.kind,
                        cleanup,
                        outcome: arm.outcome,
                    });
                }
                StepKind::CheckError(ErrorCheck { arms })
            }
        };
        Ok(Step {
            phase: self.phase,
            kind,
        })
    }
}

/// An ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StepTree<T> {
    pub steps: Vec<Step<T>>,
}

impl<T> Default for StepTree<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T> StepTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, phase: Phase, kind: StepKind<T>) {
        self.steps.push(Step::new(phase, kind));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every step with its tree position, cleanup steps included
    pub fn preorder(&self) -> Vec<(usize, &Step<T>)> {
        fn walk<'a, T>(steps: &'a [Step<T>], out: &mut Vec<(usize, &'a Step<T>)>) {
            for step in steps {
                out.push((out.len(), step));
                if let StepKind::CheckError(check) = &step.kind {
                    for arm in &check.arms {
                        walk(&arm.cleanup, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.steps, &mut out);
        out
    }

    /// Names of the top-level steps in order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.kind.name()).collect()
    }

    /// Number of steps of the given kind, anywhere in the tree
    pub fn count(&self, name: &str) -> usize {
        self.preorder().iter().filter(|(_, s)| s.kind.name() == name).count()
    }

    pub fn try_map<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<StepTree<U>, E> {
        let steps = self
            .steps
            .into_iter()
            .map(|step| step.try_map(&mut f))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(StepTree { steps })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Outline
// ═══════════════════════════════════════════════════════════════════════════

/// Short description of a transfer for outlines
pub trait TransferLabel {
    fn label(&self) -> String;
}

impl<T: TransferLabel> fmt::Display for StepTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write_step(f, step, 1)?;
        }
        Ok(())
    }
}

fn write_step<T: TransferLabel>(f: &mut fmt::Formatter<'_>, step: &Step<T>, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    let phase = match step.phase {
        Phase::Send => "send",
        Phase::Receive => "recv",
        Phase::Combined => "both",
    };
    match &step.kind {
        StepKind::Marshal(t) => writeln!(f, "{indent}[{phase}] Marshal({})", t.label()),
        StepKind::Unmarshal(t) => writeln!(f, "{indent}[{phase}] Unmarshal({})", t.label()),
        StepKind::Invoke(op) => writeln!(f, "{indent}[{phase}] Invoke({op})"),
        StepKind::ClearBuffer(ClearExtent::Whole) => writeln!(f, "{indent}[{phase}] ClearBuffer(whole)"),
        StepKind::ClearBuffer(ClearExtent::Sent) => writeln!(f, "{indent}[{phase}] ClearBuffer(sent)"),
        StepKind::Cleanup(action) => match action {
            CleanupAction::DiscardMessage => writeln!(f, "{indent}Cleanup(discard message)"),
            CleanupAction::ResetCursor => writeln!(f, "{indent}Cleanup(reset cursor)"),
            CleanupAction::InvokeErrorHook(hook) => writeln!(f, "{indent}Cleanup(call {hook})"),
        },
        StepKind::CheckError(check) => {
            writeln!(f, "{indent}[{phase}] CheckError")?;
            for arm in &check.arms {
                let outcome = match arm.outcome {
                    Outcome::Propagate => "propagate",
                    Outcome::ContinueLoop => "continue loop",
                };
                writeln!(f, "{indent}  {} => {outcome}", arm.kind)?;
                for cleanup in &arm.cleanup {
                    write_step(f, cleanup, depth + 2)?;
                }
            }
            Ok(())
        }
    }
}
