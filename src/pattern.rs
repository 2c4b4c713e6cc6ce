//! Call-pattern variants and their expansion into abstract steps
//!
//! The variant set is closed. Backend differences enter only through
//! [`BackendCapabilities`](crate::backend::BackendCapabilities): a backend
//! with a combined reply-and-receive primitive gets one invoke for
//! `ReplyToThenWaitAny`, a backend without one gets a send, a buffer clear
//! and a wildcard receive, with the send's error check strictly before
//! anything of the receive phase.

use std::fmt;

use idl_rt::TransportErrorKind;
use serde::Serialize;

use crate::backend::Backend;
use crate::error::{GenerateError, OperationErrorKind};
use crate::layout::WireLayout;
use crate::model::MessageDirection;
use crate::step::{
    CleanupAction, ClearExtent, ErrorArm, ErrorCheck, Outcome, Phase, Source, Step, StepKind, StepTree, Target,
    TransportOp,
};

/// The four request/response shapes a generated function implements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPatternVariant {
    /// Client: send a request, wait for its reply
    Call,
    /// Server: wait for a request from anyone
    WaitAny,
    /// Server: send a reply, do not wait
    ReplyTo(Target),
    /// Server: send a reply, then wait for the next request from anyone
    ReplyToThenWaitAny(Target),
}

/// Which generated file a function belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTarget {
    Client,
    Server,
}

impl CallPatternVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPatternVariant::Call => "call",
            CallPatternVariant::WaitAny => "wait_any",
            CallPatternVariant::ReplyTo(_) => "reply",
            CallPatternVariant::ReplyToThenWaitAny(_) => "reply_and_wait",
        }
    }

    pub fn file(&self) -> FileTarget {
        match self {
            CallPatternVariant::Call => FileTarget::Client,
            _ => FileTarget::Server,
        }
    }

    pub fn is_server_side(&self) -> bool {
        self.file() == FileTarget::Server
    }

    /// Does the variant send a reply message?
    pub fn sends_reply(&self) -> bool {
        matches!(
            self,
            CallPatternVariant::ReplyTo(_) | CallPatternVariant::ReplyToThenWaitAny(_)
        )
    }

    /// Message the function sends, if any
    pub fn send_direction(&self) -> Option<MessageDirection> {
        match self {
            CallPatternVariant::Call => Some(MessageDirection::Request),
            CallPatternVariant::WaitAny => None,
            CallPatternVariant::ReplyTo(_) | CallPatternVariant::ReplyToThenWaitAny(_) => Some(MessageDirection::Reply),
        }
    }

    /// Message the function receives, if any (two-way operations only)
    pub fn receive_direction(&self) -> Option<MessageDirection> {
        match self {
            CallPatternVariant::Call => Some(MessageDirection::Reply),
            CallPatternVariant::WaitAny | CallPatternVariant::ReplyToThenWaitAny(_) => Some(MessageDirection::Request),
            CallPatternVariant::ReplyTo(_) => None,
        }
    }
}

impl fmt::Display for CallPatternVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expand `variant` into steps over the given layouts.
///
/// `send` and `recv` are the layouts of the messages the variant sends and
/// receives. `Call` with no `recv` is a oneway call. A reply variant
/// without a `send` layout has no reply to send.
pub fn expand(
    variant: &CallPatternVariant,
    send: Option<WireLayout>,
    recv: Option<WireLayout>,
    backend: &Backend,
    error_hook: Option<&str>,
) -> Result<StepTree<WireLayout>, GenerateError> {
    let arms = ArmBuilder {
        backend,
        error_hook,
        server: variant.is_server_side(),
        sent_variable: send.as_ref().is_some_and(WireLayout::is_variable_sized),
    };
    let wildcard = Source::wildcard(backend.capabilities.wildcard_sender_field);
    let mut tree = StepTree::new();

    match variant {
        CallPatternVariant::Call => {
            let send = send.ok_or_else(|| no_reply(variant))?;
            tree.push(Phase::Send, StepKind::Marshal(send));
            match recv {
                Some(recv) => {
                    let op = TransportOp::Call;
                    let check = arms.check(&op, Phase::Combined);
                    tree.push(Phase::Combined, StepKind::Invoke(op));
                    tree.push(Phase::Combined, StepKind::CheckError(check));
                    tree.push(Phase::Receive, StepKind::Unmarshal(recv));
                }
                None => {
                    let op = TransportOp::Send { to: Target::Server };
                    let check = arms.check(&op, Phase::Send);
                    tree.push(Phase::Send, StepKind::Invoke(op));
                    tree.push(Phase::Send, StepKind::CheckError(check));
                }
            }
        }
        CallPatternVariant::WaitAny => {
            let recv = recv.ok_or_else(|| no_reply(variant))?;
            let op = TransportOp::Receive { from: wildcard };
            let check = arms.check(&op, Phase::Receive);
            tree.push(Phase::Receive, StepKind::Invoke(op));
            tree.push(Phase::Receive, StepKind::CheckError(check));
            tree.push(Phase::Receive, StepKind::Unmarshal(recv));
        }
        CallPatternVariant::ReplyTo(target) => {
            let send = send.ok_or_else(|| no_reply(variant))?;
            let op = TransportOp::Send { to: target.clone() };
            let check = arms.check(&op, Phase::Send);
            tree.push(Phase::Send, StepKind::Marshal(send));
            tree.push(Phase::Send, StepKind::Invoke(op));
            tree.push(Phase::Send, StepKind::CheckError(check));
        }
        CallPatternVariant::ReplyToThenWaitAny(target) => {
            let send = send.ok_or_else(|| no_reply(variant))?;
            let recv = recv.ok_or_else(|| no_reply(variant))?;
            let sent_variable = send.is_variable_sized();
            tree.push(Phase::Send, StepKind::Marshal(send));

            if backend.capabilities.combined_reply_wait {
                let op = TransportOp::ReplyAndReceive {
                    reply_to: target.clone(),
                    from: wildcard,
                };
                let check = arms.check(&op, Phase::Combined);
                tree.push(Phase::Combined, StepKind::Invoke(op));
                tree.push(Phase::Combined, StepKind::CheckError(check));
            } else {
                let reply = TransportOp::Send { to: target.clone() };
                let check = arms.check(&reply, Phase::Send);
                tree.push(Phase::Send, StepKind::Invoke(reply));
                tree.push(Phase::Send, StepKind::CheckError(check));

                if backend.capabilities.requires_buffer_clear_between_phases {
                    let extent = if sent_variable { ClearExtent::Sent } else { ClearExtent::Whole };
                    tree.push(Phase::Receive, StepKind::ClearBuffer(extent));
                }

                let receive = TransportOp::Receive { from: wildcard };
                let check = arms.check(&receive, Phase::Receive);
                tree.push(Phase::Receive, StepKind::Invoke(receive));
                tree.push(Phase::Receive, StepKind::CheckError(check));
            }
            tree.push(Phase::Receive, StepKind::Unmarshal(recv));
        }
    }

    Ok(tree)
}

fn no_reply(variant: &CallPatternVariant) -> GenerateError {
    OperationErrorKind::NoReplyForOneway(variant.as_str().to_string()).into()
}

/// Builds the error arms of one check
struct ArmBuilder<'a> {
    backend: &'a Backend,
    error_hook: Option<&'a str>,
    server: bool,
    sent_variable: bool,
}

impl ArmBuilder<'_> {
    /// One arm per error kind the backend reports for `op`
    fn check(&self, op: &TransportOp, phase: Phase) -> ErrorCheck<WireLayout> {
        let arms = TransportErrorKind::ALL
            .into_iter()
            .filter(|kind| self.backend.reports(*kind) && can_report(op, *kind))
            .map(|kind| self.arm(op, phase, kind))
            .collect();
        ErrorCheck { arms }
    }

    fn arm(&self, op: &TransportOp, phase: Phase, kind: TransportErrorKind) -> ErrorArm<WireLayout> {
        let mut cleanup = Vec::new();
        if let Some(hook) = self.error_hook {
            cleanup.push(Step::new(
                phase,
                StepKind::Cleanup(CleanupAction::InvokeErrorHook(hook.to_string())),
            ));
        }

        let outcome = match kind {
            _ if !self.server => Outcome::Propagate,
            TransportErrorKind::Cancelled => Outcome::ContinueLoop,
            // the caller went away before its reply arrived
            TransportErrorKind::PeerGone if op.sends() => {
                cleanup.push(Step::new(phase, StepKind::Cleanup(CleanupAction::DiscardMessage)));
                Outcome::ContinueLoop
            }
            _ => Outcome::Propagate,
        };

        if outcome == Outcome::ContinueLoop && self.sent_variable {
            cleanup.push(Step::new(phase, StepKind::Cleanup(CleanupAction::ResetCursor)));
        }

        ErrorArm { kind, cleanup, outcome }
    }
}

/// Can `op` fail with `kind` at all?
fn can_report(op: &TransportOp, kind: TransportErrorKind) -> bool {
    match kind {
        TransportErrorKind::SendFailed => op.sends(),
        TransportErrorKind::ReceiveFailed => op.receives(),
        _ => true,
    }
}
