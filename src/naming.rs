//! Identifier naming for generated functions and variables

use crate::pattern::CallPatternVariant;

/// Name-mangling service consulted by the assembler
pub trait Naming {
    /// Name of the function implementing `variant` for `operation`
    fn function_name(&self, interface: &str, operation: &str, variant: &CallPatternVariant) -> String;

    /// Runtime offset variable threaded through variable tails
    fn offset_var(&self) -> String;

    /// Message buffer variable
    fn buffer_var(&self) -> String;
}

/// `<interface>_<operation>_<variant>` with `_offset` and `_msgbuf`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl Naming for DefaultNaming {
    fn function_name(&self, interface: &str, operation: &str, variant: &CallPatternVariant) -> String {
        format!("{}_{}_{}", interface, operation, variant.as_str())
    }

    fn offset_var(&self) -> String {
        "_offset".to_string()
    }

    fn buffer_var(&self) -> String {
        "_msgbuf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Target;

    #[test]
    fn test_default_names() {
        let naming = DefaultNaming;
        assert_eq!(
            naming.function_name("echo", "ping", &CallPatternVariant::Call),
            "echo_ping_call"
        );
        assert_eq!(
            naming.function_name("echo", "ping", &CallPatternVariant::ReplyToThenWaitAny(Target::Caller)),
            "echo_ping_reply_and_wait"
        );
        assert_eq!(naming.offset_var(), "_offset");
        assert_eq!(naming.buffer_var(), "_msgbuf");
    }
}
