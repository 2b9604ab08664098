use jcpa_bytecode::{BytecodeError, MethodSignature};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpaError {
    #[error("Required builder field `{0}` was not set")]
    MissingField(&'static str),
    #[error("Operation `{0}` is not supported on a read-only view")]
    UnsupportedOperation(&'static str),
    #[error("Method `{0}` is not part of the control flow automaton")]
    UnknownMethod(MethodSignature),
    #[error("Method `{0}` has no code to analyze")]
    NoCode(MethodSignature),
    #[error("Malformed bytecode")]
    Bytecode(#[from] BytecodeError),
}
