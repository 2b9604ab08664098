use thiserror::Error;

/// An error in constructing or interpreting the bytecode model
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BytecodeError {
    /// A fully qualified method name did not have the shape `Lclass;name(args)ret`
    #[error("malformed method signature `{0}`")]
    InvalidSignature(String),
    /// A method or field descriptor could not be parsed
    #[error("malformed descriptor `{0}`")]
    InvalidDescriptor(String),
    /// A branch referenced a label that was never bound to an offset
    #[error("label {0} is referenced but never bound")]
    UnboundLabel(usize),
    /// A label was bound twice
    #[error("label {0} is bound more than once")]
    ReboundLabel(usize),
    /// A branch target lies outside of the code of its method
    #[error("branch target {target} is outside of code of length {length}")]
    TargetOutOfRange { target: u32, length: usize },
    /// Two methods with the same name and descriptor were added to a class
    #[error("duplicate method `{0}`")]
    DuplicateMethod(String),
    /// Two classes with the same name were added to a class pool
    #[error("duplicate class `{0}`")]
    DuplicateClass(String),
}
