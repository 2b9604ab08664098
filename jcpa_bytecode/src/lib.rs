//! A compact model of JVM-style classes and stack-machine bytecode.
//!
//! This crate only describes programs; it does not load class files. The
//! analyses in `jcpa` consume it through [`ClassPool`] and [`Instruction`].

pub mod builder;
pub(crate) mod class;
pub(crate) mod error;
pub(crate) mod instruction;
pub(crate) mod signature;

pub use class::{Class, ClassPool, Method};
pub use error::BytecodeError;
pub use instruction::*;
pub use signature::{FieldRef, MethodDescriptor, MethodSignature, parse_field_type};
