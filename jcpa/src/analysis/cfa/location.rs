use jcpa_bytecode::MethodSignature;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A node of the control flow automaton.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgramLocation {
    /// Before the instruction at `offset`.
    Code {
        signature: MethodSignature,
        offset: u32,
    },
    /// After the method returned or threw.
    Exit(MethodSignature),
    /// Control flow the automaton could not resolve, such as `ret`.
    Unknown,
}

impl ProgramLocation {
    pub fn code(signature: MethodSignature, offset: u32) -> Self {
        Self::Code { signature, offset }
    }

    pub fn entry(signature: MethodSignature) -> Self {
        Self::Code {
            signature,
            offset: 0,
        }
    }

    pub fn signature(&self) -> Option<MethodSignature> {
        match self {
            Self::Code { signature, .. } | Self::Exit(signature) => Some(*signature),
            Self::Unknown => None,
        }
    }

    pub fn offset(&self) -> Option<u32> {
        match self {
            Self::Code { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Code { offset: 0, .. })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The location of the instruction following this one.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Code { signature, offset } => Some(Self::code(*signature, offset + 1)),
            _ => None,
        }
    }
}

impl Display for ProgramLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code { signature, offset } => write!(f, "{signature}:{offset}"),
            Self::Exit(signature) => write!(f, "{signature}:exit"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
