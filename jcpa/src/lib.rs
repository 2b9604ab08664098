pub mod analysis;
mod error;

pub use jcpa_bytecode as bytecode;

pub use error::CpaError;
