//! Backward extraction of the paths values take through memory, on top of a finished
//! forward analysis.

mod extractor;
mod memory;
mod relation;

pub use extractor::{LinearTrace, TraceExtractor};
pub use memory::{MemoryLocation, TraceStep};
pub use relation::{BackwardSteps, JvmMemoryLocationTransferRelation, TraceOrigins};
