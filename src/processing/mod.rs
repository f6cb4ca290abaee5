//! Transaction post-processing

pub mod extractor;
pub mod linker;
pub mod processor;

pub use extractor::{classify_script, extract_outputs};
pub use linker::TransactionLinker;
pub use processor::TransactionProcessor;
