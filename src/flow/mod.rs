//! User-flow extraction from raw multi-hop transfer records

pub mod extractor;
pub mod types;

pub use extractor::FlowExtractor;
pub use types::{TransferHop, UserFlow, INTERMEDIARY_TYPES};
