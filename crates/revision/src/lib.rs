//! Background entity revision: extract durable facts from answered turns
//! and fold them into entity records, under permission and sensitivity
//! guards.

pub mod extract;
pub mod pipeline;

pub use extract::{EXTRACTION_PROMPT, ExtractedRevision, ExtractedTarget, clean_facts, parse_extraction};
pub use pipeline::{RevisionPipeline, RevisionRequest};
