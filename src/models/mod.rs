//! Domain models for delivery note ingestion.

pub mod document;
pub mod message;
pub mod record;

pub use document::{
    artifact_name, canonical_name, is_artifact_name, is_candidate_name, DocumentState,
    SourceDocument,
};
pub use message::{Message, MessageKind};
pub use record::{PageFields, PageRecord, QuarantinedPage};
