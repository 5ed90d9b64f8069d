// Annotation table and RTTM codec

pub mod rttm;
pub mod store;

pub use rttm::{MalformedLine, RttmError};
pub use store::{AnnotationRecord, AnnotationStore, RecordId, ValidationError};
