// Turnscribe - core engine for an RTTM speaker-diarization annotation editor
// Module declarations
pub mod annotations;
pub mod audio;
pub mod session;
pub mod settings;

pub use annotations::{AnnotationRecord, AnnotationStore, RecordId, RttmError, ValidationError};
pub use audio::{AudioBuffer, DecodeError, PlaybackController, PlaybackError, PlaybackTick};
pub use session::{format_clock, EditorSession};
pub use settings::EditorSettings;
