//! Domain types and value objects.

pub mod dialogue;
pub mod source_input;
pub mod value_objects;

pub use dialogue::{DialogueTurn, VoiceSelection};
pub use source_input::{SourceInput, SourceKind};
pub use value_objects::{PollSchedule, RetryPolicy};
