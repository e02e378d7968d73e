//! Database models.

pub mod avatar;
pub mod highlight;
pub mod task;
pub mod voice;

pub use avatar::{AvatarStatus, AvatarVideoTaskDbModel};
pub use highlight::HighlightDbModel;
pub use task::{TaskDbModel, TaskStatus};
pub use voice::VoicePreferenceDbModel;
