//! Repository traits and sqlx implementations.

pub mod avatar;
pub mod highlight;
pub mod task;
pub mod voice;

pub use avatar::{AvatarVideoTaskRepository, SqlxAvatarVideoTaskRepository};
pub use highlight::{HighlightRepository, SqlxHighlightRepository};
pub use task::{SqlxTaskRepository, TaskRepository};
pub use voice::{SqlxVoicePreferenceRepository, VoicePreferenceRepository};
