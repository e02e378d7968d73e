//! Pipeline: orchestration, progress, queueing, audio assembly, highlight
//! segmentation and the avatar-video subpipeline.

pub mod audio;
pub mod avatar;
pub mod highlights;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod stage;
pub mod worker;

pub use audio::{AudioAssembler, AudioClipper, ClippedAudio, MergedAudio};
pub use avatar::AvatarVideoPipeline;
pub use highlights::{HighlightCandidate, HighlightSegmenter, HighlightService};
pub use orchestrator::{OrchestratorConfig, PipelineOrchestrator};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use queue::TaskQueue;
pub use stage::TaskStage;
pub use worker::WorkerPool;
