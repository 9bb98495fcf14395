//! Camera post-processing - a per-camera shadow pass and stage chain
//!
//! Each frame, for a camera with a [`PostProcess`] attached:
//! - a shadow camera parented to it renders a screen-space shadow mask with an
//!   override shader
//! - the frame buffer runs through an ordered [`StageList`] using a single
//!   transient scratch target
//! - the recorded [`CommandStream`] is submitted once to the backend
//!
//! # Features
//! - Self-healing shadow camera with an explicit state machine
//! - Pluggable stages behind the [`PostProcessStage`] trait
//! - Backend abstraction with a CPU reference implementation
//! - Entity Component System (ECS) based scene using Bevy ECS

pub mod backend;
pub mod pipeline;
pub mod render_graph;
pub mod scene;

pub use backend::{BackendError, CpuBackend, GraphicsBackend, TextureFormat, TextureHandle};
pub use pipeline::postprocess::{
    register_builtin_shaders, ShadowCompositeStage, TonemapOperator, TonemappingStage,
};
pub use pipeline::{
    FrameReport, PipelineError, PostProcess, PostProcessSettings, PostProcessStage,
    ShadowCameraManager, ShadowState, ShadowSync, StageContext, StageError, StageList,
};
pub use render_graph::{CommandStream, RenderTargetId, ScratchTarget, StageChainExecutor};
pub use scene::{Camera, CameraView, Projection, Transform};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
