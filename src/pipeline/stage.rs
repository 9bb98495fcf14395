//! Post-processing stage contract
//!
//! A stage reads `source`, writes `destination` and records its work into the
//! shared [`CommandStream`]. Pipeline state the stage may need (clip planes,
//! density, the published shadow texture) arrives through [`StageContext`]
//! on every call instead of living on the stage.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;
use thiserror::Error;

use crate::pipeline::PostProcessSettings;
use crate::render_graph::{CommandStream, RenderTargetId};
use crate::scene::CameraView;

/// Errors raised by a stage while recording
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("{0}")]
    Failed(String),
    #[error("required input `{0}` is not available this frame")]
    MissingInput(&'static str),
}

/// Pipeline parameters as a shader-ready block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PostProcessUniform {
    pub near: f32,
    pub far: f32,
    pub density: f32,
    /// Frame counter, wrapping at `u32::MAX`
    pub frame: u32,
}

/// Read-only pipeline state handed to a stage for the duration of one call
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub settings: &'a PostProcessSettings,
    /// Shadow mask published for this frame, if the shadow pass is set up
    pub shadow_texture: Option<RenderTargetId>,
    pub frame_index: u64,
}

impl<'a> StageContext<'a> {
    pub fn new(settings: &'a PostProcessSettings, frame_index: u64) -> Self {
        Self {
            settings,
            shadow_texture: None,
            frame_index,
        }
    }

    pub fn with_shadow_texture(mut self, texture: Option<RenderTargetId>) -> Self {
        self.shadow_texture = texture;
        self
    }

    pub fn near(&self) -> f32 {
        self.settings.near
    }

    pub fn far(&self) -> f32 {
        self.settings.far
    }

    /// Normalized density in [0, 1]
    pub fn density(&self) -> f32 {
        self.settings.density
    }

    /// `frame` is the frame index modulo 2^32.
    pub fn uniform(&self) -> PostProcessUniform {
        PostProcessUniform {
            near: self.near(),
            far: self.far(),
            density: self.density(),
            frame: (self.frame_index & u64::from(u32::MAX)) as u32,
        }
    }
}

/// A post-processing effect
pub trait PostProcessStage: Send + Sync {
    /// Stage name for debugging and error reports
    fn name(&self) -> &str;

    /// Record the work that transforms `source` into `destination`.
    ///
    /// `source` and `destination` are always distinct. The destination is
    /// already bound as the active render target.
    fn process(
        &self,
        ctx: &StageContext<'_>,
        commands: &mut CommandStream,
        camera: &CameraView,
        source: RenderTargetId,
        destination: RenderTargetId,
    ) -> Result<(), StageError>;
}

/// Shared, ordered stage configuration.
///
/// Clones share the same list. The pipeline takes a [`snapshot`](Self::snapshot)
/// when it starts recording, so edits made while a frame is recorded apply to
/// the next frame.
#[derive(Clone, Default)]
pub struct StageList {
    stages: Arc<RwLock<Vec<Arc<dyn PostProcessStage>>>>,
}

impl StageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stages(stages: Vec<Arc<dyn PostProcessStage>>) -> Self {
        Self {
            stages: Arc::new(RwLock::new(stages)),
        }
    }

    pub fn push(&self, stage: Arc<dyn PostProcessStage>) {
        self.stages.write().push(stage);
    }

    /// Insert at `index`, clamped to the end of the list
    pub fn insert(&self, index: usize, stage: Arc<dyn PostProcessStage>) {
        let mut stages = self.stages.write();
        let index = index.min(stages.len());
        stages.insert(index, stage);
    }

    pub fn remove(&self, index: usize) -> Option<Arc<dyn PostProcessStage>> {
        let mut stages = self.stages.write();
        (index < stages.len()).then(|| stages.remove(index))
    }

    /// Swap two entries; out-of-range indices are ignored
    pub fn swap(&self, a: usize, b: usize) {
        let mut stages = self.stages.write();
        if a < stages.len() && b < stages.len() {
            stages.swap(a, b);
        }
    }

    pub fn replace(&self, stages: Vec<Arc<dyn PostProcessStage>>) {
        *self.stages.write() = stages;
    }

    pub fn clear(&self) {
        self.stages.write().clear();
    }

    pub fn len(&self) -> usize {
        self.stages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.read().iter().map(|s| s.name().to_string()).collect()
    }

    /// Copy of the current order
    pub fn snapshot(&self) -> Vec<Arc<dyn PostProcessStage>> {
        self.stages.read().clone()
    }
}

impl std::fmt::Debug for StageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageList")
            .field("stages", &self.names())
            .finish()
    }
}
