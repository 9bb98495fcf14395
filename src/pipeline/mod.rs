//! Camera post-processing pipeline
//!
//! Per frame, for the camera the pipeline is attached to:
//! 1. Shadow pass - the shadow camera renders the screen-space shadow mask
//! 2. Stage chain - the frame buffer runs through the ordered stage list
//!    via one scratch target
//! 3. Submit - the recorded command stream is handed to the backend

pub mod postprocess;
pub mod shadow;
pub mod stage;

pub use shadow::{ShadowCamera, ShadowCameraManager, ShadowError, ShadowState, ShadowSync};
pub use stage::{PostProcessStage, PostProcessUniform, StageContext, StageError, StageList};

use bevy_ecs::entity::Entity;
use bevy_ecs::world::World;
use thiserror::Error;

use crate::backend::{BackendError, GraphicsBackend, TextureFormat};
use crate::render_graph::{
    CommandStream, RenderTargetId, ScratchTarget, StageChainExecutor, SCRATCH_TARGET_NAME,
};
use crate::scene::{Camera, CameraView, DepthTextureMode};

/// Errors surfaced by [`PostProcess`] for one frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Shadow(#[from] ShadowError),
    #[error("camera {0:?} no longer exists")]
    CameraMissing(Entity),
    #[error("camera {0:?} has no frame target")]
    NoFrameTarget(Entity),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("stage {index} `{stage}` failed: {source}")]
    Stage {
        index: usize,
        stage: String,
        #[source]
        source: StageError,
    },
}

/// Configuration for the post-processing pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessSettings {
    /// Near clip distance exposed to stages
    pub near: f32,
    /// Far clip distance exposed to stages
    pub far: f32,
    /// Normalized effect density in [0, 1]
    pub density: f32,
    pub shadow_sync: ShadowSync,
    /// Override shader used by the shadow pass
    pub shadow_shader: String,
    pub scratch_format: TextureFormat,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            near: 0.3,
            far: 1000.0,
            density: 0.0,
            shadow_sync: ShadowSync::default(),
            shadow_shader: shadow::SCREEN_SPACE_SHADOW_SHADER.to_string(),
            scratch_format: TextureFormat::Rgba32Float,
        }
    }
}

impl PostProcessSettings {
    /// Defaults with the clip planes taken from `camera`
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            near: camera.near(),
            far: camera.far(),
            ..Default::default()
        }
    }

    pub fn set_density(&mut self, density: f32) {
        self.density = if density.is_nan() {
            0.0
        } else {
            density.clamp(0.0, 1.0)
        };
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.near > 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "near ({}) must be positive",
                self.near
            )));
        }
        if !(self.near < self.far) {
            return Err(PipelineError::InvalidSettings(format!(
                "near ({}) must be less than far ({})",
                self.near, self.far
            )));
        }
        if !(0.0..=1.0).contains(&self.density) {
            return Err(PipelineError::InvalidSettings(format!(
                "density ({}) must be within [0, 1]",
                self.density
            )));
        }
        if self.shadow_shader.is_empty() {
            return Err(PipelineError::InvalidSettings(
                "shadow shader name is empty".into(),
            ));
        }
        Ok(())
    }
}

/// Summary of one recorded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub stages_recorded: usize,
    pub shadow_rendered: bool,
    pub commands: usize,
}

/// Post-processing pipeline owned by one camera
#[derive(Debug)]
pub struct PostProcess {
    camera: Entity,
    settings: PostProcessSettings,
    stages: StageList,
    shadow: ShadowCameraManager,
    executor: StageChainExecutor,
    commands: CommandStream,
    frame_index: u64,
}

impl PostProcess {
    pub fn new(camera: Entity, settings: PostProcessSettings) -> Self {
        let shadow = ShadowCameraManager::new(settings.shadow_shader.clone(), settings.shadow_sync);
        let executor = StageChainExecutor::new(ScratchTarget::new(
            SCRATCH_TARGET_NAME,
            settings.scratch_format,
        ));
        Self {
            camera,
            settings,
            stages: StageList::new(),
            shadow,
            executor,
            commands: CommandStream::new("PostProcess"),
            frame_index: 0,
        }
    }

    /// Attach a pipeline to `camera`.
    ///
    /// Enables depth, motion-vector and depth-normal generation on the camera.
    pub fn attach(
        world: &mut World,
        camera: Entity,
        settings: PostProcessSettings,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;
        let mut component = world
            .get_mut::<Camera>(camera)
            .ok_or(PipelineError::CameraMissing(camera))?;
        component.depth_texture_mode |= DepthTextureMode::DEPTH
            | DepthTextureMode::MOTION_VECTORS
            | DepthTextureMode::DEPTH_NORMALS;

        log::info!("Post-processing attached to camera {:?}", camera);
        Ok(Self::new(camera, settings))
    }

    pub fn camera(&self) -> Entity {
        self.camera
    }

    pub fn settings(&self) -> &PostProcessSettings {
        &self.settings
    }

    /// Changes are picked up by the next frame.
    pub fn settings_mut(&mut self) -> &mut PostProcessSettings {
        &mut self.settings
    }

    /// Shared handle to the stage list
    pub fn stages(&self) -> &StageList {
        &self.stages
    }

    pub fn with_stages(mut self, stages: StageList) -> Self {
        self.stages = stages;
        self
    }

    pub fn shadow(&self) -> &ShadowCameraManager {
        &self.shadow
    }

    /// Stream recorded by the last frame
    pub fn commands(&self) -> &CommandStream {
        &self.commands
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Force (re)initialization of the shadow camera
    pub fn initialize(
        &mut self,
        world: &mut World,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), PipelineError> {
        self.shadow.set_shader_name(&self.settings.shadow_shader);
        self.shadow.initialize(world, backend, self.camera)?;
        Ok(())
    }

    /// Render the shadow pass and record the stage chain without submitting.
    ///
    /// On a stage failure the stream is cleared and the error names the stage.
    pub fn record(
        &mut self,
        world: &mut World,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<FrameReport, PipelineError> {
        self.settings.validate()?;
        if world.get::<Camera>(self.camera).is_none() {
            return Err(PipelineError::CameraMissing(self.camera));
        }

        self.shadow.set_sync(self.settings.shadow_sync);
        self.shadow.set_shader_name(&self.settings.shadow_shader);
        match self.shadow.ensure_ready(world, backend, self.camera) {
            Ok(_) => {}
            // Reported by the manager; the chain still runs without a mask
            Err(ShadowError::ShaderNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let shadow_rendered = self.shadow.render_shadow_pass(world, backend)?;

        let view = CameraView::extract(world, self.camera)
            .ok_or(PipelineError::CameraMissing(self.camera))?;
        let stages = self.stages.snapshot();
        let ctx = StageContext::new(&self.settings, self.frame_index).with_shadow_texture(
            self.shadow
                .shadow_texture()
                .map(RenderTargetId::Texture),
        );

        self.commands.clear();
        let stages_recorded =
            match self
                .executor
                .record_frame(&mut self.commands, &view, &stages, &ctx)
            {
                Ok(count) => count,
                Err(failure) => {
                    self.commands.clear();
                    log::error!(
                        "Stage {} `{}` failed on frame {}: {}",
                        failure.index,
                        failure.stage,
                        self.frame_index,
                        failure.error
                    );
                    return Err(PipelineError::Stage {
                        index: failure.index,
                        stage: failure.stage,
                        source: failure.error,
                    });
                }
            };

        let report = FrameReport {
            frame_index: self.frame_index,
            stages_recorded,
            shadow_rendered,
            commands: self.commands.len(),
        };
        self.frame_index += 1;
        Ok(report)
    }

    /// Record one frame and submit it against the camera's frame target.
    pub fn render_frame(
        &mut self,
        world: &mut World,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<FrameReport, PipelineError> {
        let target = world
            .get::<Camera>(self.camera)
            .ok_or(PipelineError::CameraMissing(self.camera))?
            .target_texture
            .ok_or(PipelineError::NoFrameTarget(self.camera))?;

        let report = self.record(world, backend)?;
        backend.execute(&self.commands, target)?;
        log::debug!(
            "Frame {}: {} stages, {} commands submitted",
            report.frame_index,
            report.stages_recorded,
            report.commands
        );
        Ok(report)
    }

    /// Remove the shadow camera node and release its target
    pub fn detach(mut self, world: &mut World, backend: &mut dyn GraphicsBackend) {
        self.shadow.teardown(world, backend);
        log::info!("Post-processing detached from camera {:?}", self.camera);
    }
}
