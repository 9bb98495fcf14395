//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bevy_ecs::entity::Entity;
use bevy_ecs::world::World;
use glam::Vec3;
use image::{Rgba, Rgba32FImage};
use parking_lot::Mutex;

use camera_postfx::backend::{CpuBackend, Fragment, GraphicsBackend, RenderTextureDescriptor};
use camera_postfx::pipeline::shadow::SCREEN_SPACE_SHADOW_SHADER;
use camera_postfx::render_graph::{CommandStream, Material, RenderTargetId};
use camera_postfx::{
    Camera, CameraView, PostProcess, PostProcessSettings, PostProcessStage, Projection,
    StageContext, StageError, TextureFormat, TextureHandle, Transform,
};

pub const INVERT_SHADER: &str = "Test/Invert";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn invert(color: [f32; 4]) -> [f32; 4] {
    [1.0 - color[0], 1.0 - color[1], 1.0 - color[2], color[3]]
}

/// Deterministic pattern with values in [0, 1]
pub fn test_pattern(width: u32, height: u32) -> Rgba32FImage {
    Rgba32FImage::from_fn(width, height, |x, y| {
        Rgba([
            (x % 256) as f32 / 255.0,
            (y % 256) as f32 / 255.0,
            ((x + y) % 256) as f32 / 255.0,
            1.0,
        ])
    })
}

// ============================================================================
// Stages
// ============================================================================

/// Inverts rgb through [`INVERT_SHADER`]
pub struct InvertStage;

impl PostProcessStage for InvertStage {
    fn name(&self) -> &str {
        "invert"
    }

    fn process(
        &self,
        _ctx: &StageContext<'_>,
        commands: &mut CommandStream,
        _camera: &CameraView,
        source: RenderTargetId,
        destination: RenderTargetId,
    ) -> Result<(), StageError> {
        commands.blit_with_material(source, destination, Material::new(INVERT_SHADER));
        Ok(())
    }
}

/// Plain copy from source to destination
pub struct CopyStage;

impl PostProcessStage for CopyStage {
    fn name(&self) -> &str {
        "copy"
    }

    fn process(
        &self,
        _ctx: &StageContext<'_>,
        commands: &mut CommandStream,
        _camera: &CameraView,
        source: RenderTargetId,
        destination: RenderTargetId,
    ) -> Result<(), StageError> {
        commands.blit(source, destination);
        Ok(())
    }
}

/// Copy stage that logs `(name, frame)` for every invocation
pub struct RecordingStage {
    pub name: String,
    pub log: Arc<Mutex<Vec<(String, u64)>>>,
}

impl RecordingStage {
    pub fn new(name: impl Into<String>, log: &Arc<Mutex<Vec<(String, u64)>>>) -> Self {
        Self {
            name: name.into(),
            log: Arc::clone(log),
        }
    }
}

impl PostProcessStage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &self,
        ctx: &StageContext<'_>,
        commands: &mut CommandStream,
        _camera: &CameraView,
        source: RenderTargetId,
        destination: RenderTargetId,
    ) -> Result<(), StageError> {
        assert_ne!(source, destination);
        self.log.lock().push((self.name.clone(), ctx.frame_index));
        commands.blit(source, destination);
        Ok(())
    }
}

pub struct FailingStage;

impl PostProcessStage for FailingStage {
    fn name(&self) -> &str {
        "fails"
    }

    fn process(
        &self,
        _ctx: &StageContext<'_>,
        _commands: &mut CommandStream,
        _camera: &CameraView,
        _source: RenderTargetId,
        _destination: RenderTargetId,
    ) -> Result<(), StageError> {
        Err(StageError::Failed("stage exploded".into()))
    }
}

// ============================================================================
// Scene fixture
// ============================================================================

/// A primary camera with an Rgba32Float frame buffer and an attached pipeline
pub struct Fixture {
    pub world: World,
    pub backend: CpuBackend,
    pub camera: Entity,
    pub frame_target: TextureHandle,
    pub pipeline: PostProcess,
}

impl Fixture {
    /// Backend with the shadow and invert shaders registered
    pub fn new(width: u32, height: u32) -> Self {
        let mut backend = CpuBackend::new();
        backend.register_shader(SCREEN_SPACE_SHADOW_SHADER, |f: &Fragment<'_>| f.color);
        Self::with_backend(backend, width, height, PostProcessSettings::default())
    }

    pub fn with_backend(
        mut backend: CpuBackend,
        width: u32,
        height: u32,
        settings: PostProcessSettings,
    ) -> Self {
        init_logging();
        backend.register_shader(INVERT_SHADER, |f: &Fragment<'_>| invert(f.color));

        let frame_target = backend
            .create_render_texture(
                &RenderTextureDescriptor::new(width, height, 24)
                    .with_label("FrameBuffer")
                    .with_format(TextureFormat::Rgba32Float),
            )
            .expect("frame buffer");

        let mut world = World::new();
        let mut camera = Camera::new(
            Projection::perspective(60.0, width as f32 / height as f32, 0.3, 100.0),
            width,
            height,
        );
        camera.target_texture = Some(frame_target);
        let camera = world
            .spawn((Transform::from_position(Vec3::new(0.0, 1.0, 5.0)), camera))
            .id();

        let pipeline = PostProcess::attach(&mut world, camera, settings).expect("attach");

        Self {
            world,
            backend,
            camera,
            frame_target,
            pipeline,
        }
    }

    pub fn push(&self, stage: impl PostProcessStage + 'static) {
        self.pipeline.stages().push(Arc::new(stage));
    }

    pub fn write_frame(&mut self, image: &Rgba32FImage) {
        self.backend
            .write_image(self.frame_target, image)
            .expect("write frame");
    }

    pub fn frame(&self) -> Rgba32FImage {
        self.backend
            .read_image(self.frame_target)
            .expect("frame buffer alive")
            .clone()
    }

    pub fn render(&mut self) -> Result<camera_postfx::FrameReport, camera_postfx::PipelineError> {
        self.pipeline.render_frame(&mut self.world, &mut self.backend)
    }
}
