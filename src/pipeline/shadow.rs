//! Shadow camera management
//!
//! The shadow camera is a child of the primary camera named
//! [`SHADOW_CAMERA_NAME`], sitting at the parent's origin so it shares the
//! primary pose. It is rendered manually once per frame with the
//! screen-space shadow shader replacing every material.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --initialize--> Ready            (shader resolved)
//!                           \-> Degraded         (shader missing, reported once)
//! Degraded --shader resolves--> Ready
//! Ready | Degraded --camera or target lost--> reinitialize
//! ```

use bevy_ecs::entity::Entity;
use bevy_ecs::world::World;
use glam::Vec4;
use thiserror::Error;

use crate::backend::{
    BackendError, GraphicsBackend, RenderTextureDescriptor, ShaderHandle, TextureHandle,
};
use crate::scene::{
    despawn_child, find_child_by_name, set_parent, Camera, CameraView, ClearFlags,
    DepthTextureMode, Name, Parent, Transform, ALL_LAYERS,
};

/// Name of the child entity carrying the shadow camera.
pub const SHADOW_CAMERA_NAME: &str = "ShadowCameraObject";

/// Well-known name of the override shader used for the shadow pass.
pub const SCREEN_SPACE_SHADOW_SHADER: &str = "PostProcess/ScreenSpaceShadow";

/// Depth precision requested for the shadow target.
pub const SHADOW_DEPTH_BITS: u32 = 512;

const SHADOW_TEXTURE_LABEL: &str = "ShadowTexture";

/// Errors raised while managing the shadow camera
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShadowError {
    #[error("primary camera {0:?} has no Camera component")]
    PrimaryMissing(Entity),
    #[error("shadow camera {0:?} disappeared")]
    CameraLost(Entity),
    #[error("screen-space shadow shader `{0}` could not be resolved")]
    ShaderNotFound(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// When lens and clip parameters are copied from the primary camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowSync {
    /// Only while (re)initializing; the shadow camera keeps that projection.
    #[default]
    OnInitialize,
    /// Before every shadow render.
    EveryFrame,
}

/// The shadow camera entity and its offscreen target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowCamera {
    pub entity: Entity,
    pub target: TextureHandle,
    /// Target size, fixed at initialization.
    pub size: (u32, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShadowState {
    Uninitialized,
    Ready {
        camera: ShadowCamera,
        shader: ShaderHandle,
    },
    /// Camera and target exist but the override shader is missing.
    Degraded { camera: ShadowCamera },
}

/// Owns the shadow camera entity and target
#[derive(Debug)]
pub struct ShadowCameraManager {
    state: ShadowState,
    sync: ShadowSync,
    shader_name: String,
}

impl Default for ShadowCameraManager {
    fn default() -> Self {
        Self::new(SCREEN_SPACE_SHADOW_SHADER, ShadowSync::default())
    }
}

impl ShadowCameraManager {
    pub fn new(shader_name: impl Into<String>, sync: ShadowSync) -> Self {
        Self {
            state: ShadowState::Uninitialized,
            sync,
            shader_name: shader_name.into(),
        }
    }

    pub fn state(&self) -> &ShadowState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ShadowState::Ready { .. })
    }

    pub fn camera(&self) -> Option<&ShadowCamera> {
        match &self.state {
            ShadowState::Ready { camera, .. } | ShadowState::Degraded { camera } => Some(camera),
            ShadowState::Uninitialized => None,
        }
    }

    /// Target holding a valid shadow mask, only once the shader resolved
    pub fn shadow_texture(&self) -> Option<TextureHandle> {
        match &self.state {
            ShadowState::Ready { camera, .. } => Some(camera.target),
            _ => None,
        }
    }

    pub fn sync(&self) -> ShadowSync {
        self.sync
    }

    pub fn set_sync(&mut self, sync: ShadowSync) {
        self.sync = sync;
    }

    pub fn shader_name(&self) -> &str {
        &self.shader_name
    }

    /// Switch the override shader; it is resolved again on the next frame.
    pub fn set_shader_name(&mut self, name: &str) {
        if self.shader_name == name {
            return;
        }
        log::info!("Shadow override shader changed to `{}`", name);
        self.shader_name = name.to_string();
        if let ShadowState::Ready { camera, .. } = self.state {
            self.state = ShadowState::Degraded { camera };
        }
    }

    /// Single per-frame entry point.
    ///
    /// Initializes on first use and whenever the shadow camera or its target
    /// has been destroyed. While degraded the shader lookup is retried
    /// silently. Returns `Err` only from a (re)initialization.
    pub fn ensure_ready(
        &mut self,
        world: &mut World,
        backend: &mut dyn GraphicsBackend,
        primary: Entity,
    ) -> Result<&ShadowState, ShadowError> {
        let intact = match self.camera() {
            Some(camera) => is_intact(world, backend, primary, camera),
            None => false,
        };

        if !intact {
            if let Some(camera) = self.camera() {
                log::warn!(
                    "Shadow camera {:?} lost, reinitializing under {:?}",
                    camera.entity,
                    primary
                );
            }
            return self.initialize(world, backend, primary);
        }

        if let ShadowState::Degraded { camera } = self.state {
            if let Some(shader) = backend.find_shader(&self.shader_name) {
                log::info!("Shadow override shader `{}` resolved", self.shader_name);
                self.state = ShadowState::Ready { camera, shader };
            }
        }

        if self.sync == ShadowSync::EveryFrame {
            if let Some(camera) = self.camera().copied() {
                sync_from_primary(world, primary, &camera)?;
            }
        }

        Ok(&self.state)
    }

    /// (Re)create the shadow camera from the primary camera's current state.
    ///
    /// Reuses an existing child named [`SHADOW_CAMERA_NAME`] and replaces any
    /// previously allocated target.
    pub fn initialize(
        &mut self,
        world: &mut World,
        backend: &mut dyn GraphicsBackend,
        primary: Entity,
    ) -> Result<&ShadowState, ShadowError> {
        let primary_camera = world
            .get::<Camera>(primary)
            .cloned()
            .ok_or(ShadowError::PrimaryMissing(primary))?;

        if let Some(previous) = self.camera().copied() {
            backend.destroy_texture(previous.target);
        }
        self.state = ShadowState::Uninitialized;

        let entity = match find_child_by_name(world, primary, SHADOW_CAMERA_NAME) {
            Some(entity) => entity,
            None => {
                let entity = world.spawn(Name::new(SHADOW_CAMERA_NAME)).id();
                set_parent(world, entity, primary);
                log::debug!("Created shadow camera node {:?} under {:?}", entity, primary);
                entity
            }
        };
        world.entity_mut(entity).insert(Transform::IDENTITY);

        let size = (primary_camera.pixel_width, primary_camera.pixel_height);
        let target = backend.create_render_texture(
            &RenderTextureDescriptor::new(size.0, size.1, SHADOW_DEPTH_BITS)
                .with_label(SHADOW_TEXTURE_LABEL),
        )?;
        let camera = ShadowCamera {
            entity,
            target,
            size,
        };

        // Replaces an existing camera component in place
        let mut component = primary_camera;
        apply_shadow_overrides(&mut component, &camera);
        world.entity_mut(entity).insert(component);

        match backend.find_shader(&self.shader_name) {
            Some(shader) => {
                log::info!(
                    "Shadow camera {:?} initialized ({}x{})",
                    entity,
                    size.0,
                    size.1
                );
                self.state = ShadowState::Ready { camera, shader };
                Ok(&self.state)
            }
            None => {
                log::error!(
                    "Shadow camera {:?} has no override shader: `{}` not found",
                    entity,
                    self.shader_name
                );
                self.state = ShadowState::Degraded { camera };
                Err(ShadowError::ShaderNotFound(self.shader_name.clone()))
            }
        }
    }

    /// Render the scene through the override shader into the shadow target.
    ///
    /// Returns `false` without rendering unless the manager is ready.
    pub fn render_shadow_pass(
        &self,
        world: &World,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<bool, ShadowError> {
        let ShadowState::Ready { camera, shader } = &self.state else {
            log::trace!("Shadow pass skipped ({:?})", self.state);
            return Ok(false);
        };

        let view = CameraView::extract(world, camera.entity)
            .ok_or(ShadowError::CameraLost(camera.entity))?;
        backend.render_with_shader(&view, camera.target, *shader, "")?;
        Ok(true)
    }

    /// Despawn the shadow camera node and destroy its target.
    pub fn teardown(&mut self, world: &mut World, backend: &mut dyn GraphicsBackend) {
        if let Some(camera) = self.camera().copied() {
            despawn_child(world, camera.entity);
            backend.destroy_texture(camera.target);
            log::debug!("Shadow camera {:?} torn down", camera.entity);
        }
        self.state = ShadowState::Uninitialized;
    }
}

fn is_intact(
    world: &World,
    backend: &dyn GraphicsBackend,
    primary: Entity,
    camera: &ShadowCamera,
) -> bool {
    let Some(component) = world.get::<Camera>(camera.entity) else {
        return false;
    };
    component.target_texture == Some(camera.target)
        && world.get::<Parent>(camera.entity) == Some(&Parent(primary))
        && backend.texture_size(camera.target).is_some()
}

fn apply_shadow_overrides(component: &mut Camera, camera: &ShadowCamera) {
    component.culling_mask = ALL_LAYERS;
    component.clear = ClearFlags::SolidColor(Vec4::ONE);
    component.enabled = false;
    component.depth_texture_mode = DepthTextureMode::DEPTH;
    component.target_texture = Some(camera.target);
    component.pixel_width = camera.size.0;
    component.pixel_height = camera.size.1;
}

fn sync_from_primary(
    world: &mut World,
    primary: Entity,
    camera: &ShadowCamera,
) -> Result<(), ShadowError> {
    let primary_camera = world
        .get::<Camera>(primary)
        .cloned()
        .ok_or(ShadowError::PrimaryMissing(primary))?;
    let mut component = world
        .get_mut::<Camera>(camera.entity)
        .ok_or(ShadowError::CameraLost(camera.entity))?;
    component.copy_from(&primary_camera);
    apply_shadow_overrides(&mut component, camera);
    Ok(())
}
