//! Core backend abstraction traits
//!
//! The post-processing core only talks to the graphics device through
//! [`GraphicsBackend`]. Everything here is object safe so the pipeline can
//! hold a `&mut dyn GraphicsBackend` for the duration of a frame.

use crate::backend::types::*;
use crate::render_graph::{CommandStream, PropertyId};
use crate::scene::CameraView;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("Shader not found: {0}")]
    ShaderNotFound(String),
    #[error("Temporary target {0:?} is already acquired")]
    TemporaryAlreadyAcquired(PropertyId),
    #[error("Temporary target {0:?} is not acquired")]
    UnknownTemporary(PropertyId),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a persistent GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a compiled shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Graphics device interface required by the post-processing core
pub trait GraphicsBackend {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    // Resources

    /// Create a persistent offscreen target
    fn create_render_texture(
        &mut self,
        desc: &RenderTextureDescriptor,
    ) -> BackendResult<TextureHandle>;

    /// Destroy a persistent target. Unknown handles are ignored.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Pixel size of a live texture, `None` once destroyed
    fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)>;

    /// Resolve a shader by its well-known name
    fn find_shader(&self, name: &str) -> Option<ShaderHandle>;

    // Rendering

    /// Immediately render the scene from `camera` into `target`, replacing
    /// every material with `shader`. An empty `replacement_tag` matches all
    /// passes.
    fn render_with_shader(
        &mut self,
        camera: &CameraView,
        target: TextureHandle,
        shader: ShaderHandle,
        replacement_tag: &str,
    ) -> BackendResult<()>;

    /// Execute a recorded command stream against the camera's frame buffer
    fn execute(&mut self, commands: &CommandStream, camera_target: TextureHandle)
        -> BackendResult<()>;
}
