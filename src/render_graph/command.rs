//! Command stream recorded once per frame and submitted to the backend

use bytemuck::Pod;

use crate::backend::types::TemporaryDescriptor;
use crate::backend::TextureHandle;

/// Stable identifier derived from a property name.
///
/// The same name always yields the same id, which lets a backend recognise a
/// transient target across frames and recycle its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) u32);

impl PropertyId {
    /// FNV-1a hash of the name.
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash: u32 = 0x811c_9dc5;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(0x0100_0193);
            i += 1;
        }
        Self(hash)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Anything a command can read from or render into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetId {
    /// The frame buffer of the camera the stream is submitted for
    CameraTarget,
    /// A transient target acquired with [`Command::GetTemporary`]
    Temporary(PropertyId),
    /// A persistent texture
    Texture(TextureHandle),
}

/// Shader plus parameter block used by a blit
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub shader: String,
    pub uniform: Vec<u8>,
}

impl Material {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            uniform: Vec::new(),
        }
    }

    /// Attach a plain-old-data parameter block
    pub fn with_uniform<T: Pod>(mut self, data: &T) -> Self {
        self.uniform = bytemuck::bytes_of(data).to_vec();
        self
    }

    /// Read the parameter block back, `None` if absent or sized differently.
    pub fn uniform<T: Pod>(&self) -> Option<T> {
        if self.uniform.len() != std::mem::size_of::<T>() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&self.uniform))
    }
}

/// A single recorded GPU operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Clear the active render target
    Clear { color: [f32; 4] },
    /// Expose a texture to every shader under `name`
    SetGlobalTexture { name: String, texture: RenderTargetId },
    GetTemporary {
        id: PropertyId,
        descriptor: TemporaryDescriptor,
    },
    ReleaseTemporary { id: PropertyId },
    SetRenderTarget { target: RenderTargetId },
    /// Full-screen copy, optionally through a material
    Blit {
        source: RenderTargetId,
        destination: RenderTargetId,
        material: Option<Material>,
    },
}

/// Ordered list of GPU work, reused and cleared every frame.
#[derive(Debug, Clone, Default)]
pub struct CommandStream {
    label: String,
    commands: Vec<Command>,
}

impl CommandStream {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Drop all recorded commands, keeping the allocation
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear_render_target(&mut self, color: [f32; 4]) {
        self.commands.push(Command::Clear { color });
    }

    pub fn set_global_texture(&mut self, name: impl Into<String>, texture: RenderTargetId) {
        self.commands.push(Command::SetGlobalTexture {
            name: name.into(),
            texture,
        });
    }

    pub fn get_temporary(&mut self, id: PropertyId, descriptor: TemporaryDescriptor) {
        self.commands.push(Command::GetTemporary { id, descriptor });
    }

    pub fn release_temporary(&mut self, id: PropertyId) {
        self.commands.push(Command::ReleaseTemporary { id });
    }

    pub fn set_render_target(&mut self, target: RenderTargetId) {
        self.commands.push(Command::SetRenderTarget { target });
    }

    pub fn blit(&mut self, source: RenderTargetId, destination: RenderTargetId) {
        self.commands.push(Command::Blit {
            source,
            destination,
            material: None,
        });
    }

    pub fn blit_with_material(
        &mut self,
        source: RenderTargetId,
        destination: RenderTargetId,
        material: Material,
    ) {
        self.commands.push(Command::Blit {
            source,
            destination,
            material: Some(material),
        });
    }

    /// Count commands matching a predicate
    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }
}
