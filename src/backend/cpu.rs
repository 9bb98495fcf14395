//! CPU reference backend.
//!
//! Executes command streams on `f32` RGBA images held in memory. It stands in
//! for a GPU device in tests and headless tools: shaders are per-pixel
//! kernels registered by name, transient targets are pooled and reused across
//! frames, and every camera render and submission is logged as a
//! [`BackendEvent`] so callers can check ordering.

use std::collections::HashMap;
use std::sync::Arc;

use bevy_ecs::entity::Entity;
use glam::Vec2;
use image::{Rgba, Rgba32FImage};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::{Command, CommandStream, Material, PropertyId, RenderTargetId};
use crate::scene::{CameraView, ClearFlags};

/// Deepest depth buffer the reference backend models.
const MAX_DEPTH_BITS: u32 = 32;

/// Per-pixel shader kernel
pub type PixelShader = Arc<dyn Fn(&Fragment<'_>) -> [f32; 4] + Send + Sync>;

/// Inputs visible to a [`PixelShader`] invocation
pub struct Fragment<'a> {
    pub x: u32,
    pub y: u32,
    /// Normalized pixel-center coordinates
    pub uv: Vec2,
    /// Source color at this pixel (current target color for camera renders)
    pub color: [f32; 4],
    uniform: &'a [u8],
    globals: &'a HashMap<String, TextureHandle>,
    textures: &'a HashMap<TextureHandle, CpuTexture>,
}

impl Fragment<'_> {
    /// Material parameter block, `None` if absent or sized differently
    pub fn uniform<T: bytemuck::Pod>(&self) -> Option<T> {
        if self.uniform.len() != std::mem::size_of::<T>() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(self.uniform))
    }

    /// Sample a globally published texture at this fragment's uv
    pub fn sample_global(&self, name: &str) -> Option<[f32; 4]> {
        let handle = self.globals.get(name)?;
        let texture = self.textures.get(handle)?;
        Some(texture.sample(self.uv))
    }
}

#[derive(Debug, Clone)]
struct CpuTexture {
    label: Option<String>,
    format: TextureFormat,
    filter: FilterMode,
    depth_bits: u32,
    /// Screen size a screen-relative temporary was resolved against
    screen: Option<(u32, u32)>,
    image: Rgba32FImage,
}

impl CpuTexture {
    fn new(label: Option<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label,
            format,
            filter: FilterMode::Bilinear,
            depth_bits: 0,
            screen: None,
            image: Rgba32FImage::new(width.max(1), height.max(1)),
        }
    }

    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Texel at (x, y) of a `size` target, exact when sizes match
    fn fetch(&self, x: u32, y: u32, size: (u32, u32), uv: Vec2) -> [f32; 4] {
        if self.size() == size {
            self.image.get_pixel(x, y).0
        } else {
            self.sample(uv)
        }
    }

    fn sample(&self, uv: Vec2) -> [f32; 4] {
        let (w, h) = self.size();
        match self.filter {
            FilterMode::Nearest => {
                let x = ((uv.x * w as f32) as u32).min(w - 1);
                let y = ((uv.y * h as f32) as u32).min(h - 1);
                self.image.get_pixel(x, y).0
            }
            FilterMode::Bilinear => {
                let fx = (uv.x * w as f32 - 0.5).clamp(0.0, (w - 1) as f32);
                let fy = (uv.y * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);
                let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
                let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
                let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

                let p00 = self.image.get_pixel(x0, y0).0;
                let p10 = self.image.get_pixel(x1, y0).0;
                let p01 = self.image.get_pixel(x0, y1).0;
                let p11 = self.image.get_pixel(x1, y1).0;

                let mut out = [0.0; 4];
                for c in 0..4 {
                    let top = p00[c] + (p10[c] - p00[c]) * tx;
                    let bottom = p01[c] + (p11[c] - p01[c]) * tx;
                    out[c] = top + (bottom - top) * ty;
                }
                out
            }
        }
    }

    fn store(&self, color: [f32; 4]) -> Rgba<f32> {
        if self.format.is_float() {
            Rgba(color)
        } else {
            Rgba(color.map(|c| c.clamp(0.0, 1.0)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PoolKey {
    size: (u32, u32),
    format: TextureFormat,
    filter: FilterMode,
    depth_bits: u32,
}

/// Something the backend did, in order
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    CameraRender {
        camera: Entity,
        target: TextureHandle,
        shader: ShaderHandle,
        replacement_tag: String,
    },
    Execute {
        label: String,
        commands: usize,
    },
}

/// Counters for tests and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub textures_created: u64,
    pub textures_destroyed: u64,
    pub temporaries_allocated: u64,
    pub temporaries_reused: u64,
    pub blits: u64,
    pub camera_renders: u64,
    pub submissions: u64,
}

/// CPU reference backend
#[derive(Default)]
pub struct CpuBackend {
    next_texture: u64,
    next_shader: u64,
    textures: HashMap<TextureHandle, CpuTexture>,
    shaders: HashMap<String, ShaderHandle>,
    kernels: HashMap<ShaderHandle, PixelShader>,
    temporaries: HashMap<PropertyId, TextureHandle>,
    pool: Vec<(PoolKey, TextureHandle)>,
    globals: HashMap<String, TextureHandle>,
    events: Vec<BackendEvent>,
    stats: BackendStats,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel under `name`, replacing any previous one
    pub fn register_shader(
        &mut self,
        name: impl Into<String>,
        kernel: impl Fn(&Fragment<'_>) -> [f32; 4] + Send + Sync + 'static,
    ) -> ShaderHandle {
        let name = name.into();
        let handle = match self.shaders.get(&name) {
            Some(&handle) => handle,
            None => {
                let handle = ShaderHandle(self.next_shader);
                self.next_shader += 1;
                self.shaders.insert(name.clone(), handle);
                handle
            }
        };
        log::debug!("CpuBackend: registered shader `{}` as {:?}", name, handle);
        self.kernels.insert(handle, Arc::new(kernel));
        handle
    }

    /// Overwrite a texture's pixels; the image must match the texture size
    pub fn write_image(&mut self, texture: TextureHandle, image: &Rgba32FImage) -> BackendResult<()> {
        let target = self
            .textures
            .get_mut(&texture)
            .ok_or(BackendError::UnknownTexture(texture))?;
        if target.size() != image.dimensions() {
            return Err(BackendError::InvalidCommand(format!(
                "image is {:?} but texture {:?} is {:?}",
                image.dimensions(),
                texture,
                target.size()
            )));
        }
        target.image = image.clone();
        Ok(())
    }

    pub fn read_image(&self, texture: TextureHandle) -> Option<&Rgba32FImage> {
        self.textures.get(&texture).map(|t| &t.image)
    }

    /// Depth bits actually granted to a texture
    pub fn depth_bits(&self, texture: TextureHandle) -> Option<u32> {
        self.textures.get(&texture).map(|t| t.depth_bits)
    }

    pub fn texture_label(&self, texture: TextureHandle) -> Option<&str> {
        self.textures.get(&texture).and_then(|t| t.label.as_deref())
    }

    /// Texture currently published under a global name
    pub fn global_texture(&self, name: &str) -> Option<TextureHandle> {
        self.globals.get(name).copied()
    }

    /// Transient targets acquired and not yet released
    pub fn live_temporaries(&self) -> usize {
        self.temporaries.len()
    }

    /// Released transient targets waiting for reuse
    pub fn pooled_temporaries(&self) -> usize {
        self.pool.len()
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn allocate(&mut self, texture: CpuTexture) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(handle, texture);
        self.stats.textures_created += 1;
        handle
    }

    fn kernel(&self, name: &str) -> BackendResult<PixelShader> {
        self.shaders
            .get(name)
            .and_then(|handle| self.kernels.get(handle))
            .cloned()
            .ok_or_else(|| BackendError::ShaderNotFound(name.to_string()))
    }

    fn resolve(&self, target: RenderTargetId, camera_target: TextureHandle) -> BackendResult<TextureHandle> {
        let handle = match target {
            RenderTargetId::CameraTarget => camera_target,
            RenderTargetId::Temporary(id) => *self
                .temporaries
                .get(&id)
                .ok_or(BackendError::UnknownTemporary(id))?,
            RenderTargetId::Texture(handle) => handle,
        };
        if self.textures.contains_key(&handle) {
            Ok(handle)
        } else {
            Err(BackendError::UnknownTexture(handle))
        }
    }

    fn get_temporary(
        &mut self,
        id: PropertyId,
        descriptor: &TemporaryDescriptor,
        screen: (u32, u32),
    ) -> BackendResult<()> {
        if self.temporaries.contains_key(&id) {
            return Err(BackendError::TemporaryAlreadyAcquired(id));
        }
        self.evict_stale_temporaries(screen);

        let key = PoolKey {
            size: descriptor.size.resolve(screen.0, screen.1),
            format: descriptor.format,
            filter: descriptor.filter,
            depth_bits: descriptor.depth_bits.min(MAX_DEPTH_BITS),
        };

        let handle = match self.pool.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                self.stats.temporaries_reused += 1;
                self.pool.swap_remove(index).1
            }
            None => {
                self.stats.temporaries_allocated += 1;
                let mut texture = CpuTexture::new(
                    Some(format!("temporary_{:08x}", id.value())),
                    key.size.0,
                    key.size.1,
                    key.format,
                );
                texture.filter = key.filter;
                texture.depth_bits = key.depth_bits;
                if let TextureSize::Relative { .. } = descriptor.size {
                    texture.screen = Some(screen);
                }
                self.allocate(texture)
            }
        };

        log::trace!("CpuBackend: temporary {:?} -> {:?} {:?}", id, handle, key.size);
        self.temporaries.insert(id, handle);
        Ok(())
    }

    /// Destroy pooled screen-relative targets sized for a previous screen.
    fn evict_stale_temporaries(&mut self, screen: (u32, u32)) {
        let textures = &self.textures;
        let (stale, kept): (Vec<_>, Vec<_>) = self.pool.drain(..).partition(|(_, handle)| {
            textures
                .get(handle)
                .and_then(|texture| texture.screen)
                .is_some_and(|resolved| resolved != screen)
        });
        self.pool = kept;

        for (key, handle) in stale {
            log::debug!(
                "CpuBackend: evicting pooled {:?} ({:?}), screen is now {:?}",
                handle,
                key.size,
                screen
            );
            self.destroy_texture(handle);
        }
    }

    fn run_commands(
        &mut self,
        commands: &CommandStream,
        camera_target: TextureHandle,
        screen: (u32, u32),
    ) -> BackendResult<()> {
        let mut active = camera_target;
        for command in commands.commands() {
            match command {
                Command::Clear { color } => self.clear(active, *color)?,
                Command::SetGlobalTexture { name, texture } => {
                    let handle = self.resolve(*texture, camera_target)?;
                    self.globals.insert(name.clone(), handle);
                }
                Command::GetTemporary { id, descriptor } => {
                    self.get_temporary(*id, descriptor, screen)?
                }
                Command::ReleaseTemporary { id } => self.release_temporary(*id)?,
                Command::SetRenderTarget { target } => {
                    active = self.resolve(*target, camera_target)?;
                }
                Command::Blit {
                    source,
                    destination,
                    material,
                } => {
                    let source = self.resolve(*source, camera_target)?;
                    let destination = self.resolve(*destination, camera_target)?;
                    self.blit(source, destination, material.as_ref())?;
                }
            }
        }
        Ok(())
    }

    /// Return every temporary still acquired to the pool.
    fn reclaim_temporaries(&mut self) {
        let outstanding: Vec<PropertyId> = self.temporaries.keys().copied().collect();
        for id in outstanding {
            if let Err(e) = self.release_temporary(id) {
                log::error!("CpuBackend: could not reclaim temporary {:?}: {}", id, e);
            }
        }
    }

    fn release_temporary(&mut self, id: PropertyId) -> BackendResult<()> {
        let handle = self
            .temporaries
            .remove(&id)
            .ok_or(BackendError::UnknownTemporary(id))?;
        // Globals must not outlive the frame they were published for
        self.globals.retain(|_, &mut h| h != handle);

        let texture = self
            .textures
            .get(&handle)
            .ok_or(BackendError::UnknownTexture(handle))?;
        let key = PoolKey {
            size: texture.size(),
            format: texture.format,
            filter: texture.filter,
            depth_bits: texture.depth_bits,
        };
        self.pool.push((key, handle));
        Ok(())
    }

    fn clear(&mut self, target: TextureHandle, color: [f32; 4]) -> BackendResult<()> {
        let texture = self
            .textures
            .get_mut(&target)
            .ok_or(BackendError::UnknownTexture(target))?;
        let pixel = texture.store(color);
        texture.image.pixels_mut().for_each(|p| *p = pixel);
        Ok(())
    }

    fn blit(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
        material: Option<&Material>,
    ) -> BackendResult<()> {
        let kernel = material.map(|m| self.kernel(&m.shader)).transpose()?;
        let uniform = material.map(|m| m.uniform.as_slice()).unwrap_or(&[]);

        let src = self
            .textures
            .get(&source)
            .ok_or(BackendError::UnknownTexture(source))?;
        let dst = self
            .textures
            .get(&destination)
            .ok_or(BackendError::UnknownTexture(destination))?;

        let size = dst.size();
        let mut output = Rgba32FImage::new(size.0, size.1);
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let uv = pixel_uv(x, y, size);
            let color = src.fetch(x, y, size, uv);
            let color = match &kernel {
                Some(kernel) => kernel(&Fragment {
                    x,
                    y,
                    uv,
                    color,
                    uniform,
                    globals: &self.globals,
                    textures: &self.textures,
                }),
                None => color,
            };
            *pixel = dst.store(color);
        }

        if let Some(dst) = self.textures.get_mut(&destination) {
            dst.image = output;
        }
        self.stats.blits += 1;
        Ok(())
    }
}

fn pixel_uv(x: u32, y: u32, size: (u32, u32)) -> Vec2 {
    Vec2::new(
        (x as f32 + 0.5) / size.0 as f32,
        (y as f32 + 0.5) / size.1 as f32,
    )
}

impl GraphicsBackend for CpuBackend {
    fn name(&self) -> &str {
        "Cpu"
    }

    fn create_render_texture(
        &mut self,
        desc: &RenderTextureDescriptor,
    ) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has zero size {}x{}",
                desc.label, desc.width, desc.height
            )));
        }
        if desc.format.is_depth() {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: depth formats cannot be color targets",
                desc.label
            )));
        }

        let depth_bits = desc.depth_bits.min(MAX_DEPTH_BITS);
        if depth_bits != desc.depth_bits {
            log::debug!(
                "CpuBackend: {:?} requested {} depth bits, granted {}",
                desc.label,
                desc.depth_bits,
                depth_bits
            );
        }

        let mut texture = CpuTexture::new(desc.label.clone(), desc.width, desc.height, desc.format);
        texture.filter = desc.filter;
        texture.depth_bits = depth_bits;
        let handle = self.allocate(texture);
        log::trace!(
            "CpuBackend: creating texture {:?} ({}x{}) -> {:?}",
            desc.label,
            desc.width,
            desc.height,
            handle
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.stats.textures_destroyed += 1;
            self.globals.retain(|_, &mut h| h != texture);
        }
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(CpuTexture::size)
    }

    fn find_shader(&self, name: &str) -> Option<ShaderHandle> {
        self.shaders.get(name).copied()
    }

    fn render_with_shader(
        &mut self,
        camera: &CameraView,
        target: TextureHandle,
        shader: ShaderHandle,
        replacement_tag: &str,
    ) -> BackendResult<()> {
        let kernel = self
            .kernels
            .get(&shader)
            .cloned()
            .ok_or_else(|| BackendError::ShaderNotFound(format!("{shader:?}")))?;

        if let ClearFlags::SolidColor(color) = camera.clear {
            self.clear(target, color.to_array())?;
        }

        let texture = self
            .textures
            .get(&target)
            .ok_or(BackendError::UnknownTexture(target))?;
        let size = texture.size();
        let mut output = Rgba32FImage::new(size.0, size.1);
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let uv = pixel_uv(x, y, size);
            let color = kernel(&Fragment {
                x,
                y,
                uv,
                color: texture.image.get_pixel(x, y).0,
                uniform: &[],
                globals: &self.globals,
                textures: &self.textures,
            });
            *pixel = texture.store(color);
        }

        if let Some(texture) = self.textures.get_mut(&target) {
            texture.image = output;
        }

        log::trace!(
            "CpuBackend: camera {:?} rendered into {:?} with {:?} (tag `{}`)",
            camera.entity,
            target,
            shader,
            replacement_tag
        );
        self.stats.camera_renders += 1;
        self.events.push(BackendEvent::CameraRender {
            camera: camera.entity,
            target,
            shader,
            replacement_tag: replacement_tag.to_string(),
        });
        Ok(())
    }

    fn execute(
        &mut self,
        commands: &CommandStream,
        camera_target: TextureHandle,
    ) -> BackendResult<()> {
        let screen = self
            .texture_size(camera_target)
            .ok_or(BackendError::UnknownTexture(camera_target))?;

        log::trace!(
            "CpuBackend: executing `{}` with {} commands",
            commands.label(),
            commands.len()
        );

        let result = self.run_commands(commands, camera_target, screen);

        // Temporaries never outlive the submission, even a failed one
        if !self.temporaries.is_empty() {
            if result.is_ok() {
                log::warn!(
                    "CpuBackend: `{}` left {} temporaries acquired; releasing",
                    commands.label(),
                    self.temporaries.len()
                );
            }
            self.reclaim_temporaries();
        }
        result?;

        self.stats.submissions += 1;
        self.events.push(BackendEvent::Execute {
            label: commands.label().to_string(),
            commands: commands.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::ScratchTarget;

    fn solid(width: u32, height: u32, color: [f32; 4]) -> Rgba32FImage {
        Rgba32FImage::from_pixel(width, height, Rgba(color))
    }

    fn frame_buffer(backend: &mut CpuBackend, width: u32, height: u32) -> TextureHandle {
        backend
            .create_render_texture(&RenderTextureDescriptor::new(width, height, 24))
            .unwrap()
    }

    #[test]
    fn depth_request_is_clamped() {
        let mut backend = CpuBackend::new();
        let handle = backend
            .create_render_texture(&RenderTextureDescriptor::new(8, 8, 512))
            .unwrap();
        assert_eq!(backend.depth_bits(handle), Some(32));
        assert_eq!(backend.texture_size(handle), Some((8, 8)));
    }

    #[test]
    fn zero_sized_texture_fails() {
        let mut backend = CpuBackend::new();
        let result = backend.create_render_texture(&RenderTextureDescriptor::new(0, 8, 0));
        assert!(matches!(result, Err(BackendError::TextureCreationFailed(_))));
    }

    #[test]
    fn blit_through_material() {
        let mut backend = CpuBackend::new();
        backend.register_shader("Scale", |f: &Fragment<'_>| {
            let k = f.uniform::<f32>().unwrap_or(1.0);
            [f.color[0] * k, f.color[1] * k, f.color[2] * k, f.color[3]]
        });
        let target = frame_buffer(&mut backend, 4, 4);
        backend.write_image(target, &solid(4, 4, [0.5, 0.5, 0.5, 1.0])).unwrap();

        let mut commands = CommandStream::new("test");
        commands.blit_with_material(
            RenderTargetId::CameraTarget,
            RenderTargetId::CameraTarget,
            Material::new("Scale").with_uniform(&0.5f32),
        );
        backend.execute(&commands, target).unwrap();

        assert_eq!(backend.read_image(target).unwrap().get_pixel(1, 2).0, [0.25, 0.25, 0.25, 1.0]);
    }

    #[test]
    fn unknown_material_shader() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 2, 2);
        let mut commands = CommandStream::new("test");
        commands.blit_with_material(
            RenderTargetId::CameraTarget,
            RenderTargetId::CameraTarget,
            Material::new("Missing"),
        );
        assert_eq!(
            backend.execute(&commands, target),
            Err(BackendError::ShaderNotFound("Missing".into()))
        );
    }

    #[test]
    fn unorm_targets_clamp() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 2, 2);
        let mut commands = CommandStream::new("test");
        commands.clear_render_target([2.0, -1.0, 0.5, 1.0]);
        backend.execute(&commands, target).unwrap();
        assert_eq!(backend.read_image(target).unwrap().get_pixel(0, 0).0, [1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn temporaries_follow_screen_size_and_are_reused() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 16, 8);
        let scratch = ScratchTarget::default();

        let mut commands = CommandStream::new("test");
        let lease = scratch.acquire(&mut commands);
        commands.set_render_target(lease.target());
        scratch.release(&mut commands, lease);

        backend.execute(&commands, target).unwrap();
        backend.execute(&commands, target).unwrap();

        let stats = backend.stats();
        assert_eq!(stats.temporaries_allocated, 1);
        assert_eq!(stats.temporaries_reused, 1);
        assert_eq!(backend.live_temporaries(), 0);
        assert_eq!(backend.pooled_temporaries(), 1);
    }

    #[test]
    fn failed_submission_reclaims_temporaries() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 4, 4);
        let scratch = ScratchTarget::default();

        let mut failing = CommandStream::new("failing");
        let lease = scratch.acquire(&mut failing);
        failing.blit_with_material(
            RenderTargetId::CameraTarget,
            lease.target(),
            Material::new("Missing"),
        );
        scratch.release(&mut failing, lease);

        assert_eq!(
            backend.execute(&failing, target),
            Err(BackendError::ShaderNotFound("Missing".into()))
        );
        assert_eq!(backend.live_temporaries(), 0);
        assert_eq!(backend.stats().submissions, 0);
        assert!(backend.events().is_empty());

        let mut commands = CommandStream::new("next");
        let lease = scratch.acquire(&mut commands);
        scratch.release(&mut commands, lease);
        backend.execute(&commands, target).unwrap();
        assert_eq!(backend.stats().temporaries_reused, 1);
        assert_eq!(backend.stats().submissions, 1);
    }

    #[test]
    fn resize_evicts_stale_temporaries() {
        let mut backend = CpuBackend::new();
        let large = frame_buffer(&mut backend, 16, 8);
        let small = frame_buffer(&mut backend, 8, 4);
        let scratch = ScratchTarget::default();

        let mut commands = CommandStream::new("test");
        let lease = scratch.acquire(&mut commands);
        scratch.release(&mut commands, lease);

        backend.execute(&commands, large).unwrap();
        backend.execute(&commands, small).unwrap();
        backend.execute(&commands, small).unwrap();

        let stats = backend.stats();
        assert_eq!(stats.temporaries_allocated, 2);
        assert_eq!(stats.temporaries_reused, 1);
        assert_eq!(stats.textures_destroyed, 1);
        assert_eq!(backend.pooled_temporaries(), 1);
    }

    #[test]
    fn absolute_temporaries_survive_resize() {
        let mut backend = CpuBackend::new();
        let large = frame_buffer(&mut backend, 16, 8);
        let small = frame_buffer(&mut backend, 8, 4);
        let id = PropertyId::from_name("_Fixed");
        let descriptor = TemporaryDescriptor {
            size: TextureSize::Absolute {
                width: 4,
                height: 4,
            },
            ..TemporaryDescriptor::default()
        };

        let mut commands = CommandStream::new("test");
        commands.get_temporary(id, descriptor);
        commands.release_temporary(id);

        backend.execute(&commands, large).unwrap();
        backend.execute(&commands, small).unwrap();

        assert_eq!(backend.stats().temporaries_allocated, 1);
        assert_eq!(backend.stats().temporaries_reused, 1);
        assert_eq!(backend.stats().textures_destroyed, 0);
    }

    #[test]
    fn double_acquire_is_rejected() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 2, 2);
        let id = PropertyId::from_name("_Tmp");
        let mut commands = CommandStream::new("test");
        commands.get_temporary(id, TemporaryDescriptor::default());
        commands.get_temporary(id, TemporaryDescriptor::default());
        assert_eq!(
            backend.execute(&commands, target),
            Err(BackendError::TemporaryAlreadyAcquired(id))
        );
    }

    #[test]
    fn release_without_acquire_is_rejected() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 2, 2);
        let id = PropertyId::from_name("_Tmp");
        let mut commands = CommandStream::new("test");
        commands.release_temporary(id);
        assert_eq!(
            backend.execute(&commands, target),
            Err(BackendError::UnknownTemporary(id))
        );
    }

    #[test]
    fn leaked_temporaries_are_reclaimed() {
        let mut backend = CpuBackend::new();
        let target = frame_buffer(&mut backend, 2, 2);
        let mut commands = CommandStream::new("test");
        commands.get_temporary(PropertyId::from_name("_Tmp"), TemporaryDescriptor::default());
        backend.execute(&commands, target).unwrap();
        assert_eq!(backend.live_temporaries(), 0);
        assert_eq!(backend.pooled_temporaries(), 1);
    }

    #[test]
    fn globals_are_visible_to_kernels() {
        let mut backend = CpuBackend::new();
        backend.register_shader("Mask", |f: &Fragment<'_>| {
            f.sample_global("_Mask").unwrap_or([9.0; 4])
        });
        let target = frame_buffer(&mut backend, 2, 2);
        let mask = frame_buffer(&mut backend, 2, 2);
        backend.write_image(mask, &solid(2, 2, [0.25, 0.5, 0.75, 1.0])).unwrap();

        let mut commands = CommandStream::new("test");
        commands.set_global_texture("_Mask", RenderTargetId::Texture(mask));
        commands.blit_with_material(
            RenderTargetId::CameraTarget,
            RenderTargetId::CameraTarget,
            Material::new("Mask"),
        );
        backend.execute(&commands, target).unwrap();

        assert_eq!(backend.global_texture("_Mask"), Some(mask));
        assert_eq!(backend.read_image(target).unwrap().get_pixel(1, 1).0, [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn destroyed_texture_is_gone() {
        let mut backend = CpuBackend::new();
        let handle = frame_buffer(&mut backend, 2, 2);
        backend.destroy_texture(handle);
        backend.destroy_texture(handle);
        assert_eq!(backend.texture_size(handle), None);
        assert_eq!(backend.stats().textures_destroyed, 1);
    }
}
