//! Camera component and per-frame camera snapshots

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::world::World;
use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};

use crate::backend::TextureHandle;
use crate::scene::transform::world_matrix;

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_3,
            aspect: 16.0 / 9.0,
            near: 0.3,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Projection::Orthographic {
            left: -half_w,
            right: half_w,
            bottom: -half_h,
            top: half_h,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(*fov_y, *aspect, *near, *far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(*left, *right, *bottom, *top, *near, *far),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }
}

/// How a camera clears its target before rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearFlags {
    SolidColor(Vec4),
    DepthOnly,
    Nothing,
}

impl Default for ClearFlags {
    fn default() -> Self {
        ClearFlags::SolidColor(Vec4::new(0.19, 0.3, 0.47, 1.0))
    }
}

bitflags! {
    /// Auxiliary textures a camera generates while rendering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DepthTextureMode: u32 {
        const DEPTH = 1 << 0;
        const DEPTH_NORMALS = 1 << 1;
        const MOTION_VECTORS = 1 << 2;
    }
}

/// Culling mask value that renders every layer.
pub const ALL_LAYERS: u32 = !0;

/// Camera component. The pose comes from the entity's world transform.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub culling_mask: u32,
    pub clear: ClearFlags,
    /// Disabled cameras are not rendered automatically and must be driven manually.
    pub enabled: bool,
    pub depth_texture_mode: DepthTextureMode,
    /// Offscreen target; `None` renders to the surface.
    pub target_texture: Option<TextureHandle>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            pixel_width: 1280,
            pixel_height: 720,
            culling_mask: ALL_LAYERS,
            clear: ClearFlags::default(),
            enabled: true,
            depth_texture_mode: DepthTextureMode::empty(),
            target_texture: None,
        }
    }
}

impl Camera {
    pub fn new(projection: Projection, pixel_width: u32, pixel_height: u32) -> Self {
        Self {
            projection,
            pixel_width,
            pixel_height,
            ..Default::default()
        }
    }

    pub fn near(&self) -> f32 {
        self.projection.near()
    }

    pub fn far(&self) -> f32 {
        self.projection.far()
    }

    /// Copy every camera parameter from `other`.
    pub fn copy_from(&mut self, other: &Camera) {
        *self = other.clone();
    }

    /// Resize the pixel viewport, keeping the aspect ratio in step
    pub fn set_pixel_size(&mut self, width: u32, height: u32) {
        self.pixel_width = width;
        self.pixel_height = height;
        if height > 0 {
            self.projection.set_aspect(width as f32 / height as f32);
        }
    }
}

/// Snapshot of a camera ready for rendering.
///
/// Extracted once per frame so stages and backends never touch the ECS.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraView {
    pub entity: Entity,
    /// View matrix (inverse of the camera's world transform).
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    /// Pixel size (width, height).
    pub pixel_size: (u32, u32),
    pub culling_mask: u32,
    pub clear: ClearFlags,
    pub depth_texture_mode: DepthTextureMode,
}

impl CameraView {
    /// Extract the view of `entity`, or `None` if it has no [`Camera`].
    pub fn extract(world: &World, entity: Entity) -> Option<Self> {
        let camera = world.get::<Camera>(entity)?;
        let world_matrix = world_matrix(world, entity)?;
        let view_matrix = world_matrix.inverse();
        let projection_matrix = camera.projection.matrix();

        Some(Self {
            entity,
            view_matrix,
            projection_matrix,
            view_projection: projection_matrix * view_matrix,
            position: world_matrix.w_axis.truncate(),
            near: camera.near(),
            far: camera.far(),
            pixel_size: (camera.pixel_width, camera.pixel_height),
            culling_mask: camera.culling_mask,
            clear: camera.clear,
            depth_texture_mode: camera.depth_texture_mode,
        })
    }

    /// Near/far are usable for depth reconstruction.
    pub fn has_valid_clip_planes(&self) -> bool {
        self.near > 0.0 && self.near < self.far
    }
}
