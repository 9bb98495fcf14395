//! Common types shared between backends

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// High-precision formats keep values outside [0, 1] intact
    pub fn is_float(&self) -> bool {
        matches!(self, TextureFormat::Rgba16Float | TextureFormat::Rgba32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

/// Filter mode for sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Bilinear,
}

/// Describes texture dimensions that can be relative to the camera target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSize {
    /// Absolute size in pixels
    Absolute { width: u32, height: u32 },
    /// Relative to the camera target size (1.0 = full screen)
    Relative { width_scale: f32, height_scale: f32 },
}

impl Default for TextureSize {
    fn default() -> Self {
        TextureSize::Relative {
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }
}

impl TextureSize {
    /// Full camera-target resolution, tracking resizes.
    pub const FULL_SCREEN: Self = TextureSize::Relative {
        width_scale: 1.0,
        height_scale: 1.0,
    };

    pub fn resolve(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        match self {
            TextureSize::Absolute { width, height } => (*width, *height),
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => (
                (((screen_width as f32) * width_scale) as u32).max(1),
                (((screen_height as f32) * height_scale) as u32).max(1),
            ),
        }
    }
}

/// Descriptor for a persistent offscreen color+depth target
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Requested depth precision in bits; backends clamp to what they support.
    pub depth_bits: u32,
    pub format: TextureFormat,
    pub filter: FilterMode,
}

impl Default for RenderTextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            depth_bits: 0,
            format: TextureFormat::Rgba8Unorm,
            filter: FilterMode::Bilinear,
        }
    }
}

impl RenderTextureDescriptor {
    pub fn new(width: u32, height: u32, depth_bits: u32) -> Self {
        Self {
            width,
            height,
            depth_bits,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }
}

/// Descriptor for a frame-lifetime transient target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporaryDescriptor {
    pub size: TextureSize,
    pub depth_bits: u32,
    pub filter: FilterMode,
    pub format: TextureFormat,
}

impl Default for TemporaryDescriptor {
    fn default() -> Self {
        Self {
            size: TextureSize::FULL_SCREEN,
            depth_bits: 0,
            filter: FilterMode::Bilinear,
            format: TextureFormat::Rgba32Float,
        }
    }
}
