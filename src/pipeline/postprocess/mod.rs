//! Post-processing effects

mod shadow_composite;
mod tonemapping;

pub use shadow_composite::{
    screen_space_shadow_kernel, shadow_composite_kernel, ShadowCompositeStage,
    SHADOW_COMPOSITE_SHADER,
};
pub use tonemapping::{
    tonemap_kernel, TonemapOperator, TonemapParams, TonemappingStage, TONEMAPPING_SHADER,
};

use crate::backend::CpuBackend;
use crate::pipeline::shadow::SCREEN_SPACE_SHADOW_SHADER;

/// Register the reference kernels for every built-in shader
pub fn register_builtin_shaders(backend: &mut CpuBackend) {
    backend.register_shader(SCREEN_SPACE_SHADOW_SHADER, screen_space_shadow_kernel);
    backend.register_shader(TONEMAPPING_SHADER, tonemap_kernel);
    backend.register_shader(SHADOW_COMPOSITE_SHADER, shadow_composite_kernel);
}
