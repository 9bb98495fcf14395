//! Screen-space shadow composite
//!
//! Darkens the frame by the published shadow mask, scaled by the pipeline
//! density. Without a mask this frame the stage is a plain copy.

use crate::backend::Fragment;
use crate::pipeline::stage::{PostProcessStage, PostProcessUniform, StageContext, StageError};
use crate::render_graph::{CommandStream, Material, RenderTargetId, SHADOW_TEXTURE_GLOBAL};
use crate::scene::CameraView;

pub const SHADOW_COMPOSITE_SHADER: &str = "PostProcess/ShadowComposite";

#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowCompositeStage;

impl ShadowCompositeStage {
    pub fn new() -> Self {
        Self
    }
}

impl PostProcessStage for ShadowCompositeStage {
    fn name(&self) -> &str {
        "ShadowComposite"
    }

    fn process(
        &self,
        ctx: &StageContext<'_>,
        commands: &mut CommandStream,
        _camera: &CameraView,
        source: RenderTargetId,
        destination: RenderTargetId,
    ) -> Result<(), StageError> {
        if ctx.shadow_texture.is_none() {
            log::trace!("No shadow mask this frame, copying through");
            commands.blit(source, destination);
            return Ok(());
        }

        commands.blit_with_material(
            source,
            destination,
            Material::new(SHADOW_COMPOSITE_SHADER).with_uniform(&ctx.uniform()),
        );
        Ok(())
    }
}

/// Reference kernel for [`SHADOW_COMPOSITE_SHADER`]
pub fn shadow_composite_kernel(fragment: &Fragment<'_>) -> [f32; 4] {
    let density = fragment
        .uniform::<PostProcessUniform>()
        .map_or(0.0, |u| u.density.clamp(0.0, 1.0));
    // White mask = lit
    let lit = fragment
        .sample_global(SHADOW_TEXTURE_GLOBAL)
        .map_or(1.0, |mask| mask[0]);
    let k = 1.0 - density * (1.0 - lit);

    let [r, g, b, a] = fragment.color;
    [r * k, g * k, b * k, a]
}

/// Reference kernel for the screen-space shadow override shader.
///
/// The reference backend has no scene geometry, so every pixel keeps the
/// camera's clear color (fully lit).
pub fn screen_space_shadow_kernel(fragment: &Fragment<'_>) -> [f32; 4] {
    fragment.color
}
