//! Stage chain executor
//!
//! Records the whole post-processing chain into one command stream:
//!
//! 1. publish the shadow texture as a global input
//! 2. acquire the scratch target
//! 3. per stage: copy the frame buffer into scratch, bind the frame buffer,
//!    let the stage render scratch -> frame buffer
//! 4. release the scratch target
//!
//! Every stage fully overwrites the frame buffer and the next iteration
//! captures it again, so one transient buffer is enough.

use std::sync::Arc;

use crate::pipeline::stage::{PostProcessStage, StageContext, StageError};
use crate::render_graph::command::{CommandStream, RenderTargetId};
use crate::render_graph::scratch::ScratchTarget;
use crate::scene::CameraView;

/// Global shader name the shadow mask is published under.
pub const SHADOW_TEXTURE_GLOBAL: &str = "_ScreenSpaceShadow";

/// A stage failed while recording; the rest of the chain was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub index: usize,
    pub stage: String,
    pub error: StageError,
}

/// Records the ordered stage chain for one camera
#[derive(Debug, Clone, Default)]
pub struct StageChainExecutor {
    scratch: ScratchTarget,
}

impl StageChainExecutor {
    pub fn new(scratch: ScratchTarget) -> Self {
        Self { scratch }
    }

    pub fn scratch(&self) -> &ScratchTarget {
        &self.scratch
    }

    /// Append one frame's chain to `commands`.
    ///
    /// Returns the number of stages recorded. On failure the stream holds the
    /// partial recording and must not be submitted.
    pub fn record_frame(
        &self,
        commands: &mut CommandStream,
        camera: &CameraView,
        stages: &[Arc<dyn PostProcessStage>],
        ctx: &StageContext<'_>,
    ) -> Result<usize, StageFailure> {
        if let Some(shadow) = ctx.shadow_texture {
            commands.set_global_texture(SHADOW_TEXTURE_GLOBAL, shadow);
        }

        let lease = self.scratch.acquire(commands);
        let source = lease.target();
        let destination = RenderTargetId::CameraTarget;
        debug_assert_ne!(source, destination);

        for (index, stage) in stages.iter().enumerate() {
            commands.set_render_target(source);
            commands.blit(destination, source);

            commands.set_render_target(destination);
            log::trace!("Recording stage {} `{}`", index, stage.name());
            stage
                .process(ctx, commands, camera, source, destination)
                .map_err(|error| StageFailure {
                    index,
                    stage: stage.name().to_string(),
                    error,
                })?;
        }

        self.scratch.release(commands, lease);
        Ok(stages.len())
    }
}
