//! Scratch target allocation
//!
//! One transient, full-resolution color buffer per frame. Acquiring hands out
//! a [`ScratchLease`] that must be given back to [`ScratchTarget::release`],
//! so a recorded frame cannot acquire twice or forget the release.

use crate::backend::types::{FilterMode, TemporaryDescriptor, TextureFormat, TextureSize};
use crate::render_graph::command::{CommandStream, PropertyId, RenderTargetId};

/// Property name the scratch image is registered under.
pub const SCRATCH_TARGET_NAME: &str = "_ScreenImage";

/// Outstanding acquisition of the scratch target for the frame being recorded.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "the scratch target must be released before the frame is submitted"]
pub struct ScratchLease {
    id: PropertyId,
}

impl ScratchLease {
    /// Render target to bind or sample
    pub fn target(&self) -> RenderTargetId {
        RenderTargetId::Temporary(self.id)
    }
}

/// Allocator for the per-frame scratch buffer
#[derive(Debug, Clone)]
pub struct ScratchTarget {
    id: PropertyId,
    descriptor: TemporaryDescriptor,
}

impl Default for ScratchTarget {
    fn default() -> Self {
        Self::new(SCRATCH_TARGET_NAME, TextureFormat::Rgba32Float)
    }
}

impl ScratchTarget {
    /// Full-screen, bilinear, color-only target of the given format
    pub fn new(name: &str, format: TextureFormat) -> Self {
        Self {
            id: PropertyId::from_name(name),
            descriptor: TemporaryDescriptor {
                size: TextureSize::FULL_SCREEN,
                depth_bits: 0,
                filter: FilterMode::Bilinear,
                format,
            },
        }
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn descriptor(&self) -> &TemporaryDescriptor {
        &self.descriptor
    }

    /// Record the acquisition of the scratch target
    pub fn acquire(&self, commands: &mut CommandStream) -> ScratchLease {
        commands.get_temporary(self.id, self.descriptor);
        ScratchLease { id: self.id }
    }

    /// Record the release, returning the target to the backend's pool
    pub fn release(&self, commands: &mut CommandStream, lease: ScratchLease) {
        debug_assert_eq!(lease.id, self.id, "lease belongs to another scratch target");
        commands.release_temporary(lease.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::command::Command;

    #[test]
    fn acquire_release_pair() {
        let scratch = ScratchTarget::default();
        let mut commands = CommandStream::new("test");

        let lease = scratch.acquire(&mut commands);
        assert_eq!(lease.target(), RenderTargetId::Temporary(scratch.id()));
        scratch.release(&mut commands, lease);

        assert_eq!(
            commands.commands(),
            &[
                Command::GetTemporary {
                    id: scratch.id(),
                    descriptor: *scratch.descriptor(),
                },
                Command::ReleaseTemporary { id: scratch.id() },
            ]
        );
    }

    #[test]
    fn default_is_high_precision_full_screen() {
        let scratch = ScratchTarget::default();
        assert_eq!(scratch.id(), PropertyId::from_name(SCRATCH_TARGET_NAME));
        assert_eq!(scratch.descriptor().format, TextureFormat::Rgba32Float);
        assert_eq!(scratch.descriptor().filter, FilterMode::Bilinear);
        assert_eq!(scratch.descriptor().size, TextureSize::FULL_SCREEN);
        assert_eq!(scratch.descriptor().depth_bits, 0);
    }
}
