//! Scene management
//!
//! Cameras live as components in a `bevy_ecs` [`World`](bevy_ecs::world::World);
//! the hierarchy helpers here give the shadow camera a parent to follow.

mod camera;
mod transform;

pub use camera::*;
pub use transform::*;
