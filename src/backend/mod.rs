//! Backend abstraction layer
//!
//! Provides the device trait the post-processing core records against and a
//! CPU reference implementation.

pub mod cpu;
pub mod traits;
pub mod types;

pub use cpu::*;
pub use traits::*;
pub use types::*;
