//! Render graph (lite)
//!
//! A single command stream per camera per frame. Stage order is decided by
//! the caller; there is no dependency resolution or resource aliasing beyond
//! the one scratch target.

pub mod command;
pub mod executor;
pub mod scratch;

pub use command::*;
pub use executor::*;
pub use scratch::*;
