//! Utility helpers: generational arena, math extensions and step profiling.

pub mod allocator;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, GenerationalId, ProxyId};
pub use math::*;
