//! Yetty Render - WebGPU plumbing for the terminal
//!
//! This crate provides:
//! - Graphics context management (instance, adapter, device, queue)
//! - Window surface configuration and per-frame texture acquisition
//! - A blit renderer for compositing offscreen widget textures
//! - Texture upload helpers and shader source loading
//! - The shared color type

mod blit;
mod color;
mod context;
mod shader;
mod surface;

pub use blit::*;
pub use color::*;
pub use context::*;
pub use shader::*;
pub use surface::*;

// Re-export wgpu so downstream crates share a single version
pub use wgpu;
