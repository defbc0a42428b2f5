//! ALBRT Overlay Library
//!
//! Mask rendering and compositor overlay management for the two eye overlays.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    bridge                           │
//! │                 OverlayBridge                       │
//! │   (create/destroy, visibility, textures, alpha)     │
//! ├─────────────────────────────────────────────────────┤
//! │                    renderer                         │
//! │           Renderer<G: GpuBackend>                   │
//! │     (offscreen target, coalesced redraws)           │
//! ├─────────────────────────────────────────────────────┤
//! │                    mask                             │
//! │        PATCH / SLAT rasterisation kernel            │
//! ├─────────────────────────────────────────────────────┤
//! │                    gpu/                             │
//! │        GpuBackend trait, SoftwareBackend            │
//! │                 (tiny-skia)                         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod gpu;
pub mod mask;
pub mod renderer;
mod utils;

// Re-export commonly used types
pub use bridge::OverlayBridge;
pub use gpu::{GpuBackend, GpuError, SoftwareBackend};
pub use renderer::{EyeTextures, MaskUniforms, RenderError, Renderer, RendererConfig};
