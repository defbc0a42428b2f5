//! GPU backend abstraction
//!
//! This module defines the trait a rendering backend must implement so the
//! [`Renderer`](crate::renderer::Renderer) can stay backend-agnostic. The
//! surface is the small slice of a GL-style API the mask renderer needs:
//! a hidden context, one program, two RGBA8 textures and a framebuffer.

pub mod software;

use std::path::{Path, PathBuf};

use albrt_core::vr::RawImage;
use thiserror::Error;

pub use software::SoftwareBackend;

/// Stereo-wide texture resolution
pub const DEFAULT_TEXTURE_WIDTH: u32 = 4096;
pub const DEFAULT_TEXTURE_HEIGHT: u32 = 2048;

/// Program used for the PATCH and SLAT masks
pub const OVERLAYS_2D_PROGRAM: &str = "Overlays2D";

/// Hidden context (window) creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
}

impl ContextConfig {
    pub fn hidden(width: u32, height: u32) -> Self {
        Self {
            title: "ALBRT Overlay Renderer".to_string(),
            width,
            height,
            visible: false,
        }
    }
}

/// Shader program sources, resolved relative to a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub name: String,
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ProgramSource {
    /// `<base>/Shaders/<name>.vert` and `<base>/Shaders/<name>.frag`
    pub fn in_shader_dir(base: &Path, name: &str) -> Self {
        let dir = base.join("Shaders");
        Self {
            name: name.to_string(),
            vertex: dir.join(format!("{name}.vert")),
            fragment: dir.join(format!("{name}.frag")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
}

/// Errors reported by a GPU backend
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create GPU context: {0}")]
    Context(String),

    #[error("no GPU context")]
    NoContext,

    #[error("failed to compile program '{name}': {reason}")]
    Shader { name: String, reason: String },

    #[error("failed to allocate {width}x{height} texture")]
    Texture { width: u32, height: u32 },

    #[error("framebuffer incomplete: {0}")]
    Framebuffer(String),

    #[error("unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: u32 },

    #[error("no program in use")]
    NoProgram,

    #[error("no framebuffer bound")]
    NoFramebuffer,
}

/// Trait that all GPU backends must implement
pub trait GpuBackend {
    /// Create the (hidden) rendering context
    fn create_context(&mut self, config: &ContextConfig) -> Result<(), GpuError>;

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId, GpuError>;

    /// Allocate an RGBA8 texture (linear filtering, clamp-to-edge)
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GpuError>;

    /// Framebuffer with the given colour attachments, in order, plus an
    /// optional depth attachment
    fn create_framebuffer(
        &mut self,
        colour: &[TextureId],
        depth: bool,
    ) -> Result<FramebufferId, GpuError>;

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GpuError>;

    /// Clear every colour attachment of the bound framebuffer
    fn clear(&mut self, rgba: [f32; 4]) -> Result<(), GpuError>;

    fn use_program(&mut self, program: ProgramId) -> Result<(), GpuError>;

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), GpuError>;

    /// One full-viewport draw with the program in use
    fn draw_fullscreen(&mut self) -> Result<(), GpuError>;

    fn swap_buffers(&mut self);

    /// Handle the compositor can sample from
    fn native_handle(&self, texture: TextureId) -> Option<u64>;

    /// CPU-side pixels of a texture, for backends that keep them
    fn texture_image(&self, _texture: TextureId) -> Option<RawImage<'_>> {
        None
    }

    /// Tear down the context and everything allocated in it
    fn destroy(&mut self);
}
