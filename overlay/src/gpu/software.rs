//! Software GPU backend using tiny-skia
//!
//! Textures are CPU pixmaps and the 2D program is the kernel in
//! [`crate::mask`]. Nothing is presented on screen, which makes this backend
//! suitable for headless runs, tests and PNG export.

use std::collections::HashMap;
use std::path::Path;

use albrt_core::vr::RawImage;
use tiny_skia::{Color, Pixmap};
use tracing::debug;

use super::{
    ContextConfig, FramebufferId, GpuBackend, GpuError, OVERLAYS_2D_PROGRAM, ProgramId,
    ProgramSource, TextureId, UniformValue,
};
use crate::mask::{self, MaskParams, Target};

/// Offset applied to texture ids to form native handles (0 is never valid)
const NATIVE_HANDLE_BASE: u64 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kernel {
    Mask2D,
}

struct Framebuffer {
    colour: Vec<TextureId>,
    depth: bool,
}

#[derive(Default)]
pub struct SoftwareBackend {
    context: Option<ContextConfig>,
    programs: Vec<Kernel>,
    textures: Vec<Pixmap>,
    framebuffers: Vec<Framebuffer>,
    bound: Option<FramebufferId>,
    current_program: Option<ProgramId>,
    uniforms: HashMap<String, UniformValue>,
    draw_calls: u64,
    swaps: u64,
    fail_context: bool,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose context creation always fails
    pub fn failing() -> Self {
        Self {
            fail_context: true,
            ..Self::default()
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    pub fn framebuffer_has_depth(&self, id: FramebufferId) -> Option<bool> {
        self.framebuffers.get(id.0 as usize).map(|fb| fb.depth)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Pixmap> {
        self.textures.get(id.0 as usize)
    }

    /// Texture for a native handle previously returned by `native_handle`
    pub fn texture_by_handle(&self, handle: u64) -> Option<&Pixmap> {
        let index = handle.checked_sub(NATIVE_HANDLE_BASE)?;
        self.textures.get(usize::try_from(index).ok()?)
    }

    pub fn save_png(&self, handle: u64, path: &Path) -> Result<(), GpuError> {
        let pixmap = self.texture_by_handle(handle).ok_or(GpuError::UnknownId {
            kind: "texture",
            id: handle as u32,
        })?;
        pixmap
            .save_png(path)
            .map_err(|e| GpuError::Context(format!("png export to {}: {e}", path.display())))
    }

    fn require_context(&self) -> Result<(), GpuError> {
        if self.context.is_none() {
            return Err(GpuError::NoContext);
        }
        Ok(())
    }

    fn bound_framebuffer(&self) -> Result<&Framebuffer, GpuError> {
        let id = self.bound.ok_or(GpuError::NoFramebuffer)?;
        self.framebuffers
            .get(id.0 as usize)
            .ok_or(GpuError::UnknownId {
                kind: "framebuffer",
                id: id.0,
            })
    }
}

impl GpuBackend for SoftwareBackend {
    fn create_context(&mut self, config: &ContextConfig) -> Result<(), GpuError> {
        if self.fail_context {
            return Err(GpuError::Context("no GPU device available".to_string()));
        }
        if config.width == 0 || config.height == 0 {
            return Err(GpuError::Context(format!(
                "invalid size {}x{}",
                config.width, config.height
            )));
        }
        debug!(width = config.width, height = config.height, "software context created");
        self.context = Some(config.clone());
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId, GpuError> {
        self.require_context()?;
        let kernel = match source.name.as_str() {
            OVERLAYS_2D_PROGRAM => Kernel::Mask2D,
            other => {
                return Err(GpuError::Shader {
                    name: other.to_string(),
                    reason: "no software kernel for this program".to_string(),
                });
            }
        };
        self.programs.push(kernel);
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GpuError> {
        self.require_context()?;
        let pixmap = Pixmap::new(width, height).ok_or(GpuError::Texture { width, height })?;
        self.textures.push(pixmap);
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn create_framebuffer(
        &mut self,
        colour: &[TextureId],
        depth: bool,
    ) -> Result<FramebufferId, GpuError> {
        self.require_context()?;
        if colour.is_empty() {
            return Err(GpuError::Framebuffer("no colour attachments".to_string()));
        }
        if let Some(missing) = colour.iter().find(|t| t.0 as usize >= self.textures.len()) {
            return Err(GpuError::UnknownId {
                kind: "texture",
                id: missing.0,
            });
        }
        self.framebuffers.push(Framebuffer {
            colour: colour.to_vec(),
            depth,
        });
        Ok(FramebufferId(self.framebuffers.len() as u32 - 1))
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GpuError> {
        self.require_context()?;
        if let Some(id) = framebuffer
            && id.0 as usize >= self.framebuffers.len()
        {
            return Err(GpuError::UnknownId {
                kind: "framebuffer",
                id: id.0,
            });
        }
        self.bound = framebuffer;
        Ok(())
    }

    fn clear(&mut self, rgba: [f32; 4]) -> Result<(), GpuError> {
        let attachments = self.bound_framebuffer()?.colour.clone();
        let colour = Color::from_rgba(
            rgba[0].clamp(0.0, 1.0),
            rgba[1].clamp(0.0, 1.0),
            rgba[2].clamp(0.0, 1.0),
            rgba[3].clamp(0.0, 1.0),
        )
        .unwrap_or(Color::TRANSPARENT);

        for id in attachments {
            if let Some(pixmap) = self.textures.get_mut(id.0 as usize) {
                pixmap.fill(colour);
            }
        }
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.require_context()?;
        if program.0 as usize >= self.programs.len() {
            return Err(GpuError::UnknownId {
                kind: "program",
                id: program.0,
            });
        }
        self.current_program = Some(program);
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), GpuError> {
        if self.current_program.is_none() {
            return Err(GpuError::NoProgram);
        }
        self.uniforms.insert(name.to_string(), value);
        Ok(())
    }

    fn draw_fullscreen(&mut self) -> Result<(), GpuError> {
        let program = self.current_program.ok_or(GpuError::NoProgram)?;
        let attachments = self.bound_framebuffer()?.colour.clone();
        self.draw_calls += 1;

        match self.programs[program.0 as usize] {
            Kernel::Mask2D => {
                let params = MaskParams::from_uniforms(&self.uniforms);
                for (index, id) in attachments.into_iter().enumerate() {
                    let Some(target) = Target::from_attachment(index) else {
                        continue;
                    };
                    if let Some(pixmap) = self.textures.get_mut(id.0 as usize) {
                        mask::draw(pixmap, &params, target);
                    }
                }
            }
        }
        Ok(())
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
    }

    fn native_handle(&self, texture: TextureId) -> Option<u64> {
        if (texture.0 as usize) < self.textures.len() {
            Some(NATIVE_HANDLE_BASE + u64::from(texture.0))
        } else {
            None
        }
    }

    fn texture_image(&self, texture: TextureId) -> Option<RawImage<'_>> {
        self.texture(texture).map(|pixmap| RawImage {
            pixels: pixmap.data(),
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }

    fn destroy(&mut self) {
        if self.context.take().is_some() {
            debug!("software context destroyed");
        }
        self.programs.clear();
        self.textures.clear();
        self.framebuffers.clear();
        self.bound = None;
        self.current_program = None;
        self.uniforms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(width: u32, height: u32) -> (SoftwareBackend, [TextureId; 2], FramebufferId) {
        let mut gpu = SoftwareBackend::new();
        gpu.create_context(&ContextConfig::hidden(width, height)).unwrap();
        let left = gpu.create_texture(width, height).unwrap();
        let right = gpu.create_texture(width, height).unwrap();
        let fb = gpu.create_framebuffer(&[left, right], true).unwrap();
        (gpu, [left, right], fb)
    }

    #[test]
    fn calls_before_context_fail() {
        let mut gpu = SoftwareBackend::new();
        assert!(matches!(gpu.create_texture(4, 4), Err(GpuError::NoContext)));
    }

    #[test]
    fn failing_backend_refuses_context() {
        let mut gpu = SoftwareBackend::failing();
        assert!(gpu.create_context(&ContextConfig::hidden(8, 8)).is_err());
        assert!(!gpu.has_context());
    }

    #[test]
    fn unknown_program_is_a_shader_error() {
        let (mut gpu, _, _) = ready(8, 8);
        let source = ProgramSource::in_shader_dir(Path::new("."), "Overlays3D");
        assert!(matches!(gpu.compile_program(&source), Err(GpuError::Shader { .. })));
    }

    #[test]
    fn clear_fills_every_attachment() {
        let (mut gpu, [left, right], fb) = ready(8, 4);
        gpu.bind_framebuffer(Some(fb)).unwrap();

        gpu.clear([1.0, 0.0, 1.0, 1.0]).unwrap();

        for id in [left, right] {
            let px = gpu.texture(id).unwrap().pixel(3, 3).unwrap();
            assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (255, 0, 255, 255));
        }
    }

    #[test]
    fn draw_requires_program() {
        let (mut gpu, _, fb) = ready(8, 4);
        gpu.bind_framebuffer(Some(fb)).unwrap();
        assert!(matches!(gpu.draw_fullscreen(), Err(GpuError::NoProgram)));
        assert!(matches!(
            gpu.set_uniform("time", UniformValue::Float(0.0)),
            Err(GpuError::NoProgram)
        ));
    }

    #[test]
    fn native_handles_resolve_back_to_textures() {
        let (gpu, [left, right], _) = ready(8, 4);
        let lh = gpu.native_handle(left).unwrap();
        let rh = gpu.native_handle(right).unwrap();

        assert_ne!(lh, rh);
        assert_ne!(lh, 0);
        assert!(gpu.texture_by_handle(rh).is_some());
        assert!(gpu.native_handle(TextureId(9)).is_none());
    }

    #[test]
    fn texture_image_exposes_premultiplied_pixels() {
        let (mut gpu, [left, _], fb) = ready(8, 4);
        gpu.bind_framebuffer(Some(fb)).unwrap();
        gpu.clear([0.0, 0.0, 1.0, 0.5]).unwrap();

        let image = gpu.texture_image(left).unwrap();
        assert_eq!((image.width, image.height), (8, 4));
        assert_eq!(image.pixels.len(), 8 * 4 * 4);
        assert_eq!(image.pixels[3], 128);
        assert!(gpu.texture_image(TextureId(9)).is_none());
    }

    #[test]
    fn destroy_releases_everything() {
        let (mut gpu, [left, _], _) = ready(8, 4);
        gpu.destroy();
        assert!(!gpu.has_context());
        assert!(gpu.texture(left).is_none());
    }
}
