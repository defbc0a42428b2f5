//! Mask renderer
//!
//! Owns the offscreen target (two colour textures plus depth) and redraws it
//! only when invalidated. Several invalidations between two draws collapse
//! into a single redraw.

use std::path::PathBuf;

use albrt_core::ConfigStore;
use albrt_core::vr::{RawImage, TextureRef};
use albrt_types::{Eye, MaskType, PatchType, Rgb};
use thiserror::Error;
use tracing::{debug, info};

use crate::gpu::{
    ContextConfig, DEFAULT_TEXTURE_HEIGHT, DEFAULT_TEXTURE_WIDTH, FramebufferId, GpuBackend,
    GpuError, OVERLAYS_2D_PROGRAM, ProgramId, ProgramSource, TextureId, UniformValue,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("backend returned no native handle for texture {0}")]
    MissingHandle(u32),
}

/// Renderer construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    /// Directory containing `Shaders/`
    pub asset_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_TEXTURE_WIDTH,
            height: DEFAULT_TEXTURE_HEIGHT,
            asset_dir: PathBuf::from("."),
        }
    }
}

/// Uniform set for the 2D mask program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskUniforms {
    pub mask_type: MaskType,
    pub eye_to_render: Eye,
    pub patch_colour: Rgb,
    pub patch_type: PatchType,
    pub patch_radial_size: f32,
    pub patch_radial_softness: f32,
    pub slat_colour: Rgb,
    pub slat_height: f32,
    pub slat_slice_height: f32,
    pub slat_slice_offset: f32,
}

impl MaskUniforms {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            mask_type: store.overlay_mask_type(),
            eye_to_render: store.eye_to_render(),
            patch_colour: store.patch_colour(),
            patch_type: store.patch_type(),
            patch_radial_size: store.patch_radial_size(),
            patch_radial_softness: store.patch_radial_softness(),
            slat_colour: store.slat_colour(),
            slat_height: store.slat_height(),
            slat_slice_height: store.slat_slice_height(),
            slat_slice_offset: store.slat_slice_offset(),
        }
    }

    fn upload<G: GpuBackend + ?Sized>(&self, gpu: &mut G, time: f32) -> Result<(), GpuError> {
        gpu.set_uniform("time", UniformValue::Float(time))?;
        gpu.set_uniform("maskType", UniformValue::Int(self.mask_type.uniform_value()))?;
        gpu.set_uniform("eye", UniformValue::Int(self.eye_to_render as i32))?;

        gpu.set_uniform("slatColour", UniformValue::Vec3(self.slat_colour.0))?;
        gpu.set_uniform("slatHeight", UniformValue::Float(self.slat_height))?;
        gpu.set_uniform("sliceHeight", UniformValue::Float(self.slat_slice_height))?;
        gpu.set_uniform("sliceOffset", UniformValue::Float(self.slat_slice_offset))?;

        gpu.set_uniform("patchColour", UniformValue::Vec3(self.patch_colour.0))?;
        gpu.set_uniform("patchType", UniformValue::Int(self.patch_type as i32))?;
        gpu.set_uniform("patchRadialSize", UniformValue::Float(self.patch_radial_size))?;
        gpu.set_uniform(
            "patchRadialSoftness",
            UniformValue::Float(self.patch_radial_softness),
        )?;
        Ok(())
    }
}

/// The two rendered eye textures, as compositor handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeTextures {
    pub left: TextureRef,
    pub right: TextureRef,
}

impl EyeTextures {
    /// Swap left and right when `switched` is set
    pub fn arranged(self, switched: bool) -> Self {
        if switched {
            Self {
                left: self.right,
                right: self.left,
            }
        } else {
            self
        }
    }
}

struct GpuResources {
    program_2d: ProgramId,
    framebuffer: FramebufferId,
    texture_ids: [TextureId; 2],
    textures: EyeTextures,
}

pub struct Renderer<G: GpuBackend> {
    gpu: G,
    config: RendererConfig,
    resources: Option<GpuResources>,
    needs_render: bool,
    redraw_count: u64,
}

impl<G: GpuBackend> Renderer<G> {
    pub fn new(gpu: G, config: RendererConfig) -> Self {
        Self {
            gpu,
            config,
            resources: None,
            needs_render: false,
            redraw_count: 0,
        }
    }

    /// Create the hidden context, compile the 2D program, allocate both eye
    /// textures and the framebuffer. Forces the first render.
    pub fn start(&mut self) -> Result<(), RenderError> {
        if self.resources.is_some() {
            return Ok(());
        }
        let (width, height) = (self.config.width, self.config.height);

        self.gpu.create_context(&ContextConfig::hidden(width, height))?;
        let source = ProgramSource::in_shader_dir(&self.config.asset_dir, OVERLAYS_2D_PROGRAM);
        let program_2d = self.gpu.compile_program(&source)?;

        let left = self.gpu.create_texture(width, height)?;
        let right = self.gpu.create_texture(width, height)?;
        let framebuffer = self.gpu.create_framebuffer(&[left, right], true)?;

        self.gpu.bind_framebuffer(Some(framebuffer))?;
        self.gpu.clear([0.0, 0.0, 0.0, 0.0])?;
        self.gpu.bind_framebuffer(None)?;

        let textures = EyeTextures {
            left: self.texture_ref(left)?,
            right: self.texture_ref(right)?,
        };
        self.resources = Some(GpuResources {
            program_2d,
            framebuffer,
            texture_ids: [left, right],
            textures,
        });
        self.needs_render = true;

        info!(width, height, "renderer started");
        Ok(())
    }

    fn texture_ref(&self, id: TextureId) -> Result<TextureRef, RenderError> {
        let handle = self
            .gpu
            .native_handle(id)
            .ok_or(RenderError::MissingHandle(id.0))?;
        Ok(TextureRef { handle })
    }

    pub fn is_started(&self) -> bool {
        self.resources.is_some()
    }

    /// Request a redraw on the next `draw_if_needed`
    pub fn invalidate(&mut self) {
        self.needs_render = true;
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    /// Completed redraw passes since start
    pub fn redraw_count(&self) -> u64 {
        self.redraw_count
    }

    /// Current texture handles, if started
    pub fn textures(&self) -> Option<EyeTextures> {
        self.resources.as_ref().map(|r| r.textures)
    }

    /// Left and right pixels, when the backend keeps them on the CPU
    pub fn eye_images(&self) -> Option<[RawImage<'_>; 2]> {
        let [left, right] = self.resources.as_ref()?.texture_ids;
        Some([self.gpu.texture_image(left)?, self.gpu.texture_image(right)?])
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Redraw if invalidated. Returns the textures when a new frame was
    /// produced. FOG keeps the previous contents and produces nothing.
    pub fn draw_if_needed(
        &mut self,
        uniforms: &MaskUniforms,
        time: f32,
    ) -> Result<Option<EyeTextures>, RenderError> {
        if !self.needs_render {
            return Ok(None);
        }
        let Some(resources) = self.resources.as_ref() else {
            // Not ready yet; keep the request for a later tick
            return Ok(None);
        };
        let (program_2d, framebuffer, textures) =
            (resources.program_2d, resources.framebuffer, resources.textures);

        self.needs_render = false;
        if uniforms.mask_type == MaskType::Fog {
            debug!("fog mask selected; keeping previous frame");
            return Ok(None);
        }

        self.gpu.bind_framebuffer(Some(framebuffer))?;
        self.gpu.clear([0.0, 0.0, 0.0, 0.0])?;

        if uniforms.mask_type.is_2d() {
            self.gpu.use_program(program_2d)?;
            uniforms.upload(&mut self.gpu, time)?;
            self.gpu.draw_fullscreen()?;
        }

        self.gpu.bind_framebuffer(None)?;
        self.gpu.swap_buffers();
        self.redraw_count += 1;
        debug!(mask = ?uniforms.mask_type, redraws = self.redraw_count, "overlays redrawn");

        Ok(Some(textures))
    }

    /// Release the context and everything in it. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.resources.take().is_some() {
            self.gpu.destroy();
            info!("renderer destroyed");
        }
        self.needs_render = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;

    fn renderer() -> Renderer<SoftwareBackend> {
        let mut r = Renderer::new(
            SoftwareBackend::new(),
            RendererConfig {
                width: 32,
                height: 16,
                ..RendererConfig::default()
            },
        );
        r.start().unwrap();
        r
    }

    fn uniforms(mask_type: MaskType) -> MaskUniforms {
        let mut u = MaskUniforms::from_store(&ConfigStore::new());
        u.mask_type = mask_type;
        u
    }

    #[test]
    fn start_forces_first_render() {
        let mut r = renderer();
        assert!(r.needs_render());

        let textures = r.draw_if_needed(&uniforms(MaskType::Patch), 0.0).unwrap();

        assert_eq!(textures, r.textures());
        assert_eq!(r.redraw_count(), 1);
        assert!(!r.needs_render());
    }

    #[test]
    fn start_attaches_both_eyes_and_a_depth_buffer() {
        let r = renderer();
        let framebuffer = r.resources.as_ref().map(|res| res.framebuffer).unwrap();

        assert_eq!(r.gpu().framebuffer_has_depth(framebuffer), Some(true));
        let textures = r.textures().unwrap();
        assert_ne!(textures.left, textures.right);
    }

    #[test]
    fn eye_images_follow_the_drawn_eye() {
        let mut r = renderer();
        let mut u = uniforms(MaskType::Patch);
        u.eye_to_render = Eye::Right;
        u.patch_type = PatchType::Flat;
        r.draw_if_needed(&u, 0.0).unwrap();

        let [left, right] = r.eye_images().unwrap();
        assert_eq!((left.width, left.height), (32, 16));
        assert!(left.pixels.iter().all(|&b| b == 0));
        assert!(right.pixels.chunks(4).any(|px| px[3] == 255));

        r.destroy();
        assert!(r.eye_images().is_none());
    }

    #[test]
    fn invalidations_coalesce_into_one_draw() {
        let mut r = renderer();
        r.draw_if_needed(&uniforms(MaskType::Patch), 0.0).unwrap();
        let before = r.gpu().draw_calls();

        for _ in 0..5 {
            r.invalidate();
        }
        assert!(r.draw_if_needed(&uniforms(MaskType::Slat), 0.1).unwrap().is_some());
        assert!(r.draw_if_needed(&uniforms(MaskType::Slat), 0.2).unwrap().is_none());

        assert_eq!(r.gpu().draw_calls(), before + 1);
        assert_eq!(r.redraw_count(), 2);
        assert_eq!(r.gpu().swaps(), 2);
    }

    #[test]
    fn fog_keeps_previous_frame() {
        let mut r = renderer();
        let mut patch = uniforms(MaskType::Patch);
        patch.patch_type = PatchType::Flat;
        patch.patch_colour = Rgb::new(0.0, 1.0, 0.0);
        let textures = r.draw_if_needed(&patch, 0.0).unwrap().unwrap();

        r.invalidate();
        assert!(r.draw_if_needed(&uniforms(MaskType::Fog), 1.0).unwrap().is_none());

        assert!(!r.needs_render());
        assert_eq!(r.redraw_count(), 1);
        let px = r.gpu().texture_by_handle(textures.left.handle).unwrap().pixel(2, 2).unwrap();
        assert_eq!((px.green(), px.alpha()), (255, 255));
    }

    #[test]
    fn none_mask_clears_without_drawing() {
        let mut r = renderer();
        r.draw_if_needed(&uniforms(MaskType::Patch), 0.0).unwrap();
        let draws = r.gpu().draw_calls();

        r.invalidate();
        let textures = r.draw_if_needed(&uniforms(MaskType::None), 0.0).unwrap().unwrap();

        assert_eq!(r.gpu().draw_calls(), draws);
        let left = r.gpu().texture_by_handle(textures.left.handle).unwrap();
        assert!(left.pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn uniforms_are_uploaded() {
        let mut r = renderer();
        let mut u = uniforms(MaskType::Slat);
        u.slat_slice_offset = 0.3;

        r.draw_if_needed(&u, 2.5).unwrap();

        assert_eq!(r.gpu().uniform("maskType"), Some(UniformValue::Int(3)));
        assert_eq!(r.gpu().uniform("sliceOffset"), Some(UniformValue::Float(0.3)));
        assert_eq!(r.gpu().uniform("time"), Some(UniformValue::Float(2.5)));
    }

    #[test]
    fn not_started_keeps_request() {
        let mut r = Renderer::new(SoftwareBackend::new(), RendererConfig::default());
        r.invalidate();
        assert!(r.draw_if_needed(&uniforms(MaskType::Patch), 0.0).unwrap().is_none());
        assert!(r.needs_render());
    }

    #[test]
    fn failing_context_is_reported() {
        let mut r = Renderer::new(SoftwareBackend::failing(), RendererConfig::default());
        assert!(matches!(r.start(), Err(RenderError::Gpu(GpuError::Context(_)))));
        assert!(!r.is_started());
    }

    #[test]
    fn eye_swap_is_an_involution() {
        let textures = EyeTextures {
            left: TextureRef { handle: 1 },
            right: TextureRef { handle: 2 },
        };
        assert_eq!(textures.arranged(true).left.handle, 2);
        assert_eq!(textures.arranged(true).arranged(true), textures);
        assert_eq!(textures.arranged(false), textures);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut r = renderer();
        r.destroy();
        r.destroy();
        assert!(!r.is_started());
        assert!(!r.gpu().has_context());
    }
}
