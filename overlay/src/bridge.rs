//! Compositor overlay bridge
//!
//! Creates, updates and destroys the two eye overlays. Every update call is
//! guarded by a single `created` flag shared by both slots: until both
//! overlays exist, updates are silently skipped.

use std::path::{Path, PathBuf};

use albrt_core::StartupError;
use albrt_core::transform::{EyeTransforms, overlay_width};
use albrt_core::vr::{
    EyeSlot, HMD_DEVICE_INDEX, Matrix34, OverlayError, OverlayFlag, OverlayHandle, RawImage,
    TextureRef, VrRuntime,
};
use tracing::{debug, info, warn};

use crate::renderer::EyeTextures;

pub const LEFT_OVERLAY_KEY: &str = "albrt.overlay.eye.left";
pub const RIGHT_OVERLAY_KEY: &str = "albrt.overlay.eye.right";
pub const LEFT_OVERLAY_NAME: &str = "ALBRT Left Eye";
pub const RIGHT_OVERLAY_NAME: &str = "ALBRT Right Eye";

/// Placeholder shown until the first texture arrives, relative to the asset dir
pub const LOADING_IMAGE: &str = "ImageMasks/loading.png";

pub fn overlay_key(slot: EyeSlot) -> &'static str {
    match slot {
        EyeSlot::Left => LEFT_OVERLAY_KEY,
        EyeSlot::Right => RIGHT_OVERLAY_KEY,
    }
}

pub fn overlay_name(slot: EyeSlot) -> &'static str {
    match slot {
        EyeSlot::Left => LEFT_OVERLAY_NAME,
        EyeSlot::Right => RIGHT_OVERLAY_NAME,
    }
}

/// Side-by-side mode per slot: the left overlay shows the left half of its
/// texture to the left eye, the right overlay shows it to the right eye.
fn stereo_flag(slot: EyeSlot) -> OverlayFlag {
    match slot {
        EyeSlot::Left => OverlayFlag::SideBySideParallel,
        EyeSlot::Right => OverlayFlag::SideBySideCrossed,
    }
}

/// Whether an overlay should be visible under the current policy
pub fn should_show(visible: bool, dashboard_open: bool, hide_in_dash: bool) -> bool {
    visible && !(dashboard_open && hide_in_dash)
}

pub struct OverlayBridge {
    handles: [OverlayHandle; 2],
    created: bool,
    /// Last visibility pushed per slot
    shown: [Option<bool>; 2],
    placeholder: PathBuf,
}

impl OverlayBridge {
    pub fn new(asset_dir: &Path) -> Self {
        Self {
            handles: [OverlayHandle::NONE; 2],
            created: false,
            shown: [None; 2],
            placeholder: asset_dir.join(LOADING_IMAGE),
        }
    }

    pub fn handle(&self, slot: EyeSlot) -> OverlayHandle {
        self.handles[slot.index()]
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Create one overlay and configure it. The handle is recorded even
    /// though updates stay disabled until both slots exist.
    pub fn create<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        slot: EyeSlot,
    ) -> Result<OverlayHandle, OverlayError> {
        let handle = runtime.create_overlay(overlay_key(slot), overlay_name(slot))?;
        self.handles[slot.index()] = handle;

        runtime.set_overlay_flag(handle, stereo_flag(slot), true)?;
        runtime.set_overlay_flag(handle, OverlayFlag::IsPremultiplied, true)?;
        runtime.set_overlay_width_in_meters(handle, overlay_width())?;
        if let Err(err) = runtime.set_overlay_from_file(handle, &self.placeholder) {
            warn!(key = overlay_key(slot), error = %err, "loading image not applied");
        }

        info!(key = overlay_key(slot), handle = handle.0, "overlay created");
        Ok(handle)
    }

    /// Create both overlays. On failure, whatever was created is destroyed
    /// again and no handle is kept.
    pub fn create_both<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
    ) -> Result<(), StartupError> {
        for slot in EyeSlot::BOTH {
            if let Err(source) = self.create(runtime, slot) {
                self.release_handles(runtime);
                return Err(StartupError::OverlayCreate {
                    key: overlay_key(slot).to_string(),
                    source,
                });
            }
        }
        self.created = true;
        Ok(())
    }

    fn release_handles<R: VrRuntime + ?Sized>(&mut self, runtime: &mut R) {
        for slot in EyeSlot::BOTH {
            let handle = std::mem::take(&mut self.handles[slot.index()]);
            if handle.is_none() {
                continue;
            }
            if let Err(err) = runtime.destroy_overlay(handle) {
                debug!(key = overlay_key(slot), error = %err, "overlay destroy failed");
            }
        }
        self.shown = [None; 2];
    }

    /// Destroy both overlays and reset the handles to the null sentinel
    pub fn destroy<R: VrRuntime + ?Sized>(&mut self, runtime: &mut R) {
        if !self.created {
            return;
        }
        self.created = false;
        self.release_handles(runtime);
        info!("overlays destroyed");
    }

    pub fn show<R: VrRuntime + ?Sized>(&mut self, runtime: &mut R, slot: EyeSlot) {
        self.push_visibility(runtime, slot, true);
    }

    pub fn hide<R: VrRuntime + ?Sized>(&mut self, runtime: &mut R, slot: EyeSlot) {
        self.push_visibility(runtime, slot, false);
    }

    fn push_visibility<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        slot: EyeSlot,
        visible: bool,
    ) {
        if !self.created {
            return;
        }
        let handle = self.handle(slot);
        let result = if visible {
            runtime.show_overlay(handle)
        } else {
            runtime.hide_overlay(handle)
        };
        match result {
            Ok(()) => self.shown[slot.index()] = Some(visible),
            Err(err) => debug!(key = overlay_key(slot), error = %err, "visibility not applied"),
        }
    }

    /// Apply the visibility policy to both slots, skipping slots already in
    /// the wanted state
    pub fn show_or_hide<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        visible: bool,
        dashboard_open: bool,
        hide_in_dash: bool,
    ) {
        let wanted = should_show(visible, dashboard_open, hide_in_dash);
        for slot in EyeSlot::BOTH {
            if self.shown[slot.index()] == Some(wanted) {
                continue;
            }
            self.push_visibility(runtime, slot, wanted);
        }
    }

    pub fn set_texture<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        slot: EyeSlot,
        texture: TextureRef,
    ) {
        if !self.created {
            return;
        }
        if let Err(err) = runtime.set_overlay_texture(self.handle(slot), texture) {
            debug!(key = overlay_key(slot), error = %err, "texture not applied");
        }
    }

    /// Push both eye textures, applying the eye swap
    pub fn push_textures<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        textures: EyeTextures,
        eyes_switched: bool,
    ) {
        let arranged = textures.arranged(eyes_switched);
        self.set_texture(runtime, EyeSlot::Left, arranged.left);
        self.set_texture(runtime, EyeSlot::Right, arranged.right);
    }

    /// Upload both eye images as pixels, applying the eye swap
    pub fn push_images<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        images: [RawImage<'_>; 2],
        eyes_switched: bool,
    ) {
        if !self.created {
            return;
        }
        let [mut left, mut right] = images;
        if eyes_switched {
            std::mem::swap(&mut left, &mut right);
        }
        for (slot, image) in [(EyeSlot::Left, left), (EyeSlot::Right, right)] {
            if let Err(err) = runtime.set_overlay_raw(self.handle(slot), &image) {
                debug!(key = overlay_key(slot), error = %err, "image not applied");
            }
        }
    }

    pub fn set_transform<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        slot: EyeSlot,
        transform: &Matrix34,
    ) {
        if !self.created {
            return;
        }
        if let Err(err) = runtime.set_overlay_transform_tracked_device_relative(
            self.handle(slot),
            HMD_DEVICE_INDEX,
            transform,
        ) {
            debug!(key = overlay_key(slot), error = %err, "transform not applied");
        }
    }

    pub fn push_transforms<R: VrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        transforms: &EyeTransforms,
    ) {
        for slot in EyeSlot::BOTH {
            self.set_transform(runtime, slot, transforms.for_slot(slot));
        }
    }

    /// Set the same opacity on both overlays
    pub fn set_alpha<R: VrRuntime + ?Sized>(&mut self, runtime: &mut R, alpha: f32) {
        if !self.created {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        for slot in EyeSlot::BOTH {
            if let Err(err) = runtime.set_overlay_alpha(self.handle(slot), alpha) {
                debug!(key = overlay_key(slot), error = %err, "alpha not applied");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use albrt_core::vr::{ApplicationType, RuntimeCall, SimulatedRuntime};

    fn runtime() -> SimulatedRuntime {
        let mut rt = SimulatedRuntime::new();
        rt.init(ApplicationType::Overlay).unwrap();
        rt.clear_calls();
        rt
    }

    fn created(rt: &mut SimulatedRuntime) -> OverlayBridge {
        let mut bridge = OverlayBridge::new(Path::new("/opt/albrt"));
        bridge.create_both(rt).unwrap();
        rt.clear_calls();
        bridge
    }

    fn visibility_calls(rt: &SimulatedRuntime) -> usize {
        rt.count_calls(|c| matches!(c, RuntimeCall::Show(_) | RuntimeCall::Hide(_)))
    }

    #[test]
    fn create_configures_both_overlays() {
        let mut rt = runtime();
        let mut bridge = OverlayBridge::new(Path::new("/opt/albrt"));

        bridge.create_both(&mut rt).unwrap();

        let left = bridge.handle(EyeSlot::Left);
        let right = bridge.handle(EyeSlot::Right);
        assert!(bridge.is_created());
        assert_eq!(rt.overlay_key(left), Some(LEFT_OVERLAY_KEY));
        assert_eq!(rt.overlay_key(right), Some(RIGHT_OVERLAY_KEY));
        assert!(rt.calls().contains(&RuntimeCall::SetFlag {
            handle: left,
            flag: OverlayFlag::SideBySideParallel,
            enabled: true,
        }));
        assert!(rt.calls().contains(&RuntimeCall::SetFlag {
            handle: right,
            flag: OverlayFlag::SideBySideCrossed,
            enabled: true,
        }));
        assert!(rt.calls().contains(&RuntimeCall::SetFromFile {
            handle: left,
            path: PathBuf::from("/opt/albrt/ImageMasks/loading.png"),
        }));
        assert_eq!(
            rt.count_calls(|c| matches!(c, RuntimeCall::SetWidth { width, .. } if (*width - 0.2424).abs() < 1e-6)),
            2
        );
    }

    #[test]
    fn failed_creation_leaves_nothing_behind() {
        let mut rt = SimulatedRuntime::new().with_failing_overlay(RIGHT_OVERLAY_KEY);
        rt.init(ApplicationType::Overlay).unwrap();
        let mut bridge = OverlayBridge::new(Path::new("."));

        let err = bridge.create_both(&mut rt).unwrap_err();

        assert_eq!(err.code(), "[E:2]");
        assert!(!bridge.is_created());
        assert!(bridge.handle(EyeSlot::Left).is_none());
        assert_eq!(rt.overlay_count(), 0);
    }

    #[test]
    fn updates_are_skipped_until_created() {
        let mut rt = runtime();
        let mut bridge = OverlayBridge::new(Path::new("."));

        bridge.show(&mut rt, EyeSlot::Left);
        bridge.set_alpha(&mut rt, 0.5);
        bridge.set_texture(&mut rt, EyeSlot::Right, TextureRef { handle: 7 });
        bridge.destroy(&mut rt);

        assert!(rt.calls().is_empty());
    }

    #[test]
    fn show_or_hide_follows_policy_without_redundant_calls() {
        let mut rt = runtime();
        let mut bridge = created(&mut rt);
        let left = bridge.handle(EyeSlot::Left);

        bridge.show_or_hide(&mut rt, true, false, true);
        assert_eq!(rt.is_overlay_visible(left), Some(true));
        assert_eq!(visibility_calls(&rt), 2);

        bridge.show_or_hide(&mut rt, true, false, true);
        assert_eq!(visibility_calls(&rt), 2);

        // dashboard open with hide-in-dash
        bridge.show_or_hide(&mut rt, true, true, true);
        assert_eq!(rt.is_overlay_visible(left), Some(false));
        assert_eq!(visibility_calls(&rt), 4);

        // dashboard open, but hide-in-dash off
        bridge.show_or_hide(&mut rt, true, true, false);
        assert_eq!(rt.is_overlay_visible(left), Some(true));

        // globally hidden
        bridge.show_or_hide(&mut rt, false, false, false);
        assert_eq!(rt.is_overlay_visible(left), Some(false));
    }

    #[test]
    fn eye_swap_only_changes_texture_assignment() {
        let mut rt = runtime();
        let mut bridge = created(&mut rt);
        let left = bridge.handle(EyeSlot::Left);
        let right = bridge.handle(EyeSlot::Right);
        let textures = EyeTextures {
            left: TextureRef { handle: 100 },
            right: TextureRef { handle: 200 },
        };

        bridge.push_textures(&mut rt, textures, true);
        assert_eq!(rt.overlay_texture(left), Some(TextureRef { handle: 200 }));
        assert_eq!(rt.overlay_texture(right), Some(TextureRef { handle: 100 }));

        bridge.push_textures(&mut rt, textures, false);
        assert_eq!(rt.overlay_texture(left), Some(TextureRef { handle: 100 }));
        assert_eq!(bridge.handle(EyeSlot::Left), left);
    }

    #[test]
    fn eye_swap_applies_to_uploaded_images() {
        let mut rt = runtime();
        let mut bridge = created(&mut rt);
        let left = bridge.handle(EyeSlot::Left);
        let right = bridge.handle(EyeSlot::Right);
        let (dark, lit) = ([0u8; 4], [255u8; 4]);
        let images = [
            RawImage { pixels: &dark, width: 1, height: 1 },
            RawImage { pixels: &lit, width: 1, height: 1 },
        ];

        bridge.push_images(&mut rt, images, true);
        assert_eq!(rt.overlay_pixels(left), Some(&lit[..]));
        assert_eq!(rt.overlay_pixels(right), Some(&dark[..]));

        bridge.destroy(&mut rt);
        rt.clear_calls();
        bridge.push_images(&mut rt, images, false);
        assert_eq!(rt.count_calls(|c| matches!(c, RuntimeCall::SetRaw { .. })), 0);
    }

    #[test]
    fn destroy_resets_handles_once() {
        let mut rt = runtime();
        let mut bridge = created(&mut rt);

        bridge.destroy(&mut rt);
        bridge.destroy(&mut rt);

        assert!(bridge.handle(EyeSlot::Left).is_none());
        assert!(bridge.handle(EyeSlot::Right).is_none());
        assert_eq!(rt.count_calls(|c| matches!(c, RuntimeCall::DestroyOverlay(_))), 2);
    }

    #[test]
    fn alpha_is_clamped_and_applied_to_both() {
        let mut rt = runtime();
        let mut bridge = created(&mut rt);

        bridge.set_alpha(&mut rt, 1.7);

        assert_eq!(rt.overlay_alpha(bridge.handle(EyeSlot::Left)), Ok(1.0));
        assert_eq!(rt.overlay_alpha(bridge.handle(EyeSlot::Right)), Ok(1.0));
    }
}
