//! In-process VR runtime
//!
//! Behaves like a compositor with one headset attached: overlays are tracked
//! by handle, events are queued by the caller, and every call made through
//! [`VrRuntime`] is recorded so tests can count them.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{
    ApplicationType, EyeSlot, Matrix34, OverlayError, OverlayFlag, OverlayHandle, RawImage,
    TextureRef, VrEvent, VrInitError, VrRuntime,
};

/// Half of a 63 mm IPD, in metres
pub const DEFAULT_HALF_IPD: f32 = 0.0315;

/// One recorded call into the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
    Init,
    Shutdown,
    AcknowledgeQuitExiting,
    CreateOverlay { key: String, name: String },
    DestroyOverlay(OverlayHandle),
    SetFlag {
        handle: OverlayHandle,
        flag: OverlayFlag,
        enabled: bool,
    },
    SetWidth { handle: OverlayHandle, width: f32 },
    SetFromFile { handle: OverlayHandle, path: PathBuf },
    SetTexture {
        handle: OverlayHandle,
        texture: TextureRef,
    },
    SetRaw {
        handle: OverlayHandle,
        width: u32,
        height: u32,
    },
    SetTransform {
        handle: OverlayHandle,
        transform: Matrix34,
    },
    SetAlpha { handle: OverlayHandle, alpha: f32 },
    Show(OverlayHandle),
    Hide(OverlayHandle),
}

#[derive(Debug, Clone)]
struct SimOverlay {
    key: String,
    visible: bool,
    alpha: f32,
    texture: Option<TextureRef>,
    pixels: Option<Vec<u8>>,
    transform: Option<Matrix34>,
}

pub struct SimulatedRuntime {
    hmd_present: bool,
    init_error: Option<VrInitError>,
    failing_overlay_key: Option<String>,
    initialised: bool,
    half_ipd: f32,
    dashboard_visible: bool,
    raw_images: bool,
    events: VecDeque<VrEvent>,
    overlays: BTreeMap<u64, SimOverlay>,
    next_handle: u64,
    calls: Vec<RuntimeCall>,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self {
            hmd_present: true,
            init_error: None,
            failing_overlay_key: None,
            initialised: false,
            half_ipd: DEFAULT_HALF_IPD,
            dashboard_visible: false,
            raw_images: false,
            events: VecDeque::new(),
            overlays: BTreeMap::new(),
            next_handle: 1,
            calls: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scenario setup
    // ─────────────────────────────────────────────────────────────────────────

    pub fn without_hmd(mut self) -> Self {
        self.hmd_present = false;
        self
    }

    pub fn with_init_error(mut self, error: VrInitError) -> Self {
        self.init_error = Some(error);
        self
    }

    /// Make `create_overlay` fail for this key
    pub fn with_failing_overlay(mut self, key: impl Into<String>) -> Self {
        self.failing_overlay_key = Some(key.into());
        self
    }

    pub fn with_half_ipd(mut self, half_ipd: f32) -> Self {
        self.half_ipd = half_ipd;
        self
    }

    /// Ask for frames as uploaded pixels, like a compositor fed from the CPU
    pub fn with_raw_images(mut self) -> Self {
        self.raw_images = true;
        self
    }

    pub fn set_half_ipd(&mut self, half_ipd: f32) {
        self.half_ipd = half_ipd;
    }

    pub fn push_event(&mut self, event: VrEvent) {
        self.events.push_back(event);
    }

    pub fn open_dashboard(&mut self) {
        self.dashboard_visible = true;
        self.push_event(VrEvent::DashboardActivated);
    }

    pub fn close_dashboard(&mut self) {
        self.dashboard_visible = false;
        self.push_event(VrEvent::DashboardDeactivated);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn calls(&self) -> &[RuntimeCall] {
        &self.calls
    }

    pub fn count_calls(&self, pred: impl Fn(&RuntimeCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn overlay_key(&self, handle: OverlayHandle) -> Option<&str> {
        self.overlays.get(&handle.0).map(|o| o.key.as_str())
    }

    pub fn is_overlay_visible(&self, handle: OverlayHandle) -> Option<bool> {
        self.overlays.get(&handle.0).map(|o| o.visible)
    }

    pub fn overlay_texture(&self, handle: OverlayHandle) -> Option<TextureRef> {
        self.overlays.get(&handle.0).and_then(|o| o.texture)
    }

    /// Last pixels uploaded with `set_overlay_raw`
    pub fn overlay_pixels(&self, handle: OverlayHandle) -> Option<&[u8]> {
        self.overlays.get(&handle.0).and_then(|o| o.pixels.as_deref())
    }

    pub fn overlay_transform(&self, handle: OverlayHandle) -> Option<Matrix34> {
        self.overlays.get(&handle.0).and_then(|o| o.transform)
    }

    fn overlay_mut(&mut self, handle: OverlayHandle) -> Result<&mut SimOverlay, OverlayError> {
        if !self.initialised {
            return Err(OverlayError::NotInitialized);
        }
        if handle.is_none() {
            return Err(OverlayError::InvalidHandle);
        }
        self.overlays
            .get_mut(&handle.0)
            .ok_or(OverlayError::UnknownOverlay)
    }
}

impl VrRuntime for SimulatedRuntime {
    fn is_hmd_present(&self) -> bool {
        self.hmd_present
    }

    fn init(&mut self, _app_type: ApplicationType) -> Result<(), VrInitError> {
        self.calls.push(RuntimeCall::Init);
        if let Some(err) = self.init_error.clone() {
            return Err(err);
        }
        if !self.hmd_present {
            return Err(VrInitError::HmdNotFound);
        }
        self.initialised = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.calls.push(RuntimeCall::Shutdown);
        self.initialised = false;
        self.overlays.clear();
        self.events.clear();
    }

    fn poll_next_event(&mut self) -> Option<VrEvent> {
        if !self.initialised {
            return None;
        }
        self.events.pop_front()
    }

    fn acknowledge_quit_exiting(&mut self) {
        self.calls.push(RuntimeCall::AcknowledgeQuitExiting);
    }

    fn eye_to_head_transform(&self, eye: EyeSlot) -> Matrix34 {
        let x = match eye {
            EyeSlot::Left => -self.half_ipd,
            EyeSlot::Right => self.half_ipd,
        };
        Matrix34::from_translation(x, 0.0, 0.0)
    }

    fn is_dashboard_visible(&self) -> bool {
        self.dashboard_visible
    }

    fn create_overlay(&mut self, key: &str, name: &str) -> Result<OverlayHandle, OverlayError> {
        self.calls.push(RuntimeCall::CreateOverlay {
            key: key.to_string(),
            name: name.to_string(),
        });
        if !self.initialised {
            return Err(OverlayError::NotInitialized);
        }
        if self.failing_overlay_key.as_deref() == Some(key)
            || self.overlays.values().any(|o| o.key == key)
        {
            return Err(OverlayError::KeyInUse(key.to_string()));
        }

        let handle = OverlayHandle(self.next_handle);
        self.next_handle += 1;
        self.overlays.insert(
            handle.0,
            SimOverlay {
                key: key.to_string(),
                visible: false,
                alpha: 1.0,
                texture: None,
                pixels: None,
                transform: None,
            },
        );
        debug!(key, handle = handle.0, "simulated overlay created");
        Ok(handle)
    }

    fn destroy_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::DestroyOverlay(handle));
        self.overlay_mut(handle)?;
        self.overlays.remove(&handle.0);
        Ok(())
    }

    fn set_overlay_flag(
        &mut self,
        handle: OverlayHandle,
        flag: OverlayFlag,
        enabled: bool,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetFlag {
            handle,
            flag,
            enabled,
        });
        self.overlay_mut(handle).map(|_| ())
    }

    fn set_overlay_width_in_meters(
        &mut self,
        handle: OverlayHandle,
        width: f32,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetWidth { handle, width });
        if !(width.is_finite() && width > 0.0) {
            return Err(OverlayError::InvalidParameter);
        }
        self.overlay_mut(handle).map(|_| ())
    }

    fn set_overlay_from_file(
        &mut self,
        handle: OverlayHandle,
        path: &Path,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetFromFile {
            handle,
            path: path.to_path_buf(),
        });
        self.overlay_mut(handle).map(|_| ())
    }

    fn set_overlay_texture(
        &mut self,
        handle: OverlayHandle,
        texture: TextureRef,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetTexture { handle, texture });
        self.overlay_mut(handle)?.texture = Some(texture);
        Ok(())
    }

    fn set_overlay_raw(
        &mut self,
        handle: OverlayHandle,
        image: &RawImage<'_>,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetRaw {
            handle,
            width: image.width,
            height: image.height,
        });
        let expected = image.width as usize * image.height as usize * RawImage::BYTES_PER_PIXEL as usize;
        if image.pixels.len() != expected {
            return Err(OverlayError::InvalidParameter);
        }
        self.overlay_mut(handle)?.pixels = Some(image.pixels.to_vec());
        Ok(())
    }

    fn wants_raw_images(&self) -> bool {
        self.raw_images
    }

    fn set_overlay_transform_tracked_device_relative(
        &mut self,
        handle: OverlayHandle,
        _device: u32,
        transform: &Matrix34,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetTransform {
            handle,
            transform: *transform,
        });
        self.overlay_mut(handle)?.transform = Some(*transform);
        Ok(())
    }

    fn set_overlay_alpha(
        &mut self,
        handle: OverlayHandle,
        alpha: f32,
    ) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::SetAlpha { handle, alpha });
        self.overlay_mut(handle)?.alpha = alpha;
        Ok(())
    }

    fn overlay_alpha(&self, handle: OverlayHandle) -> Result<f32, OverlayError> {
        self.overlays
            .get(&handle.0)
            .map(|o| o.alpha)
            .ok_or(OverlayError::UnknownOverlay)
    }

    fn show_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::Show(handle));
        self.overlay_mut(handle)?.visible = true;
        Ok(())
    }

    fn hide_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError> {
        self.calls.push(RuntimeCall::Hide(handle));
        self.overlay_mut(handle)?.visible = false;
        Ok(())
    }
}
