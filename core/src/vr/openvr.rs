//! SteamVR runtime through the OpenVR C API
//!
//! Interfaces are loaded as `FnTable:` function tables after
//! `VR_InitInternal`; every call goes through the table pointers, which stay
//! valid until `VR_ShutdownInternal`.

#![allow(unsafe_code)]

use std::ffi::{CString, c_char, c_void};
use std::path::Path;
use std::ptr;

use openvr_sys as sys;
use tracing::{debug, info, warn};

use super::{
    ApplicationType, EyeSlot, Matrix34, OverlayError, OverlayFlag, OverlayHandle, RawImage,
    TextureRef, VrEvent, VrInitError, VrRuntime,
};

const INIT_ERROR_NONE: sys::EVRInitError = 0;
const INIT_ERROR_INSTALLATION_NOT_FOUND: sys::EVRInitError = 100;
const INIT_ERROR_PATH_REGISTRY_NOT_FOUND: sys::EVRInitError = 110;
const INIT_ERROR_NO_SERVER_FOR_BACKGROUND_APP: sys::EVRInitError = 121;
const INIT_ERROR_HMD_NOT_FOUND: sys::EVRInitError = 108;
const INIT_ERROR_HMD_NOT_FOUND_PRESENCE_FAILED: sys::EVRInitError = 126;
const INIT_ERROR_INTERFACE_NOT_FOUND: sys::EVRInitError = 105;

const APPLICATION_OVERLAY: sys::EVRApplicationType = 2;

const OVERLAY_ERROR_NONE: sys::EVROverlayError = 0;
const OVERLAY_ERROR_UNKNOWN_OVERLAY: sys::EVROverlayError = 10;
const OVERLAY_ERROR_INVALID_HANDLE: sys::EVROverlayError = 11;
const OVERLAY_ERROR_KEY_IN_USE: sys::EVROverlayError = 17;
const OVERLAY_ERROR_INVALID_PARAMETER: sys::EVROverlayError = 20;

const FLAG_SIDE_BY_SIDE_PARALLEL: sys::VROverlayFlags = 10;
const FLAG_SIDE_BY_SIDE_CROSSED: sys::VROverlayFlags = 11;
const FLAG_IS_PREMULTIPLIED: sys::VROverlayFlags = 21;

const EVENT_DASHBOARD_ACTIVATED: u32 = 502;
const EVENT_DASHBOARD_DEACTIVATED: u32 = 503;
const EVENT_QUIT: u32 = 700;

const EYE_LEFT: sys::EVREye = 0;
const EYE_RIGHT: sys::EVREye = 1;

const TEXTURE_TYPE_OPENGL: sys::ETextureType = 1;
const COLOR_SPACE_AUTO: sys::EColorSpace = 0;

fn init_result(error: sys::EVRInitError) -> Result<(), VrInitError> {
    match error {
        INIT_ERROR_NONE => Ok(()),
        INIT_ERROR_HMD_NOT_FOUND | INIT_ERROR_HMD_NOT_FOUND_PRESENCE_FAILED => {
            Err(VrInitError::HmdNotFound)
        }
        INIT_ERROR_INSTALLATION_NOT_FOUND
        | INIT_ERROR_PATH_REGISTRY_NOT_FOUND
        | INIT_ERROR_NO_SERVER_FOR_BACKGROUND_APP => Err(VrInitError::RuntimeNotRunning),
        code => Err(VrInitError::Other { code: code as i32 }),
    }
}

fn overlay_result(error: sys::EVROverlayError) -> Result<(), OverlayError> {
    match error {
        OVERLAY_ERROR_NONE => Ok(()),
        OVERLAY_ERROR_UNKNOWN_OVERLAY => Err(OverlayError::UnknownOverlay),
        OVERLAY_ERROR_INVALID_HANDLE => Err(OverlayError::InvalidHandle),
        OVERLAY_ERROR_INVALID_PARAMETER => Err(OverlayError::InvalidParameter),
        _ => Err(OverlayError::RequestFailed),
    }
}

fn overlay_flag(flag: OverlayFlag) -> sys::VROverlayFlags {
    match flag {
        OverlayFlag::SideBySideParallel => FLAG_SIDE_BY_SIDE_PARALLEL,
        OverlayFlag::SideBySideCrossed => FLAG_SIDE_BY_SIDE_CROSSED,
        OverlayFlag::IsPremultiplied => FLAG_IS_PREMULTIPLIED,
    }
}

fn application_type(app_type: ApplicationType) -> sys::EVRApplicationType {
    match app_type {
        ApplicationType::Overlay => APPLICATION_OVERLAY,
    }
}

fn c_string(value: &str) -> Result<CString, OverlayError> {
    CString::new(value).map_err(|_| OverlayError::InvalidParameter)
}

/// Fetch an interface function table by its versioned name
fn load_table<T>(version: &[u8]) -> Result<*mut T, VrInitError> {
    let mut name = b"FnTable:".to_vec();
    name.extend(version.iter().take_while(|&&b| b != 0));
    name.push(0);

    let mut error = INIT_ERROR_NONE;
    // SAFETY: `name` is NUL-terminated and outlives the call
    let table = unsafe { sys::VR_GetGenericInterface(name.as_ptr() as *const c_char, &mut error) };
    init_result(error)?;
    if table == 0 {
        return Err(VrInitError::Other {
            code: INIT_ERROR_INTERFACE_NOT_FOUND as i32,
        });
    }
    Ok(table as *mut T)
}

pub struct OpenVrRuntime {
    system: *mut sys::VR_IVRSystem_FnTable,
    overlay: *mut sys::VR_IVROverlay_FnTable,
    raw_images: bool,
}

impl Default for OpenVrRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenVrRuntime {
    /// A runtime fed with uploaded pixels from a CPU renderer
    pub fn new() -> Self {
        Self {
            system: ptr::null_mut(),
            overlay: ptr::null_mut(),
            raw_images: true,
        }
    }

    /// Share GL textures instead of uploading pixels
    pub fn with_gl_textures(mut self) -> Self {
        self.raw_images = false;
        self
    }

    pub fn is_initialised(&self) -> bool {
        !self.overlay.is_null()
    }

    fn system_fn<F>(
        &self,
        pick: impl FnOnce(&sys::VR_IVRSystem_FnTable) -> Option<F>,
    ) -> Option<F> {
        if self.system.is_null() {
            return None;
        }
        // SAFETY: non-null tables stay valid until shutdown nulls them
        pick(unsafe { &*self.system })
    }

    fn overlay_fn<F>(
        &self,
        pick: impl FnOnce(&sys::VR_IVROverlay_FnTable) -> Option<F>,
    ) -> Result<F, OverlayError> {
        if self.overlay.is_null() {
            return Err(OverlayError::NotInitialized);
        }
        // SAFETY: non-null tables stay valid until shutdown nulls them
        pick(unsafe { &*self.overlay }).ok_or(OverlayError::RequestFailed)
    }

    fn checked_handle(handle: OverlayHandle) -> Result<sys::VROverlayHandle_t, OverlayError> {
        if handle.is_none() {
            return Err(OverlayError::InvalidHandle);
        }
        Ok(handle.0)
    }
}

impl Drop for OpenVrRuntime {
    fn drop(&mut self) {
        if self.is_initialised() {
            self.shutdown();
        }
    }
}

impl VrRuntime for OpenVrRuntime {
    fn is_hmd_present(&self) -> bool {
        // SAFETY: no arguments; loads the runtime library on demand
        unsafe { sys::VR_IsHmdPresent() }
    }

    fn init(&mut self, app_type: ApplicationType) -> Result<(), VrInitError> {
        if self.is_initialised() {
            return Ok(());
        }
        let mut error = INIT_ERROR_NONE;
        // SAFETY: `error` is a valid out pointer
        unsafe {
            sys::VR_InitInternal(&mut error, application_type(app_type));
        }
        init_result(error)?;

        let tables = load_table::<sys::VR_IVRSystem_FnTable>(sys::IVRSystem_Version).and_then(
            |system| {
                load_table::<sys::VR_IVROverlay_FnTable>(sys::IVROverlay_Version)
                    .map(|overlay| (system, overlay))
            },
        );
        match tables {
            Ok((system, overlay)) => {
                self.system = system;
                self.overlay = overlay;
                info!("OpenVR session started");
                Ok(())
            }
            Err(err) => {
                // SAFETY: init succeeded above
                unsafe { sys::VR_ShutdownInternal() };
                Err(err)
            }
        }
    }

    fn shutdown(&mut self) {
        if !self.is_initialised() {
            return;
        }
        self.system = ptr::null_mut();
        self.overlay = ptr::null_mut();
        // SAFETY: paired with the successful VR_InitInternal in init
        unsafe { sys::VR_ShutdownInternal() };
        info!("OpenVR session ended");
    }

    fn poll_next_event(&mut self) -> Option<VrEvent> {
        let poll = self.system_fn(|t| t.PollNextEvent)?;
        // SAFETY: VREvent_t is plain data; all-zero is a valid value
        let mut event: sys::VREvent_t = unsafe { std::mem::zeroed() };
        let size = std::mem::size_of::<sys::VREvent_t>() as u32;
        // SAFETY: `event` is writable and `size` matches it
        if !unsafe { poll(&mut event, size) } {
            return None;
        }
        Some(match event.eventType {
            EVENT_DASHBOARD_ACTIVATED => VrEvent::DashboardActivated,
            EVENT_DASHBOARD_DEACTIVATED => VrEvent::DashboardDeactivated,
            EVENT_QUIT => VrEvent::Quit,
            other => VrEvent::Other(other),
        })
    }

    fn acknowledge_quit_exiting(&mut self) {
        if let Some(acknowledge) = self.system_fn(|t| t.AcknowledgeQuit_Exiting) {
            // SAFETY: table function with no arguments
            unsafe { acknowledge() };
        }
    }

    fn eye_to_head_transform(&self, eye: EyeSlot) -> Matrix34 {
        let Some(transform) = self.system_fn(|t| t.GetEyeToHeadTransform) else {
            return Matrix34::IDENTITY;
        };
        let eye = match eye {
            EyeSlot::Left => EYE_LEFT,
            EyeSlot::Right => EYE_RIGHT,
        };
        // SAFETY: plain value call
        let matrix = unsafe { transform(eye) };
        Matrix34 { m: matrix.m }
    }

    fn is_dashboard_visible(&self) -> bool {
        match self.overlay_fn(|t| t.IsDashboardVisible) {
            // SAFETY: table function with no arguments
            Ok(visible) => unsafe { visible() },
            Err(_) => false,
        }
    }

    fn create_overlay(&mut self, key: &str, name: &str) -> Result<OverlayHandle, OverlayError> {
        let create = self.overlay_fn(|t| t.CreateOverlay)?;
        let (c_key, c_name) = (c_string(key)?, c_string(name)?);
        let mut handle: sys::VROverlayHandle_t = 0;
        // SAFETY: both strings are NUL-terminated and only read; `handle` is writable
        let error = unsafe {
            create(
                c_key.as_ptr() as *mut c_char,
                c_name.as_ptr() as *mut c_char,
                &mut handle,
            )
        };
        if error == OVERLAY_ERROR_KEY_IN_USE {
            return Err(OverlayError::KeyInUse(key.to_string()));
        }
        overlay_result(error)?;
        debug!(key, handle, "OpenVR overlay created");
        Ok(OverlayHandle(handle))
    }

    fn destroy_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError> {
        let destroy = self.overlay_fn(|t| t.DestroyOverlay)?;
        let handle = Self::checked_handle(handle)?;
        // SAFETY: plain value call
        overlay_result(unsafe { destroy(handle) })
    }

    fn set_overlay_flag(
        &mut self,
        handle: OverlayHandle,
        flag: OverlayFlag,
        enabled: bool,
    ) -> Result<(), OverlayError> {
        let set_flag = self.overlay_fn(|t| t.SetOverlayFlag)?;
        let handle = Self::checked_handle(handle)?;
        // SAFETY: plain value call
        overlay_result(unsafe { set_flag(handle, overlay_flag(flag), enabled) })
    }

    fn set_overlay_width_in_meters(
        &mut self,
        handle: OverlayHandle,
        width: f32,
    ) -> Result<(), OverlayError> {
        let set_width = self.overlay_fn(|t| t.SetOverlayWidthInMeters)?;
        let handle = Self::checked_handle(handle)?;
        // SAFETY: plain value call
        overlay_result(unsafe { set_width(handle, width) })
    }

    fn set_overlay_from_file(
        &mut self,
        handle: OverlayHandle,
        path: &Path,
    ) -> Result<(), OverlayError> {
        let from_file = self.overlay_fn(|t| t.SetOverlayFromFile)?;
        let handle = Self::checked_handle(handle)?;
        let path = path.to_str().ok_or(OverlayError::InvalidParameter)?;
        let c_path = c_string(path)?;
        // SAFETY: the path is NUL-terminated and only read
        overlay_result(unsafe { from_file(handle, c_path.as_ptr() as *mut c_char) })
    }

    fn set_overlay_texture(
        &mut self,
        handle: OverlayHandle,
        texture: TextureRef,
    ) -> Result<(), OverlayError> {
        let set_texture = self.overlay_fn(|t| t.SetOverlayTexture)?;
        let handle = Self::checked_handle(handle)?;
        let mut native = sys::Texture_t {
            handle: texture.handle as usize as *mut c_void,
            eType: TEXTURE_TYPE_OPENGL,
            eColorSpace: COLOR_SPACE_AUTO,
        };
        // SAFETY: `native` lives for the call; the GL name is passed through
        overlay_result(unsafe { set_texture(handle, &mut native) })
    }

    fn set_overlay_raw(
        &mut self,
        handle: OverlayHandle,
        image: &RawImage<'_>,
    ) -> Result<(), OverlayError> {
        let set_raw = self.overlay_fn(|t| t.SetOverlayRaw)?;
        let handle = Self::checked_handle(handle)?;
        let expected = image.width as usize * image.height as usize * RawImage::BYTES_PER_PIXEL as usize;
        if image.pixels.len() != expected {
            warn!(len = image.pixels.len(), expected, "raw image size mismatch");
            return Err(OverlayError::InvalidParameter);
        }
        // SAFETY: the buffer holds width * height * 4 bytes and is only read
        overlay_result(unsafe {
            set_raw(
                handle,
                image.pixels.as_ptr() as *mut c_void,
                image.width,
                image.height,
                RawImage::BYTES_PER_PIXEL,
            )
        })
    }

    fn wants_raw_images(&self) -> bool {
        self.raw_images
    }

    fn set_overlay_transform_tracked_device_relative(
        &mut self,
        handle: OverlayHandle,
        device: u32,
        transform: &Matrix34,
    ) -> Result<(), OverlayError> {
        let set_transform = self.overlay_fn(|t| t.SetOverlayTransformTrackedDeviceRelative)?;
        let handle = Self::checked_handle(handle)?;
        let mut matrix = sys::HmdMatrix34_t { m: transform.m };
        // SAFETY: `matrix` lives for the call
        overlay_result(unsafe { set_transform(handle, device, &mut matrix) })
    }

    fn set_overlay_alpha(
        &mut self,
        handle: OverlayHandle,
        alpha: f32,
    ) -> Result<(), OverlayError> {
        let set_alpha = self.overlay_fn(|t| t.SetOverlayAlpha)?;
        let handle = Self::checked_handle(handle)?;
        // SAFETY: plain value call
        overlay_result(unsafe { set_alpha(handle, alpha) })
    }

    fn overlay_alpha(&self, handle: OverlayHandle) -> Result<f32, OverlayError> {
        let get_alpha = self.overlay_fn(|t| t.GetOverlayAlpha)?;
        let handle = Self::checked_handle(handle)?;
        let mut alpha = 0.0f32;
        // SAFETY: `alpha` is a valid out pointer
        overlay_result(unsafe { get_alpha(handle, &mut alpha) })?;
        Ok(alpha)
    }

    fn show_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError> {
        let show = self.overlay_fn(|t| t.ShowOverlay)?;
        let handle = Self::checked_handle(handle)?;
        // SAFETY: plain value call
        overlay_result(unsafe { show(handle) })
    }

    fn hide_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError> {
        let hide = self.overlay_fn(|t| t.HideOverlay)?;
        let handle = Self::checked_handle(handle)?;
        // SAFETY: plain value call
        overlay_result(unsafe { hide(handle) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_errors_map_to_startup_causes() {
        assert_eq!(init_result(INIT_ERROR_NONE), Ok(()));
        assert_eq!(init_result(108), Err(VrInitError::HmdNotFound));
        assert_eq!(init_result(126), Err(VrInitError::HmdNotFound));
        assert_eq!(init_result(100), Err(VrInitError::RuntimeNotRunning));
        assert_eq!(init_result(121), Err(VrInitError::RuntimeNotRunning));
        assert_eq!(init_result(119), Err(VrInitError::Other { code: 119 }));
    }

    #[test]
    fn overlay_errors_map_to_overlay_error() {
        assert_eq!(overlay_result(OVERLAY_ERROR_NONE), Ok(()));
        assert_eq!(overlay_result(10), Err(OverlayError::UnknownOverlay));
        assert_eq!(overlay_result(11), Err(OverlayError::InvalidHandle));
        assert_eq!(overlay_result(20), Err(OverlayError::InvalidParameter));
        assert_eq!(overlay_result(23), Err(OverlayError::RequestFailed));
    }

    #[test]
    fn calls_before_init_are_refused() {
        let mut rt = OpenVrRuntime::new();
        assert!(!rt.is_initialised());
        assert!(rt.wants_raw_images());
        assert!(!OpenVrRuntime::new().with_gl_textures().wants_raw_images());
        assert_eq!(
            rt.create_overlay("albrt.test", "Test"),
            Err(OverlayError::NotInitialized)
        );
        assert_eq!(rt.poll_next_event(), None);
        assert_eq!(rt.eye_to_head_transform(EyeSlot::Left), Matrix34::IDENTITY);
        rt.shutdown();
    }
}
