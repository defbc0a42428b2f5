//! VR runtime (compositor) interface
//!
//! [`VrRuntime`] is the seam between the overlay core and an OpenVR-style
//! compositor: session init/shutdown, event polling, eye geometry and the
//! overlay object calls. [`SimulatedRuntime`] implements it in-process and
//! records every call; `OpenVrRuntime` (feature `openvr`) drives SteamVR.

mod error;
#[cfg(feature = "openvr")]
mod openvr;
pub mod simulated;

pub use error::{OverlayError, VrInitError};
#[cfg(feature = "openvr")]
pub use openvr::OpenVrRuntime;
pub use simulated::{RuntimeCall, SimulatedRuntime};

/// Row-major 3×4 rigid transform (rotation + translation in column 3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix34 {
    pub m: [[f32; 4]; 3],
}

impl Matrix34 {
    pub const IDENTITY: Matrix34 = Matrix34 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    /// Identity rotation with the given translation
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][3] = x;
        out.m[1][3] = y;
        out.m[2][3] = z;
        out
    }

    pub fn translation(&self) -> [f32; 3] {
        [self.m[0][3], self.m[1][3], self.m[2][3]]
    }
}

impl Default for Matrix34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One of the two eye overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EyeSlot {
    Left,
    Right,
}

impl EyeSlot {
    pub const BOTH: [EyeSlot; 2] = [EyeSlot::Left, EyeSlot::Right];

    pub fn index(self) -> usize {
        match self {
            EyeSlot::Left => 0,
            EyeSlot::Right => 1,
        }
    }
}

/// Opaque compositor overlay handle. Zero means "not created".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OverlayHandle(pub u64);

impl OverlayHandle {
    pub const NONE: OverlayHandle = OverlayHandle(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Native GPU texture handed to the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub handle: u64,
}

/// Premultiplied RGBA8 pixels uploaded straight into an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawImage<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl RawImage<'_> {
    pub const BYTES_PER_PIXEL: u32 = 4;
}

/// Overlay flags the core touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayFlag {
    /// Stereo texture, left half to the left eye
    SideBySideParallel,
    /// Stereo texture, left half to the right eye
    SideBySideCrossed,
    /// Texture colour is premultiplied by alpha
    IsPremultiplied,
}

/// Tracked device index of the headset itself
pub const HMD_DEVICE_INDEX: u32 = 0;

/// Runtime events the core reacts to. Everything else arrives as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrEvent {
    DashboardActivated,
    DashboardDeactivated,
    /// The compositor wants the application to exit
    Quit,
    Other(u32),
}

/// Session application type requested at init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationType {
    Overlay,
}

/// Trait for VR compositor backends.
///
/// Overlay calls report compositor errors; callers outside startup treat them
/// as transient.
pub trait VrRuntime {
    // Session
    fn is_hmd_present(&self) -> bool;
    fn init(&mut self, app_type: ApplicationType) -> Result<(), VrInitError>;
    fn shutdown(&mut self);
    /// Next pending event, if any. Returns None once the queue is drained.
    fn poll_next_event(&mut self) -> Option<VrEvent>;
    fn acknowledge_quit_exiting(&mut self);
    fn eye_to_head_transform(&self, eye: EyeSlot) -> Matrix34;
    fn is_dashboard_visible(&self) -> bool;

    // Overlays
    fn create_overlay(&mut self, key: &str, name: &str) -> Result<OverlayHandle, OverlayError>;
    fn destroy_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError>;
    fn set_overlay_flag(
        &mut self,
        handle: OverlayHandle,
        flag: OverlayFlag,
        enabled: bool,
    ) -> Result<(), OverlayError>;
    fn set_overlay_width_in_meters(
        &mut self,
        handle: OverlayHandle,
        width: f32,
    ) -> Result<(), OverlayError>;
    fn set_overlay_from_file(
        &mut self,
        handle: OverlayHandle,
        path: &std::path::Path,
    ) -> Result<(), OverlayError>;
    fn set_overlay_texture(
        &mut self,
        handle: OverlayHandle,
        texture: TextureRef,
    ) -> Result<(), OverlayError>;
    /// Upload pixels instead of sharing a GPU texture
    fn set_overlay_raw(
        &mut self,
        handle: OverlayHandle,
        image: &RawImage<'_>,
    ) -> Result<(), OverlayError>;
    /// Whether frames should arrive as [`RawImage`]s rather than texture handles
    fn wants_raw_images(&self) -> bool {
        false
    }
    fn set_overlay_transform_tracked_device_relative(
        &mut self,
        handle: OverlayHandle,
        device: u32,
        transform: &Matrix34,
    ) -> Result<(), OverlayError>;
    fn set_overlay_alpha(&mut self, handle: OverlayHandle, alpha: f32)
    -> Result<(), OverlayError>;
    fn overlay_alpha(&self, handle: OverlayHandle) -> Result<f32, OverlayError>;
    fn show_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError>;
    fn hide_overlay(&mut self, handle: OverlayHandle) -> Result<(), OverlayError>;
}
