//! Property store with per-property dirty tracking
//!
//! Every tunable overlay property lives here as a [`ConfigProperty`]. A write
//! goes through [`ConfigStore::set`], which records the old and new value,
//! marks the property dirty and then publishes a DIRTY event on the store's
//! bus as a separate step. The component responsible for the property reacts
//! and calls [`ConfigStore::clear`], which publishes CLEARED.

use albrt_types::{AnimationType, Eye, FogType, MaskType, OverlaySettings, PatchType, Rgb, Rgba, Vec3};
use tracing::debug;

use super::property::{ConfigProperty, PropertyChange};
use crate::animation::AnimationState;
use crate::events::{EventBus, PropertyEvent};

/// Filter tag used by `broadcast_init` when the caller has no specific one
pub const DEFAULT_INIT_FILTER: &str = "init";

macro_rules! define_properties {
    ($(
        $(#[$meta:meta])*
        $variant:ident($field:ident): $ty:ty = $default:expr, persisted = $persisted:literal;
    )*) => {
        /// Names every property held by the [`ConfigStore`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Property {
            $( $(#[$meta])* $variant, )*
        }

        impl Property {
            pub const ALL: &'static [Property] = &[$( Property::$variant, )*];

            pub fn name(self) -> &'static str {
                match self {
                    $( Property::$variant => stringify!($variant), )*
                }
            }

            /// Whether the property is written to `settings.json`
            pub fn is_persisted(self) -> bool {
                match self {
                    $( Property::$variant => $persisted, )*
                }
            }
        }

        impl std::fmt::Display for Property {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        /// A property together with a value of its type.
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum Setting {
            $( $variant($ty), )*
        }

        impl Setting {
            pub fn property(&self) -> Property {
                match self {
                    $( Setting::$variant(_) => Property::$variant, )*
                }
            }
        }

        #[derive(Debug, Clone)]
        struct Properties {
            $( $field: ConfigProperty<$ty>, )*
        }

        impl Properties {
            fn with_defaults() -> Self {
                Self {
                    $( $field: ConfigProperty::new($default), )*
                }
            }

            fn get(&self, property: Property) -> Setting {
                match property {
                    $( Property::$variant => Setting::$variant(self.$field.value()), )*
                }
            }

            fn is_dirty(&self, property: Property) -> bool {
                match property {
                    $( Property::$variant => self.$field.is_dirty(), )*
                }
            }

            /// Returns the previous value, wrapped in the same variant
            fn write(&mut self, setting: Setting) -> Setting {
                match setting {
                    $( Setting::$variant(value) => Setting::$variant(self.$field.write(value)), )*
                }
            }

            fn clear(&mut self, property: Property) -> bool {
                match property {
                    $( Property::$variant => self.$field.clear(), )*
                }
            }
        }

        impl ConfigStore {
            $(
                pub fn $field(&self) -> $ty {
                    self.values.$field.value()
                }
            )*
        }
    };
}

define_properties! {
    /// Pure flag: the measured IPD moved and eye transforms must be recomputed
    IpdChanged(ipd_changed): bool = false, persisted = false;
    /// Static overlay opacity
    Alpha(alpha): f32 = 1.0, persisted = true;
    OverlayMaskType(overlay_mask_type): MaskType = MaskType::Patch, persisted = true;
    PatchColour(patch_colour): Rgb = Rgb::BLACK, persisted = true;
    PatchType(patch_type): PatchType = PatchType::Radial, persisted = true;
    PatchRadialSize(patch_radial_size): f32 = 0.05, persisted = true;
    PatchRadialSoftness(patch_radial_softness): f32 = 0.2, persisted = true;
    SlatColour(slat_colour): Rgb = Rgb::BLACK, persisted = true;
    SlatHeight(slat_height): f32 = 0.5, persisted = true;
    SlatSliceHeight(slat_slice_height): f32 = 0.1, persisted = true;
    SlatSliceOffset(slat_slice_offset): f32 = 0.0, persisted = true;
    HideInDash(hide_in_dash): bool = true, persisted = true;
    OverlaysVisible(overlays_visible): bool = true, persisted = true;
    EyeToRender(eye_to_render): Eye = Eye::Both, persisted = true;
    EyesSwitched(eyes_switched): bool = false, persisted = true;
    AlphaTEnabled(alpha_t_enabled): bool = false, persisted = true;
    /// Alpha-over-time period, seconds
    AlphaTSpeed(alpha_t_speed): f32 = 3.0, persisted = true;
    AlphaTType(alpha_t_type): AnimationType = AnimationType::PingPong, persisted = true;
    /// Reserved for the 3D mask path
    VirtualDistance(virtual_distance): f32 = 1.0, persisted = false;
    FogColour(fog_colour): Rgba = Rgba::OPAQUE_BLACK, persisted = false;
    FogAnimated(fog_animated): bool = false, persisted = false;
    FogSpeed(fog_speed): f32 = 0.1, persisted = false;
    FogDirection(fog_direction): Vec3 = Vec3([0.0, 0.0, 0.0]), persisted = false;
    FogType(fog_type): FogType = FogType::Clouds, persisted = false;
    FogSeed(fog_seed): f32 = 0.0, persisted = false;
}

/// Owns every property value, its dirty flag and the configuration channel.
pub struct ConfigStore {
    values: Properties,
    bus: EventBus<PropertyEvent>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            values: Properties::with_defaults(),
            bus: EventBus::new(),
        }
    }

    /// The configuration channel. Subscribe here to observe DIRTY, CLEARED
    /// and INIT events.
    pub fn bus(&self) -> &EventBus<PropertyEvent> {
        &self.bus
    }

    pub fn get(&self, property: Property) -> Setting {
        self.values.get(property)
    }

    pub fn is_dirty(&self, property: Property) -> bool {
        self.values.is_dirty(property)
    }

    pub fn dirty_properties(&self) -> Vec<Property> {
        Property::ALL
            .iter()
            .copied()
            .filter(|p| self.values.is_dirty(*p))
            .collect()
    }

    /// Write a value. Always marks dirty and publishes DIRTY, even when the
    /// value is identical to the current one.
    pub fn set(&mut self, setting: Setting) -> PropertyChange {
        let old = self.values.write(setting);
        let change = PropertyChange {
            property: setting.property(),
            old,
            new: setting,
        };
        debug!(property = %change.property, new = ?change.new, "property dirty");

        self.bus.publish(&PropertyEvent::Dirty(change));
        change
    }

    /// Mark a property reconciled and publish CLEARED. Returns whether it was
    /// dirty beforehand.
    pub fn clear(&mut self, property: Property) -> bool {
        let was_dirty = self.values.clear(property);
        let value = self.values.get(property);
        self.bus.publish(&PropertyEvent::Cleared { property, value });
        was_dirty
    }

    /// Clear a property while putting a value back, without a DIRTY event.
    /// Used for one-shot flags that reset once handled.
    pub fn clear_to(&mut self, setting: Setting) -> bool {
        let property = setting.property();
        let was_dirty = self.values.is_dirty(property);
        self.values.write(setting);
        self.values.clear(property);
        self.bus.publish(&PropertyEvent::Cleared {
            property,
            value: setting,
        });
        was_dirty
    }

    /// The alpha-over-time curve, when enabled
    pub fn alpha_animation(&self) -> Option<AnimationState> {
        self.alpha_t_enabled().then(|| AnimationState {
            kind: self.alpha_t_type(),
            period: self.alpha_t_speed(),
        })
    }

    /// Re-emit every property as an INIT event tagged with `filter`, so a late
    /// subscriber can resynchronise. Dirty flags are untouched.
    pub fn broadcast_init(&self, filter: &str) {
        for property in Property::ALL {
            self.bus.publish(&PropertyEvent::Init {
                filter: filter.to_string(),
                property: *property,
                value: self.values.get(*property),
            });
        }
    }

    /// The persisted subset of the current values
    pub fn snapshot(&self) -> OverlaySettings {
        OverlaySettings {
            alpha: self.alpha(),
            overlay_mask_type: self.overlay_mask_type(),
            patch_colour: self.patch_colour(),
            patch_type: self.patch_type(),
            patch_radial_size: self.patch_radial_size(),
            patch_radial_softness: self.patch_radial_softness(),
            slat_colour: self.slat_colour(),
            slat_height: self.slat_height(),
            slat_slice_height: self.slat_slice_height(),
            slat_slice_offset: self.slat_slice_offset(),
            hide_in_dash: self.hide_in_dash(),
            overlays_visible: self.overlays_visible(),
            eye_to_render: self.eye_to_render(),
            eyes_switched: self.eyes_switched(),
            alpha_t_enabled: self.alpha_t_enabled(),
            alpha_t_speed: self.alpha_t_speed(),
            alpha_t_type: self.alpha_t_type(),
        }
    }

    /// Apply every persisted value through the normal `set` path
    pub fn apply_settings(&mut self, settings: &OverlaySettings) {
        for setting in persisted_settings(settings) {
            self.set(setting);
        }
    }
}

fn persisted_settings(s: &OverlaySettings) -> [Setting; 17] {
    [
        Setting::Alpha(s.alpha),
        Setting::OverlayMaskType(s.overlay_mask_type),
        Setting::PatchColour(s.patch_colour),
        Setting::PatchType(s.patch_type),
        Setting::PatchRadialSize(s.patch_radial_size),
        Setting::PatchRadialSoftness(s.patch_radial_softness),
        Setting::SlatColour(s.slat_colour),
        Setting::SlatHeight(s.slat_height),
        Setting::SlatSliceHeight(s.slat_slice_height),
        Setting::SlatSliceOffset(s.slat_slice_offset),
        Setting::HideInDash(s.hide_in_dash),
        Setting::OverlaysVisible(s.overlays_visible),
        Setting::EyeToRender(s.eye_to_render),
        Setting::EyesSwitched(s.eyes_switched),
        Setting::AlphaTEnabled(s.alpha_t_enabled),
        Setting::AlphaTSpeed(s.alpha_t_speed),
        Setting::AlphaTType(s.alpha_t_type),
    ]
}
