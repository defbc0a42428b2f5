pub mod animation;
pub mod config;
pub mod context;
pub mod events;
pub mod scheduler;
pub mod transform;
pub mod vr;

// Re-exports for convenience
pub use animation::AnimationState;
pub use config::{ConfigStore, Property, PropertyChange, Setting};
pub use context::{ConfigError, ConfigStorage, JsonFileStorage, MemoryStorage, StartupError};
pub use events::{EventBus, ManagerEvent, PropertyEvent, Subscriber, SubscriptionId};
pub use scheduler::{CancelToken, RunOutcome, Scheduler, TICK_RATE_HZ, Tick, TickControl};
pub use transform::{EyeTransforms, TransformResolver};
pub use vr::{
    EyeSlot, Matrix34, OverlayError, OverlayFlag, OverlayHandle, RawImage, TextureRef, VrEvent,
    VrInitError, VrRuntime,
};
