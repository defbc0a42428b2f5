pub mod event_log;
pub mod logging;
pub mod manager;


pub use event_log::EventLogger;
pub use manager::{LifecycleState, Manager};
