pub mod bus;
pub mod types;

pub use bus::{EventBus, Subscriber, SubscriptionId};
pub use types::{ManagerEvent, PropertyEvent};
