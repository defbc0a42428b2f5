mod property;
mod store;


pub use property::{ConfigProperty, PropertyChange};
pub use store::{ConfigStore, DEFAULT_INIT_FILTER, Property, Setting};
