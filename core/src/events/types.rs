use crate::config::{Property, PropertyChange, Setting};

/// Events published on the configuration channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEvent {
    /// Resync snapshot from `broadcast_init`. Never touches dirty state.
    Init {
        filter: String,
        property: Property,
        value: Setting,
    },
    /// A value was just written; the responsible handler must react and clear.
    Dirty(PropertyChange),
    /// The handler finished reacting to a property. Informational only.
    Cleared { property: Property, value: Setting },
}

impl PropertyEvent {
    pub fn property(&self) -> Property {
        match self {
            PropertyEvent::Init { property, .. } => *property,
            PropertyEvent::Dirty(change) => change.property,
            PropertyEvent::Cleared { property, .. } => *property,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PropertyEvent::Init { .. } => "init",
            PropertyEvent::Dirty(_) => "dirty",
            PropertyEvent::Cleared { .. } => "cleared",
        }
    }
}

/// Events published on the lifecycle channel. Runtime-originated events
/// (dashboard, quit) share this channel with the manager's own transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Loading,
    Started,
    /// Startup failed. Carries the code, a human-readable error and a remedy.
    Error {
        code: String,
        error: String,
        solution: String,
    },
    Quit,
    DashboardOpened,
    DashboardClosed,
}
