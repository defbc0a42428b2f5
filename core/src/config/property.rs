use super::store::{Property, Setting};

/// A typed value paired with its dirty flag.
///
/// Writing always marks the property dirty, even when the value is unchanged.
/// Only an explicit `clear` makes it clean again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigProperty<T> {
    value: T,
    dirty: bool,
}

impl<T: Copy> ConfigProperty<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Store a new value and mark dirty. Returns the previous value.
    pub(crate) fn write(&mut self, value: T) -> T {
        self.dirty = true;
        std::mem::replace(&mut self.value, value)
    }

    /// Returns whether the property was dirty before clearing
    pub(crate) fn clear(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// Describes one completed `set`: which property, and the values either side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyChange {
    pub property: Property,
    pub old: Setting,
    pub new: Setting,
}

impl PropertyChange {
    /// True when the write stored the value that was already there
    pub fn is_same_value(&self) -> bool {
        self.old == self.new
    }
}
