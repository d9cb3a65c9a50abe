/// What [`RbTree::insert`](crate::RbTree::insert) does with a key that is already present.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DuplicateKeys {
    /// Replace the stored value with the new one and report [`Insert::Updated`].
    ///
    /// [`Insert::Updated`]: crate::Insert::Updated
    #[default]
    Overwrite,

    /// Keep the stored value, drop the new one and report [`Insert::Kept`].
    ///
    /// [`Insert::Kept`]: crate::Insert::Kept
    KeepExisting,
}

/// Construction-time settings of a tree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Policy for inserting a key that is already present.
    pub duplicates: DuplicateKeys,
}

impl Config {
    /// Returns the default configuration.
    pub const fn new() -> Self {
        Config {
            duplicates: DuplicateKeys::Overwrite,
        }
    }

    /// Sets the duplicate-key policy.
    #[must_use]
    pub const fn duplicates(mut self, duplicates: DuplicateKeys) -> Self {
        self.duplicates = duplicates;
        self
    }
}
