//! Engine version with total ordering.

use std::fmt;

/// A `major.minor.patch` engine library version.
///
/// Versions order numerically component by component, so feature gates
/// can be expressed as plain comparisons.
///
/// # Example
///
/// ```rust
/// use litelink_engine::EngineVersion;
///
/// let v = EngineVersion::new(3, 7, 2);
/// assert!(v >= EngineVersion::new(2, 6, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    /// Major version component.
    pub major: u16,
    /// Minor version component.
    pub minor: u16,
    /// Patch version component.
    pub patch: u16,
}

impl EngineVersion {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
