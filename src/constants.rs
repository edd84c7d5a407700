//! Hard-coded constants for the tree builder and its dependents.

/// Status value of a padded border cell. Never processed by the flood.
pub const BORDER_STATUS: i64 = -3;

/// Status value of a pixel that has not been queued yet.
pub const ACTIVE: i64 = -2;

/// Status value of a pixel that is queued but not yet popped.
pub const NOT_ACTIVE: i64 = -1;

/// For avoiding divide-by-zero errors.
pub const EPSILON: f64 = 1e-8;
