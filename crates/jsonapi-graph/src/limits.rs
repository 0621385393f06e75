//! Bounds applied while encoding.

/// Default maximum relationship nesting depth for one encode call.
///
/// The primary resource sits at depth 0; each relationship hop adds one.
pub const DEFAULT_MAX_DEPTH: usize = 64;
