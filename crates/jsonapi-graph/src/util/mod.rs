//! Utility modules.

pub mod path;

pub use path::{deep_merge, get_path, set_path};
