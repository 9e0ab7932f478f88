//! # Composite readables.
//!
//! - [`StandardReadable`] - builder-constructed composite with read/config lists
//! - [`Renamed`] / [`Uncached`] - read-list adapters (primary re-keying, fresh reads)
//! - [`merge_gathered`] - concurrent gather of name-keyed maps

mod merge;
mod standard;
mod wrappers;

pub use merge::merge_gathered;
pub use standard::{StandardReadable, StandardReadableBuilder};
pub use wrappers::{Renamed, Uncached};
