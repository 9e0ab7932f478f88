//! # Device tree: identity, parent links and explicit children.
//!
//! - [`Device`] - trait every node implements (leaf signals and composites alike)
//! - [`DeviceCore`] - set-once name / parent storage embedded in each node
//! - [`Child`] - one explicitly registered `(attribute, device)` pair

#[allow(clippy::module_inception)]
mod device;

pub use device::{Child, Device, DeviceCore, child_name};
