//! # Device abstraction and naming.
//!
//! A [`Device`] is a node in the orchestration tree. It has:
//! - a **name**: empty until [`Device::set_name`] is called with a non-empty value,
//!   then fixed for the lifetime of the device;
//! - an optional **parent**: a weak back-reference, never owning;
//! - an ordered list of **children** declared explicitly at construction.
//!
//! ## Naming
//! ```text
//! stage.set_name("stage")
//!   ├─► stage.name = "stage"
//!   ├─► x.set_name("stage-x")        x.parent = stage
//!   │     └─► readback.set_name("stage-x-readback") ...
//!   └─► y.set_name("stage-y")        y.parent = stage
//! ```
//! - Blank names and second calls are no-ops; children that already have a name keep it.
//! - Trailing `_` on an attribute is dropped (`stop_` → `stage-stop`).
//!
//! ## Connecting
//! [`Device::connect`] receives a prefix (used to build hierarchical source
//! addresses), a simulation flag and a [`CancellationToken`]. Composite devices
//! delegate to [`connect_children`](crate::connect_children).

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::connect::NotConnected;

/// Builds the name of a child: `parent-attr` without trailing underscores on `attr`.
///
/// # Example
/// ```
/// use devicevisor::child_name;
///
/// assert_eq!(child_name("mover", "stop_"), "mover-stop");
/// ```
pub fn child_name(parent: &str, attr: &str) -> String {
    format!("{parent}-{}", attr.trim_end_matches('_'))
}

/// Set-once identity storage shared by all device implementations.
///
/// Embed one in every device and return it from [`Device::core`].
#[derive(Default)]
pub struct DeviceCore {
    name: OnceLock<String>,
    parent: OnceLock<Weak<dyn Device>>,
    this: OnceLock<Weak<dyn Device>>,
}

impl DeviceCore {
    /// Creates an unnamed core.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a weak reference to the device owning this core.
    ///
    /// Composites call this from `Arc::new_cyclic` so that naming can wire
    /// parent links into their children.
    pub fn bind(&self, me: Weak<dyn Device>) {
        let _ = self.this.set(me);
    }

    /// The device owning this core, if it was bound and is still alive.
    pub fn this(&self) -> Option<Arc<dyn Device>> {
        self.this.get().and_then(Weak::upgrade)
    }

    /// Current name, `""` while unnamed.
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or("")
    }

    /// Sets the name if `name` is non-empty and none was set before.
    ///
    /// Returns true when this call named the device.
    pub fn claim_name(&self, name: &str) -> bool {
        !name.is_empty() && self.name.set(name.to_string()).is_ok()
    }

    /// Parent device, if set and still alive.
    pub fn parent(&self) -> Option<Arc<dyn Device>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// Sets the parent back-reference (first call wins).
    pub fn set_parent(&self, parent: Weak<dyn Device>) {
        let _ = self.parent.set(parent);
    }
}

impl std::fmt::Debug for DeviceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCore")
            .field("name", &self.name())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}

/// One explicitly registered child of a device.
#[derive(Clone)]
pub struct Child {
    /// Attribute name under which the child is registered (used for naming).
    pub attr: String,
    /// The child device.
    pub device: Arc<dyn Device>,
}

impl Child {
    /// Creates a child entry.
    pub fn new(attr: impl Into<String>, device: Arc<dyn Device>) -> Self {
        Self {
            attr: attr.into(),
            device,
        }
    }
}

impl std::fmt::Debug for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Child")
            .field("attr", &self.attr)
            .field("name", &self.device.name())
            .finish()
    }
}

/// # A node of the device tree.
///
/// Implementors provide [`core`](Device::core) and [`connect`](Device::connect);
/// composites also override [`children`](Device::children).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use devicevisor::{Device, DeviceCore, NotConnected};
///
/// #[derive(Default)]
/// struct Shutter {
///     core: DeviceCore,
/// }
///
/// #[async_trait]
/// impl Device for Shutter {
///     fn core(&self) -> &DeviceCore {
///         &self.core
///     }
///
///     async fn connect(&self, _prefix: &str, _sim: bool, _ctx: CancellationToken) -> Result<(), NotConnected> {
///         Ok(())
///     }
/// }
///
/// let shutter = Shutter::default();
/// shutter.set_name("shutter");
/// shutter.set_name("other");
/// assert_eq!(shutter.name(), "shutter");
/// ```
#[async_trait]
pub trait Device: Send + Sync + 'static {
    /// Identity storage of this device.
    fn core(&self) -> &DeviceCore;

    /// Current name, `""` while unnamed.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Parent device, if this device was named through a parent.
    fn parent(&self) -> Option<Arc<dyn Device>> {
        self.core().parent()
    }

    /// Ordered children of this device.
    fn children(&self) -> Vec<Child> {
        Vec::new()
    }

    /// Names this device and, recursively, its children.
    ///
    /// No-op if `name` is empty or the device is already named.
    fn set_name(&self, name: &str) {
        if !self.core().claim_name(name) {
            return;
        }
        let me = self.core().this();
        for child in self.children() {
            child.device.set_name(&child_name(name, &child.attr));
            if let Some(me) = &me {
                child.device.core().set_parent(Arc::downgrade(me));
            }
        }
    }

    /// Connects this device and all of its children.
    ///
    /// Cancelling `ctx` aborts the connection; the returned report names every
    /// leaf that did not connect.
    async fn connect(
        &self,
        prefix: &str,
        sim: bool,
        ctx: CancellationToken,
    ) -> Result<(), NotConnected>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Leaf {
        core: DeviceCore,
    }

    #[async_trait]
    impl Device for Leaf {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        async fn connect(&self, _: &str, _: bool, _: CancellationToken) -> Result<(), NotConnected> {
            Ok(())
        }
    }

    struct Node {
        core: DeviceCore,
        children: Vec<Child>,
    }

    impl Node {
        fn new(children: Vec<Child>) -> Arc<Self> {
            Arc::new_cyclic(|me: &Weak<Node>| {
                let core = DeviceCore::new();
                let me: Weak<dyn Device> = me.clone();
                core.bind(me);
                Node { core, children }
            })
        }
    }

    #[async_trait]
    impl Device for Node {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        fn children(&self) -> Vec<Child> {
            self.children.clone()
        }

        async fn connect(&self, _: &str, _: bool, _: CancellationToken) -> Result<(), NotConnected> {
            Ok(())
        }
    }

    #[test]
    fn test_name_is_set_once() {
        let leaf = Leaf::default();
        assert_eq!(leaf.name(), "");
        leaf.set_name("");
        assert_eq!(leaf.name(), "");
        leaf.set_name("first");
        leaf.set_name("second");
        assert_eq!(leaf.name(), "first");
    }

    #[test]
    fn test_names_propagate_to_children_with_parent_links() {
        let velocity: Arc<dyn Device> = Arc::new(Leaf::default());
        let stop: Arc<dyn Device> = Arc::new(Leaf::default());
        let x = Node::new(vec![
            Child::new("velocity", Arc::clone(&velocity)),
            Child::new("stop_", Arc::clone(&stop)),
        ]);
        let stage = Node::new(vec![Child::new("x", x.clone())]);

        stage.set_name("stage");

        assert_eq!(x.name(), "stage-x");
        assert_eq!(velocity.name(), "stage-x-velocity");
        assert_eq!(stop.name(), "stage-x-stop");
        assert_eq!(x.parent().map(|p| p.name().to_string()).as_deref(), Some("stage"));
        assert_eq!(
            velocity.parent().map(|p| p.name().to_string()).as_deref(),
            Some("stage-x")
        );
        assert!(stage.parent().is_none());
    }

    #[test]
    fn test_already_named_child_keeps_name() {
        let det: Arc<dyn Device> = Arc::new(Leaf::default());
        det.set_name("det");
        let group = Node::new(vec![Child::new("det", Arc::clone(&det))]);
        group.set_name("group");
        assert_eq!(det.name(), "det");
        assert_eq!(det.parent().map(|p| p.name().to_string()).as_deref(), Some("group"));
    }

    #[test]
    fn test_child_name_strips_trailing_underscores() {
        assert_eq!(child_name("m", "set_"), "m-set");
        assert_eq!(child_name("m", "a_b"), "m-a_b");
    }
}
