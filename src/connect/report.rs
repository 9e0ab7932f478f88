//! # Hierarchical connection failure report.
//!
//! [`NotConnected`] is built bottom-up: a signal that could not connect reports
//! a [`Leaf`](NotConnected::Leaf) with its source address; a composite reports
//! [`Children`](NotConnected::Children), one entry per failing child in
//! registration order.
//!
//! ## Rendering
//! ```text
//! stage:
//!   x: sim://BL01:X:Readback
//!   y:
//!     velocity: ca://BL01:Y:Velo
//!     stop: ca://BL01:Y:Stop
//! ```
//! One line per failing leaf. A child whose own report is a single line
//! collapses onto its name (`x: ...`); deeper reports are indented two spaces
//! per level.

use std::fmt;

/// Tree-shaped report naming every device that failed to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotConnected {
    /// A leaf failure, usually the source address that did not connect.
    Leaf(String),
    /// Failures of named children, in registration order.
    Children(Vec<(String, NotConnected)>),
}

impl NotConnected {
    /// Leaf report from a message.
    pub fn leaf(message: impl Into<String>) -> Self {
        NotConnected::Leaf(message.into())
    }

    /// Rendered report lines, without trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        match self {
            NotConnected::Leaf(message) => vec![message.clone()],
            NotConnected::Children(children) => {
                let mut lines = Vec::new();
                for (name, report) in children {
                    let sub = report.lines();
                    if let [only] = sub.as_slice() {
                        lines.push(format!("{name}: {only}"));
                    } else {
                        lines.push(format!("{name}:"));
                        lines.extend(sub.into_iter().map(|l| format!("  {l}")));
                    }
                }
                lines
            }
        }
    }

    /// Report of the direct child `name`, if it failed.
    pub fn get(&self, name: &str) -> Option<&NotConnected> {
        match self {
            NotConnected::Leaf(_) => None,
            NotConnected::Children(children) => {
                children.iter().find(|(n, _)| n == name).map(|(_, r)| r)
            }
        }
    }

    /// Names of the failing direct children, in order.
    pub fn failed_names(&self) -> Vec<&str> {
        match self {
            NotConnected::Leaf(_) => Vec::new(),
            NotConnected::Children(children) => children.iter().map(|(n, _)| n.as_str()).collect(),
        }
    }

    /// Splits the report into its named entries.
    ///
    /// A leaf becomes a single entry under `name`.
    pub fn into_entries(self, name: &str) -> Vec<(String, NotConnected)> {
        match self {
            NotConnected::Children(children) => children,
            leaf => vec![(name.to_string(), leaf)],
        }
    }

    /// Returns a short stable label for use in logs.
    pub fn as_label(&self) -> &'static str {
        "not_connected"
    }
}

impl fmt::Display for NotConnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

impl std::error::Error for NotConnected {}
