//! Flat DOM snapshot model captured by the page shim
//!
//! The shim serializes the document as a vector of nodes in document order, so
//! a node's index doubles as its id and every parent index is smaller than its
//! children's. Element bounds are viewport-relative client rects; the viewport
//! carries the scroll offsets needed to convert to page coordinates.

use serde::{Deserialize, Serialize};

/// Index into [`DomSnapshot::nodes`].
pub type NodeId = usize;

/// Upper bound on nodes per snapshot. The shim stops collecting here; the
/// agent re-enforces it on ingest in case a foreign client sends more.
pub const MAX_SNAPSHOT_NODES: usize = 5000;

/// A viewport-relative client rect.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Point-in-rect test, inclusive of all edges.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Zero-area rects never participate in hit testing.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// One element captured by the shim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
    /// Index of the parent element, absent for the document root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Lowercase tag name.
    pub tag: String,
    /// Value of the tracked attribute at capture time, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    /// The `type` attribute for inputs, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Trimmed visible text, truncated by the shim.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bounds: Bounds,
}

/// Viewport dimensions and scroll offsets at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

/// A point-in-time capture of one page's element tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    pub nodes: Vec<DomNode>,
    pub viewport: Viewport,
    /// Node the user most recently right-clicked, when the shim saw one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_clicked: Option<NodeId>,
}

impl DomSnapshot {
    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate ancestor ids from `id`'s parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(id).and_then(|n| n.parent), move |&p| {
            self.nodes.get(p).and_then(|n| n.parent)
        })
    }

    /// Number of ancestors between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Find the element under a viewport-relative point.
    ///
    /// The deepest node with a positive-area rect containing the point wins;
    /// among equally deep candidates the one later in document order does,
    /// matching how a browser would resolve overlapping siblings.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<NodeId> {
        let mut best: Option<(usize, NodeId)> = None;
        for (id, node) in self.nodes.iter().enumerate() {
            if !node.bounds.has_area() || !node.bounds.contains(x, y) {
                continue;
            }
            let depth = self.depth(id);
            if best.map_or(true, |(d, _)| depth >= d) {
                best = Some((depth, id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Truncate an oversized snapshot, dropping references into the removed
    /// tail. Returns whether anything was cut.
    pub fn enforce_cap(&mut self) -> bool {
        if self.nodes.len() <= MAX_SNAPSHOT_NODES {
            return false;
        }
        self.nodes.truncate(MAX_SNAPSHOT_NODES);
        for node in &mut self.nodes {
            if matches!(node.parent, Some(p) if p >= MAX_SNAPSHOT_NODES) {
                node.parent = None;
            }
        }
        if matches!(self.right_clicked, Some(id) if id >= MAX_SNAPSHOT_NODES) {
            self.right_clicked = None;
        }
        true
    }
}
