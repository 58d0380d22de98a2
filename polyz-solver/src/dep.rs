//! Dependency tracking for unsat cores.
//!
//! Every input constraint may carry an opaque tag. Learned lemmas carry
//! the join of the dependencies of the constraints they were derived
//! from, as an immutable DAG node; an unsat verdict linearizes the final
//! node back into the set of input tags.

use rustc_hash::{FxHashMap, FxHashSet};

/// Opaque tag attached to input constraints.
pub type DepTag = u32;

/// Handle to a node in the dependency DAG. The null reference denotes
/// "no dependencies".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepRef(u32);

impl DepRef {
    /// The empty dependency.
    pub const NULL: DepRef = DepRef(u32::MAX);

    /// Whether this is the empty dependency.
    #[must_use]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

#[derive(Debug, Clone, Copy)]
enum DepNode {
    Leaf(DepTag),
    Join(DepRef, DepRef),
}

/// Interned DAG of dependency nodes.
#[derive(Debug, Default)]
pub struct DepManager {
    nodes: Vec<DepNode>,
    leaves: FxHashMap<DepTag, DepRef>,
    joins: FxHashMap<(u32, u32), DepRef>,
}

impl DepManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: DepNode) -> DepRef {
        let id = u32::try_from(self.nodes.len()).expect("dependency arena overflow");
        self.nodes.push(node);
        DepRef(id)
    }

    /// The dependency consisting of a single input tag.
    pub fn leaf(&mut self, tag: DepTag) -> DepRef {
        if let Some(&d) = self.leaves.get(&tag) {
            return d;
        }
        let d = self.push(DepNode::Leaf(tag));
        self.leaves.insert(tag, d);
        d
    }

    /// The union of two dependencies.
    pub fn join(&mut self, a: DepRef, b: DepRef) -> DepRef {
        if a.is_null() || a == b {
            return b;
        }
        if b.is_null() {
            return a;
        }
        let key = (a.0.min(b.0), a.0.max(b.0));
        if let Some(&d) = self.joins.get(&key) {
            return d;
        }
        let d = self.push(DepNode::Join(a, b));
        self.joins.insert(key, d);
        d
    }

    /// The distinct input tags under `dep`, in increasing order.
    #[must_use]
    pub fn linearize(&self, dep: DepRef) -> Vec<DepTag> {
        let mut tags = Vec::new();
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        let mut stack = vec![dep];
        while let Some(d) = stack.pop() {
            if d.is_null() || !seen.insert(d.0) {
                continue;
            }
            match self.nodes[d.0 as usize] {
                DepNode::Leaf(tag) => tags.push(tag),
                DepNode::Join(a, b) => {
                    stack.push(a);
                    stack.push(b);
                }
            }
        }
        tags.sort_unstable();
        tags.dedup();
        tags
    }
}
