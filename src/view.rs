use crate::arena::{Color, NodeId, NIL};
use crate::OrderStatTree;

/// Read-only handle to a node of an [`OrderStatTree`].
///
/// Sentinel positions are reported as `None` by the link accessors.
pub struct NodeRef<'a, K, V> {
    tree: &'a OrderStatTree<K, V>,
    id: NodeId,
}

impl<K, V> Clone for NodeRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<'_, K, V> {}

impl<'a, K, V> NodeRef<'a, K, V> {
    pub(crate) fn new(tree: &'a OrderStatTree<K, V>, id: NodeId) -> Option<Self> {
        (id != NIL).then_some(Self { tree, id })
    }

    pub fn key(&self) -> &'a K {
        self.tree.nodes.key(self.id)
    }

    /// Top of the value stack.
    pub fn value(&self) -> &'a V {
        self.tree.nodes.top(self.id).1
    }

    /// The node's values, most recently inserted first.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &'a V> + 'a {
        self.tree.nodes.entry(self.id).values.iter().rev()
    }

    pub fn value_count(&self) -> usize {
        self.tree.nodes.own(self.id)
    }

    /// Total values stored in the subtree rooted at this node.
    pub fn subtree_count(&self) -> usize {
        self.tree.nodes.count(self.id)
    }

    pub fn color(&self) -> Color {
        self.tree.nodes.color(self.id)
    }

    pub fn is_red(&self) -> bool {
        self.color() == Color::Red
    }

    pub fn left(&self) -> Option<Self> {
        Self::new(self.tree, self.tree.nodes.left(self.id))
    }

    pub fn right(&self) -> Option<Self> {
        Self::new(self.tree, self.tree.nodes.right(self.id))
    }

    pub fn parent(&self) -> Option<Self> {
        Self::new(self.tree, self.tree.nodes.parent(self.id))
    }

    /// Whether both handles point at the same node of the same tree.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl<K: std::fmt::Debug, V> std::fmt::Debug for NodeRef<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("key", self.key())
            .field("color", &self.color())
            .field("value_count", &self.value_count())
            .field("subtree_count", &self.subtree_count())
            .finish()
    }
}
