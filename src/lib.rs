//! # rb-ostat
//!
//! An ordered multimap backed by a red-black tree whose nodes carry
//! subtree value counts, giving O(log n) rank selection and predecessor
//! queries on top of the usual lookups.
//!
//! Several values may share a key. They are kept on a per-key stack: the most
//! recently inserted value is the one returned by [`OrderStatTree::get`] and
//! the first one taken by [`OrderStatTree::remove`].
//!
//! ## Example
//!
//! ```rust
//! use rb_ostat::OrderStatTree;
//!
//! let mut tree = OrderStatTree::new();
//! tree.put(10, "a");
//! tree.put(10, "b");
//! tree.put(3, "c");
//!
//! assert_eq!(tree.len(), 3);
//! assert_eq!(tree.get(&10), Some(&"b"));
//! assert_eq!(tree.select(1), Ok((&3, &"c")));
//! assert_eq!(tree.select(2), Ok((&10, &"b")));
//! assert_eq!(tree.remove(&10), Some("b"));
//! assert_eq!(tree.remove(&10), Some("a"));
//! assert!(!tree.contains_key(&10));
//! ```

use std::borrow::Borrow;
use std::cmp::Ordering;

use log::{debug, trace};

mod arena;
mod balance;
mod error;
mod view;

use arena::{NodeArena, NodeId, NIL};

pub use arena::Color;
pub use error::{Result, TreeError};
pub use view::NodeRef;

// =============================================================================
// OrderStatTree
// =============================================================================

/// An ordered multimap with order-statistic queries.
///
/// Features:
/// - Red-black balancing, so every operation is O(log n)
/// - Per-key value stacks (last in, first out)
/// - Rank selection over all stored values via subtree counts
/// - Arena node storage with id recycling and a per-tree sentinel
///
/// Nodes are addressed by `u32` ids, so at most `u32::MAX` distinct keys can
/// be live at once. Inserting past that limit panics.
pub struct OrderStatTree<K, V> {
    nodes: NodeArena<K, V>,
    root: NodeId,
}

impl<K, V> OrderStatTree<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty tree with room for `capacity` distinct keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: NodeArena::with_capacity(capacity),
            root: NIL,
        }
    }

    /// Total number of stored values, counting every value of every key.
    #[doc(alias = "size")]
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.count(self.root)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.nodes.live()
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        let mut best = 0;
        let mut stack = Vec::new();
        if self.root != NIL {
            stack.push((self.root, 1usize));
        }
        while let Some((id, depth)) = stack.pop() {
            best = best.max(depth);
            for child in [self.nodes.left(id), self.nodes.right(id)] {
                if child != NIL {
                    stack.push((child, depth + 1));
                }
            }
        }
        best
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity_bytes()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        debug!("shrank node arena to {} bytes", self.memory_usage());
    }

    pub fn clear(&mut self) {
        debug!("clearing tree of {} values", self.len());
        self.nodes.clear();
        self.root = NIL;
    }

    /// Read-only view of the root node, for structural inspection.
    pub fn root_node(&self) -> Option<NodeRef<'_, K, V>> {
        NodeRef::new(self, self.root)
    }

    // -------------------------------------------------------------------------
    // Order statistics
    // -------------------------------------------------------------------------

    /// Entry with the smallest key (top of its value stack).
    pub fn min(&self) -> Result<(&K, &V)> {
        if self.root == NIL {
            return Err(TreeError::Empty);
        }
        Ok(self.nodes.top(self.subtree_min(self.root)))
    }

    /// Entry with the largest key (top of its value stack).
    pub fn max(&self) -> Result<(&K, &V)> {
        if self.root == NIL {
            return Err(TreeError::Empty);
        }
        Ok(self.nodes.top(self.subtree_max(self.root)))
    }

    /// Returns the value of 1-based `rank` among all stored values.
    ///
    /// Values are ranked by key; values sharing a key are ranked in retrieval
    /// order, most recently inserted first.
    pub fn select(&self, rank: usize) -> Result<(&K, &V)> {
        if self.root == NIL {
            return Err(TreeError::Empty);
        }
        let len = self.len();
        if rank == 0 || rank > len {
            return Err(TreeError::OutOfRange { rank, len });
        }

        let mut rank = rank;
        let mut current = self.root;
        loop {
            let left = self.nodes.left(current);
            let left_count = self.nodes.count(left);
            let own = self.nodes.own(current);

            if rank <= left_count {
                current = left;
            } else if rank > left_count + own {
                rank -= left_count + own;
                current = self.nodes.right(current);
            } else {
                let entry = self.nodes.entry(current);
                // Offset 1 is the top of the stack.
                let offset = rank - left_count;
                return Ok((&entry.key, &entry.values[own - offset]));
            }

            if current == NIL {
                arena::invalid_structure("select descended past a leaf");
            }
        }
    }

    fn subtree_min(&self, mut id: NodeId) -> NodeId {
        while self.nodes.left(id) != NIL {
            id = self.nodes.left(id);
        }
        id
    }

    fn subtree_max(&self, mut id: NodeId) -> NodeId {
        while self.nodes.right(id) != NIL {
            id = self.nodes.right(id);
        }
        id
    }

    /// Walks the tree in key order.
    fn for_each_in_order(&self, mut f: impl FnMut(NodeId)) {
        let mut stack = Vec::new();
        let mut current = self.root;
        while current != NIL || !stack.is_empty() {
            while current != NIL {
                stack.push(current);
                current = self.nodes.left(current);
            }
            if let Some(id) = stack.pop() {
                f(id);
                current = self.nodes.right(id);
            }
        }
    }
}

impl<K, V> OrderStatTree<K, V> {
    fn search<Q>(&self, key: &Q) -> NodeId
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root;
        while current != NIL {
            match key.cmp(self.nodes.key(current).borrow()) {
                Ordering::Less => current = self.nodes.left(current),
                Ordering::Greater => current = self.nodes.right(current),
                Ordering::Equal => return current,
            }
        }
        NIL
    }

    /// Most recently inserted value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            NIL => None,
            id => Some(self.nodes.top(id).1),
        }
    }

    /// All values stored under `key`, most recently inserted first.
    pub fn get_all<Q>(&self, key: &Q) -> impl DoubleEndedIterator<Item = &V> + '_
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let values: &[V] = match self.search(key) {
            NIL => &[],
            id => self.nodes.entry(id).values.as_slice(),
        };
        values.iter().rev()
    }

    /// Number of values stored under `key`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.nodes.own(self.search(key))
    }

    #[doc(alias = "contains")]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key) != NIL
    }

    /// Entry with the greatest key strictly less than `key`.
    ///
    /// Returns `Ok(None)` when `key` is absent or is the smallest key.
    pub fn predecessor<Q>(&self, key: &Q) -> Result<Option<(&K, &V)>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if self.root == NIL {
            return Err(TreeError::Empty);
        }
        let node = self.search(key);
        if node == NIL {
            return Ok(None);
        }

        let left = self.nodes.left(node);
        if left != NIL {
            return Ok(Some(self.nodes.top(self.subtree_max(left))));
        }

        // Climb until we arrive from a right child.
        let mut child = node;
        let mut parent = self.nodes.parent(node);
        while parent != NIL && self.nodes.left(parent) == child {
            child = parent;
            parent = self.nodes.parent(parent);
        }
        Ok((parent != NIL).then(|| self.nodes.top(parent)))
    }

    /// Stores `value` under `key`, on top of any values already there.
    pub fn put(&mut self, key: K, value: V)
    where
        K: Ord,
    {
        let mut parent = NIL;
        let mut current = self.root;
        let mut went_left = false;
        while current != NIL {
            parent = current;
            match key.cmp(self.nodes.key(current)) {
                Ordering::Less => {
                    went_left = true;
                    current = self.nodes.left(current);
                }
                Ordering::Greater => {
                    went_left = false;
                    current = self.nodes.right(current);
                }
                Ordering::Equal => {
                    self.nodes.entry_mut(current).values.push(value);
                    self.grow_path(current);
                    return;
                }
            }
        }

        let id = self.nodes.alloc(key, value, parent);
        if parent == NIL {
            self.root = id;
        } else if went_left {
            self.nodes.set_left(parent, id);
        } else {
            self.nodes.set_right(parent, id);
        }
        self.grow_path(parent);
        trace!("linked new node {id} under {parent}");

        self.insert_fixup(id);
    }

    /// Removes and returns the most recently inserted value for `key`.
    ///
    /// The key's node is unlinked once its last value is removed.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.search(key);
        if node == NIL {
            return None;
        }

        if self.nodes.own(node) > 1 {
            let value = self.nodes.entry_mut(node).values.pop();
            self.shrink_path(node, NIL, 1);
            return value;
        }

        self.delete_node(node).values.pop()
    }
}

impl<K, V> Default for OrderStatTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for OrderStatTree<K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for OrderStatTree<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        self.for_each_in_order(|id| {
            let entry = self.nodes.entry(id);
            map.entry(&entry.key, &entry.values.iter().rev().collect::<Vec<_>>());
        });
        map.finish()
    }
}


#[cfg(test)]
mod proptests;
