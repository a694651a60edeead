// =============================================================================
// Node Arena
// =============================================================================
//
// Nodes are addressed by `u32` ids. Link records and payload records are kept
// in parallel vectors:
//
//   links[id]   = [parent][left][right][color][subtree_count]
//   entries[id] = Some(key + value stack) for live nodes, None otherwise
//
// Id 0 is the tree's sentinel: a black link record with count 0 and no
// payload. It is created with the arena and never written afterwards, so
// every leaf position can point at it without null checks.

use smallvec::SmallVec;

pub(crate) type NodeId = u32;

/// Id of the sentinel slot.
pub(crate) const NIL: NodeId = 0;

/// Node color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Links {
    pub(crate) parent: NodeId,
    pub(crate) left: NodeId,
    pub(crate) right: NodeId,
    pub(crate) color: Color,
    /// Total values stored in the subtree rooted here.
    pub(crate) count: usize,
}

impl Links {
    const SENTINEL: Links = Links {
        parent: NIL,
        left: NIL,
        right: NIL,
        color: Color::Black,
        count: 0,
    };
}

/// Payload of a live node. The last pushed value is the first retrieved.
#[derive(Clone, Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) values: SmallVec<[V; 1]>,
}

#[derive(Clone)]
pub(crate) struct NodeArena<K, V> {
    links: Vec<Links>,
    entries: Vec<Option<Entry<K, V>>>,
    /// Recycled ids, reused before the vectors grow.
    free: Vec<NodeId>,
}

impl<K, V> NodeArena<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut links = Vec::with_capacity(capacity + 1);
        let mut entries = Vec::with_capacity(capacity + 1);
        links.push(Links::SENTINEL);
        entries.push(None);
        Self {
            links,
            entries,
            free: Vec::new(),
        }
    }

    /// Number of live (non-sentinel) nodes.
    pub(crate) fn live(&self) -> usize {
        self.links.len() - 1 - self.free.len()
    }

    pub(crate) fn capacity_bytes(&self) -> usize {
        self.links.capacity() * std::mem::size_of::<Links>()
            + self.entries.capacity() * std::mem::size_of::<Option<Entry<K, V>>>()
            + self.free.capacity() * std::mem::size_of::<NodeId>()
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        // Trailing free slots can be dropped outright.
        let mut new_len = self.entries.len();
        while new_len > 1 && self.entries[new_len - 1].is_none() {
            new_len -= 1;
        }
        if new_len < self.entries.len() {
            self.links.truncate(new_len);
            self.entries.truncate(new_len);
            self.free.retain(|&f| (f as usize) < new_len);
        }
        self.links.shrink_to_fit();
        self.entries.shrink_to_fit();
        self.free.shrink_to_fit();
    }

    pub(crate) fn clear(&mut self) {
        self.links.truncate(1);
        self.entries.truncate(1);
        self.free.clear();
    }

    /// Allocates a new RED node holding one value, with sentinel children.
    pub(crate) fn alloc(&mut self, key: K, value: V, parent: NodeId) -> NodeId {
        let links = Links {
            parent,
            left: NIL,
            right: NIL,
            color: Color::Red,
            count: 1,
        };
        let mut values = SmallVec::new();
        values.push(value);
        let entry = Some(Entry { key, values });

        if let Some(id) = self.free.pop() {
            self.links[id as usize] = links;
            self.entries[id as usize] = entry;
            return id;
        }

        let id = next_id(self.links.len());
        self.links.push(links);
        self.entries.push(entry);
        id
    }

    /// Releases a node's slot and hands back its payload.
    pub(crate) fn release(&mut self, id: NodeId) -> Entry<K, V> {
        debug_assert_ne!(id, NIL, "the sentinel is never released");
        let entry = self.entries[id as usize]
            .take()
            .unwrap_or_else(|| invalid_structure("released a vacant node"));
        self.links[id as usize] = Links::SENTINEL;
        self.free.push(id);
        entry
    }

    // -------------------------------------------------------------------------
    // Link accessors. Reads of the sentinel are always valid; writes to it are
    // dropped, except that painting it RED is a defect.
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn parent(&self, id: NodeId) -> NodeId {
        self.links[id as usize].parent
    }

    #[inline]
    pub(crate) fn left(&self, id: NodeId) -> NodeId {
        self.links[id as usize].left
    }

    #[inline]
    pub(crate) fn right(&self, id: NodeId) -> NodeId {
        self.links[id as usize].right
    }

    #[inline]
    pub(crate) fn color(&self, id: NodeId) -> Color {
        self.links[id as usize].color
    }

    #[inline]
    pub(crate) fn count(&self, id: NodeId) -> usize {
        self.links[id as usize].count
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        if id != NIL {
            self.links[id as usize].parent = parent;
        }
    }

    #[inline]
    pub(crate) fn set_left(&mut self, id: NodeId, left: NodeId) {
        debug_assert_ne!(id, NIL, "sentinel has no children");
        self.links[id as usize].left = left;
    }

    #[inline]
    pub(crate) fn set_right(&mut self, id: NodeId, right: NodeId) {
        debug_assert_ne!(id, NIL, "sentinel has no children");
        self.links[id as usize].right = right;
    }

    #[inline]
    pub(crate) fn set_color(&mut self, id: NodeId, color: Color) {
        if id == NIL {
            if color == Color::Red {
                invalid_structure("attempted to paint the sentinel red");
            }
            return;
        }
        self.links[id as usize].color = color;
    }

    #[inline]
    pub(crate) fn set_count(&mut self, id: NodeId, count: usize) {
        debug_assert!(id != NIL || count == 0, "sentinel count is always 0");
        if id != NIL {
            self.links[id as usize].count = count;
        }
    }

    // -------------------------------------------------------------------------
    // Payload accessors. The sentinel has no payload.
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn entry(&self, id: NodeId) -> &Entry<K, V> {
        match &self.entries[id as usize] {
            Some(entry) => entry,
            None => invalid_structure("payload read from the sentinel or a vacant slot"),
        }
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, id: NodeId) -> &mut Entry<K, V> {
        match &mut self.entries[id as usize] {
            Some(entry) => entry,
            None => invalid_structure("payload write to the sentinel or a vacant slot"),
        }
    }

    #[inline]
    pub(crate) fn key(&self, id: NodeId) -> &K {
        &self.entry(id).key
    }

    /// Number of values in the node's own stack (0 for the sentinel).
    #[inline]
    pub(crate) fn own(&self, id: NodeId) -> usize {
        self.entries[id as usize]
            .as_ref()
            .map_or(0, |entry| entry.values.len())
    }

    /// Top of the node's value stack, paired with its key.
    #[inline]
    pub(crate) fn top(&self, id: NodeId) -> (&K, &V) {
        let entry = self.entry(id);
        match entry.values.last() {
            Some(value) => (&entry.key, value),
            None => invalid_structure("live node with an empty value stack"),
        }
    }
}

/// Id for a slot appended at `len`. Id 0 is the sentinel, so at most
/// `NodeId::MAX` keys can be live at once.
#[inline]
fn next_id(len: usize) -> NodeId {
    match NodeId::try_from(len) {
        Ok(id) => id,
        Err(_) => arena_exhausted(),
    }
}

#[cold]
#[track_caller]
fn arena_exhausted() -> ! {
    panic!("node arena exhausted: at most {} distinct keys", NodeId::MAX)
}

/// Reports a broken internal invariant. Never reachable through correct use
/// of the public API.
#[cold]
#[track_caller]
pub(crate) fn invalid_structure(what: &str) -> ! {
    panic!("invalid structural assumption: {what}")
}
