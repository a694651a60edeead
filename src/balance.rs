// =============================================================================
// Red-black balancing
// =============================================================================
//
// Rotations, insert fix-up, structural delete and delete fix-up. Every routine
// here leaves `links[id].count` equal to own values + left count + right count
// for every node it touches.

use log::trace;

use crate::arena::{invalid_structure, Color, Entry, NodeId, NIL};
use crate::OrderStatTree;

impl<K, V> OrderStatTree<K, V> {
    // -------------------------------------------------------------------------
    // Count bookkeeping
    // -------------------------------------------------------------------------

    /// Recomputes `id`'s subtree count from its own stack and its children.
    #[inline]
    fn recount(&mut self, id: NodeId) {
        let count = self.nodes.own(id)
            + self.nodes.count(self.nodes.left(id))
            + self.nodes.count(self.nodes.right(id));
        self.nodes.set_count(id, count);
    }

    /// Adds one value to every subtree count from `id` up to the root.
    pub(crate) fn grow_path(&mut self, mut id: NodeId) {
        while id != NIL {
            let count = self.nodes.count(id) + 1;
            self.nodes.set_count(id, count);
            id = self.nodes.parent(id);
        }
    }

    /// Removes `by` values from every subtree count from `id` up to, but not
    /// including, `stop`.
    pub(crate) fn shrink_path(&mut self, mut id: NodeId, stop: NodeId, by: usize) {
        while id != stop {
            let count = self.nodes.count(id);
            if count < by {
                invalid_structure("subtree count underflow");
            }
            self.nodes.set_count(id, count - by);
            id = self.nodes.parent(id);
        }
    }

    // -------------------------------------------------------------------------
    // Rotations
    // -------------------------------------------------------------------------

    /// Replaces the subtree rooted at `old` by the one rooted at `new` in
    /// `old`'s parent.
    fn transplant(&mut self, old: NodeId, new: NodeId) {
        let parent = self.nodes.parent(old);
        if parent == NIL {
            self.root = new;
        } else if self.nodes.left(parent) == old {
            self.nodes.set_left(parent, new);
        } else {
            self.nodes.set_right(parent, new);
        }
        self.nodes.set_parent(new, parent);
    }

    pub(crate) fn rotate_left(&mut self, x: NodeId) {
        let y = self.nodes.right(x);
        if y == NIL {
            invalid_structure("left rotation without a right child");
        }

        let inner = self.nodes.left(y);
        self.nodes.set_right(x, inner);
        self.nodes.set_parent(inner, x);

        self.transplant(x, y);
        self.nodes.set_left(y, x);
        self.nodes.set_parent(x, y);

        self.nodes.set_count(y, self.nodes.count(x));
        self.recount(x);
    }

    pub(crate) fn rotate_right(&mut self, x: NodeId) {
        let y = self.nodes.left(x);
        if y == NIL {
            invalid_structure("right rotation without a left child");
        }

        let inner = self.nodes.right(y);
        self.nodes.set_left(x, inner);
        self.nodes.set_parent(inner, x);

        self.transplant(x, y);
        self.nodes.set_right(y, x);
        self.nodes.set_parent(x, y);

        self.nodes.set_count(y, self.nodes.count(x));
        self.recount(x);
    }

    // -------------------------------------------------------------------------
    // Insert fix-up
    // -------------------------------------------------------------------------

    /// Restores the coloring rules after `x` was linked in as a RED leaf.
    ///
    /// The root's parent is the sentinel, which is BLACK, so the loop stops
    /// at the root at the latest.
    pub(crate) fn insert_fixup(&mut self, mut x: NodeId) {
        while self.nodes.color(self.nodes.parent(x)) == Color::Red {
            let parent = self.nodes.parent(x);
            // A red parent is never the root.
            let grandparent = self.nodes.parent(parent);

            if parent == self.nodes.left(grandparent) {
                let uncle = self.nodes.right(grandparent);
                if self.nodes.color(uncle) == Color::Red {
                    self.nodes.set_color(parent, Color::Black);
                    self.nodes.set_color(uncle, Color::Black);
                    self.nodes.set_color(grandparent, Color::Red);
                    x = grandparent;
                    continue;
                }
                if x == self.nodes.right(parent) {
                    x = parent;
                    self.rotate_left(x);
                }
                let parent = self.nodes.parent(x);
                let grandparent = self.nodes.parent(parent);
                self.nodes.set_color(parent, Color::Black);
                self.nodes.set_color(grandparent, Color::Red);
                self.rotate_right(grandparent);
            } else {
                let uncle = self.nodes.left(grandparent);
                if self.nodes.color(uncle) == Color::Red {
                    self.nodes.set_color(parent, Color::Black);
                    self.nodes.set_color(uncle, Color::Black);
                    self.nodes.set_color(grandparent, Color::Red);
                    x = grandparent;
                    continue;
                }
                if x == self.nodes.left(parent) {
                    x = parent;
                    self.rotate_right(x);
                }
                let parent = self.nodes.parent(x);
                let grandparent = self.nodes.parent(parent);
                self.nodes.set_color(parent, Color::Black);
                self.nodes.set_color(grandparent, Color::Red);
                self.rotate_left(grandparent);
            }
        }

        self.nodes.set_color(self.root, Color::Black);
    }

    // -------------------------------------------------------------------------
    // Structural delete
    // -------------------------------------------------------------------------

    /// Unlinks node `z` from the tree, rebalances, and returns its payload.
    ///
    /// With two children, `z`'s in-order successor takes over its position,
    /// color and both subtrees.
    pub(crate) fn delete_node(&mut self, z: NodeId) -> Entry<K, V> {
        // z's values leave every subtree on its path.
        self.shrink_path(z, NIL, self.nodes.own(z));

        let z_left = self.nodes.left(z);
        let z_right = self.nodes.right(z);

        let removed_color;
        let x;
        let x_parent;

        if z_left == NIL {
            removed_color = self.nodes.color(z);
            x = z_right;
            x_parent = self.nodes.parent(z);
            self.transplant(z, z_right);
        } else if z_right == NIL {
            removed_color = self.nodes.color(z);
            x = z_left;
            x_parent = self.nodes.parent(z);
            self.transplant(z, z_left);
        } else {
            let y = self.subtree_min(z_right);
            removed_color = self.nodes.color(y);
            x = self.nodes.right(y);

            if self.nodes.parent(y) == z {
                x_parent = y;
            } else {
                x_parent = self.nodes.parent(y);
                // y's values leave the subtrees between its old slot and z.
                self.shrink_path(x_parent, z, self.nodes.own(y));
                self.transplant(y, x);
                self.nodes.set_right(y, z_right);
                self.nodes.set_parent(z_right, y);
            }

            self.transplant(z, y);
            self.nodes.set_left(y, z_left);
            self.nodes.set_parent(z_left, y);
            self.nodes.set_color(y, self.nodes.color(z));
            self.nodes.set_count(y, self.nodes.count(z));
            trace!("promoted successor {y} into the slot of node {z}");
        }

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }

        trace!("structurally removed node {z}");
        self.nodes.release(z)
    }

    // -------------------------------------------------------------------------
    // Delete fix-up
    // -------------------------------------------------------------------------

    /// Removes the extra black carried by `x`, which may be the sentinel.
    ///
    /// `parent` is `x`'s logical parent. It is tracked here rather than read
    /// from `x`, because the sentinel's own parent link is never written.
    fn delete_fixup(&mut self, mut x: NodeId, mut parent: NodeId) {
        while x != self.root && self.nodes.color(x) == Color::Black {
            if x == self.nodes.left(parent) {
                let mut sibling = self.nodes.right(parent);
                if sibling == NIL {
                    invalid_structure("black-deficient node without a sibling");
                }

                if self.nodes.color(sibling) == Color::Red {
                    self.nodes.set_color(sibling, Color::Black);
                    self.nodes.set_color(parent, Color::Red);
                    self.rotate_left(parent);
                    sibling = self.nodes.right(parent);
                }

                let near = self.nodes.left(sibling);
                let far = self.nodes.right(sibling);
                if self.nodes.color(near) == Color::Black && self.nodes.color(far) == Color::Black
                {
                    self.nodes.set_color(sibling, Color::Red);
                    x = parent;
                    parent = self.nodes.parent(x);
                    continue;
                }

                if self.nodes.color(far) == Color::Black {
                    self.nodes.set_color(near, Color::Black);
                    self.nodes.set_color(sibling, Color::Red);
                    self.rotate_right(sibling);
                    sibling = self.nodes.right(parent);
                }

                self.nodes.set_color(sibling, self.nodes.color(parent));
                self.nodes.set_color(parent, Color::Black);
                self.nodes.set_color(self.nodes.right(sibling), Color::Black);
                self.rotate_left(parent);
            } else {
                let mut sibling = self.nodes.left(parent);
                if sibling == NIL {
                    invalid_structure("black-deficient node without a sibling");
                }

                if self.nodes.color(sibling) == Color::Red {
                    self.nodes.set_color(sibling, Color::Black);
                    self.nodes.set_color(parent, Color::Red);
                    self.rotate_right(parent);
                    sibling = self.nodes.left(parent);
                }

                let near = self.nodes.right(sibling);
                let far = self.nodes.left(sibling);
                if self.nodes.color(near) == Color::Black && self.nodes.color(far) == Color::Black
                {
                    self.nodes.set_color(sibling, Color::Red);
                    x = parent;
                    parent = self.nodes.parent(x);
                    continue;
                }

                if self.nodes.color(far) == Color::Black {
                    self.nodes.set_color(near, Color::Black);
                    self.nodes.set_color(sibling, Color::Red);
                    self.rotate_left(sibling);
                    sibling = self.nodes.left(parent);
                }

                self.nodes.set_color(sibling, self.nodes.color(parent));
                self.nodes.set_color(parent, Color::Black);
                self.nodes.set_color(self.nodes.left(sibling), Color::Black);
                self.rotate_right(parent);
            }

            x = self.root;
            parent = NIL;
        }

        self.nodes.set_color(x, Color::Black);
    }
}
