use std::collections::HashMap;
use std::hash::Hash;

use glam::Vec2;

use super::aabb::Box2;

const NULL: usize = usize::MAX;

/// Node pool growth: start small, then jump to a large block once the
/// initial capacity is exceeded, then grow linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    pub initial: usize,
    pub first_step: usize,
    pub increment: usize,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            initial: 16,
            first_step: 3840,
            increment: 256,
        }
    }
}

impl GrowthPolicy {
    pub fn next_capacity(&self, current: usize) -> usize {
        if current < self.initial {
            self.initial
        } else if current == self.initial {
            self.first_step.max(current + 1)
        } else {
            current + self.increment.max(1)
        }
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    /// Enlarged box used for traversal.
    fat: Box2,
    /// Exact box, only meaningful on leaves.
    tight: Box2,
    /// Parent index, or next free node while on the free list.
    parent: usize,
    left: usize,
    right: usize,
    /// -1 for free nodes, 0 for leaves.
    height: i32,
    item: Option<T>,
}

impl<T> Node<T> {
    fn free(next: usize) -> Self {
        Self {
            fat: Box2::default(),
            tight: Box2::default(),
            parent: next,
            left: NULL,
            right: NULL,
            height: -1,
            item: None,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left == NULL
    }
}

/// Dynamic bounding volume tree keyed by item.
///
/// Leaves store a fattened box; moving an item only restructures the tree
/// once its new box escapes the fattened one.
#[derive(Debug, Clone)]
pub struct DynamicTree<T> {
    nodes: Vec<Node<T>>,
    root: usize,
    free_list: usize,
    leaves: HashMap<T, usize>,
    margin: f32,
    growth: GrowthPolicy,
}

impl<T> Default for DynamicTree<T>
where
    T: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new(0.1, GrowthPolicy::default())
    }
}

impl<T> DynamicTree<T>
where
    T: Copy + Eq + Hash,
{
    pub fn new(margin: f32, growth: GrowthPolicy) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NULL,
            free_list: NULL,
            leaves: HashMap::with_capacity(growth.initial),
            margin: margin.max(0.0),
            growth,
        };
        tree.grow_pool();
        tree
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Number of allocated node slots, free or used.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.leaves.contains_key(item)
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    pub fn aabb(&self, item: &T) -> Option<Box2> {
        self.leaves.get(item).map(|&leaf| self.nodes[leaf].tight)
    }

    pub fn fat_aabb(&self, item: &T) -> Option<Box2> {
        self.leaves.get(item).map(|&leaf| self.nodes[leaf].fat)
    }

    /// Inserts the item or moves it to `aabb`. Returns true when the tree
    /// had to be restructured.
    pub fn insert_or_update(&mut self, item: T, aabb: Box2) -> bool {
        if let Some(&leaf) = self.leaves.get(&item) {
            let node = &mut self.nodes[leaf];
            node.tight = aabb;
            // Keep the fat box while it still contains the item and has not
            // become wildly oversized after a shrink.
            if node.fat.contains(&aabb) && aabb.grow(4.0 * self.margin).contains(&node.fat) {
                return false;
            }
            self.remove_leaf(leaf);
            self.nodes[leaf].fat = aabb.grow(self.margin);
            self.insert_leaf(leaf);
            return true;
        }

        let leaf = self.allocate_node();
        {
            let node = &mut self.nodes[leaf];
            node.fat = aabb.grow(self.margin);
            node.tight = aabb;
            node.height = 0;
            node.item = Some(item);
        }
        self.insert_leaf(leaf);
        self.leaves.insert(item, leaf);
        true
    }

    pub fn remove(&mut self, item: &T) -> bool {
        let Some(leaf) = self.leaves.remove(item) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.free_node(leaf);
        true
    }

    pub fn clear(&mut self) {
        let items: Vec<T> = self.leaves.keys().copied().collect();
        for item in items {
            self.remove(&item);
        }
    }

    /// Visits every item whose box intersects `aabb`. In approximate mode
    /// the fattened boxes are tested instead of the exact ones. The visitor
    /// returns false to stop early.
    pub fn query<F>(&self, aabb: &Box2, approximate: bool, mut visit: F)
    where
        F: FnMut(T) -> bool,
    {
        if self.root == NULL {
            return;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.fat.intersects(aabb) {
                continue;
            }

            if node.is_leaf() {
                if approximate || node.tight.intersects(aabb) {
                    if let Some(item) = node.item {
                        if !visit(item) {
                            return;
                        }
                    }
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    pub fn query_region(&self, aabb: &Box2, approximate: bool) -> Vec<T> {
        let mut found = Vec::new();
        self.query(aabb, approximate, |item| {
            found.push(item);
            true
        });
        found
    }

    pub fn query_point(&self, point: Vec2, approximate: bool) -> Vec<T> {
        self.query_region(&Box2::from_point(point), approximate)
    }

    /// Exact test: does any item's box intersect `aabb`, optionally
    /// skipping items rejected by `filter`.
    pub fn query_any<F>(&self, aabb: &Box2, mut filter: F) -> bool
    where
        F: FnMut(T) -> bool,
    {
        let mut any = false;
        self.query(aabb, false, |item| {
            if filter(item) {
                any = true;
                return false;
            }
            true
        });
        any
    }

    fn grow_pool(&mut self) {
        let old = self.nodes.len();
        let new = self.growth.next_capacity(old);
        self.nodes.reserve_exact(new - old);
        for index in old..new {
            let next = if index + 1 < new { index + 1 } else { NULL };
            self.nodes.push(Node::free(next));
        }
        self.free_list = old;
    }

    fn allocate_node(&mut self) -> usize {
        if self.free_list == NULL {
            self.grow_pool();
        }
        let index = self.free_list;
        let node = &mut self.nodes[index];
        self.free_list = node.parent;
        node.parent = NULL;
        node.left = NULL;
        node.right = NULL;
        node.height = 0;
        node.item = None;
        index
    }

    fn free_node(&mut self, index: usize) {
        self.nodes[index] = Node::free(self.free_list);
        self.free_list = index;
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL {
            self.root = leaf;
            self.nodes[leaf].parent = NULL;
            return;
        }

        let leaf_box = self.nodes[leaf].fat;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let node = &self.nodes[index];
            let (left, right) = (node.left, node.right);

            let area = node.fat.perimeter();
            let combined = node.fat.union(&leaf_box).perimeter();

            let cost = 2.0 * combined;
            let inheritance = 2.0 * (combined - area);

            let cost_left = self.descend_cost(left, &leaf_box) + inheritance;
            let cost_right = self.descend_cost(right, &leaf_box) + inheritance;

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_node = &self.nodes[sibling];
            let fat = leaf_box.union(&sibling_node.fat);
            let height = sibling_node.height + 1;
            let node = &mut self.nodes[new_parent];
            node.parent = old_parent;
            node.fat = fat;
            node.height = height;
            node.left = sibling;
            node.right = leaf;
        }

        if old_parent == NULL {
            self.root = new_parent;
        } else if self.nodes[old_parent].left == sibling {
            self.nodes[old_parent].left = new_parent;
        } else {
            self.nodes[old_parent].right = new_parent;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        self.refit_from(self.nodes[leaf].parent);
    }

    fn descend_cost(&self, child: usize, leaf_box: &Box2) -> f32 {
        let node = &self.nodes[child];
        let merged = leaf_box.union(&node.fat).perimeter();
        if node.is_leaf() {
            merged
        } else {
            merged - node.fat.perimeter()
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grand_parent == NULL {
            self.root = sibling;
            self.nodes[sibling].parent = NULL;
            self.free_node(parent);
            return;
        }

        if self.nodes[grand_parent].left == parent {
            self.nodes[grand_parent].left = sibling;
        } else {
            self.nodes[grand_parent].right = sibling;
        }
        self.nodes[sibling].parent = grand_parent;
        self.free_node(parent);

        self.refit_from(grand_parent);
    }

    fn refit_from(&mut self, start: usize) {
        let mut index = start;
        while index != NULL {
            index = self.balance(index);

            let (left, right) = (self.nodes[index].left, self.nodes[index].right);
            let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
            let fat = self.nodes[left].fat.union(&self.nodes[right].fat);

            let node = &mut self.nodes[index];
            node.height = height;
            node.fat = fat;
            index = node.parent;
        }
    }

    /// Rotates the subtree rooted at `a` if it is imbalanced. Returns the new
    /// subtree root.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let b = self.nodes[a].left;
        let c = self.nodes[a].right;
        let balance = self.nodes[c].height - self.nodes[b].height;

        if balance > 1 {
            self.rotate_up(a, c, b, true)
        } else if balance < -1 {
            self.rotate_up(a, b, c, false)
        } else {
            a
        }
    }

    /// Promotes `child` above `a`. `other` is a's remaining child and
    /// `child_was_right` says which side `child` came from.
    fn rotate_up(&mut self, a: usize, child: usize, other: usize, child_was_right: bool) -> usize {
        let f = self.nodes[child].left;
        let g = self.nodes[child].right;

        let a_parent = self.nodes[a].parent;
        self.nodes[child].left = a;
        self.nodes[child].parent = a_parent;
        self.nodes[a].parent = child;

        if a_parent == NULL {
            self.root = child;
        } else if self.nodes[a_parent].left == a {
            self.nodes[a_parent].left = child;
        } else {
            self.nodes[a_parent].right = child;
        }

        let (keep, moved) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };

        self.nodes[child].right = keep;
        if child_was_right {
            self.nodes[a].right = moved;
        } else {
            self.nodes[a].left = moved;
        }
        self.nodes[moved].parent = a;

        let a_box = self.nodes[other].fat.union(&self.nodes[moved].fat);
        let a_height = 1 + self.nodes[other].height.max(self.nodes[moved].height);
        self.nodes[a].fat = a_box;
        self.nodes[a].height = a_height;

        self.nodes[child].fat = a_box.union(&self.nodes[keep].fat);
        self.nodes[child].height = 1 + a_height.max(self.nodes[keep].height);

        child
    }

    /// Walks the whole tree checking parent links, heights and box
    /// containment. Used by tests.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        if self.root == NULL {
            assert!(self.leaves.is_empty());
            return;
        }
        assert_eq!(self.nodes[self.root].parent, NULL);
        let leaf_count = self.validate_node(self.root);
        assert_eq!(leaf_count, self.leaves.len());
    }

    #[cfg(test)]
    fn validate_node(&self, index: usize) -> usize {
        let node = &self.nodes[index];
        if node.is_leaf() {
            assert_eq!(node.height, 0);
            assert!(node.fat.contains(&node.tight));
            return 1;
        }
        let (left, right) = (node.left, node.right);
        assert_eq!(self.nodes[left].parent, index);
        assert_eq!(self.nodes[right].parent, index);
        assert_eq!(
            node.height,
            1 + self.nodes[left].height.max(self.nodes[right].height)
        );
        assert!(node.fat.contains(&self.nodes[left].fat));
        assert!(node.fat.contains(&self.nodes[right].fat));
        self.validate_node(left) + self.validate_node(right)
    }
}
