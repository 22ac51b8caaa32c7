/*!
Character classes.

A class is a set of codepoints stored as a binary search tree of disjoint
inclusive ranges, so membership tests during matching are `O(log n)` in the
number of ranges. Insertions, deletions and the set operations all work on
an intermediate *vine* form: the tree is rotated into an increasing
right-linked list, the list is edited, adjacent ranges are merged, and the
list is rotated back into a balanced tree. The vine idea comes from the
tree-rebalancing literature (Stout & Warren); the edit cases enumerate how
the incoming range sits relative to the existing ones (below the minimum,
disjoint, overlapping one range, overlapping several, overlapping all).
*/

use std::sync::OnceLock;

/// A node holds one inclusive range `[lo, hi]` of codepoints.
///
/// Invariants, restored after every mutation: ranges of a class are
/// pairwise disjoint, in-order traversal yields them in strictly
/// increasing order, and no two ranges are adjacent (`hi + 1 == next.lo`
/// never holds; such pairs are merged).
#[derive(Clone, Debug)]
struct Node {
    lo: u32,
    hi: u32,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(lo: u32, hi: u32) -> Node {
        Node { lo, hi, left: None, right: None }
    }
}

/// A set of codepoints.
#[derive(Clone, Default)]
pub(crate) struct CharClass {
    root: Option<Box<Node>>,
}

impl CharClass {
    /// Create an empty class.
    pub(crate) fn new() -> CharClass {
        CharClass { root: None }
    }

    /// Add a single codepoint to the class.
    pub(crate) fn insert_codepoint(&mut self, cp: u32) {
        self.insert_range(cp, cp);
    }

    /// Add an inclusive range of codepoints to the class.
    pub(crate) fn insert_range(&mut self, lo: u32, hi: u32) {
        assert!(lo <= hi);
        let root = match self.root {
            None => {
                self.root = Some(Box::new(Node::leaf(lo, hi)));
                return;
            }
            Some(ref mut root) => root,
        };
        tree_to_vine(root);
        vine_insert(root, lo, hi);
        merge_adjacent(root);
        if root.right.is_some() {
            vine_to_tree(root);
        }
    }

    /// Remove a single codepoint from the class.
    pub(crate) fn delete_codepoint(&mut self, cp: u32) {
        self.delete_range(cp, cp);
    }

    /// Remove an inclusive range of codepoints from the class.
    pub(crate) fn delete_range(&mut self, lo: u32, hi: u32) {
        assert!(lo <= hi);
        match self.root {
            None => return,
            Some(ref mut root) => tree_to_vine(root),
        }
        vine_delete(&mut self.root, lo, hi);
        if let Some(ref mut root) = self.root {
            if root.right.is_some() {
                vine_to_tree(root);
            }
        }
    }

    /// Membership test: a standard search-tree walk.
    pub(crate) fn contains(&self, cp: u32) -> bool {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            if cp < n.lo {
                node = n.left.as_deref();
            } else if cp > n.hi {
                node = n.right.as_deref();
            } else {
                return true;
            }
        }
        false
    }

    /// Grow this class to the union with `other`.
    pub(crate) fn union(&mut self, other: &CharClass) {
        let other_root = match other.root {
            None => return,
            Some(ref r) => r,
        };
        let root = match self.root {
            None => {
                self.root = other.root.clone();
                return;
            }
            Some(ref mut root) => root,
        };
        tree_to_vine(root);
        insert_all(root, other_root);
        merge_adjacent(root);
        if root.right.is_some() {
            vine_to_tree(root);
        }
    }

    /// Shrink this class to the difference with `other`.
    pub(crate) fn difference(&mut self, other: &CharClass) {
        let other_root = match other.root {
            None => return,
            Some(ref r) => r,
        };
        match self.root {
            None => return,
            Some(ref mut root) => tree_to_vine(root),
        }
        delete_all(&mut self.root, other_root);
        if let Some(ref mut root) = self.root {
            if root.right.is_some() {
                vine_to_tree(root);
            }
        }
    }

    /// Shrink this class to the intersection with `other`, computed as
    /// `self − (self − other)`.
    pub(crate) fn intersection(&mut self, other: &CharClass) {
        let mut outside = self.clone();
        outside.difference(other);
        self.difference(&outside);
    }

    /// True if the class contains no codepoints.
    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The number of codepoints in the class.
    pub(crate) fn cardinality(&self) -> u64 {
        fn count(node: Option<&Node>) -> u64 {
            match node {
                None => 0,
                Some(n) => {
                    u64::from(n.hi - n.lo) + 1
                        + count(n.left.as_deref())
                        + count(n.right.as_deref())
                }
            }
        }
        count(self.root.as_deref())
    }

    /// The number of disjoint ranges in the class.
    pub(crate) fn size(&self) -> usize {
        fn count(node: Option<&Node>) -> usize {
            match node {
                None => 0,
                Some(n) => 1 + count(n.left.as_deref()) + count(n.right.as_deref()),
            }
        }
        count(self.root.as_deref())
    }

    /// The ranges of the class in increasing order.
    pub(crate) fn ranges(&self) -> Vec<(u32, u32)> {
        fn walk(node: Option<&Node>, out: &mut Vec<(u32, u32)>) {
            if let Some(n) = node {
                walk(n.left.as_deref(), out);
                out.push((n.lo, n.hi));
                walk(n.right.as_deref(), out);
            }
        }
        let mut out = vec![];
        walk(self.root.as_deref(), &mut out);
        out
    }
}

impl std::fmt::Debug for CharClass {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.ranges()).finish()
    }
}

/// The class matched by `\w`, used by word-boundary anchors.
pub(crate) fn word_characters() -> &'static CharClass {
    static WORD: OnceLock<CharClass> = OnceLock::new();
    WORD.get_or_init(|| {
        let mut class = CharClass::new();
        class.insert_range(u32::from(b'0'), u32::from(b'9'));
        class.insert_range(u32::from(b'A'), u32::from(b'Z'));
        class.insert_range(u32::from(b'a'), u32::from(b'z'));
        class.insert_codepoint(u32::from(b'_'));
        class
    })
}

/*
 * Rotations. Instead of returning a new subtree root, a rotation swaps the
 * range payloads of parent and child and relinks the children, so the node
 * at the root of the subtree stays put and callers never re-seat pointers.
 */

fn swap_ranges(a: &mut Node, b: &mut Node) {
    std::mem::swap(&mut a.lo, &mut b.lo);
    std::mem::swap(&mut a.hi, &mut b.hi);
}

fn rotate_right(parent: &mut Node) {
    let mut child = parent.left.take().expect("rotate_right needs a left child");
    let child_new_right = parent.right.take();
    let child_new_left = child.right.take();
    parent.left = child.left.take();
    child.left = child_new_left;
    child.right = child_new_right;
    swap_ranges(parent, &mut child);
    parent.right = Some(child);
}

fn rotate_left(parent: &mut Node) {
    let mut child = parent.right.take().expect("rotate_left needs a right child");
    let child_new_left = parent.left.take();
    let child_new_right = child.left.take();
    parent.right = child.right.take();
    child.right = child_new_right;
    child.left = child_new_left;
    swap_ranges(parent, &mut child);
    parent.left = Some(child);
}

/// Rotate the minimum of the subtree up to its root, using the fact that
/// the minimum sits at the end of the leftmost path.
fn move_min_to_root(node: &mut Node) {
    if node.left.is_none() {
        return;
    }
    move_min_to_root(node.left.as_deref_mut().expect("checked above"));
    rotate_right(node);
}

/// Convert an arbitrary tree to an increasing vine (a right-linked list
/// ordered by `lo`).
fn tree_to_vine(root: &mut Node) {
    let mut cur = Some(root);
    while let Some(node) = cur {
        move_min_to_root(node);
        cur = node.right.as_deref_mut();
    }
}

fn height(node: Option<&Node>) -> u32 {
    match node {
        None => 0,
        Some(n) => 1 + height(n.left.as_deref()).max(height(n.right.as_deref())),
    }
}

fn balance_factor(node: &Node) -> i64 {
    i64::from(height(node.left.as_deref())) - i64::from(height(node.right.as_deref()))
}

/// Convert a vine back into a balanced tree: rotate at the root until its
/// balance factor is within `[-1, 1]`, at which point both children are
/// shorter vines, and recurse.
fn vine_to_tree(node: &mut Node) {
    let mut bf = balance_factor(node);
    while bf > 1 {
        rotate_right(node);
        bf -= 2;
    }
    while bf < -1 {
        rotate_left(node);
        bf += 2;
    }
    if let Some(left) = node.left.as_deref_mut() {
        vine_to_tree(left);
    }
    if let Some(right) = node.right.as_deref_mut() {
        vine_to_tree(right);
    }
}

/// Merge every run of adjacent ranges in an increasing vine. Keeps
/// absorbing at the current node before moving on, so chains collapse
/// completely.
fn merge_adjacent(node: &mut Node) {
    while node
        .right
        .as_ref()
        .map_or(false, |r| node.hi.saturating_add(1) == r.lo)
    {
        let r = node.right.take().expect("checked above");
        node.hi = r.hi;
        node.right = r.right;
    }
    if let Some(right) = node.right.as_deref_mut() {
        merge_adjacent(right);
    }
}

/// Insert `[lo, hi]` into a non-empty increasing vine, keeping the ranges
/// disjoint. Adjacent ranges are left for `merge_adjacent`.
fn vine_insert(root: &mut Box<Node>, lo: u32, hi: u32) {
    // Below the current minimum: the new range becomes the vine head.
    if hi < root.lo {
        let old = std::mem::replace(root, Box::new(Node::leaf(lo, hi)));
        root.right = Some(old);
        return;
    }
    vine_insert_at(root, lo, hi);
}

fn vine_insert_at(node: &mut Node, lo: u32, hi: u32) {
    if lo > node.hi {
        // The new range begins past this one.
        match node.right {
            None => {
                // Disjoint, past every range: append.
                node.right = Some(Box::new(Node::leaf(lo, hi)));
            }
            Some(ref next) if hi < next.lo => {
                // Disjoint, between two ranges: splice in.
                let mut new = Box::new(Node::leaf(lo, hi));
                new.right = node.right.take();
                node.right = Some(new);
            }
            Some(_) => {
                vine_insert_at(node.right.as_deref_mut().expect("checked above"), lo, hi);
            }
        }
        return;
    }
    // Overlap with one or more ranges (possibly all of them): widen this
    // range, then absorb every following range it now reaches.
    node.lo = node.lo.min(lo);
    node.hi = node.hi.max(hi);
    while node.right.as_ref().map_or(false, |r| r.lo <= node.hi) {
        let r = node.right.take().expect("checked above");
        node.hi = node.hi.max(r.hi);
        node.right = r.right;
    }
}

/// Delete `[lo, hi]` from an increasing vine, dropping emptied nodes and
/// splitting a range when the deletion lies strictly inside it.
fn vine_delete(link: &mut Option<Box<Node>>, lo: u32, hi: u32) {
    let node = match *link {
        None => return,
        Some(ref mut node) => node,
    };
    if node.hi < lo {
        // Entirely before the deletion.
        vine_delete(&mut node.right, lo, hi);
    } else if node.lo > hi {
        // Past the deletion; nothing further can overlap.
    } else if lo <= node.lo && hi >= node.hi {
        // Fully covered: unlink the node and re-examine its successor.
        let right = node.right.take();
        *link = right;
        vine_delete(link, lo, hi);
    } else if lo > node.lo && hi < node.hi {
        // Strictly inside: split into two ranges.
        let mut tail = Box::new(Node::leaf(hi + 1, node.hi));
        tail.right = node.right.take();
        node.hi = lo - 1;
        node.right = Some(tail);
    } else if lo <= node.lo {
        // Overlaps the low side only.
        node.lo = hi + 1;
    } else {
        // Overlaps the high side; later ranges may still overlap.
        node.hi = lo - 1;
        vine_delete(&mut node.right, lo, hi);
    }
}

/// Apply `vine_insert` to the left vine for every range of the right tree.
fn insert_all(left: &mut Box<Node>, right: &Node) {
    vine_insert(left, right.lo, right.hi);
    if let Some(ref l) = right.left {
        insert_all(left, l);
    }
    if let Some(ref r) = right.right {
        insert_all(left, r);
    }
}

/// Apply `vine_delete` to the left vine for every range of the right tree.
fn delete_all(left: &mut Option<Box<Node>>, right: &Node) {
    vine_delete(left, right.lo, right.hi);
    if let Some(ref l) = right.left {
        delete_all(left, l);
    }
    if let Some(ref r) = right.right {
        delete_all(left, r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(ranges: &[(u32, u32)]) -> CharClass {
        let mut c = CharClass::new();
        for &(lo, hi) in ranges {
            c.insert_range(lo, hi);
        }
        c
    }

    /// Ranges must be strictly increasing with gaps of at least two, i.e.
    /// disjoint and non-adjacent.
    fn assert_well_formed(c: &CharClass) {
        let ranges = c.ranges();
        for r in &ranges {
            assert!(r.0 <= r.1, "inverted range in {:?}", ranges);
        }
        for w in ranges.windows(2) {
            assert!(
                w[0].1.saturating_add(2) <= w[1].0,
                "adjacent or overlapping ranges in {:?}",
                ranges
            );
        }
    }

    #[test]
    fn insert_disjoint_and_merge() {
        let mut c = CharClass::new();
        c.insert_codepoint(5);
        c.insert_codepoint(9);
        assert_eq!(vec![(5, 5), (9, 9)], c.ranges());
        // Bridges both neighbours; the chain must collapse to one range.
        c.insert_range(6, 8);
        assert_eq!(vec![(5, 9)], c.ranges());
        assert_well_formed(&c);
    }

    #[test]
    fn insert_cases() {
        // Below the minimum.
        let mut c = class(&[(10, 20)]);
        c.insert_range(1, 3);
        assert_eq!(vec![(1, 3), (10, 20)], c.ranges());
        // Overlapping one.
        c.insert_range(15, 25);
        assert_eq!(vec![(1, 3), (10, 25)], c.ranges());
        // Overlapping multiple.
        c.insert_range(2, 11);
        assert_eq!(vec![(1, 25)], c.ranges());
        // Disjoint past the end.
        c.insert_range(40, 50);
        assert_eq!(vec![(1, 25), (40, 50)], c.ranges());
        // Overlapping all.
        c.insert_range(0, 60);
        assert_eq!(vec![(0, 60)], c.ranges());
        assert_well_formed(&c);
    }

    #[test]
    fn adjacent_merges() {
        let mut c = class(&[(1, 2), (4, 5), (7, 8)]);
        assert_eq!(3, c.size());
        c.insert_codepoint(3);
        assert_eq!(vec![(1, 5), (7, 8)], c.ranges());
        c.insert_codepoint(6);
        assert_eq!(vec![(1, 8)], c.ranges());
        assert_well_formed(&c);
    }

    #[test]
    fn delete_cases() {
        let mut c = class(&[(1, 10), (20, 30), (40, 50)]);
        // Strictly inside: split.
        c.delete_range(3, 5);
        assert_eq!(vec![(1, 2), (6, 10), (20, 30), (40, 50)], c.ranges());
        // Low-side overlap.
        c.delete_range(15, 25);
        assert_eq!(vec![(1, 2), (6, 10), (26, 30), (40, 50)], c.ranges());
        // High-side overlap.
        c.delete_range(9, 12);
        assert_eq!(vec![(1, 2), (6, 8), (26, 30), (40, 50)], c.ranges());
        // Full cover of several.
        c.delete_range(0, 45);
        assert_eq!(vec![(46, 50)], c.ranges());
        // Deleting everything empties the class.
        c.delete_range(0, 100);
        assert!(c.is_empty());
        assert_eq!(0, c.size());
        // Deleting from an empty class is a no-op.
        c.delete_codepoint(7);
        assert!(c.is_empty());
    }

    #[test]
    fn search() {
        let mut c = CharClass::new();
        for i in 0..64u32 {
            c.insert_codepoint(i * 3);
        }
        for i in 0..64u32 {
            assert!(c.contains(i * 3));
            assert!(!c.contains(i * 3 + 1));
        }
        assert_eq!(64, c.size());
        assert_well_formed(&c);
    }

    #[test]
    fn set_algebra_laws() {
        let a = class(&[(1, 5), (10, 20), (30, 30)]);
        let b = class(&[(4, 12), (19, 40)]);

        // A ∪ A = A, A ∩ A = A, A − A = ∅.
        let mut u = a.clone();
        u.union(&a);
        assert_eq!(a.ranges(), u.ranges());
        let mut i = a.clone();
        i.intersection(&a);
        assert_eq!(a.ranges(), i.ranges());
        let mut d = a.clone();
        d.difference(&a);
        assert!(d.is_empty());

        // |A ∪ B| + |A ∩ B| = |A| + |B|.
        let mut u = a.clone();
        u.union(&b);
        let mut i = a.clone();
        i.intersection(&b);
        assert_well_formed(&u);
        assert_well_formed(&i);
        assert_eq!(
            a.cardinality() + b.cardinality(),
            u.cardinality() + i.cardinality()
        );

        // Membership agrees with the definitions, pointwise.
        let mut d = a.clone();
        d.difference(&b);
        assert_well_formed(&d);
        for cp in 0..64 {
            assert_eq!(a.contains(cp) || b.contains(cp), u.contains(cp), "{}", cp);
            assert_eq!(a.contains(cp) && b.contains(cp), i.contains(cp), "{}", cp);
            assert_eq!(a.contains(cp) && !b.contains(cp), d.contains(cp), "{}", cp);
        }
    }

    #[test]
    fn well_formed_after_random_mutation() {
        // A cheap deterministic pseudo-random walk over inserts and
        // deletes, checking the structural invariant throughout.
        let mut c = CharClass::new();
        let mut state = 0x9E37_79B9u32;
        for step in 0..500 {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let lo = state % 200;
            let hi = lo + (state >> 16) % 20;
            if step % 3 == 0 {
                c.delete_range(lo, hi);
            } else {
                c.insert_range(lo, hi);
            }
            assert_well_formed(&c);
        }
    }

    #[test]
    fn word_characters_class() {
        let w = word_characters();
        for b in b"azAZ09_" {
            assert!(w.contains(u32::from(*b)));
        }
        for b in b" .-\n{" {
            assert!(!w.contains(u32::from(*b)));
        }
        assert_eq!(4, w.size());
    }
}
