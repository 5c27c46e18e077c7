//! Binary search tree engine (§4.3), shared by the plain `BST` and `RBT`
//! engine kinds: the same node shape and traversal code serves both, and
//! the red-black invariants are maintained by `insert_fixup`/`delete_fixup`
//! only when `red_black` is set. For the plain variant those two functions
//! are simply never called — `balance()` is a no-op by construction rather
//! than a method that does nothing.
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) addressed by index rather
//! than behind `Rc<RefCell<_>>` or raw pointers, so parent/child links are
//! plain `Option<usize>` and rotations are just a few field swaps — no
//! `unsafe`, no borrow-checker fights over simultaneous parent/child access.

use crate::error::EngineError;
use crate::key::Key;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node {
    key: Key,
    rows: Vec<usize>,
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
    color: Color,
}

#[derive(Debug, Default)]
pub struct BstEngine {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: Option<usize>,
    red_black: bool,
}

impl BstEngine {
    pub fn new(entries: impl IntoIterator<Item = (Key, usize)>, red_black: bool) -> Self {
        let mut engine = Self { nodes: Vec::new(), free: Vec::new(), root: None, red_black };
        for (key, row) in entries {
            engine.add(key, row);
        }
        engine
    }

    // -- arena helpers --------------------------------------------------

    fn node(&self, id: usize) -> &Node { self.nodes[id].as_ref().expect("dangling arena slot") }

    fn node_mut(&mut self, id: usize) -> &mut Node { self.nodes[id].as_mut().expect("dangling arena slot") }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, id: usize) {
        self.nodes[id] = None;
        self.free.push(id);
    }

    fn color(&self, id: Option<usize>) -> Color { id.map(|i| self.node(i).color).unwrap_or(Color::Black) }

    fn set_color(&mut self, id: usize, c: Color) { self.node_mut(id).color = c; }

    fn left(&self, id: usize) -> Option<usize> { self.node(id).left }
    fn right(&self, id: usize) -> Option<usize> { self.node(id).right }
    fn parent(&self, id: usize) -> Option<usize> { self.node(id).parent }

    fn is_red(&self, id: Option<usize>) -> bool { self.color(id) == Color::Red }

    // -- search -----------------------------------------------------------

    fn find_node(&self, key: &Key) -> Option<usize> {
        let mut cur = self.root;
        while let Some(id) = cur {
            match key.cmp(&self.node(id).key) {
                Ordering::Less => cur = self.left(id),
                Ordering::Greater => cur = self.right(id),
                Ordering::Equal => return Some(id),
            }
        }
        None
    }

    fn minimum(&self, mut id: usize) -> usize {
        while let Some(l) = self.left(id) {
            id = l;
        }
        id
    }

    // -- rotations ----------------------------------------------------------

    fn rotate_left(&mut self, x: usize) {
        let y = self.right(x).expect("rotate_left requires a right child");
        let y_left = self.left(y);
        self.node_mut(x).right = y_left;
        if let Some(yl) = y_left {
            self.node_mut(yl).parent = Some(x);
        }
        let xp = self.parent(x);
        self.node_mut(y).parent = xp;
        match xp {
            None => self.root = Some(y),
            Some(p) if self.left(p) == Some(x) => self.node_mut(p).left = Some(y),
            Some(p) => self.node_mut(p).right = Some(y),
        }
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.left(x).expect("rotate_right requires a left child");
        let y_right = self.right(y);
        self.node_mut(x).left = y_right;
        if let Some(yr) = y_right {
            self.node_mut(yr).parent = Some(x);
        }
        let xp = self.parent(x);
        self.node_mut(y).parent = xp;
        match xp {
            None => self.root = Some(y),
            Some(p) if self.left(p) == Some(x) => self.node_mut(p).left = Some(y),
            Some(p) => self.node_mut(p).right = Some(y),
        }
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    // -- insertion ----------------------------------------------------------

    pub fn add(&mut self, key: Key, row: usize) {
        if let Some(id) = self.find_node(&key) {
            insert_sorted(&mut self.node_mut(id).rows, row);
            return;
        }

        let new_id = self.alloc(Node { key: key.clone(), rows: vec![row], left: None, right: None, parent: None, color: Color::Red });

        if self.root.is_none() {
            self.root = Some(new_id);
            self.set_color(new_id, Color::Black);
            return;
        }

        let mut cur = self.root.unwrap();
        loop {
            match key.cmp(&self.node(cur).key) {
                Ordering::Less => match self.left(cur) {
                    Some(l) => cur = l,
                    None => {
                        self.node_mut(cur).left = Some(new_id);
                        break;
                    }
                },
                _ => match self.right(cur) {
                    Some(r) => cur = r,
                    None => {
                        self.node_mut(cur).right = Some(new_id);
                        break;
                    }
                },
            }
        }
        self.node_mut(new_id).parent = Some(cur);

        if self.red_black {
            self.insert_fixup(new_id);
        }
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while self.is_red(self.parent(z)) {
            let zp = self.parent(z).unwrap();
            let zpp = self.parent(zp).expect("a red node always has a black (non-root) parent with a grandparent");
            if Some(zp) == self.left(zpp) {
                let y = self.right(zpp);
                if self.is_red(y) {
                    self.set_color(zp, Color::Black);
                    self.set_color(y.unwrap(), Color::Black);
                    self.set_color(zpp, Color::Red);
                    z = zpp;
                } else {
                    if Some(z) == self.right(zp) {
                        z = zp;
                        self.rotate_left(z);
                    }
                    let zp = self.parent(z).unwrap();
                    let zpp = self.parent(zp).unwrap();
                    self.set_color(zp, Color::Black);
                    self.set_color(zpp, Color::Red);
                    self.rotate_right(zpp);
                }
            } else {
                let y = self.left(zpp);
                if self.is_red(y) {
                    self.set_color(zp, Color::Black);
                    self.set_color(y.unwrap(), Color::Black);
                    self.set_color(zpp, Color::Red);
                    z = zpp;
                } else {
                    if Some(z) == self.left(zp) {
                        z = zp;
                        self.rotate_right(z);
                    }
                    let zp = self.parent(z).unwrap();
                    let zpp = self.parent(zp).unwrap();
                    self.set_color(zp, Color::Black);
                    self.set_color(zpp, Color::Red);
                    self.rotate_left(zpp);
                }
            }
        }
        self.set_color(self.root.unwrap(), Color::Black);
    }

    // -- removal --------------------------------------------------------

    /// Remove a single `(key, row)` entry, or every entry under `key` when
    /// `row` is `None`. See the `Engine::remove` contract.
    pub fn remove(&mut self, key: &Key, row: Option<usize>) -> Result<bool, EngineError> {
        let Some(id) = self.find_node(key) else {
            return Ok(false);
        };

        match row {
            Some(r) => {
                let rows = &mut self.node_mut(id).rows;
                let Some(pos) = rows.iter().position(|&x| x == r) else {
                    return Err(EngineError::RowNotFoundUnderKey { row: r });
                };
                rows.remove(pos);
                if self.node(id).rows.is_empty() {
                    self.delete_node(id);
                }
            }
            None => self.delete_node(id),
        }
        Ok(true)
    }

    fn transplant(&mut self, u: usize, v: Option<usize>) {
        let up = self.parent(u);
        match up {
            None => self.root = v,
            Some(p) if self.left(p) == Some(u) => self.node_mut(p).left = v,
            Some(p) => self.node_mut(p).right = v,
        }
        if let Some(v) = v {
            self.node_mut(v).parent = up;
        }
    }

    fn delete_node(&mut self, z: usize) {
        // Two children: substitute with the in-order predecessor (rightmost
        // descendant of the left subtree) and splice that predecessor out
        // instead, per §4.3.
        if self.left(z).is_some() && self.right(z).is_some() {
            let pred = self.predecessor_of_two_child_node(z);
            let (pkey, prows) = (self.node(pred).key.clone(), self.node(pred).rows.clone());
            self.node_mut(z).key = pkey;
            self.node_mut(z).rows = prows;
            self.delete_node(pred);
            return;
        }

        let child = self.left(z).or(self.right(z));
        if self.red_black {
            let z_color = self.color(Some(z));
            let z_parent = self.parent(z);
            self.transplant(z, child);
            self.free_node(z);
            if z_color == Color::Black {
                self.delete_fixup(child, z_parent);
            }
        } else {
            self.transplant(z, child);
            self.free_node(z);
        }
    }

    /// Rightmost node of `z`'s left subtree — used only when `z` has two
    /// children, so this always returns a distinct node.
    fn predecessor_of_two_child_node(&self, z: usize) -> usize {
        let mut cur = self.left(z).unwrap();
        while let Some(r) = self.right(cur) {
            cur = r;
        }
        cur
    }

    /// CLRS RB-DELETE-FIXUP, adapted to an arena where "NIL" is `None` and
    /// carries no node of its own, so the conceptual double-black node `x`
    /// is tracked as `(x, x_parent)` instead of a real node with a parent
    /// pointer.
    fn delete_fixup(&mut self, mut x: Option<usize>, mut x_parent: Option<usize>) {
        while x != self.root && !self.is_red(x) {
            let Some(xp) = x_parent else { break };
            if x == self.left(xp) {
                let mut w = self.right(xp).expect("sibling of a black node with a black-height deficit always exists");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(xp, Color::Red);
                    self.rotate_left(xp);
                    w = self.right(xp).unwrap();
                }
                if !self.is_red(self.left(w)) && !self.is_red(self.right(w)) {
                    self.set_color(w, Color::Red);
                    x = Some(xp);
                    x_parent = self.parent(xp);
                } else {
                    if !self.is_red(self.right(w)) {
                        if let Some(wl) = self.left(w) {
                            self.set_color(wl, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.right(xp).unwrap();
                    }
                    self.set_color(w, self.color(Some(xp)));
                    self.set_color(xp, Color::Black);
                    if let Some(wr) = self.right(w) {
                        self.set_color(wr, Color::Black);
                    }
                    self.rotate_left(xp);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let mut w = self.left(xp).expect("sibling of a black node with a black-height deficit always exists");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(xp, Color::Red);
                    self.rotate_right(xp);
                    w = self.left(xp).unwrap();
                }
                if !self.is_red(self.right(w)) && !self.is_red(self.left(w)) {
                    self.set_color(w, Color::Red);
                    x = Some(xp);
                    x_parent = self.parent(xp);
                } else {
                    if !self.is_red(self.left(w)) {
                        if let Some(wr) = self.right(w) {
                            self.set_color(wr, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.left(xp).unwrap();
                    }
                    self.set_color(w, self.color(Some(xp)));
                    self.set_color(xp, Color::Black);
                    if let Some(wl) = self.left(w) {
                        self.set_color(wl, Color::Black);
                    }
                    self.rotate_right(xp);
                    x = self.root;
                    x_parent = None;
                }
            }
        }
        if let Some(x) = x {
            self.set_color(x, Color::Black);
        }
    }

    // -- bulk row-number rewrites ----------------------------------------

    pub fn shift_left(&mut self, r: usize) {
        for slot in self.nodes.iter_mut().flatten() {
            for row in slot.rows.iter_mut() {
                if *row > r {
                    *row -= 1;
                }
            }
        }
    }

    pub fn shift_right(&mut self, r: usize) {
        for slot in self.nodes.iter_mut().flatten() {
            for row in slot.rows.iter_mut() {
                if *row >= r {
                    *row += 1;
                }
            }
        }
    }

    /// Rebuilds the tree from scratch from the remapped `(key, row)` set
    /// rather than deleting emptied nodes in place: `delete_node`'s
    /// two-child case splices in the in-order predecessor's `(key, rows)`
    /// and then deletes that predecessor, so if two nodes are both emptied
    /// by the same `replace_rows` call and one happens to be the other's
    /// predecessor, an in-place delete pass can copy an already-emptied
    /// `rows` list up into the surviving node and leave a spurious
    /// `(key, [])` group behind. Rebuilding from the surviving entries
    /// sidesteps that ordering dependency entirely.
    pub fn replace_rows(&mut self, map: &HashMap<usize, usize>) {
        let entries: Vec<(Key, usize)> = self
            .items()
            .into_iter()
            .flat_map(|(key, rows)| rows.into_iter().filter_map(move |r| map.get(&r).copied().map(|nr| (key.clone(), nr))))
            .collect();
        *self = BstEngine::new(entries, self.red_black);
    }

    // -- reads ---------------------------------------------------------

    pub fn find(&self, key: &Key) -> Vec<usize> { self.find_node(key).map(|id| self.node(id).rows.clone()).unwrap_or_default() }

    pub fn range(&self, lo: &Key, hi: &Key, bounds: (bool, bool)) -> Vec<usize> {
        let mut out = Vec::new();
        self.range_recurse(self.root, lo, hi, bounds, &mut out);
        out
    }

    fn range_recurse(&self, id: Option<usize>, lo: &Key, hi: &Key, bounds: (bool, bool), out: &mut Vec<usize>) {
        let Some(id) = id else { return };
        let node = self.node(id);
        let above_lo = match bounds.0 {
            true => node.key >= *lo,
            false => node.key > *lo,
        };
        let below_hi = match bounds.1 {
            true => node.key <= *hi,
            false => node.key < *hi,
        };
        if node.key > *lo {
            self.range_recurse(node.left, lo, hi, bounds, out);
        }
        if above_lo && below_hi {
            out.extend(node.rows.iter().copied());
        }
        if node.key < *hi {
            self.range_recurse(node.right, lo, hi, bounds, out);
        }
    }

    pub fn same_prefix(&self, prefix: &Key) -> Vec<usize> {
        let mut out = Vec::new();
        self.prefix_recurse(self.root, prefix, &mut out);
        out
    }

    fn prefix_recurse(&self, id: Option<usize>, prefix: &Key, out: &mut Vec<usize>) {
        let Some(id) = id else { return };
        let node = self.node(id);
        let cmp = cmp_prefix(&node.key, prefix);
        if cmp != Ordering::Less {
            self.prefix_recurse(node.left, prefix, out);
        }
        if cmp == Ordering::Equal {
            out.extend(node.rows.iter().copied());
        }
        if cmp != Ordering::Greater {
            self.prefix_recurse(node.right, prefix, out);
        }
    }

    pub fn sort(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.inorder(self.root, &mut |node| out.extend(node.rows.iter().copied()));
        out
    }

    pub fn items(&self) -> Vec<(Key, Vec<usize>)> {
        let mut out = Vec::new();
        self.inorder(self.root, &mut |node| out.push((node.key.clone(), node.rows.clone())));
        out
    }

    fn inorder<'a>(&'a self, id: Option<usize>, visit: &mut impl FnMut(&'a Node)) {
        let Some(id) = id else { return };
        let node = self.node(id);
        self.inorder(node.left, visit);
        visit(node);
        self.inorder(node.right, visit);
    }

    /// Testing aid (§4.3): the in-order property holds recursively, i.e.
    /// every node's key is `>=` its in-order predecessor and `<=` its
    /// in-order successor.
    #[cfg(test)]
    pub(crate) fn is_valid_bst(&self) -> bool {
        let items = self.items();
        items.windows(2).all(|w| w[0].0 <= w[1].0)
    }

    #[cfg(test)]
    pub(crate) fn is_valid_red_black(&self) -> bool {
        if !self.red_black {
            return true;
        }
        if self.is_red(self.root) {
            return false;
        }
        self.black_height(self.root).is_some()
    }

    #[cfg(test)]
    fn black_height(&self, id: Option<usize>) -> Option<usize> {
        let Some(id) = id else { return Some(1) };
        if self.is_red(Some(id)) && (self.is_red(self.left(id)) || self.is_red(self.right(id))) {
            return None; // red node with a red child
        }
        let lh = self.black_height(self.left(id))?;
        let rh = self.black_height(self.right(id))?;
        if lh != rh {
            return None;
        }
        Some(lh + if self.color(Some(id)) == Color::Black { 1 } else { 0 })
    }
}

fn cmp_prefix(key: &Key, prefix: &Key) -> Ordering {
    for (a, b) in key.iter().zip(prefix.iter()) {
        match a.cmp(b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn insert_sorted(rows: &mut Vec<usize>, row: usize) {
    let pos = rows.partition_point(|&r| r < row);
    rows.insert(pos, row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::key::key_of;

    fn k(i: i64) -> Key { key_of([Cell::Int(i)]) }

    #[test]
    fn insert_and_find_plain_bst() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        for (i, v) in [5, 3, 8, 1, 4, 7, 9].into_iter().enumerate() {
            e.add(k(v), i);
        }
        assert_eq!(e.find(&k(8)), vec![2]);
        assert!(e.find(&k(100)).is_empty());
        assert!(e.is_valid_bst());
    }

    /// `replace_rows` dropping a two-child node's row together with its
    /// in-order predecessor's row, in the same call, used to leave a
    /// `(key, [])` ghost behind: `delete_node` on the two-child node splices
    /// the (already-emptied) predecessor's `rows` up before the predecessor
    /// itself is freed. Key `3` here has two children (`1` and `4`) and `1`
    /// is its predecessor.
    #[test]
    fn replace_rows_dropping_a_node_and_its_predecessor_leaves_no_ghost() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        for (i, v) in [5, 3, 8, 1, 4, 7, 9].into_iter().enumerate() {
            e.add(k(v), i);
        }
        // Rows 1 (key 3) and 3 (key 1) are dropped; the rest keep their row number.
        let map: HashMap<usize, usize> = [(0, 0), (2, 2), (4, 4), (5, 5), (6, 6)].into_iter().collect();
        e.replace_rows(&map);

        let items = e.items();
        assert!(items.iter().all(|(_, rows)| !rows.is_empty()), "no key should survive with an empty row list: {items:?}");
        assert_eq!(
            items,
            vec![(k(4), vec![4]), (k(5), vec![0]), (k(7), vec![5]), (k(8), vec![2]), (k(9), vec![6])]
        );
        assert!(e.is_valid_bst());
    }

    #[test]
    fn duplicate_keys_accumulate_rows_sorted() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        e.add(k(1), 5);
        e.add(k(1), 2);
        e.add(k(1), 9);
        assert_eq!(e.find(&k(1)), vec![2, 5, 9]);
    }

    #[test]
    fn remove_single_row_then_whole_key() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        e.add(k(1), 0);
        e.add(k(1), 1);
        assert!(e.remove(&k(1), Some(0)).unwrap());
        assert_eq!(e.find(&k(1)), vec![1]);
        assert!(e.remove(&k(1), None).unwrap());
        assert!(e.find(&k(1)).is_empty());
    }

    #[test]
    fn remove_missing_row_under_existing_key_is_hard_error() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        e.add(k(1), 0);
        assert!(e.remove(&k(1), Some(99)).is_err());
    }

    #[test]
    fn remove_absent_key_returns_false() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        e.add(k(1), 0);
        assert!(!e.remove(&k(2), None).unwrap());
    }

    #[test]
    fn red_black_stays_balanced_under_sorted_insertion() {
        let mut e = BstEngine::new(std::iter::empty(), true);
        for i in 0..200i64 {
            e.add(k(i), i as usize);
        }
        assert!(e.is_valid_bst());
        assert!(e.is_valid_red_black());
        assert_eq!(e.sort().len(), 200);
    }

    #[test]
    fn red_black_survives_heavy_deletion() {
        let mut e = BstEngine::new(std::iter::empty(), true);
        for i in 0..100i64 {
            e.add(k(i), i as usize);
        }
        for i in (0..100i64).step_by(2) {
            e.remove(&k(i), None).unwrap();
        }
        assert!(e.is_valid_bst());
        assert!(e.is_valid_red_black());
        assert_eq!(e.sort().len(), 50);
    }

    #[test]
    fn range_and_prefix_queries() {
        let mut e = BstEngine::new(std::iter::empty(), false);
        for i in 0..10i64 {
            e.add(k(i), i as usize);
        }
        let mut r = e.range(&k(3), &k(6), (true, true));
        r.sort_unstable();
        assert_eq!(r, vec![3, 4, 5, 6]);

        let mut r = e.range(&k(3), &k(6), (false, false));
        r.sort_unstable();
        assert_eq!(r, vec![4, 5]);
    }

    #[test]
    fn sort_is_a_permutation_after_mixed_ops() {
        let mut e = BstEngine::new(std::iter::empty(), true);
        for i in [4, 2, 9, 1, 7, 3].into_iter().enumerate().map(|(r, v)| (k(v), r)) {
            e.add(i.0, i.1);
        }
        e.remove(&k(9), None).unwrap();
        e.shift_left(3);
        let mut sorted = e.sort();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
    }
}
