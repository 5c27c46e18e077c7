//! Sorted-array engine (§4.4): two parallel vectors (`keys`, `rows`) held in
//! ascending `(key, row)` order. Binary search answers `find`/`range` in
//! O(log N); every mutation is O(N) because it has to keep the arrays
//! packed and sorted. Default engine for read-mostly indices (bulk
//! construction and reads are the fastest of the three engines; see §4.4's
//! trade-off note).

use crate::error::EngineError;
use crate::key::Key;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SortedArrayEngine {
    keys: Vec<Key>,
    rows: Vec<usize>,
}

impl SortedArrayEngine {
    pub fn new(entries: impl IntoIterator<Item = (Key, usize)>) -> Self {
        let mut pairs: Vec<(Key, usize)> = entries.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        let (keys, rows) = pairs.into_iter().unzip();
        Self { keys, rows }
    }

    /// First index `i` such that `keys[i] >= key` (the lower bound).
    fn lower_bound(&self, key: &Key) -> usize { self.keys.partition_point(|k| k < key) }

    /// First index `i` such that `keys[i] > key` (the upper bound); together
    /// with `lower_bound` this brackets the contiguous run of entries equal
    /// to `key`.
    fn upper_bound(&self, key: &Key) -> usize { self.keys.partition_point(|k| k <= key) }

    pub fn add(&mut self, key: Key, row: usize) {
        let lo = self.lower_bound(&key);
        let hi = self.upper_bound(&key);
        // Insert keeping the (key, row) sub-run sorted by row.
        let pos = lo + self.rows[lo..hi].partition_point(|&r| r < row);
        self.keys.insert(pos, key);
        self.rows.insert(pos, row);
    }

    pub fn find(&self, key: &Key) -> Vec<usize> {
        let lo = self.lower_bound(key);
        let hi = self.upper_bound(key);
        self.rows[lo..hi].to_vec()
    }

    pub fn range(&self, lo: &Key, hi: &Key, bounds: (bool, bool)) -> Vec<usize> {
        let start = match bounds.0 {
            true => self.keys.partition_point(|k| k < lo),
            false => self.keys.partition_point(|k| k <= lo),
        };
        let end = match bounds.1 {
            true => self.keys.partition_point(|k| k <= hi),
            false => self.keys.partition_point(|k| k < hi),
        };
        if start >= end {
            return Vec::new();
        }
        self.rows[start..end].to_vec()
    }

    pub fn same_prefix(&self, prefix: &Key) -> Vec<usize> {
        let start = self.keys.partition_point(|k| cmp_prefix(k, prefix) == Ordering::Less);
        let end = self.keys.partition_point(|k| cmp_prefix(k, prefix) != Ordering::Greater);
        if start >= end {
            return Vec::new();
        }
        self.rows[start..end].to_vec()
    }

    pub fn remove(&mut self, key: &Key, row: Option<usize>) -> Result<bool, EngineError> {
        let lo = self.lower_bound(key);
        let hi = self.upper_bound(key);
        if lo == hi {
            return Ok(false);
        }
        match row {
            Some(r) => {
                let Some(offset) = self.rows[lo..hi].iter().position(|&x| x == r) else {
                    return Err(EngineError::RowNotFoundUnderKey { row: r });
                };
                self.keys.remove(lo + offset);
                self.rows.remove(lo + offset);
            }
            None => {
                self.keys.drain(lo..hi);
                self.rows.drain(lo..hi);
            }
        }
        Ok(true)
    }

    pub fn shift_left(&mut self, r: usize) {
        for row in self.rows.iter_mut() {
            if *row > r {
                *row -= 1;
            }
        }
    }

    pub fn shift_right(&mut self, r: usize) {
        for row in self.rows.iter_mut() {
            if *row >= r {
                *row += 1;
            }
        }
    }

    pub fn replace_rows(&mut self, map: &HashMap<usize, usize>) {
        let mut pairs: Vec<(Key, usize)> = self
            .keys
            .iter()
            .zip(self.rows.iter())
            .filter_map(|(k, r)| map.get(r).map(|&nr| (k.clone(), nr)))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        let (keys, rows) = pairs.into_iter().unzip();
        self.keys = keys;
        self.rows = rows;
    }

    pub fn sort(&self) -> Vec<usize> { self.rows.clone() }

    pub fn items(&self) -> Vec<(Key, Vec<usize>)> {
        let mut out: Vec<(Key, Vec<usize>)> = Vec::new();
        for (k, &r) in self.keys.iter().zip(self.rows.iter()) {
            match out.last_mut() {
                Some((lk, rows)) if *lk == *k => rows.push(r),
                _ => out.push((k.clone(), vec![r])),
            }
        }
        out
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::key::key_of;

    fn k(i: i64) -> Key { key_of([Cell::Int(i)]) }

    #[test]
    fn bulk_construction_sorts_once() {
        let e = SortedArrayEngine::new([(k(3), 0), (k(1), 1), (k(2), 2)]);
        assert_eq!(e.sort(), vec![1, 2, 0]);
    }

    #[test]
    fn find_and_range() {
        let mut e = SortedArrayEngine::new(std::iter::empty());
        for i in 0..10i64 {
            e.add(k(i), i as usize);
        }
        assert_eq!(e.find(&k(5)), vec![5]);
        let mut r = e.range(&k(3), &k(6), (true, false));
        r.sort_unstable();
        assert_eq!(r, vec![3, 4, 5]);
    }

    #[test]
    fn duplicate_keys_keep_rows_sorted() {
        let mut e = SortedArrayEngine::new(std::iter::empty());
        e.add(k(1), 5);
        e.add(k(1), 1);
        e.add(k(1), 3);
        assert_eq!(e.find(&k(1)), vec![1, 3, 5]);
    }

    #[test]
    fn remove_row_then_whole_key() {
        let mut e = SortedArrayEngine::new([(k(1), 0), (k(1), 1)]);
        assert!(e.remove(&k(1), Some(0)).unwrap());
        assert_eq!(e.find(&k(1)), vec![1]);
        assert!(e.remove(&k(1), None).unwrap());
        assert!(e.find(&k(1)).is_empty());
    }

    #[test]
    fn remove_missing_row_is_hard_error() {
        let mut e = SortedArrayEngine::new([(k(1), 0)]);
        assert!(e.remove(&k(1), Some(7)).is_err());
    }
}
