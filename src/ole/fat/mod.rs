//! Block allocation tables.
//!
//! A [`Fat`] maps each block index to the next block of its chain or to one
//! of the sentinels in [`consts`](super::consts). The same traversal and
//! validation logic serves both the big-block table and the small-block
//! ("mini") table.

/// Read-through block cache in front of the byte source
mod cache;

/// Primary (big-block) allocation table
pub mod big;

/// Secondary (small-block) allocation table
pub mod small;

pub use big::BigBlockTable;
pub use small::SmallBlockTable;

use super::consts::*;
use crate::common::{DocfileError, Result};
use fixedbitset::FixedBitSet;

/// An immutable chain-of-blocks index table.
#[derive(Debug, Clone, Default)]
pub struct Fat {
    entries: Vec<i32>,
}

impl Fat {
    pub fn new(entries: Vec<i32>) -> Self {
        Self { entries }
    }

    /// Number of blocks addressed by this table
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw table entries
    #[inline]
    pub fn entries(&self) -> &[i32] {
        &self.entries
    }

    /// Whether `block` is an index inside this table
    #[inline]
    pub fn contains(&self, block: i32) -> bool {
        block >= 0 && (block as usize) < self.entries.len()
    }

    /// Successor of `block`, failing if `block` is not an index of the table.
    #[inline]
    pub fn next(&self, block: i32) -> Result<i32> {
        if !self.contains(block) {
            return Err(DocfileError::CorruptedFile(format!(
                "block index {block} outside allocation table of {} entries",
                self.entries.len()
            )));
        }
        Ok(self.entries[block as usize])
    }

    /// Follow `n` successor links starting at `start`.
    ///
    /// Every block stepped from must be in range; the returned index may be a
    /// sentinel such as [`END_OF_CHAIN`] when the chain is exactly `n` long.
    pub fn advance(&self, start: i32, n: usize) -> Result<i32> {
        let mut block = start;
        for _ in 0..n {
            block = self.next(block)?;
        }
        Ok(block)
    }

    /// Count the blocks in the chain starting at `start`.
    pub fn length_in_blocks(&self, start: i32) -> Result<usize> {
        let mut count = 0;
        for block in self.chain(start) {
            block?;
            count += 1;
        }
        Ok(count)
    }

    /// Iterate the blocks of the chain starting at `start`.
    pub fn chain(&self, start: i32) -> Chain<'_> {
        Chain {
            fat: self,
            next: start,
            remaining: self.entries.len(),
            failed: false,
        }
    }

    /// Collect the chain starting at `start` into a vector of block indices.
    pub fn collect_chain(&self, start: i32) -> Result<Vec<i32>> {
        self.chain(start).collect()
    }

    /// Check every slot for out-of-range targets, self-loops, cross-linked
    /// chains (two slots naming the same successor) and closed loops.
    pub fn validate(&self) -> Result<()> {
        let mut referenced = FixedBitSet::with_capacity(self.entries.len());
        for (index, &target) in self.entries.iter().enumerate() {
            match target {
                FREE_BLOCK | END_OF_CHAIN | SPECIAL_BLOCK | EXTENSION_BLOCK => continue,
                t if t < 0 => {
                    return Err(DocfileError::CorruptedFile(format!(
                        "invalid allocation table entry {t} at block {index}"
                    )));
                },
                t if t as usize >= self.entries.len() => {
                    return Err(DocfileError::CorruptedFile(format!(
                        "allocation table entry at block {index} references block {t} out of range"
                    )));
                },
                t => {
                    let t = t as usize;
                    if t == index || referenced.contains(t) {
                        return Err(DocfileError::CorruptedFile(format!(
                            "circular reference in allocation table: block {index} -> {t}"
                        )));
                    }
                    referenced.insert(t);
                },
            }
        }

        // With no cross-links every chain is a simple path from an unreferenced
        // head; a referenced slot no head reaches sits on a closed cycle.
        let mut reached = FixedBitSet::with_capacity(self.entries.len());
        for head in (0..self.entries.len()).filter(|&i| !referenced.contains(i)) {
            let mut target = self.entries[head];
            while target >= 0 {
                reached.insert(target as usize);
                target = self.entries[target as usize];
            }
        }
        if let Some(index) = referenced.difference(&reached).next() {
            return Err(DocfileError::CorruptedFile(format!(
                "circular reference in allocation table: block {index} lies on a closed loop"
            )));
        }
        Ok(())
    }
}

/// Iterator over the blocks of one chain.
///
/// Yields an error and stops on an out-of-range link, on a free or special
/// block inside the chain, or when the chain is longer than the table (a loop).
#[derive(Debug)]
pub struct Chain<'a> {
    fat: &'a Fat,
    next: i32,
    remaining: usize,
    failed: bool,
}

impl Iterator for Chain<'_> {
    type Item = Result<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next == END_OF_CHAIN {
            return None;
        }
        let block = self.next;
        if self.remaining == 0 {
            self.failed = true;
            return Some(Err(DocfileError::CorruptedFile(format!(
                "block chain loops back through block {block}"
            ))));
        }
        self.remaining -= 1;
        match self.fat.next(block) {
            Ok(successor) => {
                self.next = successor;
                Some(Ok(block))
            },
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn linear(len: usize) -> Fat {
        let mut entries: Vec<i32> = (1..len as i32).collect();
        entries.push(END_OF_CHAIN);
        Fat::new(entries)
    }

    #[test]
    fn test_advance_and_length() {
        let fat = Fat::new(vec![2, END_OF_CHAIN, 3, 1, FREE_BLOCK]);
        assert_eq!(fat.advance(0, 0).unwrap(), 0);
        assert_eq!(fat.advance(0, 1).unwrap(), 2);
        assert_eq!(fat.advance(0, 3).unwrap(), 1);
        assert_eq!(fat.advance(0, 4).unwrap(), END_OF_CHAIN);
        assert!(fat.advance(0, 5).is_err());
        assert_eq!(fat.length_in_blocks(0).unwrap(), 4);
        assert_eq!(fat.length_in_blocks(END_OF_CHAIN).unwrap(), 0);
        assert_eq!(fat.collect_chain(0).unwrap(), vec![0, 2, 3, 1]);
        assert!(fat.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_link_is_fatal() {
        let fat = Fat::new(vec![7, END_OF_CHAIN]);
        assert!(fat.advance(0, 2).is_err());
        assert!(fat.length_in_blocks(0).is_err());
        assert!(fat.validate().is_err());
        assert!(fat.advance(-5, 1).is_err());
    }

    #[test]
    fn test_validate_rejects_self_loop() {
        let fat = Fat::new(vec![END_OF_CHAIN, 1, END_OF_CHAIN]);
        assert!(matches!(fat.validate(), Err(DocfileError::CorruptedFile(_))));
    }

    #[test]
    fn test_validate_rejects_cross_link() {
        let fat = Fat::new(vec![2, 2, END_OF_CHAIN]);
        assert!(fat.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_sentinel() {
        let fat = Fat::new(vec![-6, END_OF_CHAIN]);
        assert!(fat.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_sentinels() {
        let fat = Fat::new(vec![
            SPECIAL_BLOCK,
            EXTENSION_BLOCK,
            FREE_BLOCK,
            4,
            END_OF_CHAIN,
        ]);
        assert!(fat.validate().is_ok());
    }

    #[test]
    fn test_loop_detected_during_traversal() {
        // Unvalidated table with a cycle 0 -> 1 -> 0
        let fat = Fat::new(vec![1, 0]);
        assert!(fat.length_in_blocks(0).is_err());
        assert!(fat.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_closed_loop_beside_valid_chain() {
        // 0 -> 4 -> END is fine; 1 -> 2 -> 3 -> 1 has no head
        let fat = Fat::new(vec![4, 2, 3, 1, END_OF_CHAIN, FREE_BLOCK]);
        assert!(matches!(fat.validate(), Err(DocfileError::CorruptedFile(_))));

        let fat = Fat::new(vec![4, 2, 3, END_OF_CHAIN, END_OF_CHAIN, FREE_BLOCK]);
        assert!(fat.validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_advance_composes(len in 1usize..200, a in any::<usize>(), b in any::<usize>()) {
            let fat = linear(len);
            let n = a % (len + 1);
            let m = b % (len - n + 1);
            let direct = fat.advance(0, n + m).unwrap();
            let stepped = fat.advance(fat.advance(0, n).unwrap(), m).unwrap();
            prop_assert_eq!(direct, stepped);
        }

        #[test]
        fn prop_shuffled_chain_validates(seed in any::<u64>(), len in 2usize..64) {
            // Build a single chain visiting a permutation of all blocks
            let mut order: Vec<i32> = (0..len as i32).collect();
            let mut state = seed | 1;
            for i in (1..order.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                order.swap(i, (state % (i as u64 + 1)) as usize);
            }
            let mut entries = vec![FREE_BLOCK; len];
            for pair in order.windows(2) {
                entries[pair[0] as usize] = pair[1];
            }
            entries[order[len - 1] as usize] = END_OF_CHAIN;
            let fat = Fat::new(entries);
            prop_assert!(fat.validate().is_ok());
            prop_assert_eq!(fat.length_in_blocks(order[0]).unwrap(), len);
            prop_assert_eq!(fat.collect_chain(order[0]).unwrap(), order);
        }
    }
}
