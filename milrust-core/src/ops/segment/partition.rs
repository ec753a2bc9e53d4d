use crate::error::MilRustError;
use std::collections::BTreeMap;
use std::ops::Range;

/// An ordered partition of the instance axis into contiguous "bags".
///
/// Each bag is a half-open column range `start..end` over a `[features,
/// instances]` tensor. Ranges must be non-empty and strictly ascending
/// (non-overlapping); gaps between consecutive bags are allowed, in which case
/// the skipped columns simply belong to no bag.
///
/// The partition is purely structural: it is validated once at construction,
/// carries derived statistics, and never participates in gradients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagPartition {
    ranges: Vec<Range<usize>>,
    lengths: Vec<usize>,
    max_len: usize,
}

impl BagPartition {
    /// Builds a partition from explicit column ranges.
    ///
    /// # Errors
    /// * `EmptyBag` if any range covers no columns.
    /// * `UnorderedBags` if a range starts before the previous one ends.
    pub fn new(ranges: Vec<Range<usize>>) -> Result<Self, MilRustError> {
        let mut prev_end = 0usize;
        for (bag_index, range) in ranges.iter().enumerate() {
            if range.start >= range.end {
                return Err(MilRustError::EmptyBag { bag_index });
            }
            if bag_index > 0 && range.start < prev_end {
                return Err(MilRustError::UnorderedBags {
                    bag_index,
                    start: range.start,
                    end: range.end,
                    prev_end,
                });
            }
            prev_end = range.end;
        }

        let lengths: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        Ok(BagPartition {
            ranges,
            lengths,
            max_len,
        })
    }

    /// Builds a gap-free partition from consecutive bag lengths, starting at
    /// column 0.
    ///
    /// # Errors
    /// `EmptyBag` if any length is zero.
    pub fn from_lengths(lengths: &[usize]) -> Result<Self, MilRustError> {
        let mut ranges = Vec::with_capacity(lengths.len());
        let mut start = 0usize;
        for &len in lengths {
            ranges.push(start..start + len);
            start += len;
        }
        Self::new(ranges)
    }

    /// Number of bags.
    pub fn num_bags(&self) -> usize {
        self.ranges.len()
    }

    /// Per-bag instance counts.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Length of the longest bag, i.e. the number of rounds the vectorized
    /// reductions run.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// The column ranges of all bags.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// The column range of bag `i`. Panics on an out-of-bounds bag index.
    pub fn range(&self, i: usize) -> Range<usize> {
        self.ranges[i].clone()
    }

    /// One past the last column any bag covers (0 for an empty partition).
    pub fn span(&self) -> usize {
        self.ranges.last().map_or(0, |r| r.end)
    }

    /// Checks that every bag fits within an instance axis of `ninstances`
    /// columns.
    ///
    /// # Errors
    /// `BagOutOfBounds` naming the first offending bag.
    pub fn check_instances(&self, ninstances: usize) -> Result<(), MilRustError> {
        if let Some(bag_index) = self.ranges.iter().position(|r| r.end > ninstances) {
            return Err(MilRustError::BagOutOfBounds {
                bag_index,
                end: self.ranges[bag_index].end,
                ninstances,
            });
        }
        Ok(())
    }

    /// Enumerates `(bag index, representative column)` pairs for round `r`.
    ///
    /// A bag is active at round `r` (0-based) while `r < len(bag)`; its
    /// representative is its `r`-th column, `start + r`. Every column of every
    /// bag appears as a representative in exactly one round, which is what the
    /// reduction kernels build on: `max_len()` dense passes instead of one
    /// variable-length loop per bag.
    pub(crate) fn round(&self, r: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ranges
            .iter()
            .enumerate()
            .filter(move |(_, range)| range.len() > r)
            .map(move |(bag, range)| (bag, range.start + r))
    }

    /// Groups bag indices by bag length, ascending.
    ///
    /// The mean gradient's normalization pass is keyed by owning-bag length
    /// rather than by round, so each instance is divided exactly once.
    pub(crate) fn bags_by_len(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (bag, &len) in self.lengths.iter().enumerate() {
            groups.entry(len).or_default().push(bag);
        }
        groups
    }
}

#[cfg(test)]
#[path = "partition_test.rs"]
mod tests;
