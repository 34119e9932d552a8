/*!
 * Character-budget splitting of a document pair into overlapping chunks.
 *
 * The primary document is cut at the element boundaries whose cumulative
 * unit count is nearest to an even share of the total. The resulting
 * boundaries are expressed as ratios of the element count and replayed onto
 * the secondary document, so both sides are cut at proportionally matching
 * positions. Every interior boundary is then widened by a buffer measured in
 * units, so adjacent chunks overlap and sentences straddling a cut are seen
 * whole by at least one chunk.
 */

use serde::{Deserialize, Serialize};

use crate::document::Anchors;
use crate::errors::AlignmentError;

/// Default overlap on each side of an interior boundary
pub const DEFAULT_BUFFER_UNITS: usize = 2000;

/// Default unit thresholds; threshold `i` enables `i + 2` parts
pub const DEFAULT_PART_THRESHOLDS: [usize; 7] =
    [25_000, 50_000, 75_000, 100_000, 125_000, 150_000, 175_000];

/// Half-open range `[start, end)` over element indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// The ordered ranges of one document plus the cut points that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub ranges: Vec<Range>,
    /// Interior boundary element indices, strictly increasing
    pub boundaries: Vec<usize>,
    pub element_count: usize,
}

impl SplitPlan {
    pub fn parts(&self) -> usize {
        self.ranges.len()
    }

    /// Interior boundaries as fractions of the element count
    pub fn ratios(&self) -> Vec<f64> {
        if self.element_count == 0 {
            return Vec::new();
        }
        self.boundaries
            .iter()
            .map(|&b| b as f64 / self.element_count as f64)
            .collect()
    }
}

/// One unit of oracle work: matching ranges of both documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkTask {
    /// Zero-based output slot
    pub index: usize,
    pub source: Range,
    pub target: Range,
    pub source_anchors: Anchors,
    pub target_anchors: Anchors,
}

impl ChunkTask {
    /// 1-based number used in logs and file names
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Pair the source plan's ranges with the target plan's, one task per source range.
///
/// A target too small to be cut (a single element) has fewer ranges; its
/// last range is reused for the remaining source ranges.
pub fn pair_plans(source: &SplitPlan, target: &SplitPlan) -> Vec<ChunkTask> {
    let fallback = Range::new(0, target.element_count);
    source
        .ranges
        .iter()
        .enumerate()
        .map(|(index, s)| ChunkTask {
            index,
            source: *s,
            target: target
                .ranges
                .get(index)
                .or(target.ranges.last())
                .copied()
                .unwrap_or(fallback),
            source_anchors: Anchors::default(),
            target_anchors: Anchors::default(),
        })
        .collect()
}

/// Chooses how many parts a document pair is cut into
#[derive(Debug, Clone, PartialEq)]
pub struct PartCountPolicy {
    thresholds: Vec<usize>,
}

impl Default for PartCountPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PART_THRESHOLDS.to_vec())
    }
}

impl PartCountPolicy {
    pub fn new(thresholds: Vec<usize>) -> Self {
        Self { thresholds }
    }

    /// Largest part count whose threshold `max(source, target)` exceeds, else 1
    pub fn parts_for(&self, source_units: usize, target_units: usize) -> usize {
        let size = source_units.max(target_units);
        self.thresholds
            .iter()
            .enumerate()
            .filter(|(_, threshold)| size > **threshold)
            .map(|(i, _)| i + 2)
            .max()
            .unwrap_or(1)
    }
}

/// Splits element sequences by cumulative unit count
#[derive(Debug, Clone, Copy)]
pub struct CharBudgetSplitter {
    buffer_units: usize,
}

impl Default for CharBudgetSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_UNITS)
    }
}

impl CharBudgetSplitter {
    pub fn new(buffer_units: usize) -> Self {
        Self { buffer_units }
    }

    pub fn buffer_units(&self) -> usize {
        self.buffer_units
    }

    /// Cut a document with per-element `unit_counts` into `num_parts` ranges
    pub fn plan(&self, unit_counts: &[usize], num_parts: usize) -> Result<SplitPlan, AlignmentError> {
        if num_parts == 0 {
            return Err(AlignmentError::InvalidPartCount(num_parts));
        }
        let cumulative = cumulative(unit_counts);
        let total = cumulative.last().copied().unwrap_or(0);
        if total == 0 {
            return Err(AlignmentError::EmptyDocument(
                "document has zero measurable units".to_string(),
            ));
        }

        let n = unit_counts.len();
        if num_parts == 1 || n == 1 {
            return Ok(whole(n));
        }

        let share = total as f64 / num_parts as f64;
        let raw: Vec<usize> = (1..num_parts)
            .map(|i| nearest_index(&cumulative, share * i as f64))
            .collect();

        Ok(self.expand(&cumulative, enforce_increasing(raw, n)))
    }

    /// Cut a document at positions proportional to `ratios`
    pub fn apply_ratios(&self, unit_counts: &[usize], ratios: &[f64]) -> Result<SplitPlan, AlignmentError> {
        let cumulative = cumulative(unit_counts);
        if cumulative.last().copied().unwrap_or(0) == 0 {
            return Err(AlignmentError::EmptyDocument(
                "document has zero measurable units".to_string(),
            ));
        }

        let n = unit_counts.len();
        if ratios.is_empty() || n == 1 {
            return Ok(whole(n));
        }

        let raw: Vec<usize> = ratios
            .iter()
            .map(|r| {
                let r = if r.is_finite() { r.clamp(0.0, 1.0) } else { 0.0 };
                ((r * n as f64).round() as usize).min(n - 1)
            })
            .collect();

        Ok(self.expand(&cumulative, enforce_increasing(raw, n)))
    }

    fn expand(&self, cumulative: &[usize], boundaries: Vec<usize>) -> SplitPlan {
        let n = cumulative.len();
        let parts = boundaries.len() + 1;

        let ranges = (0..parts)
            .map(|k| {
                let start = if k == 0 {
                    0
                } else {
                    self.left_edge(cumulative, boundaries[k - 1])
                };
                let end = if k == parts - 1 {
                    n
                } else {
                    self.right_edge(cumulative, boundaries[k])
                };
                let start = start.min(n - 1);
                let end = end.min(n).max(start + 1);
                Range::new(start, end)
            })
            .collect();

        SplitPlan {
            ranges,
            boundaries,
            element_count: n,
        }
    }

    /// Exclusive end index: one past the first element reaching `boundary + buffer`
    fn right_edge(&self, cumulative: &[usize], split: usize) -> usize {
        let target = cumulative[split] + self.buffer_units;
        (split + 1..cumulative.len())
            .find(|&i| cumulative[i] >= target)
            .map(|i| i + 1)
            .unwrap_or(cumulative.len())
    }

    /// Inclusive start index: last element at or below `boundary - buffer`
    fn left_edge(&self, cumulative: &[usize], split: usize) -> usize {
        let base = cumulative[split];
        if base <= self.buffer_units {
            return 0;
        }
        let target = base - self.buffer_units;
        (0..split)
            .rev()
            .find(|&i| cumulative[i] <= target)
            .unwrap_or(0)
    }
}

fn whole(n: usize) -> SplitPlan {
    SplitPlan {
        ranges: vec![Range::new(0, n)],
        boundaries: Vec::new(),
        element_count: n,
    }
}

fn cumulative(unit_counts: &[usize]) -> Vec<usize> {
    unit_counts
        .iter()
        .scan(0usize, |acc, &c| {
            *acc += c;
            Some(*acc)
        })
        .collect()
}

/// Index whose cumulative count is nearest to `target`; ties keep the lower index
fn nearest_index(cumulative: &[usize], target: f64) -> usize {
    let below = cumulative.partition_point(|&c| (c as f64) < target);
    let best = below.saturating_sub(1);
    if best + 1 < cumulative.len() {
        let here = (target - cumulative[best] as f64).abs();
        let next = (cumulative[best + 1] as f64 - target).abs();
        if next < here {
            return best + 1;
        }
    }
    best
}

/// Bump non-increasing boundaries forward and clamp them into `[0, n - 1]`
fn enforce_increasing(mut boundaries: Vec<usize>, n: usize) -> Vec<usize> {
    for i in 1..boundaries.len() {
        if boundaries[i] <= boundaries[i - 1] {
            boundaries[i] = boundaries[i - 1] + 1;
        }
    }
    for b in boundaries.iter_mut() {
        *b = (*b).min(n - 1);
    }
    boundaries
}
