/*!
 * Tests for character-budget chunk planning
 */

use docalign::alignment::splitter::{
    CharBudgetSplitter, PartCountPolicy, Range, SplitPlan, pair_plans,
};
use docalign::errors::AlignmentError;

/// Deterministic pseudo-random unit counts, some of them zero
fn generated_counts(seed: u64, len: usize) -> Vec<usize> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let value = (state >> 33) % 900;
            if value < 60 { 0 } else { value as usize }
        })
        .collect()
}

fn units_in(counts: &[usize], start: usize, end: usize) -> usize {
    counts[start..end].iter().sum()
}

fn assert_valid_plan(plan: &SplitPlan, n: usize) {
    assert!(!plan.ranges.is_empty());
    assert_eq!(plan.ranges[0].start, 0, "first range must start at 0");
    assert_eq!(plan.ranges.last().unwrap().end, n, "last range must end at n");
    for range in &plan.ranges {
        assert!(range.start < range.end, "empty range {:?}", range);
        assert!(range.end <= n, "range {:?} out of bounds", range);
    }
    for pair in plan.ranges.windows(2) {
        assert!(pair[0].start <= pair[1].start, "starts decrease: {:?}", pair);
        assert!(pair[0].end <= pair[1].end, "ends decrease: {:?}", pair);
        assert!(pair[1].start <= pair[0].end, "gap between {:?}", pair);
    }
}

#[test]
fn test_plan_withThreeEqualElements_shouldOverlapAroundMidpoint() {
    let counts = [1000, 1000, 1000];
    let plan = CharBudgetSplitter::new(200).plan(&counts, 2).unwrap();

    assert_eq!(plan.parts(), 2);
    let (first, second) = (plan.ranges[0], plan.ranges[1]);
    // The first part reaches past its boundary element by at least the buffer
    let boundary = plan.boundaries[0];
    assert!(units_in(&counts, boundary + 1, first.end) >= 200);
    // The second part starts early enough to repeat at least the buffer
    assert!(second.start <= boundary);
    assert!(units_in(&counts, second.start, first.end) >= 200);
    assert_eq!(first, Range::new(0, 2));
    assert_eq!(second, Range::new(0, 3));
}

#[test]
fn test_plan_withGeneratedDocuments_shouldCoverAndOverlapByBuffer() {
    let buffer = 500;
    let splitter = CharBudgetSplitter::new(buffer);
    for seed in 0..40 {
        let counts = generated_counts(seed, 5 + (seed as usize * 7) % 120);
        if counts.iter().sum::<usize>() == 0 {
            continue;
        }
        for parts in 1..=6 {
            let plan = splitter.plan(&counts, parts).unwrap();
            assert_valid_plan(&plan, counts.len());

            for pair in plan.ranges.windows(2) {
                let overlap = units_in(&counts, pair[1].start, pair[0].end);
                let at_edge = pair[1].start == 0 || pair[0].end == counts.len();
                assert!(
                    overlap >= buffer || at_edge,
                    "seed {} parts {}: overlap {} below buffer for {:?}",
                    seed,
                    parts,
                    overlap,
                    pair
                );
            }
        }
    }
}

#[test]
fn test_plan_withOneOversizedElement_shouldNotCollapseBoundaries() {
    let counts = [10, 10, 5000, 10, 10, 10];
    let plan = CharBudgetSplitter::new(0).plan(&counts, 3).unwrap();
    assert_eq!(plan.boundaries.len(), 2);
    assert!(plan.boundaries[0] < plan.boundaries[1]);
    assert_valid_plan(&plan, counts.len());
}

#[test]
fn test_plan_withSinglePart_shouldNotBuffer() {
    let plan = CharBudgetSplitter::new(10_000).plan(&[3, 4, 5], 1).unwrap();
    assert_eq!(plan.ranges, vec![Range::new(0, 3)]);
    assert!(plan.boundaries.is_empty());
}

#[test]
fn test_plan_withZeroParts_shouldFail() {
    let result = CharBudgetSplitter::new(10).plan(&[3, 4], 0);
    assert!(matches!(result, Err(AlignmentError::InvalidPartCount(0))));
}

#[test]
fn test_plan_withMorePartsThanElements_shouldStayInBounds() {
    let plan = CharBudgetSplitter::new(1).plan(&[50, 50, 50], 8).unwrap();
    assert_valid_plan(&plan, 3);
}

#[test]
fn test_applyRatios_withDifferentLengths_shouldYieldValidRanges() {
    let splitter = CharBudgetSplitter::new(300);
    for seed in 0..30 {
        let source = generated_counts(seed, 20 + seed as usize * 3);
        let target = generated_counts(seed + 1000, 7 + seed as usize * 5);
        if source.iter().sum::<usize>() == 0 || target.iter().sum::<usize>() == 0 {
            continue;
        }
        for parts in 2..=5 {
            let source_plan = splitter.plan(&source, parts).unwrap();
            let target_plan = splitter.apply_ratios(&target, &source_plan.ratios()).unwrap();
            assert_valid_plan(&target_plan, target.len());
            assert_eq!(target_plan.parts(), source_plan.parts());
        }
    }
}

#[test]
fn test_applyRatios_shouldRoundRatioTimesLength() {
    let plan = CharBudgetSplitter::new(0).apply_ratios(&[1; 10], &[0.34, 0.66]).unwrap();
    assert_eq!(plan.boundaries, vec![3, 7]);
}

#[test]
fn test_applyRatios_withEmptyDocument_shouldFail() {
    let result = CharBudgetSplitter::new(0).apply_ratios(&[0, 0, 0], &[0.5]);
    assert!(matches!(result, Err(AlignmentError::EmptyDocument(_))));
}

#[test]
fn test_pairPlans_withSingleElementTarget_shouldReuseWholeTarget() {
    let splitter = CharBudgetSplitter::new(0);
    let source = splitter.plan(&[100, 100, 100, 100], 2).unwrap();
    let target = splitter.apply_ratios(&[400], &source.ratios()).unwrap();
    let tasks = pair_plans(&source, &target);
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.target == Range::new(0, 1)));
    assert_eq!(tasks[1].number(), 2);
}

#[test]
fn test_partCountPolicy_shouldUseLargerDocument() {
    let policy = PartCountPolicy::default();
    assert_eq!(policy.parts_for(1_000, 2_000), 1);
    assert_eq!(policy.parts_for(25_000, 0), 1);
    assert_eq!(policy.parts_for(10, 30_000), 2);
    assert_eq!(policy.parts_for(76_000, 0), 4);
    assert_eq!(policy.parts_for(500_000, 0), 8);
}
