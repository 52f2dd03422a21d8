//! Parallel map over disjoint output ranges.
//!
//! The skinning pass computes one contiguous block of bone matrices per
//! skinned component, all blocks living in a single flat array. Because
//! every block is reserved up front and no two overlap, the per-component
//! work can run concurrently without locking. This module provides that
//! pattern generically: partition an output slice by pre-computed spans,
//! pair each span with its item, run all pairs on the rayon pool and join.

use std::ops::Range;

use rayon::prelude::*;

/// Runs `task` for every `(item, span)` pair in parallel, handing each
/// invocation exclusive access to `output[span]`. Blocks until all tasks
/// complete.
///
/// Spans must be sorted by start and pairwise disjoint, and must stay
/// within `output` — violations are programming errors. Gaps between
/// spans are allowed and left untouched.
pub fn parallel_scatter<T, O, F>(items: Vec<T>, output: &mut [O], spans: &[Range<usize>], task: F)
where
    T: Send,
    O: Send,
    F: Fn(T, &mut [O]) + Send + Sync,
{
    debug_assert_eq!(items.len(), spans.len(), "one span per item");

    let mut slices = Vec::with_capacity(spans.len());
    let mut rest = output;
    let mut cursor = 0;
    for span in spans {
        debug_assert!(span.start >= cursor, "spans must be sorted and disjoint");
        let (_, tail) = rest.split_at_mut(span.start - cursor);
        let (slice, tail) = tail.split_at_mut(span.end - span.start);
        slices.push(slice);
        rest = tail;
        cursor = span.end;
    }

    items
        .into_par_iter()
        .zip(slices)
        .for_each(|(item, slice)| task(item, slice));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_disjoint_ranges() {
        let mut out = vec![0u32; 10];
        let spans = vec![0..3, 3..4, 6..10];
        parallel_scatter(vec![1u32, 2, 3], &mut out, &spans, |item, slice| {
            for v in slice {
                *v = item;
            }
        });
        assert_eq!(out, vec![1, 1, 1, 2, 0, 0, 3, 3, 3, 3]);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut out = vec![7u32; 4];
        parallel_scatter(Vec::<u32>::new(), &mut out, &[], |_, _| unreachable!());
        assert_eq!(out, vec![7; 4]);
    }

    #[test]
    fn slices_receive_exact_lengths() {
        let mut out = vec![0usize; 8];
        let spans = vec![0..2, 2..7, 7..8];
        parallel_scatter(vec![0, 1, 2], &mut out, &spans, |_, slice| {
            let len = slice.len();
            for v in slice {
                *v = len;
            }
        });
        assert_eq!(out, vec![2, 2, 5, 5, 5, 5, 5, 1]);
    }
}
