//! Time-column placement: concurrent timed events stack side by side.

use crate::placement::hierarchy::SegHierarchy;
use crate::placement::{OverflowPolicy, SegEntry, SegSpan};
use crate::slice::time_cols::TimeColSeg;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTimeSeg {
    pub seg: TimeColSeg,
    /// Stacking level; each concurrent event sits one level above the one
    /// it overlaps.
    pub level: i64,
    pub stack_depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HiddenTimeGroup {
    pub start_ms: i64,
    pub end_ms: i64,
    pub segs: Vec<TimeColSeg>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeColPlacement {
    pub placed: Vec<PlacedTimeSeg>,
    pub hidden_groups: Vec<HiddenTimeGroup>,
}

/// Place one column's segments in the given order.
///
/// Every segment is at least `min_span_ms` long for overlap purposes, so
/// very short events still claim the height they are drawn with.
/// `max_stack` hides events beyond that many concurrent ones.
pub fn compute_time_col_placement(
    segs: &[TimeColSeg],
    max_stack: Option<usize>,
    strict_order: bool,
    min_span_ms: i64,
) -> TimeColPlacement {
    let mut hierarchy = SegHierarchy::new(OverflowPolicy::Strict)
        .with_strict_order(strict_order)
        .with_max_stack_cnt(max_stack);

    let entries: Vec<SegEntry> = segs
        .iter()
        .enumerate()
        .map(|(index, seg)| {
            let end = seg.end_ms.max(seg.start_ms + min_span_ms.max(1));
            SegEntry::new(index, 1, SegSpan::new(seg.start_ms, end))
        })
        .collect();
    hierarchy.add_segs(&entries);

    let placed = hierarchy
        .to_rects()
        .into_iter()
        .filter_map(|rect| {
            Some(PlacedTimeSeg {
                seg: segs.get(rect.index)?.clone(),
                level: rect.level_coord,
                stack_depth: rect.stack_depth,
            })
        })
        .collect();

    let hidden_groups = hierarchy
        .hidden_groups()
        .into_iter()
        .map(|group| HiddenTimeGroup {
            start_ms: group.span.start,
            end_ms: group.span.end,
            segs: group
                .member_indices()
                .into_iter()
                .filter_map(|index| segs.get(index).cloned())
                .collect(),
        })
        .collect();

    TimeColPlacement {
        placed,
        hidden_groups,
    }
}
