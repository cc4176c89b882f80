//! Segment placement: stacking segments along one axis so that overlapping
//! spans never share a vertical band.
//!
//! [`SegHierarchy`] is the packing engine. [`day_grid`] and [`time_grid`]
//! drive it for table rows and time columns.

pub mod day_grid;
pub mod hierarchy;
pub mod time_grid;

pub use day_grid::{
    DayMaxEvents, HiddenTableGroup, PlacedTableSeg, RowPlacement, compute_row_placement,
    compute_table_placement,
};
pub use hierarchy::SegHierarchy;
pub use time_grid::{HiddenTimeGroup, PlacedTimeSeg, TimeColPlacement, compute_time_col_placement};

/// A half-open span `[start, end)` on the placement axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegSpan {
    pub start: i64,
    pub end: i64,
}

impl SegSpan {
    pub fn new(start: i64, end: i64) -> Self {
        SegSpan { start, end }
    }
}

/// An input to the hierarchy. `index` points back at the caller's segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegEntry {
    pub index: usize,
    /// Size along the stacking axis. Zero counts as one.
    pub thickness: i64,
    pub span: SegSpan,
}

impl SegEntry {
    pub fn new(index: usize, thickness: i64, span: SegSpan) -> Self {
        SegEntry {
            index,
            thickness,
            span,
        }
    }
}

/// A placed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegRect {
    pub index: usize,
    pub thickness: i64,
    pub span: SegSpan,
    pub level_coord: i64,
    /// How many entries it is stacked on at exactly its coordinate.
    pub stack_depth: usize,
}

/// What happens to an entry that doesn't fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// The whole entry is hidden.
    #[default]
    Strict,
    /// Only the piece overlapping the blocking entry is hidden; the pieces
    /// on either side are inserted again.
    Reslice,
    /// Like `Reslice`, but the blocking entry's overlapping piece is hidden
    /// too, so later entries see that slot as full.
    Consume,
}

/// Overlapping hidden entries merged into one summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenGroup {
    pub span: SegSpan,
    pub entries: Vec<SegEntry>,
}

impl HiddenGroup {
    /// Distinct source indices, in first-seen order.
    pub fn member_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !indices.contains(&entry.index) {
                indices.push(entry.index);
            }
        }
        indices
    }
}

pub fn intersect_spans(a: &SegSpan, b: &SegSpan) -> Option<SegSpan> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start < end).then_some(SegSpan { start, end })
}

pub fn join_spans(a: &SegSpan, b: &SegSpan) -> SegSpan {
    SegSpan {
        start: a.start.min(b.start),
        end: a.end.max(b.end),
    }
}

/// Merge entries into groups whose spans overlap transitively.
pub fn group_intersecting_entries(entries: &[SegEntry]) -> Vec<HiddenGroup> {
    let mut merges: Vec<HiddenGroup> = Vec::new();

    for entry in entries {
        let mut hungry = HiddenGroup {
            span: entry.span,
            entries: vec![*entry],
        };
        let mut kept = Vec::with_capacity(merges.len() + 1);

        for merge in merges {
            if intersect_spans(&merge.span, &hungry.span).is_some() {
                let mut combined = merge.entries;
                combined.extend(hungry.entries);
                hungry = HiddenGroup {
                    span: join_spans(&merge.span, &hungry.span),
                    entries: combined,
                };
            } else {
                kept.push(merge);
            }
        }

        kept.push(hungry);
        merges = kept;
    }

    merges
}

/// Hidden groups ordered along the axis, ready for "+N more" summaries.
pub fn build_hidden_groups(hidden: &[SegEntry]) -> Vec<HiddenGroup> {
    let mut groups = group_intersecting_entries(hidden);
    groups.sort_by_key(|group| (group.span.start, group.span.end));
    groups
}
