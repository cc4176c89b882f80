//! Day-grid row placement with "+N more" overflow.

use crate::date_range::DateRange;
use crate::placement::hierarchy::SegHierarchy;
use crate::placement::{HiddenGroup, OverflowPolicy, SegEntry, SegSpan};
use crate::slice::day_table::{DayTable, TableSeg};

/// How much of a day cell events may fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayMaxEvents {
    #[default]
    Unlimited,
    /// Fit into this many pixels of cell height.
    Height(i64),
    /// At most this many events per cell, "+N more" included.
    Events(usize),
    /// At most this many rows per cell.
    Rows(usize),
}

impl DayMaxEvents {
    fn policy(&self) -> OverflowPolicy {
        match self {
            DayMaxEvents::Unlimited | DayMaxEvents::Events(_) => OverflowPolicy::Reslice,
            DayMaxEvents::Height(_) | DayMaxEvents::Rows(_) => OverflowPolicy::Consume,
        }
    }

    fn hierarchy(&self, strict_order: bool) -> SegHierarchy {
        let hierarchy = SegHierarchy::new(self.policy()).with_strict_order(strict_order);
        match *self {
            DayMaxEvents::Unlimited => hierarchy,
            DayMaxEvents::Height(px) => hierarchy.with_max_coord(Some(px)),
            DayMaxEvents::Events(n) | DayMaxEvents::Rows(n) => hierarchy.with_max_stack_cnt(Some(n)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTableSeg {
    pub seg: TableSeg,
    pub level_coord: i64,
    pub thickness: i64,
    pub stack_depth: usize,
}

/// Hidden segments over a run of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenTableGroup {
    pub first_col: usize,
    pub last_col: usize,
    pub segs: Vec<TableSeg>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPlacement {
    pub placed: Vec<PlacedTableSeg>,
    /// Hidden segment count per column.
    pub more_counts: Vec<usize>,
    pub hidden_groups: Vec<HiddenTableGroup>,
}

/// Narrow a segment to `[first_col, last_col]` of its row. Pieces of a
/// segment lose their resize handles in the middle and can't be resized.
pub fn reslice_seg(table: &DayTable, seg: &TableSeg, first_col: usize, last_col: usize) -> TableSeg {
    if seg.first_col == first_col && seg.last_col == last_col {
        return seg.clone();
    }

    let orig = seg.event.range;
    let sliced = table
        .cells_range(seg.row, first_col, last_col)
        .and_then(|cells| orig.intersect(&cells))
        .unwrap_or(orig);

    let mut event = seg.event.clone();
    event.range = sliced;
    event.ui.duration_editable = Some(false);

    TableSeg {
        event,
        row: seg.row,
        first_col,
        last_col,
        is_start: seg.is_start && sliced.start == orig.start,
        is_end: seg.is_end && sliced.end == orig.end,
    }
}

fn columns(span: &SegSpan) -> (usize, usize) {
    (span.start as usize, (span.end - 1) as usize)
}

/// Place one row's segments. Segments are inserted in the given order, so
/// sort them first. `thickness` gives each segment's rendered height; it
/// only matters for [`DayMaxEvents::Height`].
pub fn compute_row_placement(
    table: &DayTable,
    segs: &[TableSeg],
    limit: DayMaxEvents,
    strict_order: bool,
    thickness: impl Fn(&TableSeg) -> i64,
) -> RowPlacement {
    let mut hierarchy = limit.hierarchy(strict_order);

    let entries: Vec<SegEntry> = segs
        .iter()
        .enumerate()
        .map(|(index, seg)| {
            SegEntry::new(
                index,
                thickness(seg),
                SegSpan::new(seg.first_col as i64, seg.last_col as i64 + 1),
            )
        })
        .collect();
    let hidden = hierarchy.add_segs(&entries);

    let placed = hierarchy
        .to_rects()
        .into_iter()
        .filter_map(|rect| {
            let seg = segs.get(rect.index)?;
            let (first_col, last_col) = columns(&rect.span);
            Some(PlacedTableSeg {
                seg: reslice_seg(table, seg, first_col, last_col),
                level_coord: rect.level_coord,
                thickness: rect.thickness,
                stack_depth: rect.stack_depth,
            })
        })
        .collect();

    let mut more_counts = vec![0; table.cols_per_row()];
    for entry in &hidden {
        let (first_col, last_col) = columns(&entry.span);
        for count in more_counts.iter_mut().take(last_col + 1).skip(first_col) {
            *count += 1;
        }
    }

    let hidden_groups = hierarchy
        .hidden_groups()
        .into_iter()
        .map(|group| hidden_table_group(table, segs, &group))
        .collect();

    RowPlacement {
        placed,
        more_counts,
        hidden_groups,
    }
}

fn hidden_table_group(table: &DayTable, segs: &[TableSeg], group: &HiddenGroup) -> HiddenTableGroup {
    let (first_col, last_col) = columns(&group.span);
    let segs = group
        .entries
        .iter()
        .filter_map(|entry| {
            let seg = segs.get(entry.index)?;
            let (first, last) = columns(&entry.span);
            Some(reslice_seg(table, seg, first, last))
        })
        .collect();

    HiddenTableGroup {
        first_col,
        last_col,
        segs,
    }
}

/// Place every row of a table. `segs` may be in any row order; within a
/// row the given order is kept.
pub fn compute_table_placement(
    table: &DayTable,
    segs: &[TableSeg],
    limit: DayMaxEvents,
    strict_order: bool,
    thickness: impl Fn(&TableSeg) -> i64,
) -> Vec<RowPlacement> {
    (0..table.row_count())
        .map(|row| {
            let row_segs: Vec<TableSeg> = segs.iter().filter(|s| s.row == row).cloned().collect();
            compute_row_placement(table, &row_segs, limit, strict_order, &thickness)
        })
        .collect()
}

/// The dates a hidden group covers, for a "+N more" popover.
pub fn hidden_group_range(table: &DayTable, row: usize, group: &HiddenTableGroup) -> Option<DateRange> {
    table.cells_range(row, group.first_col, group.last_col)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::event::def::EventDef;
    use crate::event::ui::EventUi;
    use crate::marker::Marker;
    use crate::slice::EventRenderRange;
    use crate::slice::day_table::DaySeries;

    fn day(d: u32) -> Marker {
        Marker::from_ymd(2024, 3, d).unwrap()
    }

    // One week row starting Sunday 2024-03-03.
    fn make_test_table() -> DayTable {
        let range = DateRange::bounded(day(3), day(10)).unwrap();
        DayTable::new(DaySeries::new(&range, &[]).unwrap(), true)
    }

    fn make_test_range(title: &str, start: u32, end: u32) -> EventRenderRange {
        EventRenderRange {
            def: Arc::new(EventDef {
                def_id: title.into(),
                source_id: String::new(),
                public_id: None,
                group_id: None,
                title: title.into(),
                url: None,
                all_day: true,
                has_end: true,
                recurring: None,
                ui: EventUi::default(),
                extended_props: Default::default(),
            }),
            ui: EventUi::default(),
            instance: None,
            range: DateRange::bounded(day(start), day(end)).unwrap(),
            is_start: true,
            is_end: true,
        }
    }

    fn segs(table: &DayTable, ranges: &[(&str, u32, u32)]) -> Vec<TableSeg> {
        let ranges: Vec<EventRenderRange> = ranges
            .iter()
            .map(|(title, start, end)| make_test_range(title, *start, *end))
            .collect();
        table.slice_render_ranges(&ranges)
    }

    #[test]
    fn test_unlimited_places_everything() {
        let table = make_test_table();
        let segs = segs(&table, &[("a", 3, 6), ("b", 4, 5), ("c", 5, 8)]);
        let placement = compute_row_placement(&table, &segs, DayMaxEvents::Unlimited, false, |_| 1);

        assert_eq!(placement.placed.len(), 3);
        assert!(placement.more_counts.iter().all(|c| *c == 0));
        assert!(placement.hidden_groups.is_empty());
    }

    #[test_log::test]
    fn test_event_limit_reslices_long_event() {
        let table = make_test_table();
        // "b" is blocked on Tuesday only, so its Monday and Wednesday stay.
        let segs = segs(&table, &[("a", 5, 6), ("b", 4, 7)]);
        let placement = compute_row_placement(&table, &segs, DayMaxEvents::Events(1), false, |_| 1);

        let mut placed: Vec<(String, usize, usize, bool, bool)> = placement
            .placed
            .iter()
            .map(|p| {
                (
                    p.seg.event.def.title.clone(),
                    p.seg.first_col,
                    p.seg.last_col,
                    p.seg.is_start,
                    p.seg.is_end,
                )
            })
            .collect();
        placed.sort();
        assert_eq!(
            placed,
            vec![
                ("a".to_string(), 2, 2, true, true),
                ("b".to_string(), 1, 1, true, false),
                ("b".to_string(), 3, 3, false, true),
            ]
        );
        assert_eq!(placement.more_counts, vec![0, 0, 1, 0, 0, 0, 0]);

        let group = &placement.hidden_groups[0];
        assert_eq!((group.first_col, group.last_col), (2, 2));
        assert_eq!(group.segs[0].event.range, DateRange::bounded(day(5), day(6)).unwrap());
        assert_eq!(group.segs[0].event.ui.duration_editable, Some(false));
        assert_eq!(
            hidden_group_range(&table, 0, group),
            DateRange::bounded(day(5), day(6))
        );
    }

    #[test]
    fn test_row_limit_consumes_overflow() {
        let table = make_test_table();
        let segs = segs(&table, &[("a", 3, 5), ("b", 4, 6)]);
        let placement = compute_row_placement(&table, &segs, DayMaxEvents::Rows(1), false, |_| 1);

        assert_eq!(placement.more_counts, vec![0, 2, 0, 0, 0, 0, 0]);
        assert!(
            placement.placed.iter().all(|p| p.seg.first_col != 1 && p.seg.last_col != 1),
            "the overflowing column shows only the +N link"
        );
        assert_eq!(placement.hidden_groups.len(), 1);
        assert_eq!(placement.hidden_groups[0].segs.len(), 2);
    }

    #[test]
    fn test_height_limit_uses_thickness() {
        let table = make_test_table();
        let segs = segs(&table, &[("a", 3, 4), ("b", 3, 4), ("c", 3, 4)]);
        let placement = compute_row_placement(&table, &segs, DayMaxEvents::Height(50), false, |_| 20);

        assert_eq!(placement.placed.len(), 1, "the second event is consumed by the third");
        assert_eq!(placement.more_counts[0], 2);
    }

    #[test]
    fn test_table_placement_runs_per_row() {
        let range = DateRange::bounded(day(3), day(17)).unwrap();
        let table = DayTable::new(DaySeries::new(&range, &[]).unwrap(), true);
        let ranges = [make_test_range("long", 8, 12)];
        let segs = table.slice_render_ranges(&ranges);

        let rows = compute_table_placement(&table, &segs, DayMaxEvents::Unlimited, false, |_| 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].placed.len(), 1);
        assert_eq!(rows[1].placed.len(), 1);
    }
}
