//! Time columns: one column per visible day, restricted to the slot window.

use crate::date_range::DateRange;
use crate::duration::Duration;
use crate::marker::Marker;
use crate::slice::day_table::DaySeries;
use crate::slice::EventRenderRange;

/// A render range's piece within one day column.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeColSeg {
    pub event: EventRenderRange,
    pub col: usize,
    pub start: Marker,
    pub end: Marker,
    /// Milliseconds from the column's slot-window start.
    pub start_ms: i64,
    pub end_ms: i64,
    pub is_start: bool,
    pub is_end: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeCols {
    day_ranges: Vec<DateRange>,
}

impl TimeCols {
    /// Columns for each visible day of `series`, each spanning
    /// `[day + slot_min_time, day + slot_max_time)`. The window may run past
    /// midnight.
    pub fn new(series: &DaySeries, slot_min_time: &Duration, slot_max_time: &Duration) -> Self {
        let day_ranges = series
            .dates()
            .iter()
            .filter_map(|date| DateRange::bounded(date.add(slot_min_time), date.add(slot_max_time)))
            .collect();
        TimeCols { day_ranges }
    }

    pub fn day_ranges(&self) -> &[DateRange] {
        &self.day_ranges
    }

    pub fn col_count(&self) -> usize {
        self.day_ranges.len()
    }

    pub fn slice_render_ranges(&self, ranges: &[EventRenderRange]) -> Vec<TimeColSeg> {
        let mut segs = Vec::new();

        for event in ranges {
            for (col, day_range) in self.day_ranges.iter().enumerate() {
                let Some(piece) = event.range.intersect(day_range) else {
                    continue;
                };
                let (Some(start), Some(end), Some(col_start)) = (piece.start, piece.end, day_range.start)
                else {
                    continue;
                };
                segs.push(TimeColSeg {
                    event: event.clone(),
                    col,
                    start,
                    end,
                    start_ms: col_start.diff_ms(&start),
                    end_ms: col_start.diff_ms(&end),
                    is_start: event.is_start && piece.start == event.range.start,
                    is_end: event.is_end && piece.end == event.range.end,
                });
            }
        }

        segs
    }
}
