//! Day tables: days laid out in rows of columns.
//!
//! This is where temporal overlap becomes column overlap. A render range is
//! cut into one [`TableSeg`] per row it touches, each covering an inclusive
//! run of columns.

use crate::date_range::DateRange;
use crate::duration::MS_PER_DAY;
use crate::marker::Marker;
use crate::slice::EventRenderRange;

/// The visible days of a range, skipping hidden weekdays.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySeries {
    origin: Marker,
    dates: Vec<Marker>,
    /// Per calendar day from `origin`, twice its column index. Hidden days get
    /// the odd number between their neighbours.
    indices: Vec<i64>,
}

/// A contiguous run of series columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSeg {
    pub first_index: usize,
    pub last_index: usize,
    pub is_start: bool,
    pub is_end: bool,
}

impl DaySeries {
    /// None when the range is unbounded or every day in it is hidden.
    pub fn new(range: &DateRange, hidden_days: &[u8]) -> Option<Self> {
        let (Some(start), Some(end)) = (range.start, range.end) else {
            tracing::debug!("day series needs a bounded range");
            return None;
        };

        let origin = start.start_of_day();
        let mut dates = Vec::new();
        let mut indices = Vec::new();
        let mut day_index: i64 = -1;
        let mut date = origin;

        while date < end {
            if hidden_days.contains(&date.weekday()) {
                indices.push(day_index * 2 + 1);
            } else {
                day_index += 1;
                indices.push(day_index * 2);
                dates.push(date);
            }
            date = date.add_days(1);
        }

        if dates.is_empty() {
            tracing::debug!("every day of the range is hidden");
            return None;
        }

        Some(DaySeries {
            origin,
            dates,
            indices,
        })
    }

    pub fn dates(&self) -> &[Marker] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn doubled_index(&self, date: &Marker) -> i64 {
        let offset = self.origin.diff_ms(date).div_euclid(MS_PER_DAY);
        let (Some(first), Some(last)) = (self.indices.first(), self.indices.last()) else {
            return 0;
        };
        if offset < 0 {
            return first - 2;
        }
        match usize::try_from(offset).ok().and_then(|i| self.indices.get(i)) {
            Some(index) => *index,
            None => last + 2,
        }
    }

    /// The columns `range` covers, or None if it falls entirely on hidden
    /// days or outside the series.
    pub fn slice_range(&self, range: &DateRange) -> Option<SeriesSeg> {
        let (Some(start), Some(end)) = (range.start, range.end) else {
            return None;
        };

        let first = self.doubled_index(&start);
        let last = self.doubled_index(&end.add_ms(-1));
        let max = (self.dates.len() as i64 - 1) * 2;

        // Round onto visible columns: up at the start, down at the end.
        let mut clipped_first = first.max(0);
        if clipped_first % 2 != 0 {
            clipped_first += 1;
        }
        let mut clipped_last = last.min(max);
        if clipped_last % 2 != 0 {
            clipped_last -= 1;
        }

        if clipped_first > clipped_last {
            return None;
        }

        Some(SeriesSeg {
            first_index: (clipped_first / 2) as usize,
            last_index: (clipped_last / 2) as usize,
            is_start: first == clipped_first,
            is_end: last == clipped_last,
        })
    }
}

/// A render range's piece within one table row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSeg {
    pub event: EventRenderRange,
    pub row: usize,
    pub first_col: usize,
    /// Inclusive.
    pub last_col: usize,
    pub is_start: bool,
    pub is_end: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayTable {
    series: DaySeries,
    cols_per_row: usize,
    row_count: usize,
}

impl DayTable {
    /// With `break_on_weeks` each row is one week (by the weekday of the
    /// first visible day); otherwise everything is one row.
    pub fn new(series: DaySeries, break_on_weeks: bool) -> Self {
        let dates = series.dates();
        let cols_per_row = if break_on_weeks {
            let first_weekday = dates[0].weekday();
            dates
                .iter()
                .skip(1)
                .position(|d| d.weekday() == first_weekday)
                .map_or(dates.len(), |pos| pos + 1)
        } else {
            dates.len()
        };
        let row_count = dates.len().div_ceil(cols_per_row);

        DayTable {
            series,
            cols_per_row,
            row_count,
        }
    }

    pub fn series(&self) -> &DaySeries {
        &self.series
    }

    pub fn cols_per_row(&self) -> usize {
        self.cols_per_row
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn cell_date(&self, row: usize, col: usize) -> Option<Marker> {
        if col >= self.cols_per_row {
            return None;
        }
        self.series
            .dates()
            .get(row * self.cols_per_row + col)
            .copied()
    }

    /// The date range `[first_col, last_col]` covers within `row`.
    pub fn cells_range(&self, row: usize, first_col: usize, last_col: usize) -> Option<DateRange> {
        let start = self.cell_date(row, first_col)?;
        let end = self.cell_date(row, last_col)?.add_days(1);
        DateRange::bounded(start, end)
    }

    /// Per-row column runs of `range`. Flags only say whether each piece
    /// touches the range's own start or end.
    pub fn slice_range(&self, range: &DateRange) -> Vec<SeriesSegInRow> {
        let Some(seg) = self.series.slice_range(range) else {
            return Vec::new();
        };

        let mut pieces = Vec::new();
        let mut index = seg.first_index;
        while index <= seg.last_index {
            let row = index / self.cols_per_row;
            let next = ((row + 1) * self.cols_per_row).min(seg.last_index + 1);
            pieces.push(SeriesSegInRow {
                row,
                first_col: index % self.cols_per_row,
                last_col: (next - 1) % self.cols_per_row,
                is_start: seg.is_start && index == seg.first_index,
                is_end: seg.is_end && next - 1 == seg.last_index,
            });
            index = next;
        }
        pieces
    }

    /// Slice render ranges into table segments. A segment only keeps a
    /// start or end flag when the render range itself had it.
    pub fn slice_render_ranges(&self, ranges: &[EventRenderRange]) -> Vec<TableSeg> {
        ranges
            .iter()
            .flat_map(|event| {
                self.slice_range(&event.range).into_iter().map(move |piece| TableSeg {
                    event: event.clone(),
                    row: piece.row,
                    first_col: piece.first_col,
                    last_col: piece.last_col,
                    is_start: event.is_start && piece.is_start,
                    is_end: event.is_end && piece.is_end,
                })
            })
            .collect()
    }
}

/// A run of columns within one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSegInRow {
    pub row: usize,
    pub first_col: usize,
    pub last_col: usize,
    pub is_start: bool,
    pub is_end: bool,
}
