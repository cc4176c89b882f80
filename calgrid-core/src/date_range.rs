//! Half-open date ranges.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::marker::Marker;

/// Date range `[start, end)`.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<Marker>,
    pub end: Option<Marker>,
}

/// A range endpoint on the extended timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bound {
    NegInf,
    At(Marker),
    PosInf,
}

impl Bound {
    fn lower(start: Option<Marker>) -> Self {
        start.map_or(Bound::NegInf, Bound::At)
    }

    fn upper(end: Option<Marker>) -> Self {
        end.map_or(Bound::PosInf, Bound::At)
    }

    fn marker(self) -> Option<Marker> {
        match self {
            Bound::At(m) => Some(m),
            Bound::NegInf | Bound::PosInf => None,
        }
    }
}

impl DateRange {
    pub fn new(start: Option<Marker>, end: Option<Marker>) -> Self {
        DateRange { start, end }
    }

    /// A fully bounded range, or None if it would be empty or inverted.
    pub fn bounded(start: Marker, end: Marker) -> Option<Self> {
        (start < end).then_some(DateRange {
            start: Some(start),
            end: Some(end),
        })
    }

    pub fn unbounded() -> Self {
        DateRange::default()
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// False for empty or inverted ranges, which producers discard.
    pub fn is_valid(&self) -> bool {
        Bound::lower(self.start) < Bound::upper(self.end)
    }

    /// The overlap of two ranges, or None when it would be empty.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = Bound::lower(self.start).max(Bound::lower(other.start));
        let end = Bound::upper(self.end).min(Bound::upper(other.end));
        (start < end).then_some(DateRange {
            start: start.marker(),
            end: end.marker(),
        })
    }

    pub fn intersects(&self, other: &DateRange) -> bool {
        self.intersect(other).is_some()
    }

    pub fn contains_marker(&self, marker: &Marker) -> bool {
        Bound::lower(self.start) <= Bound::At(*marker) && Bound::At(*marker) < Bound::upper(self.end)
    }

    pub fn contains_range(&self, inner: &DateRange) -> bool {
        Bound::lower(self.start) <= Bound::lower(inner.start)
            && Bound::upper(inner.end) <= Bound::upper(self.end)
    }

    /// Clamp a marker into the range. The end is exclusive, so markers at or
    /// past it land one millisecond before it.
    pub fn constrain_marker(&self, marker: Marker) -> Marker {
        match (self.start, self.end) {
            (Some(start), _) if marker < start => start,
            (_, Some(end)) if marker >= end => end.add_ms(-1),
            _ => marker,
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(start.diff_ms(&end)),
            _ => None,
        }
    }
}

/// Order by start (unbounded first), then by end.
pub fn compare_by_start(a: &DateRange, b: &DateRange) -> Ordering {
    Bound::lower(a.start)
        .cmp(&Bound::lower(b.start))
        .then_with(|| Bound::upper(a.end).cmp(&Bound::upper(b.end)))
}

/// The gaps of `bound` not covered by any of `ranges`.
///
/// Input ranges are clipped to `bound` and stably sorted by start before a
/// single left-to-right sweep.
pub fn invert_ranges(ranges: &[DateRange], bound: &DateRange) -> Vec<DateRange> {
    let mut busy: Vec<DateRange> = ranges.iter().filter_map(|r| r.intersect(bound)).collect();
    busy.sort_by(|a, b| Bound::lower(a.start).cmp(&Bound::lower(b.start)));

    let mut free = Vec::new();
    let mut cursor = Bound::lower(bound.start);

    for range in &busy {
        let range_start = Bound::lower(range.start);
        if range_start > cursor {
            free.push(DateRange {
                start: cursor.marker(),
                end: range_start.marker(),
            });
        }
        let range_end = Bound::upper(range.end);
        if range_end > cursor {
            cursor = range_end;
        }
    }

    if cursor < Bound::upper(bound.end) {
        free.push(DateRange {
            start: cursor.marker(),
            end: bound.end,
        });
    }

    free
}
