//! The segment hierarchy: an online skyline packer.
//!
//! Entries are kept in levels. Each level has a coordinate and holds
//! non-overlapping entries sorted along the axis, so finding the entries an
//! incoming span overlaps is a binary search per level. An entry lands on the
//! lowest coordinate clear of everything it overlaps; entries that don't fit
//! are hidden according to the [`OverflowPolicy`].

use std::collections::{HashMap, HashSet};

use crate::placement::{
    HiddenGroup, OverflowPolicy, SegEntry, SegRect, SegSpan, build_hidden_groups, intersect_spans,
};

/// Identifies an entry or one of its pieces: source index plus span start.
type EntryKey = (usize, i64);

fn entry_key(entry: &SegEntry) -> EntryKey {
    (entry.index, entry.span.start)
}

fn thickness_of(entry: &SegEntry) -> i64 {
    if entry.thickness == 0 { 1 } else { entry.thickness }
}

#[derive(Debug, Clone)]
struct Level {
    coord: i64,
    /// Sorted by span; spans never overlap within a level.
    entries: Vec<SegEntry>,
}

/// The placed entry that decided an insertion's coordinate.
#[derive(Debug, Clone, Copy)]
struct Touching {
    level: usize,
    lateral: usize,
    entry: SegEntry,
}

#[derive(Debug, Clone, Copy)]
struct Insertion {
    level: usize,
    /// Position within `level`, or None to open a new level there.
    lateral: Option<usize>,
    level_coord: i64,
    stack_cnt: usize,
    touching: Option<Touching>,
}

#[derive(Debug, Clone, Default)]
pub struct SegHierarchy {
    policy: OverflowPolicy,
    strict_order: bool,
    max_coord: Option<i64>,
    max_stack_cnt: Option<usize>,
    levels: Vec<Level>,
    stack_cnts: HashMap<EntryKey, usize>,
    force_hidden: HashSet<EntryKey>,
    hidden: Vec<SegEntry>,
}

impl SegHierarchy {
    pub fn new(policy: OverflowPolicy) -> Self {
        SegHierarchy {
            policy,
            ..SegHierarchy::default()
        }
    }

    /// Keep entries strictly in insertion order instead of letting later
    /// entries drop into gaps beneath higher levels.
    #[must_use]
    pub fn with_strict_order(mut self, strict_order: bool) -> Self {
        self.strict_order = strict_order;
        self
    }

    /// Entries must end at or below this coordinate.
    #[must_use]
    pub fn with_max_coord(mut self, max_coord: Option<i64>) -> Self {
        self.max_coord = max_coord;
        self
    }

    /// At most this many entries may stack on one another.
    #[must_use]
    pub fn with_max_stack_cnt(mut self, max_stack_cnt: Option<usize>) -> Self {
        self.max_stack_cnt = max_stack_cnt;
        self
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Insert entries in order. Returns what this call hid.
    pub fn add_segs(&mut self, inputs: &[SegEntry]) -> Vec<SegEntry> {
        let mut hidden = Vec::new();
        for entry in inputs {
            self.insert_entry(*entry, &mut hidden);
        }

        // Consumed placeholders only block while this batch is inserted.
        if !self.force_hidden.is_empty() {
            let force_hidden = &self.force_hidden;
            for level in &mut self.levels {
                level.entries.retain(|entry| !force_hidden.contains(&entry_key(entry)));
            }
            self.levels.retain(|level| !level.entries.is_empty());
            self.force_hidden.clear();
        }

        tracing::debug!(
            inputs = inputs.len(),
            hidden = hidden.len(),
            levels = self.levels.len(),
            "placed segments"
        );
        self.hidden.extend_from_slice(&hidden);
        hidden
    }

    /// Insert one entry, hiding or reslicing it if it doesn't fit. Returns
    /// whether the entry was placed whole.
    pub fn insert_entry(&mut self, entry: SegEntry, hidden: &mut Vec<SegEntry>) -> bool {
        debug_assert!(entry.thickness >= 0, "negative thickness: {entry:?}");
        debug_assert!(entry.span.start < entry.span.end, "empty span: {entry:?}");

        let insertion = self.find_insertion(&entry);
        if self.is_insertion_valid(&insertion, &entry) {
            tracing::trace!(index = entry.index, coord = insertion.level_coord, "placing entry");
            self.insert_entry_at(entry, &insertion);
            true
        } else {
            tracing::trace!(index = entry.index, coord = insertion.level_coord, "entry doesn't fit");
            self.handle_invalid_insertion(&insertion, entry, hidden);
            false
        }
    }

    fn is_insertion_valid(&self, insertion: &Insertion, entry: &SegEntry) -> bool {
        self.max_coord
            .is_none_or(|max| insertion.level_coord + thickness_of(entry) <= max)
            && self
                .max_stack_cnt
                .is_none_or(|max| insertion.stack_cnt < max)
    }

    fn handle_invalid_insertion(&mut self, insertion: &Insertion, entry: SegEntry, hidden: &mut Vec<SegEntry>) {
        match self.policy {
            OverflowPolicy::Strict => hidden.push(entry),
            OverflowPolicy::Reslice => self.reslice_around(entry, insertion.touching, hidden),
            OverflowPolicy::Consume => {
                if let Some(touching) = insertion.touching {
                    self.consume(touching, &entry, hidden);
                }
                self.reslice_around(entry, insertion.touching, hidden);
            }
        }
    }

    /// Hide the part of `entry` under `touching` and insert the rest again.
    fn reslice_around(&mut self, entry: SegEntry, touching: Option<Touching>, hidden: &mut Vec<SegEntry>) {
        let Some(touching) = touching else {
            hidden.push(entry);
            return;
        };
        if let Some(overlap) = intersect_spans(&entry.span, &touching.entry.span) {
            hidden.push(SegEntry {
                span: overlap,
                ..entry
            });
        }
        self.split_entry(&entry, &touching.entry.span, hidden);
    }

    /// Replace the touching entry's overlap with a hidden placeholder and
    /// put its remaining pieces back.
    fn consume(&mut self, touching: Touching, entry: &SegEntry, hidden: &mut Vec<SegEntry>) {
        let touching_key = entry_key(&touching.entry);
        if self.force_hidden.contains(&touching_key) {
            return;
        }
        let Some(overlap) = intersect_spans(&touching.entry.span, &entry.span) else {
            return;
        };

        let placeholder = SegEntry {
            span: overlap,
            ..touching.entry
        };
        let placeholder_key = entry_key(&placeholder);
        self.force_hidden.insert(placeholder_key);
        if let Some(cnt) = self.stack_cnts.get(&touching_key).copied() {
            self.stack_cnts.insert(placeholder_key, cnt);
        }
        if let Some(slot) = self
            .levels
            .get_mut(touching.level)
            .and_then(|level| level.entries.get_mut(touching.lateral))
        {
            *slot = placeholder;
        }

        tracing::trace!(index = touching.entry.index, ?overlap, "consumed placed entry");
        hidden.push(placeholder);
        self.split_entry(&touching.entry, &entry.span, hidden);
    }

    /// Insert the pieces of `entry` before and after `barrier`.
    fn split_entry(&mut self, entry: &SegEntry, barrier: &SegSpan, hidden: &mut Vec<SegEntry>) {
        if entry.span.start < barrier.start {
            self.insert_entry(
                SegEntry {
                    span: SegSpan::new(entry.span.start, barrier.start),
                    ..*entry
                },
                hidden,
            );
        }
        if entry.span.end > barrier.end {
            self.insert_entry(
                SegEntry {
                    span: SegSpan::new(barrier.end, entry.span.end),
                    ..*entry
                },
                hidden,
            );
        }
    }

    fn insert_entry_at(&mut self, entry: SegEntry, insertion: &Insertion) {
        match (insertion.lateral, self.levels.get_mut(insertion.level)) {
            (Some(lateral), Some(level)) => level.entries.insert(lateral, entry),
            _ => self.levels.insert(
                insertion.level,
                Level {
                    coord: insertion.level_coord,
                    entries: vec![entry],
                },
            ),
        }
        self.stack_cnts.insert(entry_key(&entry), insertion.stack_cnt);
    }

    fn find_insertion(&self, new_entry: &SegEntry) -> Insertion {
        let thickness = thickness_of(new_entry);
        let mut candidate_coord = 0;
        let mut touching: Option<Touching> = None;
        let mut stack_cnt = 0;

        for (level_index, level) in self.levels.iter().enumerate() {
            if !self.strict_order && level.coord >= candidate_coord + thickness {
                break;
            }

            // First entry ending after the new entry starts.
            let mut lateral = level
                .entries
                .partition_point(|e| e.span.end <= new_entry.span.start);

            while let Some(tracking) = level.entries.get(lateral) {
                if tracking.span.start >= new_entry.span.end {
                    break;
                }
                let bottom = level.coord + thickness_of(tracking);
                if bottom > candidate_coord {
                    candidate_coord = bottom;
                    touching = Some(Touching {
                        level: level_index,
                        lateral,
                        entry: *tracking,
                    });
                }
                if bottom == candidate_coord {
                    let below = self.stack_cnts.get(&entry_key(tracking)).copied().unwrap_or(0);
                    stack_cnt = stack_cnt.max(below + 1);
                }
                lateral += 1;
            }
        }

        let mut dest_level = 0;
        if let Some(touching) = &touching {
            dest_level = touching.level + 1;
            while self
                .levels
                .get(dest_level)
                .is_some_and(|level| level.coord < candidate_coord)
            {
                dest_level += 1;
            }
        }

        let lateral = self
            .levels
            .get(dest_level)
            .filter(|level| level.coord == candidate_coord)
            .map(|level| level.entries.partition_point(|e| e.span.end < new_entry.span.end));

        Insertion {
            level: dest_level,
            lateral,
            level_coord: candidate_coord,
            stack_cnt,
            touching,
        }
    }

    /// Every placed entry with its level coordinate, level by level.
    pub fn to_rects(&self) -> Vec<SegRect> {
        self.levels
            .iter()
            .flat_map(|level| {
                level.entries.iter().map(move |entry| SegRect {
                    index: entry.index,
                    thickness: thickness_of(entry),
                    span: entry.span,
                    level_coord: level.coord,
                    stack_depth: self.stack_cnts.get(&entry_key(entry)).copied().unwrap_or(0),
                })
            })
            .collect()
    }

    /// Everything hidden since the hierarchy was created.
    pub fn hidden_entries(&self) -> &[SegEntry] {
        &self.hidden
    }

    pub fn hidden_groups(&self) -> Vec<HiddenGroup> {
        build_hidden_groups(&self.hidden)
    }
}
