use std::collections::{BTreeMap, BTreeSet};

use calgrid_core::date_range::invert_ranges;
use calgrid_core::event::{EventParser, RecurringDef, SequentialIds, raw_events_from_json};
use calgrid_core::placement::{OverflowPolicy, SegEntry, SegHierarchy, SegSpan, compute_table_placement};
use calgrid_core::recurrence::expand_instances;
use calgrid_core::slice::{DaySeries, DayTable};
use calgrid_core::{DateRange, Duration, EngineConfig, EventDef, EventUi, Marker, RecurrenceRule, RenderPipeline};

fn day(d: u32) -> Marker {
    Marker::from_ymd(2024, 3, d).unwrap()
}

fn hours(start: i64, end: i64) -> DateRange {
    let midnight = day(4);
    DateRange::bounded(midnight.add_ms(start * 3_600_000), midnight.add_ms(end * 3_600_000)).unwrap()
}

fn entry(index: usize, start: i64, end: i64) -> SegEntry {
    SegEntry::new(index, 1, SegSpan::new(start, end))
}

fn placed(hierarchy: &SegHierarchy) -> Vec<(usize, i64, i64, i64)> {
    let mut rects: Vec<_> = hierarchy
        .to_rects()
        .into_iter()
        .map(|r| (r.index, r.span.start, r.span.end, r.level_coord))
        .collect();
    rects.sort();
    rects
}

#[test]
fn identical_spans_stack() {
    let mut hierarchy = SegHierarchy::new(OverflowPolicy::Strict);
    let hidden = hierarchy.add_segs(&[entry(0, 0, 3), entry(1, 0, 3)]);

    assert!(hidden.is_empty());
    assert_eq!(placed(&hierarchy), vec![(0, 0, 3, 0), (1, 0, 3, 1)]);
}

#[test]
fn disjoint_spans_share_a_level() {
    let mut hierarchy = SegHierarchy::new(OverflowPolicy::Strict);
    hierarchy.add_segs(&[entry(0, 0, 1), entry(1, 1, 2), entry(2, 0, 2)]);

    assert_eq!(
        placed(&hierarchy),
        vec![(0, 0, 1, 0), (1, 1, 2, 0), (2, 0, 2, 1)]
    );
}

#[test]
fn stack_limit_hides_whole_entry() {
    let mut hierarchy = SegHierarchy::new(OverflowPolicy::Strict).with_max_stack_cnt(Some(1));
    hierarchy.add_segs(&[entry(0, 0, 2), entry(1, 0, 2)]);

    assert_eq!(placed(&hierarchy), vec![(0, 0, 2, 0)]);
    let groups = hierarchy.hidden_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].span, SegSpan::new(0, 2));
    assert_eq!(groups[0].member_indices(), vec![1]);
}

#[test]
fn reslicing_keeps_side_pieces() {
    let mut hierarchy = SegHierarchy::new(OverflowPolicy::Reslice).with_max_stack_cnt(Some(1));
    let hidden = hierarchy.add_segs(&[entry(0, 2, 3), entry(1, 0, 5)]);

    assert_eq!(
        placed(&hierarchy),
        vec![(0, 2, 3, 0), (1, 0, 2, 0), (1, 3, 5, 0)]
    );
    assert_eq!(hidden, vec![entry(1, 2, 3)]);
}

#[test]
fn business_hours_inverted() {
    let busy = [hours(9, 12), hours(13, 17)];
    assert_eq!(
        invert_ranges(&busy, &hours(0, 24)),
        vec![hours(0, 9), hours(12, 13), hours(17, 24)]
    );
}

#[test_log::test]
fn weekly_recurrence_over_two_weeks() {
    // 2024-03-03 is a Sunday.
    let def = EventDef {
        def_id: "gym".into(),
        source_id: String::new(),
        public_id: None,
        group_id: None,
        title: "Gym".into(),
        url: None,
        all_day: false,
        has_end: true,
        recurring: Some(RecurringDef {
            rule: RecurrenceRule {
                days_of_week: Some(BTreeSet::from([1, 3])),
                start_time: Some(Duration::from_hours(9)),
                recur_start: Some(day(3)),
                ..RecurrenceRule::default()
            },
            duration: Some(Duration::from_hours(1)),
        }),
        ui: EventUi::default(),
        extended_props: Default::default(),
    };
    let framing = DateRange::bounded(day(3), day(17)).unwrap();
    let instances = expand_instances(&def, &framing, &EngineConfig::default(), &mut SequentialIds::new());

    let ranges: Vec<DateRange> = instances.iter().map(|i| i.range).collect();
    let at_nine = |d: u32| DateRange::bounded(day(d).add_ms(9 * 3_600_000), day(d).add_ms(10 * 3_600_000)).unwrap();
    assert_eq!(ranges, vec![at_nine(4), at_nine(6), at_nine(11), at_nine(13)]);
}

#[test_log::test]
fn json_to_month_row_placement() {
    let payload = serde_json::json!([
        { "id": 1, "title": "Offsite", "start": "2024-03-04", "end": "2024-03-07" },
        { "id": 2, "title": "Launch", "start": "2024-03-05" },
        { "id": 3, "title": "Retro", "start": "2024-03-05", "end": "2024-03-06", "color": "teal" },
        { "title": "Broken", "start": "not a date" },
        { "title": "Yoga", "daysOfWeek": [2], "startRecur": "2024-03-01" }
    ]);
    let config = EngineConfig::from_toml_str("day_max_events = 2").unwrap();
    let mut ids = SequentialIds::new();

    let raws = raw_events_from_json(&payload);
    let store = EventParser::new(&config, "team").parse_events(&raws, None, &mut ids);
    assert_eq!(store.defs().len(), 4, "the unparseable payload is dropped");

    let week = DateRange::bounded(day(3), day(10)).unwrap();
    let mut pipeline = RenderPipeline::new(config.clone(), ids);
    let sliced = pipeline.run(&store, &BTreeMap::new(), &week).clone();
    assert_eq!(sliced.foreground.len(), 4, "yoga expands to a single Tuesday");
    assert_eq!(sliced.foreground[0].def.title, "Offsite", "earliest event sorts first");

    let table = DayTable::new(DaySeries::new(&week, &[]).unwrap(), true);
    let segs = table.slice_render_ranges(&sliced.foreground);
    let rows = compute_table_placement(&table, &segs, config.day_max_events(None), false, |_| 1);

    assert_eq!(rows.len(), 1);
    // Tuesday holds Offsite, Launch, Retro and Yoga. Two stay visible.
    let tuesday = rows[0].more_counts[2];
    assert_eq!(tuesday, 2, "retro and yoga go behind +2 more");
    let placed_on_tuesday = rows[0]
        .placed
        .iter()
        .filter(|p| p.seg.first_col <= 2 && p.seg.last_col >= 2)
        .count();
    assert_eq!(placed_on_tuesday + tuesday, 4, "every event is either shown or counted");
}
