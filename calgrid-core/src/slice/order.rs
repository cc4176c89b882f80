//! Event ordering (`eventOrder`).
//!
//! An order is a list of field specs such as `start,-duration,allDay,title`.
//! A leading `-` sorts that field descending. Names that aren't built-in
//! fields look up extended props.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CalGridError, CalGridResult};
use crate::marker::Marker;
use crate::slice::EventRenderRange;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderField {
    Start,
    End,
    Duration,
    AllDay,
    Title,
    Id,
    GroupId,
    Prop(String),
}

impl OrderField {
    fn from_name(name: &str) -> Self {
        match name {
            "start" => OrderField::Start,
            "end" => OrderField::End,
            "duration" => OrderField::Duration,
            "allDay" => OrderField::AllDay,
            "title" => OrderField::Title,
            "id" => OrderField::Id,
            "groupId" => OrderField::GroupId,
            other => OrderField::Prop(other.to_string()),
        }
    }

    fn name(&self) -> &str {
        match self {
            OrderField::Start => "start",
            OrderField::End => "end",
            OrderField::Duration => "duration",
            OrderField::AllDay => "allDay",
            OrderField::Title => "title",
            OrderField::Id => "id",
            OrderField::GroupId => "groupId",
            OrderField::Prop(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderSpec {
    pub field: OrderField,
    pub descending: bool,
}

impl OrderSpec {
    pub fn parse(spec: &str) -> CalGridResult<Self> {
        let spec = spec.trim();
        let (name, descending) = match spec.strip_prefix('-') {
            Some(rest) => (rest.trim(), true),
            None => (spec, false),
        };
        if name.is_empty() {
            return Err(CalGridError::InvalidOrder(format!("empty field in '{spec}'")));
        }
        Ok(OrderSpec {
            field: OrderField::from_name(name),
            descending,
        })
    }

    /// Parse a comma-separated list.
    pub fn parse_list(specs: &str) -> CalGridResult<Vec<Self>> {
        specs.split(',').map(OrderSpec::parse).collect()
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-")?;
        }
        write!(f, "{}", self.field.name())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EventOrderInput {
    Joined(String),
    List(Vec<String>),
}

/// A list of order specs, applied in sequence until one breaks the tie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "EventOrderInput", into = "String")]
pub struct EventOrder(Vec<OrderSpec>);

impl EventOrder {
    pub fn new(specs: Vec<OrderSpec>) -> Self {
        EventOrder(specs)
    }

    pub fn specs(&self) -> &[OrderSpec] {
        &self.0
    }
}

impl Default for EventOrder {
    fn default() -> Self {
        EventOrder(vec![
            OrderSpec {
                field: OrderField::Start,
                descending: false,
            },
            OrderSpec {
                field: OrderField::Duration,
                descending: true,
            },
            OrderSpec {
                field: OrderField::AllDay,
                descending: false,
            },
            OrderSpec {
                field: OrderField::Title,
                descending: false,
            },
        ])
    }
}

impl TryFrom<EventOrderInput> for EventOrder {
    type Error = CalGridError;

    fn try_from(input: EventOrderInput) -> CalGridResult<Self> {
        let specs = match input {
            EventOrderInput::Joined(joined) => OrderSpec::parse_list(&joined)?,
            EventOrderInput::List(list) => list
                .iter()
                .map(|spec| OrderSpec::parse(spec))
                .collect::<CalGridResult<_>>()?,
        };
        Ok(EventOrder(specs))
    }
}

impl From<EventOrder> for String {
    fn from(order: EventOrder) -> Self {
        order
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A comparable field value.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Time(Marker),
    Number(f64),
    Bool(bool),
    Text(String),
}

impl SortKey {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(SortKey::Bool(*b)),
            Value::Number(n) => n.as_f64().map(SortKey::Number),
            Value::String(s) => Some(SortKey::Text(s.clone())),
            other => Some(SortKey::Text(other.to_string())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Time(_) => 0,
            SortKey::Number(_) => 1,
            SortKey::Bool(_) => 2,
            SortKey::Text(_) => 3,
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn sort_key(range: &EventRenderRange, field: &OrderField) -> Option<SortKey> {
    // The instance's own range, not the clipped one, so that slices of the
    // same event order the same way in every row.
    let full = range.instance.as_ref().map_or(range.range, |i| i.range);
    let def = &range.def;

    match field {
        OrderField::Start => full.start.map(SortKey::Time),
        OrderField::End => full.end.map(SortKey::Time),
        OrderField::Duration => full.duration_ms().map(|ms| SortKey::Number(ms as f64)),
        OrderField::AllDay => Some(SortKey::Bool(def.all_day)),
        OrderField::Title => Some(SortKey::Text(def.title.clone())),
        OrderField::Id => def.public_id.clone().map(SortKey::Text),
        OrderField::GroupId => def.group_id.clone().map(SortKey::Text),
        OrderField::Prop(name) => def.extended_props.get(name).and_then(SortKey::from_json),
    }
}

/// Compare two render ranges field by field. Missing values sort last
/// regardless of direction.
pub fn compare_event_ranges(a: &EventRenderRange, b: &EventRenderRange, order: &EventOrder) -> Ordering {
    for spec in order.specs() {
        let ordering = match (sort_key(a, &spec.field), sort_key(b, &spec.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(ka), Some(kb)) if spec.descending => kb.compare(&ka),
            (Some(ka), Some(kb)) => ka.compare(&kb),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort by `order`.
pub fn sort_event_render_ranges(ranges: &mut [EventRenderRange], order: &EventOrder) {
    ranges.sort_by(|a, b| compare_event_ranges(a, b, order));
}
