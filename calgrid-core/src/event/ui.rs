//! Resolved display attributes for events.
//!
//! UI fragments come from the global config, from event sources and from the
//! definitions themselves. They combine last-wins, field by field, while list
//! fields accumulate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::event::def::EventDef;
use crate::marker::{DateEnv, DateInput};

/// How an event is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    #[default]
    Auto,
    Block,
    ListItem,
    Background,
    InverseBackground,
    None,
}

impl Display {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Display::Auto),
            "block" => Some(Display::Block),
            "list-item" => Some(Display::ListItem),
            "background" => Some(Display::Background),
            "inverse-background" => Some(Display::InverseBackground),
            "none" => Some(Display::None),
            _ => None,
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, Display::Background | Display::InverseBackground)
    }
}

/// Where an event is allowed to be dropped or resized to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    BusinessHours,
    GroupId(String),
    Range(DateRange),
}

type AllowPredicate = dyn Fn(&DateRange, bool) -> bool + Send + Sync;

/// A host-supplied predicate over a candidate range and its all-day flag.
#[derive(Clone)]
pub struct AllowFn(Arc<AllowPredicate>);

impl AllowFn {
    pub fn new(f: impl Fn(&DateRange, bool) -> bool + Send + Sync + 'static) -> Self {
        AllowFn(Arc::new(f))
    }

    pub fn allows(&self, range: &DateRange, all_day: bool) -> bool {
        (self.0)(range, all_day)
    }
}

impl fmt::Debug for AllowFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllowFn({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for AllowFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Display attributes. `None` means "not set by this fragment".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventUi {
    pub display: Option<Display>,
    pub start_editable: Option<bool>,
    pub duration_editable: Option<bool>,
    pub constraints: Vec<Constraint>,
    pub overlap: Option<bool>,
    pub allows: Vec<AllowFn>,
    pub background_color: Option<String>,
    pub border_color: Option<String>,
    pub text_color: Option<String>,
    pub class_names: Vec<String>,
}

impl EventUi {
    /// Layer `top` over `self`.
    pub fn combine(&self, top: &EventUi) -> EventUi {
        EventUi {
            display: top.display.or(self.display),
            start_editable: top.start_editable.or(self.start_editable),
            duration_editable: top.duration_editable.or(self.duration_editable),
            constraints: self
                .constraints
                .iter()
                .chain(&top.constraints)
                .cloned()
                .collect(),
            overlap: top.overlap.or(self.overlap),
            allows: self.allows.iter().chain(&top.allows).cloned().collect(),
            background_color: top
                .background_color
                .clone()
                .or_else(|| self.background_color.clone()),
            border_color: top.border_color.clone().or_else(|| self.border_color.clone()),
            text_color: top.text_color.clone().or_else(|| self.text_color.clone()),
            class_names: self
                .class_names
                .iter()
                .chain(&top.class_names)
                .cloned()
                .collect(),
        }
    }

    pub fn resolved_display(&self) -> Display {
        self.display.unwrap_or_default()
    }
}

/// Combine fragments in order; later fragments win.
pub fn combine_event_uis<'a>(uis: impl IntoIterator<Item = &'a EventUi>) -> EventUi {
    uis.into_iter()
        .fold(EventUi::default(), |acc, ui| acc.combine(ui))
}

/// Per-definition UI bases. The `""` key holds the global base.
pub type EventUiBases = BTreeMap<String, EventUi>;

/// Build the base map the slicer consumes: the global fragment under `""`,
/// plus each definition's source fragment under its def id.
pub fn build_event_ui_bases<'a>(
    defs: impl IntoIterator<Item = &'a EventDef>,
    global: &EventUi,
    by_source: &BTreeMap<String, EventUi>,
) -> EventUiBases {
    let mut bases = EventUiBases::new();
    bases.insert(String::new(), global.clone());

    for def in defs {
        if let Some(source_ui) = by_source.get(&def.source_id) {
            bases.insert(def.def_id.clone(), source_ui.clone());
        }
    }
    bases
}

/// Resolve the UI for one definition: global, then per-def base, then its own.
pub fn compile_event_ui(def: &EventDef, bases: &EventUiBases) -> EventUi {
    let layers = [bases.get(""), bases.get(&def.def_id), Some(&def.ui)];
    combine_event_uis(layers.into_iter().flatten())
}

/// Serialized UI fields as they appear in event payloads and source configs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventUiInput {
    pub display: Option<String>,
    pub editable: Option<bool>,
    pub start_editable: Option<bool>,
    pub duration_editable: Option<bool>,
    pub constraint: Option<ConstraintInput>,
    pub overlap: Option<bool>,
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub border_color: Option<String>,
    pub text_color: Option<String>,
    pub class_name: Option<ClassNamesInput>,
    pub class_names: Option<ClassNamesInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConstraintInput {
    Text(String),
    Range {
        start: Option<DateInput>,
        end: Option<DateInput>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClassNamesInput {
    One(String),
    Many(Vec<String>),
}

impl ClassNamesInput {
    fn names(&self) -> Vec<String> {
        match self {
            ClassNamesInput::One(s) => s.split_whitespace().map(str::to_string).collect(),
            ClassNamesInput::Many(list) => list.clone(),
        }
    }
}

impl EventUiInput {
    /// Refine the raw fields. Unknown display names and unparseable constraint
    /// ranges are dropped.
    pub fn refine(&self, env: &DateEnv) -> EventUi {
        let display = self.display.as_deref().and_then(|name| {
            let display = Display::parse(name);
            if display.is_none() {
                tracing::debug!(display = name, "ignoring unknown display mode");
            }
            display
        });

        let constraints = match &self.constraint {
            Some(ConstraintInput::Text(s)) if s == "businessHours" => vec![Constraint::BusinessHours],
            Some(ConstraintInput::Text(s)) => vec![Constraint::GroupId(s.clone())],
            Some(ConstraintInput::Range { start, end }) => {
                let range = DateRange::new(
                    start.as_ref().and_then(|s| env.create_marker(s)),
                    end.as_ref().and_then(|e| env.create_marker(e)),
                );
                if range.is_valid() {
                    vec![Constraint::Range(range)]
                } else {
                    tracing::debug!("ignoring empty constraint range");
                    Vec::new()
                }
            }
            None => Vec::new(),
        };

        let class_names = self
            .class_name
            .iter()
            .chain(&self.class_names)
            .flat_map(ClassNamesInput::names)
            .collect();

        EventUi {
            display,
            start_editable: self.start_editable.or(self.editable),
            duration_editable: self.duration_editable.or(self.editable),
            constraints,
            overlap: self.overlap,
            allows: Vec::new(),
            background_color: self.background_color.clone().or_else(|| self.color.clone()),
            border_color: self.border_color.clone().or_else(|| self.color.clone()),
            text_color: self.text_color.clone(),
            class_names,
        }
    }
}
