//! The event store: definitions and instances keyed by id.
//!
//! Stores are values. Every operation returns a new store, and every
//! constructor re-derives referential integrity, so an instance whose
//! definition is missing never survives into a store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::date_range::DateRange;
use crate::event::def::EventDef;
use crate::event::ids::IdentityResolver;
use crate::event::instance::EventInstance;
use crate::recurrence::expand_instances;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStore {
    defs: BTreeMap<String, Arc<EventDef>>,
    instances: BTreeMap<String, EventInstance>,
}

impl EventStore {
    pub fn new(
        defs: impl IntoIterator<Item = EventDef>,
        instances: impl IntoIterator<Item = EventInstance>,
    ) -> Self {
        let defs = defs
            .into_iter()
            .map(|def| (def.def_id.clone(), Arc::new(def)))
            .collect();
        let instances = instances
            .into_iter()
            .map(|instance| (instance.instance_id.clone(), instance))
            .collect();
        Self::from_maps(defs, instances)
    }

    /// Build from maps, dropping instances whose definition is missing.
    pub fn from_maps(
        defs: BTreeMap<String, Arc<EventDef>>,
        mut instances: BTreeMap<String, EventInstance>,
    ) -> Self {
        let before = instances.len();
        instances.retain(|_, instance| defs.contains_key(&instance.def_id));
        if instances.len() < before {
            tracing::debug!(
                dropped = before - instances.len(),
                "dropped instances without a definition"
            );
        }
        EventStore { defs, instances }
    }

    pub fn defs(&self) -> &BTreeMap<String, Arc<EventDef>> {
        &self.defs
    }

    pub fn instances(&self) -> &BTreeMap<String, EventInstance> {
        &self.instances
    }

    pub fn get_def(&self, def_id: &str) -> Option<&Arc<EventDef>> {
        self.defs.get(def_id)
    }

    pub fn get_instance(&self, instance_id: &str) -> Option<&EventInstance> {
        self.instances.get(instance_id)
    }

    pub fn instances_of<'a>(&'a self, def_id: &'a str) -> impl Iterator<Item = &'a EventInstance> {
        self.instances
            .values()
            .filter(move |instance| instance.def_id == def_id)
    }

    /// True when the store holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Union of both stores. Entries of `other` win on id collisions.
    pub fn merge(&self, other: &EventStore) -> EventStore {
        let mut defs = self.defs.clone();
        defs.extend(other.defs.iter().map(|(id, def)| (id.clone(), Arc::clone(def))));

        let mut instances = self.instances.clone();
        instances.extend(other.instances.iter().map(|(id, i)| (id.clone(), i.clone())));

        Self::from_maps(defs, instances)
    }

    /// Keep definitions matching `keep`, and only the instances of those.
    pub fn filter_defs(&self, keep: impl Fn(&EventDef) -> bool) -> EventStore {
        let defs = self
            .defs
            .iter()
            .filter(|(_, def)| keep(def))
            .map(|(id, def)| (id.clone(), Arc::clone(def)))
            .collect();
        Self::from_maps(defs, self.instances.clone())
    }

    /// Remove everything `sub` contains. A definition listed in `sub` stays
    /// while a surviving instance still refers to it. Ids missing from `self`
    /// are ignored.
    pub fn exclude(&self, sub: &EventStore) -> EventStore {
        let instances: BTreeMap<String, EventInstance> = self
            .instances
            .iter()
            .filter(|(id, _)| !sub.instances.contains_key(*id))
            .map(|(id, instance)| (id.clone(), instance.clone()))
            .collect();

        let defs = self
            .defs
            .iter()
            .filter(|(id, _)| {
                !sub.defs.contains_key(*id)
                    || instances.values().any(|instance| &instance.def_id == *id)
            })
            .map(|(id, def)| (id.clone(), Arc::clone(def)))
            .collect();

        Self::from_maps(defs, instances)
    }

    /// Everything that moves together with `instance_id`: its definition,
    /// every definition in the same group, and all of their instances.
    pub fn related_events(&self, instance_id: &str) -> EventStore {
        let Some(instance) = self.instances.get(instance_id) else {
            return EventStore::default();
        };
        let Some(anchor) = self.defs.get(&instance.def_id) else {
            return EventStore::default();
        };

        self.filter_defs(|def| def.def_id == anchor.def_id || def.is_grouped_with(anchor))
    }

    /// Replace the instances of every recurring definition with a fresh
    /// expansion against `framing`. Non-recurring instances are kept.
    pub fn expand_recurring(
        &self,
        framing: &DateRange,
        config: &EngineConfig,
        ids: &mut dyn IdentityResolver,
    ) -> EventStore {
        let mut instances: BTreeMap<String, EventInstance> = self
            .instances
            .iter()
            .filter(|(_, instance)| {
                self.defs
                    .get(&instance.def_id)
                    .is_some_and(|def| !def.is_recurring())
            })
            .map(|(id, instance)| (id.clone(), instance.clone()))
            .collect();

        for def in self.defs.values().filter(|def| def.is_recurring()) {
            for instance in expand_instances(def, framing, config, ids) {
                instances.insert(instance.instance_id.clone(), instance);
            }
        }

        tracing::debug!(
            defs = self.defs.len(),
            instances = instances.len(),
            "expanded recurring definitions"
        );
        Self::from_maps(self.defs.clone(), instances)
    }
}

/// A store holding one definition and, optionally, one of its instances.
pub fn event_tuple_to_store(def: EventDef, instance: Option<EventInstance>) -> EventStore {
    EventStore::new([def], instance)
}
