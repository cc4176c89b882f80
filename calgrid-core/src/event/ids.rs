//! Identity resolution for definitions and instances.
//!
//! Parsing and recurrence expansion never mint ids on their own; they ask an
//! [`IdentityResolver`]. Hosts that refetch the same events pass a
//! [`ReuseIds`] built from the previous store so identities stay stable.

use std::collections::{HashMap, HashSet};

use crate::event::store::EventStore;

pub trait IdentityResolver {
    /// Internal id for a definition with the given public id.
    fn def_id(&mut self, public_id: Option<&str>) -> String;

    /// Internal id for a new instance of `def_id`.
    fn instance_id(&mut self, def_id: &str) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshIds;

impl IdentityResolver for FreshIds {
    fn def_id(&mut self, _public_id: Option<&str>) -> String {
        format!("def-{}", uuid::Uuid::new_v4())
    }

    fn instance_id(&mut self, _def_id: &str) -> String {
        format!("inst-{}", uuid::Uuid::new_v4())
    }
}

/// Deterministic counters, handy for tests and reproducible output.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next_def: u64,
    next_instance: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityResolver for SequentialIds {
    fn def_id(&mut self, _public_id: Option<&str>) -> String {
        let id = format!("d{}", self.next_def);
        self.next_def += 1;
        id
    }

    fn instance_id(&mut self, _def_id: &str) -> String {
        let id = format!("i{}", self.next_instance);
        self.next_instance += 1;
        id
    }
}

/// Reuses ids from a previous store, falling back to another resolver.
///
/// Definitions are matched by public id. Instance ids are only reused for
/// non-recurring definitions, each at most once. Ids minted by the fallback
/// never collide with ids of the previous store.
#[derive(Debug, Clone)]
pub struct ReuseIds<R> {
    def_ids: HashMap<String, String>,
    instance_ids: HashMap<String, String>,
    taken: HashSet<String>,
    fallback: R,
}

impl<R: IdentityResolver> ReuseIds<R> {
    pub fn from_store(previous: &EventStore, fallback: R) -> Self {
        let def_ids = previous
            .defs()
            .values()
            .filter_map(|def| {
                def.public_id
                    .as_ref()
                    .map(|public_id| (public_id.clone(), def.def_id.clone()))
            })
            .collect();

        let instance_ids = previous
            .instances()
            .values()
            .filter(|instance| {
                previous
                    .get_def(&instance.def_id)
                    .is_some_and(|def| def.recurring.is_none())
            })
            .map(|instance| (instance.def_id.clone(), instance.instance_id.clone()))
            .collect();

        let taken = previous
            .defs()
            .keys()
            .chain(previous.instances().keys())
            .cloned()
            .collect();

        ReuseIds {
            def_ids,
            instance_ids,
            taken,
            fallback,
        }
    }
}

/// Ask `mint` until it yields an id outside `taken`. A resolver that keeps
/// repeating itself gets its last answer back once every taken id was tried.
fn mint_unused(taken: &HashSet<String>, mut mint: impl FnMut() -> String) -> String {
    let mut id = mint();
    for _ in 0..taken.len() {
        if !taken.contains(&id) {
            break;
        }
        id = mint();
    }
    id
}

impl<R: IdentityResolver> IdentityResolver for ReuseIds<R> {
    fn def_id(&mut self, public_id: Option<&str>) -> String {
        match public_id.and_then(|id| self.def_ids.remove(id)) {
            Some(existing) => existing,
            None => {
                let fallback = &mut self.fallback;
                mint_unused(&self.taken, || fallback.def_id(public_id))
            }
        }
    }

    fn instance_id(&mut self, def_id: &str) -> String {
        match self.instance_ids.remove(def_id) {
            Some(existing) => existing,
            None => {
                let fallback = &mut self.fallback;
                mint_unused(&self.taken, || fallback.instance_id(def_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_are_deterministic() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.def_id(None), "d0");
        assert_eq!(ids.def_id(Some("x")), "d1");
        assert_eq!(ids.instance_id("d0"), "i0");
    }

    #[test]
    fn test_reuse_ids_skip_taken_fallback_ids() {
        let previous = EventStore::default();
        let mut ids = ReuseIds::from_store(&previous, SequentialIds::new());
        assert_eq!(ids.def_id(Some("a")), "d0", "nothing to reuse from an empty store");

        let mut taken = ReuseIds {
            def_ids: HashMap::new(),
            instance_ids: HashMap::from([("d0".to_string(), "i0".to_string())]),
            taken: HashSet::from(["i0".to_string(), "i1".to_string()]),
            fallback: SequentialIds::new(),
        };
        assert_eq!(taken.instance_id("d0"), "i0");
        assert_eq!(taken.instance_id("d0"), "i2", "fallback skips ids of the previous store");
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let mut ids = FreshIds;
        assert_ne!(ids.instance_id("a"), ids.instance_id("a"));
    }
}
