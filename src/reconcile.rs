//! Local reconciliation of broadcast entity changes
//!
//! Keeps an in-memory, display-ordered copy of server entities consistent
//! with Created/Updated/Deleted broadcasts, so other sessions see a change
//! without refetching.

use std::fmt::Debug;
use std::hash::Hash;

/// Anything keyed by a stable id
pub trait Entity {
    type Id: Clone + Eq + Hash + Debug;

    fn id(&self) -> &Self::Id;
}

/// Change broadcast for one entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent<T: Entity> {
    Created(T),
    Updated(T),
    Deleted(T::Id),
}

impl<T: Entity> EntityEvent<T> {
    pub fn id(&self) -> &T::Id {
        match self {
            EntityEvent::Created(entity) | EntityEvent::Updated(entity) => entity.id(),
            EntityEvent::Deleted(id) => id,
        }
    }
}

/// What applying an event did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    Removed,
    Unchanged,
}

/// Order-preserving collection with unique ids.
///
/// Order is display order: new entities go to the front. Lookups are linear,
/// which is fine for the page-sized lists an admin view holds.
#[derive(Debug, Clone)]
pub struct EntityCollection<T: Entity> {
    items: Vec<T>,
}

impl<T: Entity> Default for EntityCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> EntityCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an initial load. The first occurrence of a repeated id wins.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self::new();
        collection.replace_all(items);
        collection
    }

    /// Replace the whole contents, keeping the given order
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        for item in items {
            if self.position(item.id()).is_none() {
                self.items.push(item);
            }
        }
    }

    /// Apply one change event.
    ///
    /// `Created` for a known id and `Updated` for an unknown id are both
    /// upserts, so replays and missed events converge on the same state.
    pub fn apply(&mut self, event: EntityEvent<T>) -> Applied {
        match event {
            EntityEvent::Created(entity) | EntityEvent::Updated(entity) => self.upsert(entity),
            EntityEvent::Deleted(id) => match self.position(&id) {
                Some(index) => {
                    self.items.remove(index);
                    Applied::Removed
                }
                None => Applied::Unchanged,
            },
        }
    }

    fn upsert(&mut self, entity: T) -> Applied {
        match self.position(entity.id()) {
            Some(index) => {
                self.items[index] = entity;
                Applied::Replaced
            }
            None => {
                self.items.insert(0, entity);
                Applied::Inserted
            }
        }
    }

    fn position(&self, id: &T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.position(id).map(|index| &self.items[index])
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.position(id).is_some()
    }

    pub fn index_of(&self, id: &T::Id) -> Option<usize> {
        self.position(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(|item| item.id().clone()).collect()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
