// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The registry of suites and tests opened during a run.

use crate::path::PathKey;
use indexmap::IndexMap;
use testrelay_model::{ItemType, ItemUuid};
use tracing::warn;

/// Maps canonical paths to the items created for them.
///
/// Entries are kept in creation order, so that iterating in reverse visits
/// children before their parents.
#[derive(Clone, Debug, Default)]
pub struct EntityRegistry {
    entries: IndexMap<PathKey, RegisteredEntity>,
}

/// An item recorded in an [`EntityRegistry`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisteredEntity {
    /// The temporary id of the item.
    pub id: ItemUuid,

    /// The kind of the item: a suite or a test.
    pub kind: ItemType,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id registered for `path`, if any.
    pub fn get(&self, path: &PathKey) -> Option<ItemUuid> {
        self.entries.get(path).map(|entity| entity.id)
    }

    /// Returns true if `path` is registered.
    pub fn contains(&self, path: &PathKey) -> bool {
        self.entries.contains_key(path)
    }

    /// Registers `id` for `path`.
    ///
    /// The first writer wins: if `path` is already registered, this logs a
    /// warning, leaves the registry unchanged and returns false.
    pub fn put(&mut self, path: PathKey, id: ItemUuid, kind: ItemType) -> bool {
        if let Some(existing) = self.entries.get(&path) {
            warn!(
                %path,
                existing = %existing.id,
                rejected = %id,
                "an item is already registered for this path, keeping the first one",
            );
            return false;
        }
        self.entries.insert(path, RegisteredEntity { id, kind });
        true
    }

    /// Removes `path` from the registry, returning its entry.
    ///
    /// The relative order of the remaining entries is preserved.
    pub fn remove(&mut self, path: &PathKey) -> Option<RegisteredEntity> {
        self.entries.shift_remove(path)
    }

    /// Removes every entry, returning them most recently created first.
    pub fn drain_newest_first(&mut self) -> impl Iterator<Item = (PathKey, RegisteredEntity)> + use<> {
        std::mem::take(&mut self.entries).into_iter().rev()
    }

    /// Returns the number of registered items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
