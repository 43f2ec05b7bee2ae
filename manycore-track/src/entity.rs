// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Hierarchical entities.

use std::fmt;
use std::rc::Rc;

use crate::{Id, Tracker, create, destroy};

const SEPARATOR: &str = "::";

/// A named node in the machine hierarchy (`top::manycore::tile_0_1`).
///
/// Log macros take an entity so that the tracker can filter on the entity's
/// [`Id`] and print who emitted each message. Only the root, made with
/// [`toplevel`], has no parent.
pub struct Entity {
    pub name: String,
    full_name: String,
    pub parent: Option<Rc<Entity>>,
    pub id: Id,
    pub tracker: Tracker,
}

impl Entity {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, name: &str) -> Self {
        let full_name = format!("{}{SEPARATOR}{name}", parent.full_name);
        let entity = Self::register(&parent.tracker, name, full_name, Some(parent.clone()));
        create!(entity);
        entity
    }

    fn register(tracker: &Tracker, name: &str, full_name: String, parent: Option<Rc<Entity>>) -> Self {
        let id = tracker.unique_id();
        tracker.add_entity(id, &full_name);
        Self {
            name: name.to_string(),
            full_name,
            parent,
            id,
            tracker: tracker.clone(),
        }
    }

    /// The `::` separated path from the root to this entity.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.full_name.clone()
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("full_name", &self.full_name)
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Create the root of an entity hierarchy.
pub fn toplevel(tracker: &Tracker, name: &str) -> Rc<Entity> {
    let top = Rc::new(Entity::register(tracker, name, name.to_string(), None));
    create!(top);
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::dev_null_tracker;

    #[test]
    fn hierarchical_names() {
        let tracker = dev_null_tracker();
        let top = toplevel(&tracker, "top");
        let manycore = Rc::new(Entity::new(&top, "manycore"));
        let tile = Entity::new(&manycore, "tile_0_1");

        assert_eq!(tile.full_name(), "top::manycore::tile_0_1");
        assert_eq!(format!("{tile}"), "top::manycore::tile_0_1");
        assert_eq!(tile.name, "tile_0_1");
    }
}
