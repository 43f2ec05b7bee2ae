// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Tile-group barriers.
//!
//! A barrier is identified by the origin of the tile group using it and a
//! barrier index. Tiles call [`BarrierManager::wait_at_barrier`] every cycle
//! until it returns `false`; it keeps returning `true` until every member of
//! the group has arrived.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use manycore_track::entity::Entity;
use manycore_track::{debug, warn};

use crate::types::Coordinate;

struct BarrierState {
    arrived: HashSet<Coordinate>,
    first_arrival: u64,
    completed: Option<u64>,
}

pub struct BarrierManager {
    pub entity: Rc<Entity>,
    barriers: HashMap<(Coordinate, u32), BarrierState>,
}

impl BarrierManager {
    #[must_use]
    pub fn new(parent: &Rc<Entity>) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, "barriers")),
            barriers: HashMap::new(),
        }
    }

    /// Returns `true` while `tile` must keep waiting at `barrier_id`.
    pub fn wait_at_barrier(
        &mut self,
        group_origin: Coordinate,
        tile: Coordinate,
        barrier_id: u32,
        tg_dim: Coordinate,
        cycle: u64,
    ) -> bool {
        let members = tg_dim.area();
        if members == 0 {
            warn!(self.entity ; "{tile}: barrier {barrier_id} has an empty group {tg_dim}");
            return false;
        }
        if !tile.is_within(&group_origin, &tg_dim) {
            warn!(self.entity ; "{tile}: not a member of group {group_origin} {tg_dim} at barrier {barrier_id}");
            return false;
        }

        let state = self
            .barriers
            .entry((group_origin, barrier_id))
            .or_insert_with(|| BarrierState {
                arrived: HashSet::new(),
                first_arrival: cycle,
                completed: None,
            });

        if state.completed.is_some() {
            return false;
        }

        if state.arrived.insert(tile) {
            debug!(self.entity ; "{tile}: arrived at barrier {barrier_id} ({}/{members})", state.arrived.len());
        }
        if state.arrived.len() as u64 == members {
            debug!(self.entity ; "barrier {barrier_id} of group {group_origin} released after {} cycles",
                cycle - state.first_arrival);
            state.completed = Some(cycle);
            return false;
        }
        true
    }

    /// Number of tiles that have reached a barrier.
    #[must_use]
    pub fn arrived(&self, group_origin: Coordinate, barrier_id: u32) -> usize {
        self.barriers
            .get(&(group_origin, barrier_id))
            .map_or(0, |s| s.arrived.len())
    }

    /// Cycle at which a barrier released its group.
    #[must_use]
    pub fn completed_at(&self, group_origin: Coordinate, barrier_id: u32) -> Option<u64> {
        self.barriers
            .get(&(group_origin, barrier_id))
            .and_then(|s| s.completed)
    }
}

#[cfg(test)]
mod tests {
    use manycore_track::entity::toplevel;
    use manycore_track::tracker::dev_null_tracker;

    use super::*;

    #[test]
    fn releases_when_all_arrive() {
        let top = toplevel(&dev_null_tracker(), "top");
        let mut barriers = BarrierManager::new(&top);
        let origin = Coordinate::new(0, 1);
        let dim = Coordinate::new(2, 1);
        let a = Coordinate::new(0, 1);
        let b = Coordinate::new(1, 1);

        assert!(barriers.wait_at_barrier(origin, a, 0, dim, 1));
        assert!(barriers.wait_at_barrier(origin, a, 0, dim, 2));
        assert_eq!(barriers.arrived(origin, 0), 1);
        assert!(!barriers.wait_at_barrier(origin, b, 0, dim, 3));
        assert!(!barriers.wait_at_barrier(origin, a, 0, dim, 4));
        assert_eq!(barriers.completed_at(origin, 0), Some(3));

        // A different index is a separate barrier
        assert!(barriers.wait_at_barrier(origin, a, 1, dim, 5));
    }

    #[test]
    fn outsiders_never_block() {
        let top = toplevel(&dev_null_tracker(), "top");
        let mut barriers = BarrierManager::new(&top);
        let origin = Coordinate::new(0, 1);

        assert!(!barriers.wait_at_barrier(origin, Coordinate::new(3, 3), 0, Coordinate::new(2, 2), 1));
        assert!(!barriers.wait_at_barrier(origin, origin, 0, Coordinate::new(0, 2), 1));
        assert_eq!(barriers.arrived(origin, 0), 0);
    }
}
