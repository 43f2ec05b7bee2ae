// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Define the [`Track`] trait and a number of [`Tracker`]s.

/// Include the /dev/null tracker.
pub mod dev_null;
/// Include the multi-tracker.
pub mod multi_tracker;
/// Include the text-based tracker.
pub mod text;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub use dev_null::DevNullTracker;
pub use multi_tracker::MultiTracker;
use regex::Regex;
pub use text::TextTracker;

use crate::{Id, ROOT};

/// Error used to return configuration errors
#[derive(Debug)]
pub struct TrackConfigError(pub String);

impl fmt::Display for TrackConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Track config error: {}", self.0)
    }
}

impl std::error::Error for TrackConfigError {}

/// This is the interface that is supported by all [`Tracker`]s.
pub trait Track {
    /// Allocate a new global ID
    fn unique_id(&self) -> Id;

    /// Determine whether tracking is enabled, and at what level for an
    /// entity looked up by its ID.
    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool;

    /// Record an entity being created.
    fn add_entity(&self, id: Id, entity_name: &str);

    /// Track when an entity with the given ID is created.
    fn create(&self, created_by: Id, created_obj: Id, name: &str);

    /// Track when an entity with the given ID is destroyed.
    fn destroy(&self, destroyed_by: Id, destroyed_obj: Id);

    /// Track a log message of the given level.
    fn log(&self, msg_by: Id, level: log::Level, msg: std::fmt::Arguments);

    /// Advance the simulation clock to `cycle`.
    fn cycle(&self, set_by: Id, cycle: u64);

    /// Perform any pre-exit shutdown/cleanup
    fn shutdown(&self);
}

/// The type of a [`Tracker`] that is shared across entities.
pub type Tracker = Rc<dyn Track>;

/// Create a [`Tracker`] that suppresses all track events.
#[must_use]
pub fn dev_null_tracker() -> Tracker {
    let tracker: Tracker = Rc::new(DevNullTracker {});
    tracker
}

/// The [`EntityManager`] is responsible for determining entity log levels.
///
/// Levels are determined once, when the entity is added, by matching its full
/// hierarchical name against the filters in the order they were added. The
/// first match wins; entities that match nothing use the default level.
///
/// This manager is also used to allocate unique [`Id`] values.
pub struct EntityManager {
    /// Level of tracking events to output.
    default_entity_level: log::Level,

    /// List of regular expressions mapping entity names to log levels.
    regex_to_entity_level: Vec<(Regex, log::Level)>,

    /// Used to assign unique IDs.
    unique_id: RefCell<u64>,

    /// Keep track of entities that have log levels different to the default.
    log_entity_lookup: RefCell<HashMap<Id, log::Level>>,
}

impl EntityManager {
    /// Constructor with default [`log::Level`]
    #[must_use]
    pub fn new(default_entity_level: log::Level) -> Self {
        Self {
            default_entity_level,
            regex_to_entity_level: Vec::new(),
            unique_id: RefCell::new(ROOT.0 + 1),
            log_entity_lookup: RefCell::new(HashMap::new()),
        }
    }

    fn unique_id(&self) -> Id {
        let mut guard = self.unique_id.borrow_mut();
        let id = *guard;
        *guard += 1;
        Id(id)
    }

    fn is_enabled(&self, id: Id, level: log::Level) -> bool {
        match self.log_entity_lookup.borrow().get(&id) {
            None => level <= self.default_entity_level,
            Some(entity_level) => level <= *entity_level,
        }
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        let entity_level = self.log_level_for(entity_name);
        if entity_level != self.default_entity_level {
            self.log_entity_lookup.borrow_mut().insert(id, entity_level);
        }
    }

    fn log_level_for(&self, entity_name: &str) -> log::Level {
        for (regex, level) in &self.regex_to_entity_level {
            if regex.is_match(entity_name) {
                return *level;
            }
        }
        self.default_entity_level
    }

    /// Add a log filter regular expression.
    ///
    /// # Example
    ///
    /// ```rust
    /// use manycore_track::tracker::EntityManager;
    /// let mut manager = EntityManager::new(log::Level::Warn);
    /// manager.add_entity_level_filter(".*tile_0_1.*", log::Level::Trace).unwrap();
    /// ```
    pub fn add_entity_level_filter(
        &mut self,
        regex_str: &str,
        level: log::Level,
    ) -> Result<(), TrackConfigError> {
        match Regex::new(regex_str) {
            Ok(regex) => {
                self.regex_to_entity_level.push((regex, level));
                Ok(())
            }
            Err(e) => Err(TrackConfigError(format!(
                "Failed to parse regex {regex_str}:\n{e}\n"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_paths() -> Vec<&'static str> {
        vec![
            "top",
            "top::manycore",
            "top::manycore::tile_0_1",
            "top::manycore::dram_0",
        ]
    }

    #[test]
    fn no_filters() {
        let manager = EntityManager::new(log::Level::Error);

        for p in entity_paths() {
            assert_eq!(manager.log_level_for(p), log::Level::Error);
        }
    }

    #[test]
    fn first_filter_wins() {
        let mut manager = EntityManager::new(log::Level::Error);
        manager
            .add_entity_level_filter(r".*tile_0_1", log::Level::Info)
            .unwrap();
        manager
            .add_entity_level_filter(r".*manycore.*", log::Level::Trace)
            .unwrap();
        manager
            .add_entity_level_filter(r"top.*", log::Level::Warn)
            .unwrap();

        let expected_levels = [
            log::Level::Warn,
            log::Level::Trace,
            log::Level::Info,
            log::Level::Trace,
        ];

        for (i, p) in entity_paths().iter().enumerate() {
            assert_eq!(manager.log_level_for(p), expected_levels[i]);
        }
    }

    #[test]
    fn enables_follow_entity_level() {
        let mut manager = EntityManager::new(log::Level::Warn);
        manager
            .add_entity_level_filter(r".*dram.*", log::Level::Debug)
            .unwrap();

        let tile = manager.unique_id();
        manager.add_entity(tile, "top::manycore::tile_0_1");
        let dram = manager.unique_id();
        manager.add_entity(dram, "top::manycore::dram_0");

        assert!(manager.is_enabled(tile, log::Level::Warn));
        assert!(!manager.is_enabled(tile, log::Level::Info));
        assert!(manager.is_enabled(dram, log::Level::Debug));
        assert!(!manager.is_enabled(dram, log::Level::Trace));
    }

    #[test]
    fn bad_regex() {
        let mut manager = EntityManager::new(log::Level::Warn);
        assert!(manager.add_entity_level_filter("(", log::Level::Info).is_err());
    }

    #[test]
    fn ids() {
        let manager = EntityManager::new(log::Level::Error);
        for i in 0..10 {
            assert_eq!(manager.unique_id(), Id(i + ROOT.0 + 1));
        }
    }
}
