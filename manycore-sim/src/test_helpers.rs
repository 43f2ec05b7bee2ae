// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared helpers for tests of the runtime and of tile programs.

use std::rc::Rc;

use manycore_track::entity::{Entity, toplevel};
use manycore_track::test_helpers::create_tracker;

use crate::config::ManycoreConfig;
use crate::packet::{RequestPacket, ResponsePacket};
use crate::tile::{DpiTile, TileContext};
use crate::types::{Coordinate, SimError, SimResult};

/// Create the top-level entity for a test, logging to a file named after
/// the test source file.
#[must_use]
pub fn start_test(full_filepath: &str) -> Rc<Entity> {
    let tracker = create_tracker(full_filepath);
    toplevel(&tracker, "top")
}

/// A machine of `x` by `y` tiles with short latencies.
#[must_use]
pub fn small_config(x: u32, y: u32) -> ManycoreConfig {
    ManycoreConfig {
        dimension_vcore: Coordinate::new(x, y),
        dram_bank_size_bytes: 0x1_0000,
        dram_latency_cycles: 4,
        ..Default::default()
    }
}

/// A tile that never issues anything.
pub struct IdleTile;

impl DpiTile for IdleTile {
    fn send_request(&mut self, _ctx: &mut TileContext) -> Result<Option<RequestPacket>, SimError> {
        Ok(None)
    }

    fn receive_response(&mut self, _ctx: &mut TileContext, _rsp: &ResponsePacket) -> SimResult {
        Ok(())
    }
}

#[must_use]
pub fn idle_factory(_coord: Coordinate) -> Box<dyn DpiTile> {
    Box::new(IdleTile)
}
