// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Host driver for the test_dram regression.

use std::rc::Rc;

use manycore_sim::address::{DEFAULT_MAP, Npa, VCACHE_EPA_BASE};
use manycore_sim::layout::DmemRecord;
use manycore_sim::manycore::Manycore;
use manycore_sim::tile::{DpiTile, TileFactory};
use manycore_sim::types::{Coordinate, SimError};
use manycore_track::entity::Entity;
use manycore_track::info;

use crate::config::RegressionConfig;
use crate::report::{Report, TileCheck, Word};
use crate::test_dram::layout::{RESULT, TestDramArgs};
use crate::test_dram::tile::TestDramTile;

pub const PROGRAM: &str = "test_dram";

/// Sum of `0..len`.
#[must_use]
pub fn expected_sum(len: u32) -> u32 {
    (0..len).fold(0u32, u32::wrapping_add)
}

#[must_use]
pub fn tile_factory(_coord: Coordinate) -> Box<dyn DpiTile> {
    Box::new(TestDramTile::new())
}

pub fn run(parent: &Rc<Entity>, config: &RegressionConfig) -> Result<Report, SimError> {
    run_with(parent, config, &tile_factory)
}

/// Run the regression on the last tile of the array. A mismatch ends the
/// run straight away, leaving the tile unfrozen.
pub fn run_with(
    parent: &Rc<Entity>,
    config: &RegressionConfig,
    factory: TileFactory,
) -> Result<Report, SimError> {
    let entity = Rc::new(Entity::new(parent, PROGRAM));
    info!(entity ; "{PROGRAM} regression test");

    let timeout = config.timeout_cycles;
    let len = config.test_dram.len;
    let mut mc = Manycore::new(&entity, config.manycore.clone(), factory)?;
    let origin = mc.config().origin_vcore;
    let target = mc.config().last_vcore();
    let dmem_size = mc.config().dmem_size_bytes;

    let dram = Npa::new(mc.config().dram_coordinate(0)?, VCACHE_EPA_BASE);
    let (dram_eva, _) = mc.npa_to_eva(&DEFAULT_MAP, &target, &dram)?;

    let data: Vec<u32> = (0..len).collect();
    mc.eva_write(&DEFAULT_MAP, &target, dram_eva, &data)?;

    info!(entity ; "writing buffer EVA, length and pointer to {target}");
    let args = TestDramArgs {
        base: dram_eva,
        nels: len,
        ptr: dram_eva,
        result: 0,
    };
    for (npa, word) in args.host_writes(target, dmem_size)? {
        mc.write_mem(&npa, &[word])?;
    }
    mc.tile_set_origin(&target, &origin)?;
    mc.host_request_fence(timeout)?;

    info!(entity ; "unfreezing {target}");
    mc.tile_unfreeze(&target)?;

    info!(entity ; "waiting for finish packet");
    mc.wait_finish(timeout)?;

    let mut actual = [0];
    mc.read_mem(&RESULT.npa(target, dmem_size)?, &mut actual)?;
    let mut report = Report::new(PROGRAM);
    report.checks.push(TileCheck {
        tile: target,
        expected: Word::Unsigned(expected_sum(len)),
        actual: Word::Unsigned(actual[0]),
    });
    report.cycles = mc.cycle();
    if !report.passed() {
        report.log(&entity);
        return Ok(report);
    }
    info!(entity ; "read successful");

    mc.tile_freeze(&target)?;
    mc.host_request_fence(timeout)?;
    report.cycles = mc.cycle();
    mc.exit()?;

    report.log(&entity);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_buffer() {
        assert_eq!(expected_sum(32), 496);
        assert_eq!(expected_sum(0), 0);
        assert_eq!(expected_sum(100), 4950);
    }
}
