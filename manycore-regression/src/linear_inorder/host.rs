// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Host driver for the linear_inorder regression.

use std::rc::Rc;

use manycore_sim::address::{DEFAULT_MAP, Npa, VCACHE_EPA_BASE};
use manycore_sim::layout::DmemRecord;
use manycore_sim::manycore::Manycore;
use manycore_sim::tile::{DpiTile, TileFactory};
use manycore_sim::types::{Coordinate, SimError};
use manycore_track::entity::Entity;
use manycore_track::info;
use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

use crate::config::{LinearInorderParams, RegressionConfig};
use crate::linear_inorder::layout::{LinearInorderArgs, RESULT};
use crate::linear_inorder::tile::{LinearInorderTile, Role};
use crate::report::{Report, TileCheck, Word};

pub const PROGRAM: &str = "linear_inorder";

/// The DRAM buffer: `nels` values drawn uniformly from `[0.9, 1/0.9)`.
#[must_use]
pub fn input_data(params: &LinearInorderParams) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(params.data_seed);
    let distribution = Uniform::new(0.9f32, 1.0 / 0.9);
    (0..params.nels).map(|_| distribution.sample(&mut rng)).collect()
}

/// Element offset of the tile at row-major position `idx`.
#[must_use]
pub fn tile_offset(params: &LinearInorderParams, idx: u32) -> u32 {
    params.pto.wrapping_mul(idx)
}

/// The result the tile at row-major position `idx` must produce, folding
/// the divisions in the order the tile issues its reads.
#[must_use]
pub fn expected_result(params: &LinearInorderParams, data: &[f32], idx: u32) -> f32 {
    let mut expected = params.initial;
    if data.is_empty() {
        return expected;
    }
    let nels = data.len() as u32;
    let offset = tile_offset(params, idx);
    for j in 0..params.niters {
        let element = j.wrapping_mul(params.stride).wrapping_add(offset) % nels;
        expected /= data[element as usize];
    }
    expected
}

/// Tiles built for a group rooted at `origin`. Pass the same origin that
/// the driver writes to the tile-group CSRs.
pub fn tile_factory(origin: Coordinate) -> impl Fn(Coordinate) -> Box<dyn DpiTile> {
    move |coord: Coordinate| -> Box<dyn DpiTile> {
        let role = if coord == origin {
            Role::Origin
        } else {
            Role::Member
        };
        Box::new(LinearInorderTile::new(role))
    }
}

pub fn run(parent: &Rc<Entity>, config: &RegressionConfig) -> Result<Report, SimError> {
    let (origin, _) = config.tile_group();
    let factory = tile_factory(origin);
    run_with(parent, config, &factory)
}

/// Run the regression over every tile of the array. Result mismatches are
/// collected in the report; runtime failures abort the run.
pub fn run_with(
    parent: &Rc<Entity>,
    config: &RegressionConfig,
    factory: TileFactory,
) -> Result<Report, SimError> {
    let entity = Rc::new(Entity::new(parent, PROGRAM));
    info!(entity ; "{PROGRAM} regression test");

    let params = &config.linear_inorder;
    let timeout = config.timeout_cycles;
    let mut mc = Manycore::new(&entity, config.manycore.clone(), factory)?;
    let (origin, tg_dim) = config.tile_group();
    let dmem_size = mc.config().dmem_size_bytes;
    let tiles: Vec<Coordinate> = mc.config().vcore_coordinates().collect();

    let data = input_data(params);
    let dram = Npa::new(mc.config().dram_coordinate(0)?, VCACHE_EPA_BASE);
    let (dram_eva, _) = mc.npa_to_eva(&DEFAULT_MAP, &origin, &dram)?;

    info!(entity ; "writing metadata to DMEM of each tile");
    for (idx, tile) in tiles.iter().enumerate() {
        let args = LinearInorderArgs {
            base: dram_eva,
            nels: params.nels,
            offset: tile_offset(params, idx as u32),
            stride: params.stride,
            iter: 0,
            limit: params.niters,
            tg_dim,
            result: params.initial,
        };
        for (npa, word) in args.host_writes(*tile, dmem_size)? {
            mc.write_mem(&npa, &[word])?;
        }
        mc.tile_set_origin(tile, &origin)?;
    }

    let words: Vec<u32> = data.iter().map(|v| v.to_bits()).collect();
    mc.eva_write(&DEFAULT_MAP, &origin, dram_eva, &words)?;
    mc.host_request_fence(timeout)?;

    mc.trace_enable()?;
    info!(entity ; "unfreezing {} tiles", tiles.len());
    for tile in &tiles {
        mc.tile_unfreeze(tile)?;
    }

    info!(entity ; "waiting for finish packets");
    for _ in &tiles {
        let tile = mc.wait_finish(timeout)?;
        info!(entity ; "{tile} finished at cycle {}", mc.cycle());
    }
    mc.trace_disable()?;

    info!(entity ; "reading results from DMEM");
    let mut report = Report::new(PROGRAM);
    for (idx, tile) in tiles.iter().enumerate() {
        let mut actual = [0];
        mc.read_mem(&RESULT.npa(*tile, dmem_size)?, &mut actual)?;
        report.checks.push(TileCheck {
            tile: *tile,
            expected: Word::float(expected_result(params, &data, idx as u32)),
            actual: Word::Float(actual[0]),
        });
    }

    info!(entity ; "freezing tiles");
    for tile in &tiles {
        mc.tile_freeze(tile)?;
    }
    mc.host_request_fence(timeout)?;

    let stats = mc.stats();
    report.kernel_start_cycle = stats.kernel_start_cycle;
    report.kernel_end_cycle = stats.kernel_end_cycle;
    report.cycles = mc.cycle();
    mc.exit()?;

    report.log(&entity);
    Ok(report)
}
