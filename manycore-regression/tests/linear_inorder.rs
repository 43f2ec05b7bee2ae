// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use manycore_regression::config::{LinearInorderParams, RegressionConfig};
use manycore_regression::linear_inorder::host::{input_data, run, run_with, tile_factory};
use manycore_sim::packet::{Opcode, RequestPacket, ResponsePacket};
use manycore_sim::config::ManycoreConfig;
use manycore_sim::test_helpers::{small_config, start_test};
use manycore_sim::tile::{DpiTile, TileContext, TilePort};
use manycore_sim::types::{Coordinate, SimError, SimResult};

fn config(x: u32, y: u32, params: LinearInorderParams) -> RegressionConfig {
    RegressionConfig {
        manycore: small_config(x, y),
        linear_inorder: params,
        timeout_cycles: Some(200_000),
        ..Default::default()
    }
}

#[test]
fn default_parameters_pass() {
    let top = start_test(file!());
    let report = run(&top, &config(2, 2, LinearInorderParams::default())).unwrap();
    assert!(report.passed());
    assert_eq!(report.checks.len(), 4);
    let start = report.kernel_start_cycle.unwrap();
    let end = report.kernel_end_cycle.unwrap();
    assert!(end > start + 1024);
}

#[test]
fn strided_offsets_pass() {
    let top = start_test(file!());
    let params = LinearInorderParams {
        nels: 37,
        niters: 100,
        pto: 5,
        stride: 3,
        ..Default::default()
    };
    let report = run(&top, &config(4, 2, params)).unwrap();
    assert!(report.passed());
    assert_eq!(report.checks.len(), 8);

    // Different offsets give different folds
    assert_ne!(report.checks[0].actual, report.checks[1].actual);
}

#[test]
fn single_tile_is_its_own_group() {
    let top = start_test(file!());
    let params = LinearInorderParams {
        nels: 16,
        niters: 16,
        ..Default::default()
    };
    let report = run(&top, &config(1, 1, params)).unwrap();
    assert!(report.passed());
}

#[test]
fn group_away_from_the_default_origin() {
    let top = start_test(file!());
    let params = LinearInorderParams {
        nels: 24,
        niters: 48,
        pto: 2,
        ..Default::default()
    };
    let mut config = config(2, 2, params);
    config.manycore.origin_vcore = Coordinate::new(2, 3);
    let report = run(&top, &config).unwrap();
    assert!(report.passed());
    // Exactly the group origin sends the kernel markers
    assert!(report.kernel_start_cycle.is_some());
    assert!(report.kernel_end_cycle.is_some());
}

#[derive(Clone, Copy, Debug)]
struct Event {
    tile: Coordinate,
    cycle: u64,
    op: Option<Opcode>,
    outstanding: bool,
}

/// Records every call made to the wrapped tile.
struct Observed {
    inner: Box<dyn DpiTile>,
    events: Rc<RefCell<Vec<Event>>>,
    drop_response: Option<u64>,
    responses: u64,
}

impl DpiTile for Observed {
    fn send_request(&mut self, ctx: &mut TileContext) -> Result<Option<RequestPacket>, SimError> {
        let outstanding = ctx.fence();
        let req = self.inner.send_request(ctx)?;
        self.events.borrow_mut().push(Event {
            tile: ctx.coordinate(),
            cycle: ctx.cycle(),
            op: req.map(|r| r.op),
            outstanding,
        });
        Ok(req)
    }

    fn receive_response(&mut self, ctx: &mut TileContext, rsp: &ResponsePacket) -> SimResult {
        self.responses += 1;
        if self.drop_response == Some(self.responses) {
            return Ok(());
        }
        self.inner.receive_response(ctx, rsp)
    }
}

#[test]
fn barriers_and_fence_order_phases() {
    let top = start_test(file!());
    let params = LinearInorderParams {
        nels: 64,
        niters: 40,
        stride: 7,
        ..Default::default()
    };
    let config = config(2, 2, params);
    let origin = config.manycore.origin_vcore;
    let events = Rc::new(RefCell::new(Vec::new()));

    let inner = tile_factory(origin);
    let factory_events = events.clone();
    let factory = move |coord: Coordinate| -> Box<dyn DpiTile> {
        Box::new(Observed {
            inner: inner(coord),
            events: factory_events.clone(),
            drop_response: None,
            responses: 0,
        })
    };
    let report = run_with(&top, &config, &factory).unwrap();
    assert!(report.passed());

    let events = events.borrow();
    let tiles: Vec<Coordinate> = config.manycore.vcore_coordinates().collect();
    let first_call = |tile: Coordinate| {
        events
            .iter()
            .find(|e| e.tile == tile)
            .map(|e| e.cycle)
            .unwrap()
    };
    let first_op = |tile: Coordinate, op: Opcode| {
        events
            .iter()
            .find(|e| e.tile == tile && e.op == Some(op))
            .map(|e| e.cycle)
            .unwrap()
    };

    // No tile reads before the whole group has reached the first barrier
    let last_arrival = tiles.iter().map(|t| first_call(*t)).max().unwrap();
    for tile in &tiles {
        assert!(first_op(*tile, Opcode::Read) >= last_arrival);
    }

    // The origin only starts reading once its kernel start marker is back
    let start = first_op(origin, Opcode::KernelStart);
    let first_read = events
        .iter()
        .find(|e| e.tile == origin && e.op == Some(Opcode::Read))
        .unwrap();
    assert!(first_read.cycle > start + 1);
    assert!(!first_read.outstanding);

    // No tile finishes before every tile has drained its reads
    let last_read = tiles
        .iter()
        .map(|t| {
            events
                .iter()
                .filter(|e| e.tile == *t && e.op == Some(Opcode::Read))
                .map(|e| e.cycle)
                .max()
                .unwrap()
        })
        .max()
        .unwrap();
    for tile in &tiles {
        assert!(first_op(*tile, Opcode::Finish) > last_read);
        let finishes = events
            .iter()
            .filter(|e| e.tile == *tile && e.op == Some(Opcode::Finish))
            .count();
        assert_eq!(finishes, 1);
    }
    assert!(first_op(origin, Opcode::KernelEnd) < first_op(origin, Opcode::Finish));
}

#[test]
fn mismatches_reported_per_tile() {
    let top = start_test(file!());
    let params = LinearInorderParams {
        nels: 32,
        niters: 32,
        pto: 1,
        ..Default::default()
    };
    let config = config(2, 1, params);
    let origin = config.manycore.origin_vcore;
    let broken = Coordinate::new(origin.x + 1, origin.y);

    let inner = tile_factory(origin);
    let factory = move |coord: Coordinate| -> Box<dyn DpiTile> {
        Box::new(Observed {
            inner: inner(coord),
            events: Rc::new(RefCell::new(Vec::new())),
            drop_response: (coord == broken).then_some(3),
            responses: 0,
        })
    };
    let report = run_with(&top, &config, &factory).unwrap();
    assert!(!report.passed());
    let failures: Vec<_> = report.failures().map(|c| c.tile).collect();
    assert_eq!(failures, vec![broken]);
}

/// Records the data of every response handed to the wrapped tile.
struct ResponseLog {
    inner: Box<dyn DpiTile>,
    log: Rc<RefCell<HashMap<Coordinate, Vec<u32>>>>,
}

impl DpiTile for ResponseLog {
    fn send_request(&mut self, ctx: &mut TileContext) -> Result<Option<RequestPacket>, SimError> {
        self.inner.send_request(ctx)
    }

    fn receive_response(&mut self, ctx: &mut TileContext, rsp: &ResponsePacket) -> SimResult {
        self.log
            .borrow_mut()
            .entry(ctx.coordinate())
            .or_default()
            .push(rsp.data);
        self.inner.receive_response(ctx, rsp)
    }
}

#[test]
fn buffer_split_across_banks_folds_in_issue_order() {
    let top = start_test(file!());
    for data_seed in 0..8 {
        let params = LinearInorderParams {
            nels: 17,
            niters: 340,
            pto: 3,
            stride: 5,
            data_seed,
            ..Default::default()
        };
        let config = RegressionConfig {
            // 16 words per bank: the buffer spans banks 0 and 1
            manycore: ManycoreConfig {
                dram_bank_size_bytes: 64,
                ..small_config(2, 1)
            },
            linear_inorder: params.clone(),
            timeout_cycles: Some(200_000),
            ..Default::default()
        };
        let origin = config.manycore.origin_vcore;
        let log = Rc::new(RefCell::new(HashMap::new()));

        let inner = tile_factory(origin);
        let factory_log = log.clone();
        let factory = move |coord: Coordinate| -> Box<dyn DpiTile> {
            Box::new(ResponseLog {
                inner: inner(coord),
                log: factory_log.clone(),
            })
        };
        let report = run_with(&top, &config, &factory).unwrap();
        assert!(report.passed(), "seed {data_seed}");

        let data = input_data(&params);
        let log = log.borrow();
        for (idx, tile) in config.manycore.vcore_coordinates().enumerate() {
            let offset = params.pto * idx as u32;
            let issued: Vec<u32> = (0..params.niters)
                .map(|j| data[((j * params.stride + offset) % params.nels) as usize].to_bits())
                .collect();
            assert_eq!(log[&tile], issued, "seed {data_seed} tile {tile}");
        }
    }
}
