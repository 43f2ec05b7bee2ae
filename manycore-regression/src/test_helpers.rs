// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A scripted [`TilePort`] for exercising tile programs one call at a time.

use std::rc::Rc;

use manycore_sim::address::{Eva, Npa};
use manycore_sim::memory::Dmem;
use manycore_sim::packet::{Opcode, RequestPacket};
use manycore_sim::tile::TilePort;
use manycore_sim::types::Coordinate;
use manycore_track::entity::{Entity, toplevel};
use manycore_track::tracker::dev_null_tracker;

/// Every read request carries its EVA in the EPA so tests can recover the
/// address sequence.
pub struct MockPort {
    pub entity: Rc<Entity>,
    pub coordinate: Coordinate,
    pub dmem: Dmem,
    pub cycle: u64,
    /// Requests the test pretends are still in flight.
    pub outstanding: usize,
    /// While set, every barrier keeps the tile waiting.
    pub barrier_closed: bool,
    pub barrier_calls: Vec<u32>,
    pub finished: bool,
}

impl MockPort {
    #[must_use]
    pub fn new(dmem_size: u32) -> Self {
        let tracker = dev_null_tracker();
        Self {
            entity: toplevel(&tracker, "mock"),
            coordinate: Coordinate::new(0, 1),
            dmem: Dmem::new(dmem_size),
            cycle: 0,
            outstanding: 0,
            barrier_closed: false,
            barrier_calls: Vec::new(),
            finished: false,
        }
    }
}

impl TilePort for MockPort {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn dmem(&self) -> &Dmem {
        &self.dmem
    }

    fn dmem_mut(&mut self) -> &mut Dmem {
        &mut self.dmem
    }

    fn fence(&self) -> bool {
        self.outstanding > 0
    }

    fn wait_at_barrier(&mut self, barrier_id: u32, _tg_dim: Coordinate) -> bool {
        self.barrier_calls.push(barrier_id);
        self.barrier_closed
    }

    fn read_request(&self, eva: Eva) -> Option<RequestPacket> {
        Some(RequestPacket::read(
            self.coordinate,
            Npa::new(Coordinate::new(0, 0), eva),
        ))
    }

    fn kernel_start(&self) -> RequestPacket {
        RequestPacket::marker(self.coordinate, Coordinate::new(0, 0), Opcode::KernelStart)
    }

    fn kernel_end(&self) -> RequestPacket {
        RequestPacket::marker(self.coordinate, Coordinate::new(0, 0), Opcode::KernelEnd)
    }

    fn finish(&self) -> RequestPacket {
        RequestPacket::marker(self.coordinate, Coordinate::new(0, 0), Opcode::Finish)
    }

    fn set_finished(&mut self) {
        self.finished = true;
    }
}
