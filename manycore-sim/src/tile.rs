// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! DPI tiles: tiles whose behaviour is provided by host-side code.
//!
//! A tile program implements [`DpiTile`]. The host runtime calls
//! [`DpiTile::send_request`] once per cycle while the tile is running and
//! [`DpiTile::receive_response`] for every read response that arrives. Both
//! are given a [`TileContext`], through which the tile reaches its DMEM, the
//! barrier and fence primitives and the packet constructors. Those services
//! are described by the [`TilePort`] trait so that tile programs can be
//! written, and tested, against any implementation of it.

use std::collections::BTreeMap;
use std::rc::Rc;

use manycore_track::entity::Entity;
use manycore_track::{info, warn};

use crate::address::{
    AddressMap, DEFAULT_MAP, Eva, TILE_EPA_CSR_FREEZE, TILE_EPA_CSR_TG_ORIGIN_X,
    TILE_EPA_CSR_TG_ORIGIN_Y, TILE_EPA_DMEM_BASE,
};
use crate::barrier::BarrierManager;
use crate::config::ManycoreConfig;
use crate::memory::Dmem;
use crate::packet::{Opcode, RequestPacket, ResponsePacket};
use crate::sim_error;
use crate::types::{Coordinate, SimError, SimResult};

/// Runtime-owned state of one tile.
pub struct TileState {
    pub entity: Rc<Entity>,
    coordinate: Coordinate,
    dmem: Dmem,
    frozen: bool,
    finished: bool,
    tg_origin: Coordinate,
    outstanding: usize,
    next_read_tag: u32,
    next_release_tag: u32,
    held: BTreeMap<u32, ResponsePacket>,
}

impl TileState {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, coordinate: Coordinate, config: &ManycoreConfig) -> Self {
        let name = format!("tile_{}_{}", coordinate.x, coordinate.y);
        Self {
            entity: Rc::new(Entity::new(parent, &name)),
            coordinate,
            dmem: Dmem::new(config.dmem_size_bytes),
            frozen: true,
            finished: false,
            tg_origin: config.origin_vcore,
            outstanding: 0,
            next_read_tag: 0,
            next_release_tag: 0,
            held: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    #[must_use]
    pub fn dmem(&self) -> &Dmem {
        &self.dmem
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn tg_origin(&self) -> Coordinate {
        self.tg_origin
    }

    /// Requests sent by the tile that have not yet been answered.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Read responses that arrived ahead of an earlier read.
    #[must_use]
    pub fn held_responses(&self) -> usize {
        self.held.len()
    }

    /// Count a request leaving the tile and tag reads with their issue
    /// order.
    pub(crate) fn request_sent(&mut self, req: &mut RequestPacket) {
        if req.op == Opcode::Read {
            req.tag = self.next_read_tag;
            self.next_read_tag = self.next_read_tag.wrapping_add(1);
        }
        self.outstanding += 1;
    }

    /// Accept a response and return the read responses that can now be
    /// handed to the tile, in the order the reads were issued.
    ///
    /// A read stays outstanding until it is released, so a fence does not
    /// pass while a response is held.
    pub(crate) fn response_received(
        &mut self,
        rsp: ResponsePacket,
    ) -> Result<Vec<ResponsePacket>, SimError> {
        if self.outstanding <= self.held.len() {
            return sim_error!(format!(
                "{}: response received with no request outstanding",
                self.coordinate
            ));
        }
        if rsp.op != Opcode::Read {
            self.outstanding -= 1;
            return Ok(Vec::new());
        }
        if self.held.insert(rsp.tag, rsp).is_some() {
            return sim_error!(format!(
                "{}: duplicate response for read {}",
                self.coordinate, rsp.tag
            ));
        }

        let mut released = Vec::new();
        while let Some(rsp) = self.held.remove(&self.next_release_tag) {
            self.next_release_tag = self.next_release_tag.wrapping_add(1);
            self.outstanding -= 1;
            released.push(rsp);
        }
        Ok(released)
    }

    /// Can the runtime offer this tile a cycle?
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        !self.frozen && !self.finished
    }
}

/// The services a tile program can use.
pub trait TilePort {
    fn entity(&self) -> &Rc<Entity>;

    fn coordinate(&self) -> Coordinate;

    /// The current simulation cycle.
    fn cycle(&self) -> u64;

    fn dmem(&self) -> &Dmem;

    fn dmem_mut(&mut self) -> &mut Dmem;

    /// Returns `true` while requests from this tile are still outstanding.
    fn fence(&self) -> bool;

    /// Returns `true` while the tile must keep waiting at the barrier.
    fn wait_at_barrier(&mut self, barrier_id: u32, tg_dim: Coordinate) -> bool;

    /// Build a read of `eva`. An unmapped address is logged and no packet
    /// is built.
    fn read_request(&self, eva: Eva) -> Option<RequestPacket>;

    fn kernel_start(&self) -> RequestPacket;

    fn kernel_end(&self) -> RequestPacket;

    fn finish(&self) -> RequestPacket;

    /// Mark the tile as done; it will not be offered further cycles.
    fn set_finished(&mut self);
}

/// A tile's view of the machine for the duration of one callback.
pub struct TileContext<'a> {
    state: &'a mut TileState,
    barriers: &'a mut BarrierManager,
    config: &'a ManycoreConfig,
    cycle: u64,
}

impl<'a> TileContext<'a> {
    pub fn new(
        state: &'a mut TileState,
        barriers: &'a mut BarrierManager,
        config: &'a ManycoreConfig,
        cycle: u64,
    ) -> Self {
        Self {
            state,
            barriers,
            config,
            cycle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ManycoreConfig {
        self.config
    }

    /// Service a request addressed to this tile: DMEM reads and writes, and
    /// the freeze and tile-group origin CSRs.
    pub fn default_request_handler(
        &mut self,
        req: &RequestPacket,
    ) -> Result<ResponsePacket, SimError> {
        let epa = req.dst.epa;
        let dmem_end = TILE_EPA_DMEM_BASE + self.state.dmem.size_bytes();
        let state = &mut *self.state;
        let data = match (req.op, epa) {
            (Opcode::Read, e) if (TILE_EPA_DMEM_BASE..dmem_end).contains(&e) => {
                state.dmem.read_word(e - TILE_EPA_DMEM_BASE)?
            }
            (Opcode::Write, e) if (TILE_EPA_DMEM_BASE..dmem_end).contains(&e) => {
                state.dmem.write_word(e - TILE_EPA_DMEM_BASE, req.data)?;
                0
            }
            (Opcode::Read, TILE_EPA_CSR_FREEZE) => u32::from(state.frozen),
            (Opcode::Write, TILE_EPA_CSR_FREEZE) => {
                let frozen = req.data != 0;
                if frozen != state.frozen {
                    if frozen {
                        info!(state.entity ; "frozen at cycle {}", self.cycle);
                    } else {
                        info!(state.entity ; "unfrozen at cycle {}", self.cycle);
                    }
                }
                state.frozen = frozen;
                0
            }
            (Opcode::Read, TILE_EPA_CSR_TG_ORIGIN_X) => state.tg_origin.x,
            (Opcode::Read, TILE_EPA_CSR_TG_ORIGIN_Y) => state.tg_origin.y,
            (Opcode::Write, TILE_EPA_CSR_TG_ORIGIN_X) => {
                state.tg_origin.x = req.data;
                0
            }
            (Opcode::Write, TILE_EPA_CSR_TG_ORIGIN_Y) => {
                state.tg_origin.y = req.data;
                0
            }
            (op, e) => {
                return sim_error!(format!(
                    "{}: cannot service {op} of EPA 0x{e:08x}",
                    state.coordinate
                ));
            }
        };
        Ok(req.response(data))
    }
}

impl TilePort for TileContext<'_> {
    fn entity(&self) -> &Rc<Entity> {
        &self.state.entity
    }

    fn coordinate(&self) -> Coordinate {
        self.state.coordinate
    }

    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn dmem(&self) -> &Dmem {
        &self.state.dmem
    }

    fn dmem_mut(&mut self) -> &mut Dmem {
        &mut self.state.dmem
    }

    fn fence(&self) -> bool {
        self.state.outstanding > 0
    }

    fn wait_at_barrier(&mut self, barrier_id: u32, tg_dim: Coordinate) -> bool {
        self.barriers.wait_at_barrier(
            self.state.tg_origin,
            self.state.coordinate,
            barrier_id,
            tg_dim,
            self.cycle,
        )
    }

    fn read_request(&self, eva: Eva) -> Option<RequestPacket> {
        match DEFAULT_MAP.eva_to_npa(self.config, &self.state.coordinate, eva) {
            Ok((npa, _)) => Some(RequestPacket::read(self.state.coordinate, npa)),
            Err(e) => {
                warn!(self.state.entity ; "dropping read: {e}");
                None
            }
        }
    }

    fn kernel_start(&self) -> RequestPacket {
        RequestPacket::marker(
            self.state.coordinate,
            self.config.host_coordinate,
            Opcode::KernelStart,
        )
    }

    fn kernel_end(&self) -> RequestPacket {
        RequestPacket::marker(
            self.state.coordinate,
            self.config.host_coordinate,
            Opcode::KernelEnd,
        )
    }

    fn finish(&self) -> RequestPacket {
        RequestPacket::marker(
            self.state.coordinate,
            self.config.host_coordinate,
            Opcode::Finish,
        )
    }

    fn set_finished(&mut self) {
        self.state.finished = true;
    }
}

/// Behaviour of a DPI tile.
pub trait DpiTile {
    /// Service a request addressed to this tile.
    fn execute_request(
        &mut self,
        ctx: &mut TileContext,
        req: &RequestPacket,
    ) -> Result<ResponsePacket, SimError> {
        ctx.default_request_handler(req)
    }

    /// Called once per cycle while the tile is running. Return at most one
    /// request to inject into the network.
    fn send_request(&mut self, ctx: &mut TileContext) -> Result<Option<RequestPacket>, SimError>;

    /// Called for each read response that reaches this tile.
    fn receive_response(&mut self, ctx: &mut TileContext, rsp: &ResponsePacket) -> SimResult;
}

/// Builds the behaviour for the tile at a coordinate.
pub type TileFactory<'a> = &'a dyn Fn(Coordinate) -> Box<dyn DpiTile>;

#[cfg(test)]
mod tests {
    use manycore_track::entity::toplevel;
    use manycore_track::tracker::dev_null_tracker;

    use super::*;
    use crate::address::{DRAM_EVA_BASE, Npa};

    #[test]
    fn csr_and_dmem_access() {
        let top = toplevel(&dev_null_tracker(), "top");
        let config = ManycoreConfig::default();
        let host = config.host_coordinate;
        let tile = Coordinate::new(1, 2);
        let mut state = TileState::new(&top, tile, &config);
        let mut barriers = BarrierManager::new(&top);
        let mut ctx = TileContext::new(&mut state, &mut barriers, &config, 0);

        let write = RequestPacket::write(host, Npa::new(tile, TILE_EPA_DMEM_BASE + 8), 77);
        assert_eq!(ctx.default_request_handler(&write).unwrap().dst, host);
        assert_eq!(ctx.dmem().read_word(8).unwrap(), 77);

        let origin_x = RequestPacket::write(host, Npa::new(tile, TILE_EPA_CSR_TG_ORIGIN_X), 1);
        let origin_y = RequestPacket::write(host, Npa::new(tile, TILE_EPA_CSR_TG_ORIGIN_Y), 2);
        ctx.default_request_handler(&origin_x).unwrap();
        ctx.default_request_handler(&origin_y).unwrap();
        let read_y = RequestPacket::read(host, Npa::new(tile, TILE_EPA_CSR_TG_ORIGIN_Y));
        assert_eq!(ctx.default_request_handler(&read_y).unwrap().data, 2);

        let unfreeze = RequestPacket::write(host, Npa::new(tile, TILE_EPA_CSR_FREEZE), 0);
        ctx.default_request_handler(&unfreeze).unwrap();
        let read = RequestPacket::read(host, Npa::new(tile, TILE_EPA_CSR_FREEZE));
        assert_eq!(ctx.default_request_handler(&read).unwrap().data, 0);

        let bad = RequestPacket::read(host, Npa::new(tile, 0x10));
        assert!(ctx.default_request_handler(&bad).is_err());

        assert!(!state.is_frozen());
        assert_eq!(state.tg_origin(), Coordinate::new(1, 2));
    }

    #[test]
    fn reads_released_in_issue_order() {
        let top = toplevel(&dev_null_tracker(), "top");
        let config = ManycoreConfig::default();
        let tile = Coordinate::new(0, 1);
        let mut state = TileState::new(&top, tile, &config);

        let reads: Vec<RequestPacket> = (0..3)
            .map(|i| {
                let mut req = RequestPacket::read(tile, Npa::new(Coordinate::new(i, 5), 0));
                state.request_sent(&mut req);
                req
            })
            .collect();
        let mut write = RequestPacket::write(tile, Npa::new(tile, TILE_EPA_DMEM_BASE), 1);
        state.request_sent(&mut write);
        assert_eq!(reads.iter().map(|r| r.tag).collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(write.tag, 0);
        assert_eq!(state.outstanding(), 4);

        // The last read comes back first and is held
        let released = state.response_received(reads[2].response(30)).unwrap();
        assert!(released.is_empty());
        assert_eq!(state.held_responses(), 1);
        assert_eq!(state.outstanding(), 4);

        // Writes are not ordered against reads
        assert!(state.response_received(write.response(0)).unwrap().is_empty());
        assert_eq!(state.outstanding(), 3);

        let released = state.response_received(reads[0].response(10)).unwrap();
        assert_eq!(released.iter().map(|r| r.data).collect::<Vec<_>>(), [10]);
        assert_eq!(state.outstanding(), 2);

        let released = state.response_received(reads[1].response(20)).unwrap();
        assert_eq!(released.iter().map(|r| r.data).collect::<Vec<_>>(), [20, 30]);
        assert_eq!(state.outstanding(), 0);
        assert_eq!(state.held_responses(), 0);

        assert!(state.response_received(reads[0].response(10)).is_err());
    }

    #[test]
    fn read_request_translation() {
        let top = toplevel(&dev_null_tracker(), "top");
        let config = ManycoreConfig::default();
        let tile = Coordinate::new(0, 1);
        let mut state = TileState::new(&top, tile, &config);
        let mut barriers = BarrierManager::new(&top);
        let ctx = TileContext::new(&mut state, &mut barriers, &config, 0);

        let req = ctx.read_request(DRAM_EVA_BASE + 4).unwrap();
        assert_eq!(req.dst, Npa::new(config.dram_coordinate(0).unwrap(), 4));
        assert_eq!(req.op, Opcode::Read);
        assert!(ctx.read_request(0x10).is_none());

        assert_eq!(ctx.finish().dst.coordinate(), config.host_coordinate);
        assert!(!ctx.fence());
    }
}
