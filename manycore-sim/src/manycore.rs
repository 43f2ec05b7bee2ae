// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The host's handle on the simulated machine.

use std::collections::VecDeque;
use std::rc::Rc;

use manycore_track::entity::Entity;
use manycore_track::{debug, info, set_cycle, trace};

use crate::address::{
    AddressMap, Eva, Npa, TILE_EPA_CSR_FREEZE, TILE_EPA_CSR_TG_ORIGIN_X, TILE_EPA_CSR_TG_ORIGIN_Y,
};
use crate::barrier::BarrierManager;
use crate::config::ManycoreConfig;
use crate::memory::{Dram, MemoryMetrics};
use crate::network::{Network, Packet};
use crate::packet::{Opcode, RequestPacket, ResponsePacket};
use crate::sim_error;
use crate::tile::{DpiTile, TileContext, TileFactory, TileState};
use crate::types::{Coordinate, SimError, SimResult};

/// Counters and marker cycles gathered while the machine runs.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub kernel_start_cycle: Option<u64>,
    pub kernel_end_cycle: Option<u64>,
    pub finish_cycles: Vec<(Coordinate, u64)>,
    pub tile_requests: u64,
    pub host_requests: u64,
    pub dram: MemoryMetrics,
}

struct TileSlot {
    state: TileState,
    behaviour: Box<dyn DpiTile>,
}

struct DramBank {
    entity: Rc<Entity>,
    memory: Dram,
}

#[derive(Default)]
struct HostEndpoint {
    outstanding: usize,
    read_data: VecDeque<u32>,
    finished: VecDeque<Coordinate>,
}

pub struct Manycore {
    pub entity: Rc<Entity>,
    config: ManycoreConfig,
    cycle: u64,
    tiles: Vec<TileSlot>,
    drams: Vec<DramBank>,
    network: Network,
    barriers: BarrierManager,
    host: HostEndpoint,
    trace_enabled: bool,
    stats: Stats,
}

impl Manycore {
    /// Build the machine. Every tile starts frozen with zeroed DMEM.
    pub fn new(
        parent: &Rc<Entity>,
        config: ManycoreConfig,
        factory: TileFactory,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let entity = Rc::new(Entity::new(parent, "manycore"));

        let tiles = config
            .vcore_coordinates()
            .map(|coord| TileSlot {
                state: TileState::new(&entity, coord, &config),
                behaviour: factory(coord),
            })
            .collect();

        let drams = (0..config.num_dram())
            .map(|i| DramBank {
                entity: Rc::new(Entity::new(&entity, &format!("dram_{i}"))),
                memory: Dram::new(config.dram_bank_size_bytes),
            })
            .collect();

        info!(entity ; "{}x{} tiles at {}, host at {}",
            config.dimension_vcore.x, config.dimension_vcore.y,
            config.origin_vcore, config.host_coordinate);

        Ok(Self {
            barriers: BarrierManager::new(&entity),
            network: Network::new(config.hop_latency_cycles),
            entity,
            config,
            cycle: 0,
            tiles,
            drams,
            host: HostEndpoint::default(),
            trace_enabled: false,
            stats: Stats::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ManycoreConfig {
        &self.config
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Runtime state of the tile at `coord`.
    #[must_use]
    pub fn tile(&self, coord: &Coordinate) -> Option<&TileState> {
        self.config
            .vcore_index(coord)
            .map(|index| &self.tiles[index].state)
    }

    #[must_use]
    pub fn barriers(&self) -> &BarrierManager {
        &self.barriers
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        let mut stats = self.stats.clone();
        for bank in &self.drams {
            stats.dram.bytes_read += bank.memory.metrics().bytes_read;
            stats.dram.bytes_written += bank.memory.metrics().bytes_written;
        }
        stats
    }

    pub fn npa_to_eva(
        &self,
        map: &dyn AddressMap,
        src: &Coordinate,
        npa: &Npa,
    ) -> Result<(Eva, usize), SimError> {
        map.npa_to_eva(&self.config, src, npa)
    }

    fn check_endpoint(&self, npa: &Npa) -> SimResult {
        let coord = npa.coordinate();
        if self.config.is_vcore(&coord) || self.config.dram_index(&coord).is_some() {
            Ok(())
        } else {
            sim_error!(format!("no memory endpoint at {npa}"))
        }
    }

    fn host_send(&mut self, req: RequestPacket) {
        self.host.outstanding += 1;
        self.stats.host_requests += 1;
        self.network.send(Packet::Request(req), self.cycle, 0);
    }

    /// Write consecutive words starting at `npa`.
    pub fn write_mem(&mut self, npa: &Npa, data: &[u32]) -> SimResult {
        self.check_endpoint(npa)?;
        let host = self.config.host_coordinate;
        for (i, word) in data.iter().enumerate() {
            let dst = npa.offset_words(i)?;
            self.host_send(RequestPacket::write(host, dst, *word));
        }
        Ok(())
    }

    /// Read consecutive words starting at `npa`. The machine is stepped
    /// until every word has come back.
    pub fn read_mem(&mut self, npa: &Npa, buf: &mut [u32]) -> SimResult {
        self.check_endpoint(npa)?;
        self.host.read_data.clear();
        let host = self.config.host_coordinate;
        for i in 0..buf.len() {
            let dst = npa.offset_words(i)?;
            self.host_send(RequestPacket::read(host, dst));
        }
        let wanted = buf.len();
        self.run_until(None, "read_mem", |mc| mc.host.read_data.len() >= wanted)?;
        for (slot, word) in buf.iter_mut().zip(self.host.read_data.drain(..)) {
            *slot = word;
        }
        Ok(())
    }

    /// Write words at an EVA as seen by `src`, splitting the access where
    /// the mapping stops being contiguous.
    pub fn eva_write(
        &mut self,
        map: &dyn AddressMap,
        src: &Coordinate,
        eva: Eva,
        data: &[u32],
    ) -> SimResult {
        let mut done = 0;
        while done < data.len() {
            let (npa, bytes) = map.eva_to_npa(&self.config, src, eva_offset(eva, done)?)?;
            let words = (bytes / 4).clamp(1, data.len() - done);
            self.write_mem(&npa, &data[done..done + words])?;
            done += words;
        }
        Ok(())
    }

    /// Read words at an EVA as seen by `src`.
    pub fn eva_read(
        &mut self,
        map: &dyn AddressMap,
        src: &Coordinate,
        eva: Eva,
        buf: &mut [u32],
    ) -> SimResult {
        let mut done = 0;
        while done < buf.len() {
            let (npa, bytes) = map.eva_to_npa(&self.config, src, eva_offset(eva, done)?)?;
            let words = (bytes / 4).clamp(1, buf.len() - done);
            self.read_mem(&npa, &mut buf[done..done + words])?;
            done += words;
        }
        Ok(())
    }

    fn check_tile(&self, target: &Coordinate) -> SimResult {
        if self.config.is_vcore(target) {
            Ok(())
        } else {
            sim_error!(format!("{target} is not a tile"))
        }
    }

    /// Point a tile at the origin of its tile group.
    pub fn tile_set_origin(&mut self, target: &Coordinate, origin: &Coordinate) -> SimResult {
        self.check_tile(target)?;
        let host = self.config.host_coordinate;
        self.host_send(RequestPacket::write(
            host,
            Npa::new(*target, TILE_EPA_CSR_TG_ORIGIN_X),
            origin.x,
        ));
        self.host_send(RequestPacket::write(
            host,
            Npa::new(*target, TILE_EPA_CSR_TG_ORIGIN_Y),
            origin.y,
        ));
        Ok(())
    }

    pub fn tile_unfreeze(&mut self, target: &Coordinate) -> SimResult {
        self.check_tile(target)?;
        let host = self.config.host_coordinate;
        self.host_send(RequestPacket::write(
            host,
            Npa::new(*target, TILE_EPA_CSR_FREEZE),
            0,
        ));
        Ok(())
    }

    pub fn tile_freeze(&mut self, target: &Coordinate) -> SimResult {
        self.check_tile(target)?;
        let host = self.config.host_coordinate;
        self.host_send(RequestPacket::write(
            host,
            Npa::new(*target, TILE_EPA_CSR_FREEZE),
            1,
        ));
        Ok(())
    }

    /// Step until every host request has been answered.
    pub fn host_request_fence(&mut self, timeout: Option<u64>) -> SimResult {
        self.run_until(timeout, "host_request_fence", |mc| mc.host.outstanding == 0)
    }

    pub fn trace_enable(&mut self) -> SimResult {
        info!(self.entity ; "trace enabled at cycle {}", self.cycle);
        self.trace_enabled = true;
        Ok(())
    }

    pub fn trace_disable(&mut self) -> SimResult {
        info!(self.entity ; "trace disabled at cycle {}", self.cycle);
        self.trace_enabled = false;
        Ok(())
    }

    /// Step until a finish packet reaches the host and return its sender.
    pub fn wait_finish(&mut self, timeout: Option<u64>) -> Result<Coordinate, SimError> {
        self.run_until(timeout, "wait_finish", |mc| !mc.host.finished.is_empty())?;
        match self.host.finished.pop_front() {
            Some(coord) => Ok(coord),
            None => sim_error!("wait_finish: no finish packet"),
        }
    }

    /// Shut the machine down. Fails if anything is still in flight.
    pub fn exit(self) -> SimResult {
        if !self.network.is_empty() {
            return sim_error!(format!(
                "exit with {} packets still in flight",
                self.network.in_flight()
            ));
        }
        let stats = self.stats();
        info!(self.entity ; "exit at cycle {}: {} tile requests, {} host requests, {} DRAM bytes read",
            self.cycle, stats.tile_requests, stats.host_requests, stats.dram.bytes_read);
        Ok(())
    }

    /// Could stepping ever change anything?
    fn can_progress(&self) -> bool {
        !self.network.is_empty() || self.tiles.iter().any(|t| t.state.is_runnable())
    }

    fn run_until(
        &mut self,
        timeout: Option<u64>,
        what: &str,
        done: impl Fn(&Self) -> bool,
    ) -> SimResult {
        let start = self.cycle;
        while !done(&*self) {
            if let Some(timeout) = timeout {
                if self.cycle - start >= timeout {
                    return sim_error!(format!(
                        "{what}: timed out after {timeout} cycles at cycle {}",
                        self.cycle
                    ));
                }
            }
            if !self.can_progress() {
                return sim_error!(format!(
                    "{what}: no tile is running and nothing is in flight at cycle {}",
                    self.cycle
                ));
            }
            self.step()?;
        }
        Ok(())
    }

    /// Advance the machine by one cycle.
    pub fn step(&mut self) -> SimResult {
        self.cycle += 1;
        set_cycle!(self.entity ; self.cycle);

        let config = &self.config;
        let delivered = self.network.deliver(self.cycle, |dst| {
            if config.dram_index(dst).is_some() {
                config.dram_requests_per_cycle
            } else {
                1
            }
        });
        for packet in delivered {
            if self.trace_enabled {
                trace!(self.entity ; "{packet}");
            }
            match packet {
                Packet::Request(req) => self.service_request(req)?,
                Packet::Response(rsp) => self.accept_response(rsp)?,
            }
        }

        self.offer_cycle_to_tiles()
    }

    fn service_request(&mut self, req: RequestPacket) -> SimResult {
        let dst = req.dst.coordinate();

        if let Some(index) = self.config.vcore_index(&dst) {
            let slot = &mut self.tiles[index];
            let mut ctx = TileContext::new(
                &mut slot.state,
                &mut self.barriers,
                &self.config,
                self.cycle,
            );
            let rsp = slot.behaviour.execute_request(&mut ctx, &req)?;
            self.network.send(Packet::Response(rsp), self.cycle, 0);
            return Ok(());
        }

        if let Some(bank) = self.config.dram_index(&dst) {
            let bank = &mut self.drams[bank as usize];
            let data = match req.op {
                Opcode::Read => bank.memory.read_word(req.dst.epa)?,
                Opcode::Write => {
                    bank.memory.write_word(req.dst.epa, req.data)?;
                    0
                }
                op => {
                    return sim_error!(format!("{}: DRAM cannot service {op}", bank.entity));
                }
            };
            self.network.send(
                Packet::Response(req.response(data)),
                self.cycle,
                self.config.dram_latency_cycles,
            );
            return Ok(());
        }

        if dst == self.config.host_coordinate && req.op.is_marker() {
            self.record_marker(&req);
            self.network
                .send(Packet::Response(req.response(0)), self.cycle, 0);
            return Ok(());
        }

        sim_error!(format!("no endpoint can service {req}"))
    }

    fn record_marker(&mut self, req: &RequestPacket) {
        match req.op {
            Opcode::KernelStart => {
                info!(self.entity ; "{}: kernel start at cycle {}", req.src, self.cycle);
                self.stats.kernel_start_cycle = Some(self.cycle);
            }
            Opcode::KernelEnd => {
                info!(self.entity ; "{}: kernel end at cycle {}", req.src, self.cycle);
                self.stats.kernel_end_cycle = Some(self.cycle);
            }
            Opcode::Finish => {
                debug!(self.entity ; "{}: finish at cycle {}", req.src, self.cycle);
                self.stats.finish_cycles.push((req.src, self.cycle));
                self.host.finished.push_back(req.src);
            }
            Opcode::Read | Opcode::Write => {}
        }
    }

    fn accept_response(&mut self, rsp: ResponsePacket) -> SimResult {
        if rsp.dst == self.config.host_coordinate {
            match self.host.outstanding.checked_sub(1) {
                Some(outstanding) => self.host.outstanding = outstanding,
                None => return sim_error!(format!("host has nothing outstanding for {rsp}")),
            }
            if rsp.op == Opcode::Read {
                self.host.read_data.push_back(rsp.data);
            }
            return Ok(());
        }

        let Some(index) = self.config.vcore_index(&rsp.dst) else {
            return sim_error!(format!("no endpoint can accept {rsp}"));
        };
        let slot = &mut self.tiles[index];
        for rsp in slot.state.response_received(rsp)? {
            let mut ctx = TileContext::new(
                &mut slot.state,
                &mut self.barriers,
                &self.config,
                self.cycle,
            );
            slot.behaviour.receive_response(&mut ctx, &rsp)?;
        }
        Ok(())
    }

    fn offer_cycle_to_tiles(&mut self) -> SimResult {
        let credits = self.config.max_out_credits;
        for slot in &mut self.tiles {
            if !slot.state.is_runnable() || slot.state.outstanding() >= credits {
                continue;
            }
            let mut ctx = TileContext::new(
                &mut slot.state,
                &mut self.barriers,
                &self.config,
                self.cycle,
            );
            let Some(mut req) = slot.behaviour.send_request(&mut ctx)? else {
                continue;
            };
            if req.src != slot.state.coordinate() {
                return sim_error!(format!(
                    "{}: request claims to come from {}",
                    slot.state.coordinate(),
                    req.src
                ));
            }
            slot.state.request_sent(&mut req);
            self.stats.tile_requests += 1;
            if self.trace_enabled {
                trace!(slot.state.entity ; "{req}");
            }
            self.network.send(Packet::Request(req), self.cycle, 0);
        }
        Ok(())
    }
}

fn eva_offset(eva: Eva, words: usize) -> Result<Eva, SimError> {
    let offset = u32::try_from(words)
        .ok()
        .and_then(|w| w.checked_mul(4))
        .and_then(|b| eva.checked_add(b));
    match offset {
        Some(eva) => Ok(eva),
        None => sim_error!(format!("EVA 0x{eva:08x} + {words} words overflows")),
    }
}
