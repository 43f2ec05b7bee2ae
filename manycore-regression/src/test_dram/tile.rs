// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The sequential-read traffic generator.

use manycore_sim::packet::{RequestPacket, ResponsePacket};
use manycore_sim::tile::{DpiTile, TileContext, TilePort};
use manycore_sim::types::{SimError, SimResult};
use manycore_track::{info, trace};

use crate::test_dram::layout::{BASE, NELS, PTR, RESULT};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Fetch,
    Drain,
    Finish,
    Done,
}

/// Reads `nels` consecutive words from `base`, then finishes once every
/// response has been added into the result.
pub struct TestDramTile {
    phase: Phase,
}

impl Default for TestDramTile {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDramTile {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Fetch,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step<P: TilePort>(&mut self, port: &mut P) -> Result<Option<RequestPacket>, SimError> {
        loop {
            match self.phase {
                Phase::Fetch => {
                    let dmem = port.dmem();
                    let base = dmem.read(&BASE)?;
                    let nels = dmem.read(&NELS)?;
                    let ptr = dmem.read(&PTR)?;
                    let limit = base.wrapping_add(nels.wrapping_mul(4));
                    if ptr < limit {
                        port.dmem_mut().write(&PTR, ptr.wrapping_add(4))?;
                        trace!(port.entity() ; "read 0x{ptr:08x}");
                        return Ok(port.read_request(ptr));
                    }
                    self.phase = Phase::Drain;
                }
                Phase::Drain => {
                    if port.fence() {
                        return Ok(None);
                    }
                    self.phase = Phase::Finish;
                }
                Phase::Finish => {
                    info!(port.entity() ; "finished at cycle {}", port.cycle());
                    port.set_finished();
                    self.phase = Phase::Done;
                    return Ok(Some(port.finish()));
                }
                Phase::Done => return Ok(None),
            }
        }
    }

    pub fn accumulate<P: TilePort>(&mut self, port: &mut P, data: u32) -> SimResult {
        let dmem = port.dmem_mut();
        let sum = dmem.read(&RESULT)?.wrapping_add(data);
        dmem.write(&RESULT, sum)
    }
}

impl DpiTile for TestDramTile {
    fn send_request(&mut self, ctx: &mut TileContext) -> Result<Option<RequestPacket>, SimError> {
        self.step(ctx)
    }

    fn receive_response(&mut self, ctx: &mut TileContext, rsp: &ResponsePacket) -> SimResult {
        self.accumulate(ctx, rsp.data)
    }
}

#[cfg(test)]
mod tests {
    use manycore_sim::layout::DmemRecord;
    use manycore_sim::packet::Opcode;

    use super::*;
    use crate::test_dram::layout::TestDramArgs;
    use crate::test_helpers::MockPort;

    const BASE_EVA: u32 = 0x8000_0100;

    fn port(nels: u32) -> MockPort {
        let mut port = MockPort::new(64);
        TestDramArgs {
            base: BASE_EVA,
            nels,
            ptr: BASE_EVA,
            result: 0,
        }
        .store(&mut port.dmem)
        .unwrap();
        port
    }

    #[test]
    fn sequential_addresses_without_gaps() {
        let mut port = port(32);
        let mut tile = TestDramTile::new();
        let mut reads = Vec::new();
        loop {
            let req = tile.step(&mut port).unwrap().unwrap();
            if req.op == Opcode::Finish {
                break;
            }
            reads.push(req.dst.epa);
        }
        let expected: Vec<u32> = (0..32).map(|i| BASE_EVA + i * 4).collect();
        assert_eq!(reads, expected);
        assert!(port.finished);
        for _ in 0..5 {
            assert!(tile.step(&mut port).unwrap().is_none());
        }
    }

    #[test]
    fn waits_for_outstanding_reads() {
        let mut port = port(1);
        let mut tile = TestDramTile::new();
        assert_eq!(tile.step(&mut port).unwrap().unwrap().op, Opcode::Read);
        port.outstanding = 1;
        assert!(tile.step(&mut port).unwrap().is_none());
        assert_eq!(tile.phase(), Phase::Drain);
        port.outstanding = 0;
        assert_eq!(tile.step(&mut port).unwrap().unwrap().op, Opcode::Finish);
    }

    #[test]
    fn sums_buffer() {
        let mut port = port(32);
        let mut tile = TestDramTile::new();
        for value in 0..32 {
            tile.accumulate(&mut port, value).unwrap();
        }
        assert_eq!(port.dmem.read(&RESULT).unwrap(), 496);
    }
}
