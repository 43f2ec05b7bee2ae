// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The strided-read traffic generator.

use manycore_sim::packet::{RequestPacket, ResponsePacket};
use manycore_sim::tile::{DpiTile, TileContext, TilePort};
use manycore_sim::types::{Coordinate, SimError, SimResult};
use manycore_track::{debug, info, warn};

use crate::linear_inorder::layout::{BASE, ITER, LIMIT, NELS, OFFSET, RESULT, STRIDE, TG_X, TG_Y};

/// Which tile of the group signals the kernel boundaries.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    Origin,
    Member,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    BarrierStart,
    KernelStart,
    StartFence,
    Fetch,
    Drain,
    BarrierEnd,
    KernelEnd,
    Finish,
    Done,
}

/// Each tile reads `limit` elements of a DRAM buffer, element `k` being
/// `(k * stride + offset) % nels`, and divides its result by each value in
/// the order the responses arrive.
///
/// The phase lives here; the iteration counter lives in DMEM where the host
/// initialised it. Waiting phases that clear fall through to the next phase
/// in the same call, but at most one packet is returned per call.
pub struct LinearInorderTile {
    role: Role,
    phase: Phase,
}

impl LinearInorderTile {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            phase: Phase::BarrierStart,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Advance by one cycle, returning the packet to send, if any.
    pub fn step<P: TilePort>(&mut self, port: &mut P) -> Result<Option<RequestPacket>, SimError> {
        let tg_dim = {
            let dmem = port.dmem();
            Coordinate::new(dmem.read(&TG_X)?, dmem.read(&TG_Y)?)
        };

        loop {
            match self.phase {
                Phase::BarrierStart => {
                    if port.wait_at_barrier(0, tg_dim) {
                        return Ok(None);
                    }
                    self.phase = match self.role {
                        Role::Origin => Phase::KernelStart,
                        Role::Member => Phase::Fetch,
                    };
                }
                Phase::KernelStart => {
                    info!(port.entity() ; "Start Cycle: {}", port.cycle());
                    self.phase = Phase::StartFence;
                    return Ok(Some(port.kernel_start()));
                }
                Phase::StartFence => {
                    if port.fence() {
                        return Ok(None);
                    }
                    self.phase = Phase::Fetch;
                }
                Phase::Fetch => {
                    if let Some(eva) = next_address(port)? {
                        return Ok(port.read_request(eva));
                    }
                    self.phase = Phase::Drain;
                }
                Phase::Drain => {
                    if port.fence() {
                        return Ok(None);
                    }
                    self.phase = Phase::BarrierEnd;
                }
                Phase::BarrierEnd => {
                    if port.wait_at_barrier(1, tg_dim) {
                        return Ok(None);
                    }
                    self.phase = match self.role {
                        Role::Origin => Phase::KernelEnd,
                        Role::Member => Phase::Finish,
                    };
                }
                Phase::KernelEnd => {
                    self.phase = Phase::Finish;
                    return Ok(Some(port.kernel_end()));
                }
                Phase::Finish => {
                    info!(port.entity() ; "Finish Cycle: {}", port.cycle());
                    port.set_finished();
                    self.phase = Phase::Done;
                    return Ok(Some(port.finish()));
                }
                Phase::Done => return Ok(None),
            }
        }
    }

    /// Fold one returned element into the result.
    pub fn accumulate<P: TilePort>(&mut self, port: &mut P, data: u32) -> SimResult {
        let dmem = port.dmem_mut();
        let result = f32::from_bits(dmem.read(&RESULT)?) / f32::from_bits(data);
        dmem.write(&RESULT, result.to_bits())
    }
}

/// Claim the next element address, advancing the counter in DMEM. Returns
/// `None` once the iteration limit is reached.
fn next_address<P: TilePort>(port: &mut P) -> Result<Option<u32>, SimError> {
    let dmem = port.dmem();
    let iter = dmem.read(&ITER)?;
    let limit = dmem.read(&LIMIT)?;
    if iter >= limit {
        return Ok(None);
    }
    let nels = dmem.read(&NELS)?;
    if nels == 0 {
        warn!(port.entity() ; "buffer has no elements, skipping {} reads", limit - iter);
        return Ok(None);
    }
    let base = dmem.read(&BASE)?;
    let stride = dmem.read(&STRIDE)?;
    let offset = dmem.read(&OFFSET)?;

    let element = iter.wrapping_mul(stride).wrapping_add(offset) % nels;
    let eva = base.wrapping_add(element.wrapping_mul(4));
    port.dmem_mut().write(&ITER, iter + 1)?;
    debug!(port.entity() ; "iter {iter}: element {element} at 0x{eva:08x}");
    Ok(Some(eva))
}

impl DpiTile for LinearInorderTile {
    fn send_request(&mut self, ctx: &mut TileContext) -> Result<Option<RequestPacket>, SimError> {
        self.step(ctx)
    }

    fn receive_response(&mut self, ctx: &mut TileContext, rsp: &ResponsePacket) -> SimResult {
        self.accumulate(ctx, rsp.data)
    }
}
