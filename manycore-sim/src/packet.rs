// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Request and response packets exchanged over the network.

use std::fmt;

use crate::address::Npa;
use crate::types::Coordinate;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Opcode {
    Read,
    Write,
    /// Marks the start of the measured kernel region.
    KernelStart,
    /// Marks the end of the measured kernel region.
    KernelEnd,
    /// Tells the host that the sending tile is done.
    Finish,
}

impl Opcode {
    /// Markers are addressed to the host and carry no memory access.
    #[must_use]
    pub fn is_marker(self) -> bool {
        matches!(self, Opcode::KernelStart | Opcode::KernelEnd | Opcode::Finish)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Opcode::Read => "read",
            Opcode::Write => "write",
            Opcode::KernelStart => "kernel_start",
            Opcode::KernelEnd => "kernel_end",
            Opcode::Finish => "finish",
        };
        f.write_str(s)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RequestPacket {
    pub src: Coordinate,
    pub dst: Npa,
    pub op: Opcode,
    pub data: u32,
    /// Issue order of a tile's reads, set by the runtime when the request
    /// leaves the tile. Copied into the response.
    pub tag: u32,
}

impl RequestPacket {
    #[must_use]
    pub fn read(src: Coordinate, dst: Npa) -> Self {
        Self {
            src,
            dst,
            op: Opcode::Read,
            data: 0,
            tag: 0,
        }
    }

    #[must_use]
    pub fn write(src: Coordinate, dst: Npa, data: u32) -> Self {
        Self {
            src,
            dst,
            op: Opcode::Write,
            data,
            tag: 0,
        }
    }

    #[must_use]
    pub fn marker(src: Coordinate, host: Coordinate, op: Opcode) -> Self {
        Self {
            src,
            dst: Npa::new(host, 0),
            op,
            data: 0,
            tag: 0,
        }
    }

    /// Build the response to this request.
    #[must_use]
    pub fn response(&self, data: u32) -> ResponsePacket {
        ResponsePacket {
            src: self.dst.coordinate(),
            dst: self.src,
            op: self.op,
            data,
            tag: self.tag,
        }
    }
}

impl fmt::Display for RequestPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "req {} {} -> {} data=0x{:08x} tag={}",
            self.op, self.src, self.dst, self.data, self.tag
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResponsePacket {
    pub src: Coordinate,
    pub dst: Coordinate,
    pub op: Opcode,
    pub data: u32,
    pub tag: u32,
}

impl fmt::Display for ResponsePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rsp {} {} -> {} data=0x{:08x} tag={}",
            self.op, self.src, self.dst, self.data, self.tag
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_swaps_endpoints() {
        let mut req = RequestPacket::read(Coordinate::new(1, 1), Npa::new(Coordinate::new(2, 5), 8));
        req.tag = 7;
        let rsp = req.response(42);
        assert_eq!(rsp.tag, 7);
        assert_eq!(rsp.src, Coordinate::new(2, 5));
        assert_eq!(rsp.dst, Coordinate::new(1, 1));
        assert_eq!(rsp.op, Opcode::Read);
        assert_eq!(rsp.data, 42);
    }

    #[test]
    fn markers() {
        let finish = RequestPacket::marker(Coordinate::new(1, 1), Coordinate::new(0, 0), Opcode::Finish);
        assert!(finish.op.is_marker());
        assert_eq!(finish.dst.coordinate(), Coordinate::new(0, 0));
        assert!(!Opcode::Write.is_marker());
        assert_eq!(format!("{}", Opcode::KernelEnd), "kernel_end");
    }
}
