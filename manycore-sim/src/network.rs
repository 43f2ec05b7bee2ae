// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A latency-only model of the on-chip network.
//!
//! Each destination endpoint has its own FIFO. A packet becomes deliverable
//! after the Manhattan distance times the hop latency (at least one cycle)
//! plus any service delay added by the sender, but never before a packet
//! queued ahead of it for the same destination. Delivery is therefore in
//! order per destination, which makes response order match request order for
//! any single source and target pair. Reads from one tile to several targets
//! can come back out of order; the tile holds them until they can be handed
//! over in issue order.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::packet::{RequestPacket, ResponsePacket};
use crate::types::Coordinate;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Packet {
    Request(RequestPacket),
    Response(ResponsePacket),
}

impl Packet {
    #[must_use]
    pub fn source(&self) -> Coordinate {
        match self {
            Packet::Request(req) => req.src,
            Packet::Response(rsp) => rsp.src,
        }
    }

    #[must_use]
    pub fn destination(&self) -> Coordinate {
        match self {
            Packet::Request(req) => req.dst.coordinate(),
            Packet::Response(rsp) => rsp.dst,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Packet::Request(req) => req.fmt(f),
            Packet::Response(rsp) => rsp.fmt(f),
        }
    }
}

struct InFlight {
    ready_cycle: u64,
    packet: Packet,
}

pub struct Network {
    hop_latency: u64,
    queues: BTreeMap<Coordinate, VecDeque<InFlight>>,
    in_flight: usize,
}

impl Network {
    #[must_use]
    pub fn new(hop_latency: u64) -> Self {
        Self {
            hop_latency,
            queues: BTreeMap::new(),
            in_flight: 0,
        }
    }

    /// Queue a packet sent at cycle `now`. `service_cycles` is added to the
    /// transit time (used for DRAM access latency).
    pub fn send(&mut self, packet: Packet, now: u64, service_cycles: u64) {
        let hops = packet.source().hops_to(&packet.destination());
        let transit = (hops * self.hop_latency).max(1) + service_cycles;
        let queue = self.queues.entry(packet.destination()).or_default();
        let mut ready_cycle = now + transit;
        if let Some(last) = queue.back() {
            ready_cycle = ready_cycle.max(last.ready_cycle);
        }
        queue.push_back(InFlight {
            ready_cycle,
            packet,
        });
        self.in_flight += 1;
    }

    /// Remove every packet deliverable at cycle `now`, taking at most
    /// `bandwidth(dst)` packets from each destination queue.
    pub fn deliver(&mut self, now: u64, bandwidth: impl Fn(&Coordinate) -> usize) -> Vec<Packet> {
        let mut delivered = Vec::new();
        for (dst, queue) in &mut self.queues {
            let limit = bandwidth(dst);
            let mut taken = 0;
            while taken < limit && queue.front().is_some_and(|p| p.ready_cycle <= now) {
                if let Some(in_flight) = queue.pop_front() {
                    delivered.push(in_flight.packet);
                    taken += 1;
                }
            }
        }
        self.in_flight -= delivered.len();
        delivered
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight == 0
    }
}
