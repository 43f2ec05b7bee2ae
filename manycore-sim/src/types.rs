// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

// Simulation errors

#[macro_export]
/// Build a [SimError] from a message that supports `to_string`
macro_rules! sim_error {
    ($msg:expr) => {
        Err($crate::types::SimError($msg.to_string()))
    };
}

/// The `SimError` is what should be returned in the case of an error
#[derive(Debug)]
pub struct SimError(pub String);

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl Error for SimError {}

/// The SimResult is the return type for most simulation functions
pub type SimResult = Result<(), SimError>;

/// Position of an endpoint (tile, DRAM bank or host) on the network.
#[derive(
    Copy, Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

impl Coordinate {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Number of network hops between two endpoints.
    #[must_use]
    pub fn hops_to(&self, other: &Coordinate) -> u64 {
        u64::from(self.x.abs_diff(other.x)) + u64::from(self.y.abs_diff(other.y))
    }

    /// Number of tiles in a group of this extent.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y)
    }

    /// Is `self` inside the rectangle starting at `origin` of size `extent`?
    #[must_use]
    pub fn is_within(&self, origin: &Coordinate, extent: &Coordinate) -> bool {
        self.x >= origin.x
            && self.y >= origin.y
            && u64::from(self.x) < u64::from(origin.x) + u64::from(extent.x)
            && u64::from(self.y) < u64::from(origin.y) + u64::from(extent.y)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
