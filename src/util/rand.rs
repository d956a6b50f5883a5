//! Randomization utilities

use rand::Rng;
use std::ops::Range;

/// Range a SOCKS port is picked from when none is configured
pub const RANDOM_SOCKS_PORTS: Range<u16> = 60000..61000;

/// Pick a random SOCKS port from [`RANDOM_SOCKS_PORTS`]
pub fn random_socks_port() -> u16 {
    let mut rng = rand::thread_rng();
    rng.gen_range(RANDOM_SOCKS_PORTS)
}
