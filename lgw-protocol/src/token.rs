//! Datagram token generation.

use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;

use crate::datagram::Token;

/// A pseudo-random source of datagram tokens.
///
/// Seed it once at startup from whatever entropy the board offers (a
/// hardware RNG read, the wideband RSSI register, a boot counter).
pub struct TokenSource {
    rng: WyRand,
}

impl TokenSource {
    /// Creates a token source from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: WyRand::seed_from_u64(seed),
        }
    }

    /// Returns the next token.
    pub fn next_token(&mut self) -> Token {
        Token(self.rng.next_u32() as u16)
    }
}
