//! Client ↔ backend pairing.
//!
//! Every connection the poller tracks (other than the listener) has exactly one
//! entry here, and entries are always symmetric: `a → b` implies `b → a`.

use std::collections::HashMap;

use mio::Token;

use crate::relay::error::RelayError;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: HashMap<Token, Token>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `a ↔ b`. Fails if either side is already paired.
    pub fn pair(&mut self, a: Token, b: Token) -> Result<(), RelayError> {
        if a == b {
            return Err(RelayError::InvariantViolation(format!(
                "{:?} cannot be paired with itself",
                a
            )));
        }
        for token in [a, b] {
            if let Some(existing) = self.peers.get(&token) {
                return Err(RelayError::InvariantViolation(format!(
                    "{:?} is already paired with {:?}",
                    token, existing
                )));
            }
        }

        self.peers.insert(a, b);
        self.peers.insert(b, a);
        Ok(())
    }

    pub fn peer_of(&self, token: Token) -> Result<Token, RelayError> {
        self.peers
            .get(&token)
            .copied()
            .ok_or(RelayError::UnknownConnection(token))
    }

    /// Remove `token` and its peer in one step. Returns the removed peer.
    ///
    /// Removing an absent token is a no-op: both ends of a pair can report
    /// closure in the same batch.
    pub fn unpair(&mut self, token: Token) -> Option<Token> {
        let peer = self.peers.remove(&token)?;
        self.peers.remove(&peer);
        Some(peer)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.peers.contains_key(&token)
    }

    /// Number of live pairs.
    pub fn pairs(&self) -> usize {
        self.peers.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
