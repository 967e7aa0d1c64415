//! Session tracking for the snake server
//!
//! This module maps transport addresses to sessions and sessions to players:
//! - Session lifecycle (connect, join, leave, timeout)
//! - The 1:1 binding between an address and at most one live snake
//! - Capacity management and activity tracking
//!
//! A session outlives the snakes it plays: a death only unbinds the player,
//! so the same address can join again without reconnecting.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected endpoint and the snake it currently controls
#[derive(Debug)]
pub struct Session {
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this address
    pub last_seen: Instant,
    /// The live snake bound to this session, if any
    pub player: Option<PlayerId>,
}

impl Session {
    /// Creates a spectating session marked as recently active
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            last_seen: Instant::now(),
            player: None,
        }
    }

    /// Returns true if nothing was received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Why a session could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    ServerFull,
}

/// Owns every session, indexed by address
///
/// The manager never touches the world. Callers get the bound `PlayerId`
/// back from `close` and `check_timeouts` and despawn it themselves, so the
/// world and the session table change in the same step.
pub struct SessionManager {
    sessions: HashMap<SocketAddr, Session>,
    max_sessions: usize,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(max_sessions: usize, timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            timeout,
        }
    }

    /// Opens a session for `addr`, or refreshes the existing one
    ///
    /// Returns an error only when a new session would exceed capacity.
    pub fn open(&mut self, addr: SocketAddr) -> Result<&mut Session, OpenError> {
        if !self.sessions.contains_key(&addr) && self.sessions.len() >= self.max_sessions {
            return Err(OpenError::ServerFull);
        }

        let session = self.sessions.entry(addr).or_insert_with(|| {
            info!("Session opened for {}", addr);
            Session::new(addr)
        });
        session.last_seen = Instant::now();
        Ok(session)
    }

    /// Removes the session and returns the player it was bound to
    pub fn close(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        let session = self.sessions.remove(&addr)?;
        info!("Session closed for {}", addr);
        session.player
    }

    /// Records activity; returns false for unknown addresses
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self.sessions.get_mut(&addr) {
            Some(session) => {
                session.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.sessions.contains_key(&addr)
    }

    pub fn player_for(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.sessions.get(&addr).and_then(|session| session.player)
    }

    /// Binds a freshly spawned player, returning the one it replaces
    pub fn bind_player(&mut self, addr: SocketAddr, id: PlayerId) -> Option<PlayerId> {
        self.sessions
            .get_mut(&addr)
            .and_then(|session| session.player.replace(id))
    }

    /// Unbinds a player that died, wherever it was bound
    ///
    /// Returns the address that controlled it.
    pub fn release_player(&mut self, id: PlayerId) -> Option<SocketAddr> {
        let session = self
            .sessions
            .values_mut()
            .find(|session| session.player == Some(id))?;
        session.player = None;
        Some(session.addr)
    }

    /// Closes every session silent for longer than the timeout
    ///
    /// Returns the closed addresses with the players they controlled.
    pub fn check_timeouts(&mut self) -> Vec<(SocketAddr, Option<PlayerId>)> {
        let timeout = self.timeout;
        let timed_out: Vec<SocketAddr> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.addr)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|addr| {
                let session = self.sessions.remove(&addr)?;
                info!("Session for {} timed out", addr);
                Some((addr, session.player))
            })
            .collect()
    }

    /// Addresses of every session, spectators included
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    fn session_mut(&mut self, addr: SocketAddr) -> Option<&mut Session> {
        self.sessions.get_mut(&addr)
    }
}
