//! Server network layer: UDP transport and the loop that owns the world

use crate::codec;
use crate::config::ServerConfig;
use crate::session::SessionManager;
use crate::world::World;
use log::{debug, error, info, warn};
use shared::{
    decode_client_message, encode_packet, ClientMessage, Packet, MAX_DATAGRAM_SIZE,
    PROTOCOL_VERSION, TICK_RATE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from the receiver task to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Received {
        message: ClientMessage,
        addr: SocketAddr,
    },
}

/// Encoded datagrams queued for the sender task
#[derive(Debug)]
pub enum Outbound {
    SendTo {
        bytes: Vec<u8>,
        addr: SocketAddr,
    },
    Broadcast {
        bytes: Vec<u8>,
        addrs: Vec<SocketAddr>,
    },
}

/// Authoritative server: the only owner of the world and the session table
pub struct Server {
    socket: Arc<UdpSocket>,
    config: ServerConfig,
    world: World,
    sessions: SessionManager,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: Option<mpsc::Receiver<Outbound>>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let world = match config.seed {
            Some(seed) => World::with_seed(config.world.clone(), seed),
            None => World::new(config.world.clone()),
        };
        let sessions = SessionManager::new(config.max_sessions, config.session_timeout);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue.max(1));

        Ok(Server {
            socket,
            config,
            world,
            sessions,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that decodes incoming datagrams for the main loop
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_client_message(&buffer[..len]) {
                        Ok(message) => {
                            if let Err(e) = server_tx.send(ServerMessage::Received { message, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => debug!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that writes queued datagrams to the socket
    fn spawn_network_sender(&mut self) {
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(outbound) = outbound_rx.recv().await {
                match outbound {
                    Outbound::SendTo { bytes, addr } => {
                        if let Err(e) = socket.send_to(&bytes, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    Outbound::Broadcast { bytes, addrs } => {
                        for addr in addrs {
                            if let Err(e) = socket.send_to(&bytes, addr).await {
                                error!("Failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    fn encode(packet: &Packet) -> Option<Vec<u8>> {
        let bytes = match encode_packet(packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode packet: {}", e);
                return None;
            }
        };
        if bytes.len() > MAX_DATAGRAM_SIZE {
            warn!(
                "Dropping {} byte packet, larger than a datagram",
                bytes.len()
            );
            return None;
        }
        Some(bytes)
    }

    /// Hands a datagram to the sender task without waiting. When the queue is
    /// full the datagram is dropped.
    fn queue(&self, outbound: Outbound) -> bool {
        match self.outbound_tx.try_send(outbound) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full, dropping packet");
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!("Outbound queue closed");
                false
            }
        }
    }

    fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Some(bytes) = Self::encode(packet) {
            self.queue(Outbound::SendTo { bytes, addr });
        }
    }

    /// Queues a packet for every session. Returns whether it was queued.
    fn broadcast_packet(&self, packet: &Packet) -> bool {
        let addrs = self.sessions.addrs();
        if addrs.is_empty() {
            return false;
        }
        match Self::encode(packet) {
            Some(bytes) => self.queue(Outbound::Broadcast { bytes, addrs }),
            None => false,
        }
    }

    fn reject(&self, addr: SocketAddr, reason: &str) {
        info!("Rejecting {}: {}", addr, reason);
        self.send_packet(
            &Packet::Disconnected {
                reason: reason.to_string(),
            },
            addr,
        );
    }

    /// Applies one validated client message
    pub fn handle_message(&mut self, message: ClientMessage, addr: SocketAddr) {
        match message {
            ClientMessage::Connect { protocol_version } => {
                if protocol_version != PROTOCOL_VERSION {
                    self.reject(addr, "Protocol version mismatch");
                    return;
                }
                if self.sessions.open(addr).is_err() {
                    self.reject(addr, "Server full");
                }
            }

            ClientMessage::Join { name, color } => {
                if self.sessions.open(addr).is_err() {
                    self.reject(addr, "Server full");
                    return;
                }

                let id = self.world.add_player(name, color);
                if let Some(previous) = self.sessions.bind_player(addr, id) {
                    self.world.remove_player(previous);
                }

                self.send_packet(&Packet::IdentityAssigned { id }, addr);
                self.send_packet(&codec::initial_food_snapshot(&self.world), addr);
            }

            ClientMessage::Input { angle, boosting } => {
                if !self.sessions.touch(addr) {
                    return;
                }
                if let Some(id) = self.sessions.player_for(addr) {
                    self.world.handle_input(id, angle, boosting);
                }
            }

            ClientMessage::Leave => self.disconnect(addr),

            ClientMessage::RequestFood => {
                if self.sessions.touch(addr) {
                    debug!("Resending food field to {}", addr);
                    self.send_packet(&codec::initial_food_snapshot(&self.world), addr);
                }
            }
        }
    }

    /// Closes the session and despawns its snake immediately
    pub fn disconnect(&mut self, addr: SocketAddr) {
        if let Some(id) = self.sessions.close(addr) {
            self.world.remove_player(id);
        }
    }

    /// Advances the world one step and broadcasts the results
    pub fn run_tick(&mut self) {
        let outcome = self.world.tick();

        for kill in &outcome.kills {
            self.sessions.release_player(kill.victim);
            info!("{} was killed by {}", kill.victim_name, kill.killer_name);
            self.broadcast_packet(&codec::kill_notification(kill));
        }

        // Taken every tick so the delta never spans more than one snapshot.
        let delta = self.world.take_food_delta();
        if !self.sessions.is_empty() {
            let parts = codec::world_snapshot(&self.world, &delta);
            let mut parts = parts.iter();
            let food_sent = parts.next().is_some_and(|part| self.broadcast_packet(part));
            for part in parts {
                self.broadcast_packet(part);
            }
            if !food_sent {
                self.world.restore_food_delta(delta);
            }
        }

        let tick = self.world.tick_count();
        if tick % (TICK_RATE * 10) == 0 && !self.sessions.is_empty() {
            debug!(
                "Tick {}: {} sessions, {} players, {} food",
                tick,
                self.sessions.len(),
                self.world.player_count(),
                self.world.food_count()
            );
        }
    }

    pub fn sweep_timeouts(&mut self) {
        for (_, player) in self.sessions.check_timeouts() {
            if let Some(id) = player {
                self.world.remove_player(id);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_interval = interval(Duration::from_secs(1));
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Received { message, addr }) => {
                            self.handle_message(message, addr);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => self.run_tick(),

                _ = sweep_interval.tick() => self.sweep_timeouts(),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use shared::{decode_packet, PlayerId, INITIAL_FOOD};
    use std::time::Instant;

    async fn test_server(config: ServerConfig) -> Server {
        Server::new("127.0.0.1:0", config).await.unwrap()
    }

    fn seeded() -> ServerConfig {
        ServerConfig {
            seed: Some(17),
            ..ServerConfig::default()
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    /// Decodes everything queued for the sender so far.
    fn drain(server: &mut Server) -> Vec<(Packet, Vec<SocketAddr>)> {
        let rx = server.outbound_rx.as_mut().unwrap();
        let mut out = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            let (bytes, addrs) = match outbound {
                Outbound::SendTo { bytes, addr } => (bytes, vec![addr]),
                Outbound::Broadcast { bytes, addrs } => (bytes, addrs),
            };
            out.push((decode_packet(&bytes).unwrap(), addrs));
        }
        out
    }

    fn join(server: &mut Server, port: u16, name: &str) -> PlayerId {
        server.handle_message(
            ClientMessage::Join {
                name: name.to_string(),
                color: "#00ff00".to_string(),
            },
            addr(port),
        );
        server.sessions.player_for(addr(port)).unwrap()
    }

    #[tokio::test]
    async fn test_join_replies_with_identity_then_food() {
        let mut server = test_server(seeded()).await;
        let id = join(&mut server, 9000, "Viper");

        let sent = drain(&mut server);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Packet::IdentityAssigned { id });
        assert_eq!(sent[0].1, vec![addr(9000)]);
        match &sent[1].0 {
            Packet::InitialFood { food } => assert_eq!(food.len(), INITIAL_FOOD),
            other => panic!("Unexpected packet {:?}", other),
        }
        assert_eq!(server.world.player(id).unwrap().name, "Viper");
    }

    #[tokio::test]
    async fn test_connect_version_mismatch() {
        let mut server = test_server(seeded()).await;
        server.handle_message(
            ClientMessage::Connect {
                protocol_version: PROTOCOL_VERSION + 1,
            },
            addr(9000),
        );

        assert!(server.sessions.is_empty());
        let sent = drain(&mut server);
        assert!(matches!(sent[0].0, Packet::Disconnected { .. }));
    }

    #[tokio::test]
    async fn test_connect_opens_spectator_session() {
        let mut server = test_server(seeded()).await;
        server.handle_message(
            ClientMessage::Connect {
                protocol_version: PROTOCOL_VERSION,
            },
            addr(9000),
        );

        assert!(server.sessions.contains(addr(9000)));
        assert_eq!(server.sessions.player_for(addr(9000)), None);

        server.run_tick();
        let sent = drain(&mut server);
        assert!(matches!(sent[0].0, Packet::WorldSnapshot { .. }));
        assert_eq!(sent[0].1, vec![addr(9000)]);
    }

    #[tokio::test]
    async fn test_server_full() {
        let mut server = test_server(ServerConfig {
            max_sessions: 1,
            ..seeded()
        })
        .await;
        join(&mut server, 9000, "First");
        drain(&mut server);

        server.handle_message(
            ClientMessage::Join {
                name: "Second".to_string(),
                color: "#0000ff".to_string(),
            },
            addr(9001),
        );

        assert_eq!(server.world.player_count(), 1);
        let sent = drain(&mut server);
        assert_eq!(
            sent[0].0,
            Packet::Disconnected {
                reason: "Server full".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_rejoin_replaces_live_player() {
        let mut server = test_server(seeded()).await;
        let first = join(&mut server, 9000, "Viper");
        let second = join(&mut server, 9000, "Viper");

        assert_ne!(first, second);
        assert!(server.world.player(first).is_none());
        assert!(server.world.player(second).is_some());
        assert_eq!(server.world.player_count(), 1);
    }

    #[tokio::test]
    async fn test_input_reaches_bound_player_only() {
        let mut server = test_server(seeded()).await;
        let id = join(&mut server, 9000, "Viper");

        server.handle_message(
            ClientMessage::Input {
                angle: 1.0,
                boosting: true,
            },
            addr(9000),
        );
        server.handle_message(
            ClientMessage::Input {
                angle: -2.0,
                boosting: false,
            },
            addr(9001),
        );

        let player = server.world.player(id).unwrap();
        assert_eq!(player.angle, 1.0);
        assert!(player.boost_intent);
        assert!(!server.sessions.contains(addr(9001)));
    }

    #[tokio::test]
    async fn test_leave_despawns_immediately() {
        let mut server = test_server(seeded()).await;
        let id = join(&mut server, 9000, "Viper");

        server.handle_message(ClientMessage::Leave, addr(9000));

        assert!(server.world.player(id).is_none());
        assert!(server.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_death_unbinds_and_notifies() {
        let mut server = test_server(ServerConfig {
            world: WorldConfig {
                initial_food: 0,
                ..WorldConfig::default()
            },
            ..seeded()
        })
        .await;
        let big = join(&mut server, 9000, "Big");
        let small = join(&mut server, 9001, "Small");
        for (id, score) in [(big, 20.0), (small, 5.0)] {
            let player = server.world.player_mut(id).unwrap();
            player.x = 1000.0;
            player.y = 1000.0;
            player.score = score;
            for segment in player.segments.iter_mut() {
                *segment = (1000.0, 1000.0);
            }
            player.settle();
        }
        drain(&mut server);

        server.run_tick();

        assert_eq!(server.sessions.player_for(addr(9001)), None);
        assert!(server.sessions.contains(addr(9001)));
        assert_eq!(server.sessions.player_for(addr(9000)), Some(big));

        let sent = drain(&mut server);
        assert_eq!(sent.len(), 2);
        match &sent[0].0 {
            Packet::KillNotification {
                killer_name,
                victim_name,
                ..
            } => {
                assert_eq!(killer_name, "Big");
                assert_eq!(victim_name, "Small");
            }
            other => panic!("Unexpected packet {:?}", other),
        }
        match &sent[1].0 {
            Packet::WorldSnapshot { players, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, big);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_sweep_despawns() {
        let mut server = test_server(ServerConfig {
            session_timeout: Duration::from_millis(0),
            ..seeded()
        })
        .await;
        let id = join(&mut server, 9000, "Viper");
        std::thread::sleep(Duration::from_millis(5));

        server.sweep_timeouts();

        assert!(server.world.player(id).is_none());
        assert!(server.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_full_outbound_queue_drops_snapshots() {
        let mut server = test_server(ServerConfig {
            outbound_queue: 1,
            ..seeded()
        })
        .await;
        join(&mut server, 9000, "Viper");
        drain(&mut server);

        let start = Instant::now();
        server.run_tick();
        let dropped = server.world.food_mut().insert(20.0, 20.0, 4);
        for _ in 0..4 {
            server.run_tick();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(drain(&mut server).len(), 1);

        // Food changes from the dropped ticks ride along with the next one.
        server.run_tick();
        let sent = drain(&mut server);
        match &sent[0].0 {
            Packet::WorldSnapshot { new_food, .. } => {
                assert!(new_food.iter().any(|food| food.id == dropped));
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_crowded_tick_is_split_across_datagrams() {
        let mut server = test_server(seeded()).await;
        for i in 0..64 {
            let id = join(&mut server, 9000 + i, &format!("P{}", i));
            let player = server.world.player_mut(id).unwrap();
            player.score = 260.0;
            player.settle();
        }
        drain(&mut server);

        server.run_tick();

        let snapshots: Vec<(Packet, Vec<SocketAddr>)> = drain(&mut server)
            .into_iter()
            .filter(|(packet, _)| matches!(packet, Packet::WorldSnapshot { .. }))
            .collect();
        assert!(snapshots.len() > 1);

        let mut players_seen = 0;
        for (packet, addrs) in &snapshots {
            assert_eq!(addrs.len(), 64);
            if let Packet::WorldSnapshot {
                tick,
                parts,
                players,
                ..
            } = packet
            {
                assert_eq!(*tick, server.world.tick_count());
                assert_eq!(usize::from(*parts), snapshots.len());
                players_seen += players.len();
            }
        }
        assert_eq!(players_seen, server.world.player_count());
    }

    #[tokio::test]
    async fn test_request_food_resends_field() {
        let mut server = test_server(seeded()).await;
        join(&mut server, 9000, "Viper");
        drain(&mut server);

        server.handle_message(ClientMessage::RequestFood, addr(9000));
        server.handle_message(ClientMessage::RequestFood, addr(9001));

        let sent = drain(&mut server);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, vec![addr(9000)]);
        match &sent[0].0 {
            Packet::InitialFood { food } => assert_eq!(food.len(), server.world.food_count()),
            other => panic!("Unexpected packet {:?}", other),
        }
        assert!(!server.sessions.contains(addr(9001)));
    }

    #[test]
    fn test_oversized_packet_is_not_encoded() {
        let packet = Packet::Disconnected {
            reason: "x".repeat(MAX_DATAGRAM_SIZE),
        };
        assert!(Server::encode(&packet).is_none());
        assert!(Server::encode(&Packet::Leave).is_some());
    }
}
