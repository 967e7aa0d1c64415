use crate::reconciler::ShadowState;
use log::{debug, error, info, warn};
use shared::{
    decode_packet, encode_packet, Packet, PlayerId, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long a kill stays in the feed.
pub const KILL_FEED_LIFETIME: Duration = Duration::from_secs(3);
const KILL_FEED_LEN: usize = 5;
/// How long to wait for the replies to a join before asking again.
pub const JOIN_RETRY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub enum ClientStatus {
    /// Connected, watching, no snake yet.
    Spectating,
    Playing,
    /// Our snake vanished from the snapshots.
    Dead,
    Disconnected { reason: String },
}

#[derive(Debug, Clone)]
pub struct KillFeedEntry {
    pub killer_name: String,
    pub killer_color: String,
    pub victim_name: String,
    pub victim_color: String,
    pub received: Instant,
}

/// A join whose replies have not all arrived.
#[derive(Debug)]
struct PendingJoin {
    name: String,
    color: String,
    has_identity: bool,
    has_food: bool,
    last_sent: Instant,
}

/// UDP endpoint driven from the render loop.
///
/// A tokio task reads the socket and forwards decoded packets over a
/// channel; `poll` drains that channel once per frame and returns
/// immediately.
pub struct Client {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<Packet>,
    receiver: JoinHandle<()>,
    player_id: Option<PlayerId>,
    status: ClientStatus,
    state: ShadowState,
    kill_feed: VecDeque<KillFeedEntry>,
    pending_join: Option<PendingJoin>,
    last_score: Option<u32>,
}

impl Client {
    /// Binds a local socket, starts the receiver task and greets the server.
    ///
    /// The receiver task lives on the runtime this is called from, so that
    /// runtime must outlive the client.
    pub async fn connect(server_addr: &str) -> Result<Self, BoxError> {
        let server_addr = lookup_host(server_addr)
            .await?
            .next()
            .ok_or_else(|| format!("could not resolve {}", server_addr))?;
        let bind_addr = if server_addr.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);

        let (incoming_tx, incoming) = mpsc::unbounded_channel();
        let receiver = spawn_network_receiver(Arc::clone(&socket), server_addr, incoming_tx);

        let client = Client {
            socket,
            server_addr,
            incoming,
            receiver,
            player_id: None,
            status: ClientStatus::Spectating,
            state: ShadowState::new(),
            kill_feed: VecDeque::new(),
            pending_join: None,
            last_score: None,
        };

        info!("Connecting to server at {}...", server_addr);
        client.send_packet(&Packet::Connect {
            protocol_version: PROTOCOL_VERSION,
        })?;
        Ok(client)
    }

    /// Sends without waiting. The frame loop is not a tokio task, so a full
    /// socket buffer surfaces as an error instead of a wait.
    fn send_packet(&self, packet: &Packet) -> Result<(), BoxError> {
        let data = encode_packet(packet)?;
        self.socket.try_send_to(&data, self.server_addr)?;
        Ok(())
    }

    /// Asks for a fresh snake. The request is repeated by [`Client::poll`]
    /// until both the identity and the food field have arrived.
    pub fn join(&mut self, name: &str, color: &str) -> Result<(), BoxError> {
        info!("Joining as {}", name);
        self.pending_join = Some(PendingJoin {
            name: name.to_string(),
            color: color.to_string(),
            has_identity: false,
            has_food: false,
            last_sent: Instant::now(),
        });
        self.send_packet(&Packet::Join {
            name: name.to_string(),
            color: color.to_string(),
        })
    }

    /// Sends the steering input. Also keeps the session alive while dead or
    /// spectating; the server ignores input without a bound snake.
    pub fn send_input(&self, angle: f32, boosting: bool) -> Result<(), BoxError> {
        if matches!(self.status, ClientStatus::Disconnected { .. }) {
            return Ok(());
        }
        let boosting = boosting && self.status == ClientStatus::Playing;
        self.send_packet(&Packet::Input { angle, boosting })
    }

    pub fn leave(&mut self) -> Result<(), BoxError> {
        if matches!(self.status, ClientStatus::Disconnected { .. }) {
            return Ok(());
        }
        self.status = ClientStatus::Disconnected {
            reason: "Left the game".to_string(),
        };
        self.pending_join = None;
        self.send_packet(&Packet::Leave)
    }

    /// Applies every packet received since the last call.
    pub fn poll(&mut self) {
        while let Ok(packet) = self.incoming.try_recv() {
            self.handle_packet(packet);
        }
        let now = Instant::now();
        self.retry_join(now);
        self.prune_kill_feed(now);
    }

    /// Asks again for whatever the last join has not delivered yet. A lost
    /// identity means the join itself may be lost, so the join is repeated;
    /// a lost food field is requested on its own.
    fn retry_join(&mut self, now: Instant) {
        let Some(pending) = self.pending_join.as_mut() else {
            return;
        };
        if now.duration_since(pending.last_sent) < JOIN_RETRY {
            return;
        }
        pending.last_sent = now;

        let packet = if pending.has_identity {
            Packet::RequestFood
        } else {
            Packet::Join {
                name: pending.name.clone(),
                color: pending.color.clone(),
            }
        };
        debug!("Join reply incomplete, sending {:?}", packet);
        if let Err(e) = self.send_packet(&packet) {
            warn!("Failed to repeat join: {}", e);
        }
    }

    fn settle_join(&mut self) {
        if self
            .pending_join
            .as_ref()
            .is_some_and(|pending| pending.has_identity && pending.has_food)
        {
            self.pending_join = None;
        }
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::IdentityAssigned { id } => {
                info!("Playing as {}", id);
                self.player_id = Some(id);
                self.status = ClientStatus::Playing;
                self.last_score = None;
                if let Some(pending) = self.pending_join.as_mut() {
                    pending.has_identity = true;
                }
                self.settle_join();
            }

            Packet::InitialFood { food } => {
                debug!("Received {} food items", food.len());
                self.state.apply_initial_food(food);
                if let Some(pending) = self.pending_join.as_mut() {
                    pending.has_food = true;
                }
                self.settle_join();
            }

            Packet::WorldSnapshot {
                tick,
                part,
                parts,
                players,
                eaten_food,
                new_food,
            } => {
                let fresh = self.state.apply_snapshot_part(
                    tick,
                    part,
                    parts,
                    players,
                    &eaten_food,
                    new_food,
                );
                if fresh && self.status == ClientStatus::Playing {
                    if let Some(id) = self.player_id {
                        match self.state.target(id) {
                            Some(me) => self.last_score = Some(me.score),
                            None => {
                                info!("Our snake died at tick {}", tick);
                                self.status = ClientStatus::Dead;
                            }
                        }
                    }
                }
            }

            Packet::KillNotification {
                killer_name,
                killer_color,
                victim_name,
                victim_color,
            } => {
                self.kill_feed.push_back(KillFeedEntry {
                    killer_name,
                    killer_color,
                    victim_name,
                    victim_color,
                    received: Instant::now(),
                });
                while self.kill_feed.len() > KILL_FEED_LEN {
                    self.kill_feed.pop_front();
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.player_id = None;
                self.pending_join = None;
                self.state.clear();
                self.status = ClientStatus::Disconnected { reason };
            }

            _ => warn!("Unexpected packet type"),
        }
    }

    fn prune_kill_feed(&mut self, now: Instant) {
        self.kill_feed
            .retain(|entry| now.duration_since(entry.received) < KILL_FEED_LIFETIME);
    }

    pub fn status(&self) -> &ClientStatus {
        &self.status
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Score of our snake in the last snapshot it appeared in. Survives its
    /// death so the death screen can show it.
    pub fn last_score(&self) -> Option<u32> {
        self.last_score
    }

    pub fn state(&self) -> &ShadowState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ShadowState {
        &mut self.state
    }

    pub fn kill_feed(&self) -> impl Iterator<Item = &KillFeedEntry> {
        self.kill_feed.iter()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

/// Spawns task that decodes datagrams from the server into the channel
fn spawn_network_receiver(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    incoming_tx: mpsc::UnboundedSender<Packet>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => {
                    if addr != server_addr {
                        debug!("Ignoring datagram from {}", addr);
                        continue;
                    }
                    match decode_packet(&buffer[..len]) {
                        Ok(packet) => {
                            if incoming_tx.send(packet).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed packet: {}", e),
                    }
                }
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    })
}
