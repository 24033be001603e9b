//! Room-matching relay for versus play
//!
//! Pairs clients in join order and forwards messages between the two seats
//! of a room. The relay never inspects boards; it only routes.

use crate::multiplayer::{GameMessage, Role, read_message, write_message};
use anyhow::{Context, Result};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

pub type ClientId = u64;

struct Client {
    name: String,
    tx: UnboundedSender<GameMessage>,
}

/// Matching and routing state, independent of any socket
pub struct RelayState {
    waiting: Option<ClientId>,
    rooms: HashMap<String, (ClientId, ClientId)>,
    clients: HashMap<ClientId, Client>,
    rng: ChaCha8Rng,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Relay whose match seeds follow `seed`
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            waiting: None,
            rooms: HashMap::new(),
            clients: HashMap::new(),
            rng,
        }
    }

    /// Register a connection; outbound messages for it go to `tx`
    pub fn connect(&mut self, id: ClientId, tx: UnboundedSender<GameMessage>) {
        self.clients.insert(
            id,
            Client {
                name: format!("Player {id}"),
                tx,
            },
        );
    }

    pub fn waiting(&self) -> Option<ClientId> {
        self.waiting
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn send(&self, id: ClientId, msg: GameMessage) {
        if let Some(client) = self.clients.get(&id) {
            let _ = client.tx.send(msg);
        }
    }

    /// The other seat of `room_id`, if `id` sits in it
    fn partner(&self, room_id: &str, id: ClientId) -> Option<ClientId> {
        match self.rooms.get(room_id) {
            Some(&(p1, p2)) if p1 == id => Some(p2),
            Some(&(p1, p2)) if p2 == id => Some(p1),
            _ => None,
        }
    }

    fn forward(&self, room_id: &str, from: ClientId, msg: GameMessage) {
        match self.partner(room_id, from) {
            Some(to) => self.send(to, msg),
            None => warn!("client {} sent to unknown room {}", from, room_id),
        }
    }

    pub fn handle(&mut self, id: ClientId, msg: GameMessage) {
        match msg {
            GameMessage::JoinGame { name } => {
                if let Some(client) = self.clients.get_mut(&id) {
                    client.name = name;
                }
                self.join(id);
            }
            GameMessage::UpdateState {
                room_id,
                board,
                score,
                level,
            } => self.forward(
                &room_id,
                id,
                GameMessage::OpponentStateUpdate { board, score, level },
            ),
            GameMessage::SendGarbage { room_id, count } => {
                if count > 0 {
                    debug!("room {}: {} garbage from {}", room_id, count, id);
                    self.forward(&room_id, id, GameMessage::ReceiveGarbage { count });
                }
            }
            GameMessage::GameOver { room_id } => {
                info!("room {}: client {} topped out", room_id, id);
                self.forward(&room_id, id, GameMessage::OpponentGameOver);
            }
            other => warn!("client {} sent unexpected {:?}", id, other),
        }
    }

    fn join(&mut self, id: ClientId) {
        let opponent = self
            .waiting
            .filter(|&w| w != id && self.clients.contains_key(&w));
        let Some(p1) = opponent else {
            self.waiting = Some(id);
            self.send(id, GameMessage::WaitingForOpponent);
            return;
        };

        self.waiting = None;
        let p2 = id;
        let room_id = format!("{p1}#{p2}");
        let seed = self.rng.next_u64();
        let name_of = |c: ClientId| {
            self.clients
                .get(&c)
                .map(|client| client.name.clone())
                .unwrap_or_default()
        };
        let (p1_name, p2_name) = (name_of(p1), name_of(p2));
        info!("room {}: {} vs {}", room_id, p1_name, p2_name);

        self.send(
            p1,
            GameMessage::MatchFound {
                room_id: room_id.clone(),
                opponent_id: p2.to_string(),
                opponent_name: p2_name,
                role: Role::P1,
                seed,
            },
        );
        self.send(
            p2,
            GameMessage::MatchFound {
                room_id: room_id.clone(),
                opponent_id: p1.to_string(),
                opponent_name: p1_name,
                role: Role::P2,
                seed,
            },
        );
        self.rooms.insert(room_id, (p1, p2));
    }

    /// Forget `id`, freeing the waiting slot and closing its rooms
    pub fn disconnect(&mut self, id: ClientId) {
        self.clients.remove(&id);
        if self.waiting == Some(id) {
            self.waiting = None;
        }
        let closed: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, seats)| seats.0 == id || seats.1 == id)
            .map(|(room_id, _)| room_id.clone())
            .collect();
        for room_id in closed {
            if let Some(partner) = self.partner(&room_id, id) {
                self.send(partner, GameMessage::OpponentDisconnected);
            }
            self.rooms.remove(&room_id);
            debug!("room {} closed", room_id);
        }
    }
}

type Shared = Arc<Mutex<RelayState>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, RelayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bind `addr` and serve until the process exits
pub async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay to {addr}"))?;
    info!("relay listening on {}", listener.local_addr()?);
    run(listener, RelayState::new()).await
}

/// Accept connections on `listener` forever
pub async fn run(listener: TcpListener, state: RelayState) -> Result<()> {
    let state: Shared = Arc::new(Mutex::new(state));
    let mut next_id: ClientId = 1;
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let id = next_id;
        next_id += 1;
        info!("client {} connected from {}", id, peer);
        tokio::spawn(handle_connection(stream, id, state.clone()));
    }
}

async fn handle_connection(stream: TcpStream, id: ClientId, state: Shared) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = unbounded_channel();
    lock(&state).connect(id, tx);

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write_message(&mut writer, &msg).await {
                debug!("client {} write failed: {:#}", id, e);
                break;
            }
        }
    });

    loop {
        match read_message(&mut reader).await {
            Ok(Some(msg)) => lock(&state).handle(id, msg),
            Ok(None) => break,
            Err(e) => {
                warn!("client {} read failed: {:#}", id, e);
                break;
            }
        }
    }

    info!("client {} disconnected", id);
    // dropping the client's sender ends the writer task
    lock(&state).disconnect(id);
    let _ = writer_task.await;
}
