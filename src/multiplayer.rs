//! Versus play through the relay server
//!
//! Protocol (length-prefixed JSON over TCP):
//! 1. Client sends `JoinGame`
//! 2. Relay answers `WaitingForOpponent`, then `MatchFound` once paired.
//!    Both players get the same seed, so they see the same piece sequence
//! 3. During play: `UpdateState` at a low fixed cadence, `SendGarbage` on
//!    attacks, `GameOver` when topped out
//! 4. The relay forwards these to the partner as `OpponentStateUpdate`,
//!    `ReceiveGarbage` and `OpponentGameOver`

use crate::board::CellRecord;
use crate::playfield::PlayField;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc as async_mpsc;
use tracing::{debug, info, warn};

/// Largest frame either side accepts
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Seat in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    P1,
    P2,
}

/// Messages exchanged with the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMessage {
    /// Ask to be paired with the next player
    JoinGame { name: String },
    WaitingForOpponent,
    MatchFound {
        room_id: String,
        opponent_id: String,
        opponent_name: String,
        role: Role,
        seed: u64,
    },
    /// Our board, mirrored to the opponent
    UpdateState {
        room_id: String,
        board: Vec<CellRecord>,
        score: u64,
        level: u32,
    },
    OpponentStateUpdate {
        board: Vec<CellRecord>,
        score: u64,
        level: u32,
    },
    SendGarbage { room_id: String, count: i32 },
    ReceiveGarbage { count: i32 },
    GameOver { room_id: String },
    OpponentGameOver,
    /// The partner's connection dropped
    OpponentDisconnected,
}

/// Serialize a message to bytes with length prefix
pub fn encode_message(msg: &GameMessage) -> serde_json::Result<Vec<u8>> {
    let json = serde_json::to_vec(msg)?;
    let len = json.len() as u32;
    let mut data = len.to_be_bytes().to_vec();
    data.extend(json);
    Ok(data)
}

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &GameMessage) -> Result<()> {
    let data = encode_message(msg).context("failed to encode message")?;
    writer.write_all(&data).await.context("failed to write message")?;
    Ok(())
}

/// Read the next message. Oversized and malformed frames are logged and
/// skipped. Returns `None` once the peer closes the stream.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<GameMessage>> {
    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("failed to read frame length"),
        }
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_LEN {
            warn!("dropping {} byte frame", len);
            let mut rest = (&mut *reader).take(len as u64);
            let skipped = tokio::io::copy(&mut rest, &mut tokio::io::sink())
                .await
                .context("failed to skip oversized frame")?;
            if skipped < len as u64 {
                return Ok(None);
            }
            continue;
        }

        let mut data = vec![0u8; len];
        reader
            .read_exact(&mut data)
            .await
            .context("failed to read frame body")?;
        match serde_json::from_slice(&data) {
            Ok(msg) => return Ok(Some(msg)),
            Err(e) => warn!("dropping malformed frame: {}", e),
        }
    }
}

/// Requests from the game loop to the network task
#[derive(Debug)]
pub enum NetCommand {
    UpdateState {
        board: Vec<CellRecord>,
        score: u64,
        level: u32,
    },
    SendGarbage(u32),
    GameOver,
    Disconnect,
}

impl NetCommand {
    fn into_message(self, room_id: String) -> Option<GameMessage> {
        match self {
            NetCommand::UpdateState { board, score, level } => Some(GameMessage::UpdateState {
                room_id,
                board,
                score,
                level,
            }),
            NetCommand::SendGarbage(count) => Some(GameMessage::SendGarbage {
                room_id,
                count: count as i32,
            }),
            NetCommand::GameOver => Some(GameMessage::GameOver { room_id }),
            NetCommand::Disconnect => None,
        }
    }
}

/// Events received from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Waiting,
    Matched {
        opponent_name: String,
        role: Role,
        seed: u64,
    },
    OpponentBoard {
        board: Vec<CellRecord>,
        score: u64,
        level: u32,
    },
    Garbage(i32),
    OpponentGameOver,
    Disconnected { reason: String },
}

/// Opponent's game state for display
pub struct OpponentState {
    pub name: String,
    /// Display-only mirror of the opponent's board
    pub field: PlayField,
    pub score: u64,
    pub level: u32,
    pub game_over: bool,
}

impl Default for OpponentState {
    fn default() -> Self {
        Self {
            name: "Opponent".to_string(),
            field: PlayField::new(0),
            score: 0,
            level: 1,
            game_over: false,
        }
    }
}

impl OpponentState {
    pub fn update(&mut self, board: &[CellRecord], score: u64, level: u32) {
        self.field.deserialize(board);
        self.score = score;
        self.level = level;
    }
}

/// Versus session seen from the synchronous game loop
pub struct VersusSession {
    pub role: Option<Role>,
    pub seed: Option<u64>,
    pub opponent: OpponentState,
    cmd_tx: Option<async_mpsc::UnboundedSender<NetCommand>>,
    event_rx: Option<mpsc::Receiver<NetEvent>>,
}

impl VersusSession {
    /// Connect to the relay on `handle` and ask for a match
    pub fn connect(handle: &tokio::runtime::Handle, addr: String, name: String) -> Self {
        let (cmd_tx, cmd_rx) = async_mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();

        handle.spawn(async move {
            if let Err(e) = run_client(&addr, name, event_tx.clone(), cmd_rx).await {
                warn!("versus session ended: {:#}", e);
                let _ = event_tx.send(NetEvent::Disconnected {
                    reason: format!("{e:#}"),
                });
            }
        });

        Self {
            role: None,
            seed: None,
            opponent: OpponentState::default(),
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
        }
    }

    /// Drain network events without blocking, keeping the opponent mirror
    /// and match details current
    pub fn poll_events(&mut self) -> Vec<NetEvent> {
        let mut events = Vec::new();
        if let Some(rx) = &self.event_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        for event in &events {
            match event {
                NetEvent::Matched {
                    opponent_name,
                    role,
                    seed,
                } => {
                    self.opponent.name = opponent_name.clone();
                    self.role = Some(*role);
                    self.seed = Some(*seed);
                }
                NetEvent::OpponentBoard { board, score, level } => {
                    self.opponent.update(board, *score, *level)
                }
                NetEvent::OpponentGameOver => self.opponent.game_over = true,
                _ => {}
            }
        }
        events
    }

    fn send(&self, cmd: NetCommand) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(cmd);
        }
    }

    pub fn send_state(&self, board: Vec<CellRecord>, score: u64, level: u32) {
        self.send(NetCommand::UpdateState { board, score, level });
    }

    pub fn send_garbage(&self, count: u32) {
        if count > 0 {
            self.send(NetCommand::SendGarbage(count));
        }
    }

    pub fn send_game_over(&self) {
        self.send(NetCommand::GameOver);
    }

    pub fn is_connected(&self) -> bool {
        self.cmd_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn disconnect(&mut self) {
        self.send(NetCommand::Disconnect);
        self.cmd_tx = None;
        self.event_rx = None;
    }
}

async fn run_client(
    addr: &str,
    name: String,
    event_tx: mpsc::Sender<NetEvent>,
    mut cmd_rx: async_mpsc::UnboundedReceiver<NetCommand>,
) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to relay at {addr}"))?;
    info!("connected to relay at {}", addr);
    let (mut reader, mut writer) = stream.into_split();
    write_message(&mut writer, &GameMessage::JoinGame { name }).await?;

    // reads run in their own task so a half-read frame never gets cancelled
    let (msg_tx, mut msg_rx) = async_mpsc::unbounded_channel();
    let reader_task = tokio::spawn(async move {
        loop {
            match read_message(&mut reader).await {
                Ok(Some(msg)) => {
                    if msg_tx.send(msg).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("relay read failed: {:#}", e);
                    break;
                }
            }
        }
    });

    let mut room_id: Option<String> = None;
    let result = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break Ok(()) };
                let Some(room) = &room_id else {
                    debug!("not matched yet, dropping {:?}", cmd);
                    continue;
                };
                match cmd.into_message(room.clone()) {
                    Some(msg) => {
                        if let Err(e) = write_message(&mut writer, &msg).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                }
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    let _ = event_tx.send(NetEvent::Disconnected {
                        reason: "relay closed the connection".to_string(),
                    });
                    break Ok(());
                };
                let event = match msg {
                    GameMessage::WaitingForOpponent => Some(NetEvent::Waiting),
                    GameMessage::MatchFound { room_id: id, opponent_id, opponent_name, role, seed } => {
                        info!("matched with {} ({}) in room {} as {:?}", opponent_name, opponent_id, id, role);
                        room_id = Some(id);
                        Some(NetEvent::Matched { opponent_name, role, seed })
                    }
                    GameMessage::OpponentStateUpdate { board, score, level } => {
                        Some(NetEvent::OpponentBoard { board, score, level })
                    }
                    GameMessage::ReceiveGarbage { count } if count > 0 => Some(NetEvent::Garbage(count)),
                    GameMessage::OpponentGameOver => Some(NetEvent::OpponentGameOver),
                    GameMessage::OpponentDisconnected => Some(NetEvent::Disconnected {
                        reason: "opponent disconnected".to_string(),
                    }),
                    other => {
                        warn!("ignoring unexpected message {:?}", other);
                        None
                    }
                };
                if let Some(event) = event {
                    if event_tx.send(event).is_err() {
                        break Ok(());
                    }
                }
            }
        }
    };

    reader_task.abort();
    let _ = writer.shutdown().await;
    result
}

/// Fail unless `addr` parses as "host:port"
pub fn check_relay_addr(addr: &str) -> Result<()> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => bail!("relay address '{addr}' is not host:port"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::TetrominoType;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let msg = GameMessage::UpdateState {
            room_id: "1#2".to_string(),
            board: vec![CellRecord {
                col: 0,
                row: 19,
                kind: TetrominoType::Garbage,
            }],
            score: 1200,
            level: 3,
        };
        let data = encode_message(&msg).unwrap();
        let mut reader = &data[..];
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(msg));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_frames_are_skipped() {
        let mut data = Vec::new();
        data.extend((3u32).to_be_bytes());
        data.extend(b"{{{");
        let oversized = MAX_FRAME_LEN + 1;
        data.extend((oversized as u32).to_be_bytes());
        data.extend(vec![b' '; oversized]);
        data.extend(encode_message(&GameMessage::OpponentGameOver).unwrap());

        let mut reader = &data[..];
        assert_eq!(
            read_message(&mut reader).await.unwrap(),
            Some(GameMessage::OpponentGameOver)
        );
    }

    #[test]
    fn test_commands_carry_room() {
        let msg = NetCommand::SendGarbage(4).into_message("a#b".to_string());
        assert_eq!(
            msg,
            Some(GameMessage::SendGarbage {
                room_id: "a#b".to_string(),
                count: 4
            })
        );
        assert_eq!(NetCommand::Disconnect.into_message("a#b".to_string()), None);
    }

    #[test]
    fn test_opponent_mirror_is_display_only() {
        let mut opponent = OpponentState::default();
        let board = vec![CellRecord {
            col: 4,
            row: 18,
            kind: TetrominoType::T,
        }];
        opponent.update(&board, 300, 2);
        assert!(opponent.field.is_display_only());
        assert_eq!(opponent.field.serialize(), board);
        assert_eq!(opponent.level, 2);
    }

    #[test]
    fn test_relay_addr_check() {
        assert!(check_relay_addr("127.0.0.1:3000").is_ok());
        assert!(check_relay_addr("relay.example:80").is_ok());
        assert!(check_relay_addr("localhost").is_err());
        assert!(check_relay_addr(":3000").is_err());
    }

    #[test]
    fn test_refused_connection_reports_disconnect() {
        // grab a free port, then close it so the connect is refused
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut session = VersusSession::connect(runtime.handle(), addr.to_string(), "bot".to_string());

        let mut disconnected = false;
        for _ in 0..200 {
            if session
                .poll_events()
                .iter()
                .any(|event| matches!(event, NetEvent::Disconnected { .. }))
            {
                disconnected = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(disconnected);
        assert!(!session.is_connected());

        session.disconnect();
        assert!(!session.is_connected());
    }
}
