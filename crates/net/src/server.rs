//! TCP hub holding shared rooms and per-user cloud documents
//!
//! Any number of clients connect. Each request is answered on the same
//! connection; room changes are pushed to every subscribed connection.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Notify, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use bitevibes_core::menu::MenuData;
use bitevibes_core::models::{HistoryEntry, RoomCode, RoomDocument};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, RejectKind, Reply, Request};

/// Maximum number of simultaneous connections
const MAX_CONNECTIONS: usize = 256;

/// Outgoing queue depth per connection
const OUTBOX_CAPACITY: usize = 64;

type ConnectionId = u64;

struct HubRoom {
    doc: RoomDocument,
    subscribers: HashSet<ConnectionId>,
}

#[derive(Default)]
struct UserDocument {
    menu: Option<MenuData>,
    history: Vec<HistoryEntry>,
}

/// Outgoing side of one connection
struct Outbox {
    tx: mpsc::Sender<Message>,
    /// Wakes the connection task to disconnect a client that fell behind
    evict: Arc<Notify>,
}

impl Outbox {
    fn new(tx: mpsc::Sender<Message>) -> Self {
        Self {
            tx,
            evict: Arc::new(Notify::new()),
        }
    }
}

/// State shared by every connection task
#[derive(Default)]
struct HubState {
    rooms: HashMap<RoomCode, HubRoom>,
    users: HashMap<Uuid, UserDocument>,
    connections: HashMap<ConnectionId, Outbox>,
    next_connection: ConnectionId,
}

impl HubState {
    /// Queue `msg` for each connection in `targets`
    ///
    /// Uses `try_send` so a stalled client cannot block the hub while the
    /// state lock is held. A push never silently disappears: a connection
    /// whose outbox is full is disconnected, which ends its room feeds.
    fn push_to(&self, targets: impl IntoIterator<Item = ConnectionId>, msg: &Message) {
        for id in targets {
            let Some(outbox) = self.connections.get(&id) else {
                continue;
            };
            match outbox.tx.try_send(msg.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(connection = id, "Outbox full, disconnecting slow client");
                    outbox.evict.notify_one();
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection = id, "Dropped push for closed connection");
                }
            }
        }
    }

    fn push_snapshot(&self, code: &RoomCode) {
        if let Some(room) = self.rooms.get(code) {
            let msg = Message::RoomSnapshot {
                room: room.doc.clone(),
            };
            self.push_to(room.subscribers.iter().copied(), &msg);
        }
    }
}

/// Hub server handle
pub struct Hub {
    addr: SocketAddr,
    state: Arc<RwLock<HubState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Hub {
    /// Bind and start accepting connections; port 0 picks a free port
    pub async fn start(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Hub started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(RwLock::new(HubState::default()));

        let state_clone = state.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, state_clone, shutdown_rx, shutdown_tx.clone()));

        Ok(Hub {
            addr: bound_addr,
            state,
            shutdown_tx,
        })
    }

    /// Get the hub's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of live rooms
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    /// Number of connected clients
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Wait until [`shutdown`](Self::shutdown) is called
    pub async fn closed(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        let _ = rx.recv().await;
    }

    /// Stop accepting and close every connection
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Hub shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    state: Arc<RwLock<HubState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
    shutdown_tx: broadcast::Sender<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let state = state.clone();
                        let shutdown_rx = shutdown_tx.subscribe();
                        tokio::spawn(handle_connection(stream, addr, state, shutdown_rx));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<RwLock<HubState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, writer) = tokio::io::split(stream);
    let (msg_tx, msg_rx) = mpsc::channel(OUTBOX_CAPACITY);

    let outbox = Outbox::new(msg_tx.clone());
    let evict = outbox.evict.clone();
    let connection = {
        let mut s = state.write().await;
        if s.connections.len() >= MAX_CONNECTIONS {
            warn!(addr = %addr, "Hub full, refusing connection");
            return;
        }
        let id = s.next_connection;
        s.next_connection += 1;
        s.connections.insert(id, outbox);
        id
    };

    info!(addr = %addr, connection, "Client connected");

    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    // Read loop; the read future lives across iterations so shutdown
    // never interrupts a half-read frame.
    let read_loop = async {
        loop {
            match read_frame::<Message, _>(&mut reader).await {
                Ok(msg) => handle_message(msg, connection, &state, &msg_tx).await,
                Err(Error::ConnectionClosed) => {
                    debug!(connection, "Connection closed");
                    break;
                }
                Err(e) => {
                    warn!(connection, error = %e, "Read error");
                    break;
                }
            }
        }
    };
    tokio::select! {
        _ = read_loop => {}
        _ = shutdown_rx.recv() => {
            debug!(connection, "Closing connection for shutdown");
        }
        _ = evict.notified() => {
            info!(connection, "Closing connection that fell behind");
        }
    }

    writer_handle.abort();
    remove_connection(&state, connection).await;

    info!(connection, "Client disconnected");
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Handle an incoming message
async fn handle_message(
    msg: Message,
    connection: ConnectionId,
    state: &Arc<RwLock<HubState>>,
    tx: &mpsc::Sender<Message>,
) {
    match msg {
        Message::Request { id, request } => {
            let reply = handle_request(request, connection, state).await;
            if tx.send(Message::Reply { id, reply }).await.is_err() {
                debug!(connection, "Reply dropped, writer gone");
            }
        }
        Message::Unsubscribe { code } => {
            let mut s = state.write().await;
            if let Some(room) = s.rooms.get_mut(&code) {
                room.subscribers.remove(&connection);
            }
        }
        other => {
            warn!(connection, "Unexpected message from client: {:?}", other);
        }
    }
}

async fn handle_request(
    request: Request,
    connection: ConnectionId,
    state: &Arc<RwLock<HubState>>,
) -> Reply {
    match request {
        Request::Ping => Reply::Pong,
        Request::SignIn => {
            let user = Uuid::new_v4();
            state.write().await.users.insert(user, UserDocument::default());
            info!(%user, "Issued anonymous identity");
            Reply::SignedIn { user }
        }
        Request::CreateRoom { room } => {
            let mut s = state.write().await;
            if s.rooms.contains_key(&room.code) {
                return Reply::rejected(RejectKind::RoomExists, room.code.as_str());
            }
            info!(code = %room.code, host = %room.host_id, "Room created");
            s.rooms.insert(
                room.code.clone(),
                HubRoom {
                    doc: room,
                    subscribers: HashSet::new(),
                },
            );
            Reply::Ok
        }
        Request::JoinRoom { code, participant } => {
            let mut s = state.write().await;
            let Some(room) = s.rooms.get_mut(&code) else {
                return Reply::Joined { room: None };
            };
            let changed = room.doc.add_participant(participant);
            let doc = room.doc.clone();
            if changed {
                debug!(code = %code, %participant, "Participant joined");
                s.push_snapshot(&code);
            }
            Reply::Joined { room: Some(doc) }
        }
        Request::Subscribe { code } => {
            let mut s = state.write().await;
            let Some(room) = s.rooms.get_mut(&code) else {
                return Reply::rejected(RejectKind::RoomNotFound, code.as_str());
            };
            room.subscribers.insert(connection);
            let snapshot = Message::RoomSnapshot {
                room: room.doc.clone(),
            };
            s.push_to([connection], &snapshot);
            Reply::Ok
        }
        Request::Publish { code, roulette } => {
            let mut s = state.write().await;
            let Some(room) = s.rooms.get_mut(&code) else {
                return Reply::rejected(RejectKind::RoomNotFound, code.as_str());
            };
            debug!(code = %code, episode = roulette.episode, spinning = roulette.is_spinning, "Roulette published");
            room.doc.roulette = roulette;
            s.push_snapshot(&code);
            Reply::Ok
        }
        Request::DestroyRoom { code } => {
            let mut s = state.write().await;
            if let Some(room) = s.rooms.remove(&code) {
                info!(code = %code, "Room destroyed");
                s.push_to(room.subscribers, &Message::RoomClosed { code });
            }
            Reply::Ok
        }
        Request::LoadMenu { user } => {
            let s = state.read().await;
            Reply::Menu {
                data: s.users.get(&user).and_then(|doc| doc.menu.clone()),
            }
        }
        Request::SaveMenu { user, data } => {
            let mut s = state.write().await;
            s.users.entry(user).or_default().menu = Some(data);
            Reply::Ok
        }
        Request::AppendHistory { user, entry } => {
            let mut s = state.write().await;
            s.users.entry(user).or_default().history.push(entry);
            Reply::Ok
        }
        Request::RecentHistory { user, limit } => {
            let s = state.read().await;
            let mut entries = s
                .users
                .get(&user)
                .map(|doc| doc.history.clone())
                .unwrap_or_default();
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            entries.truncate(limit);
            Reply::History { entries }
        }
    }
}

/// Forget a connection and its subscriptions; rooms it hosts stay alive
async fn remove_connection(state: &Arc<RwLock<HubState>>, connection: ConnectionId) {
    let mut s = state.write().await;
    s.connections.remove(&connection);
    for room in s.rooms.values_mut() {
        room.subscribers.remove(&connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitevibes_core::models::{MealType, Preset, RouletteState};

    async fn hub_state() -> Arc<RwLock<HubState>> {
        Arc::new(RwLock::new(HubState::default()))
    }

    fn make_room(code: &str) -> RoomDocument {
        RoomDocument::new(
            RoomCode::parse(code).unwrap(),
            Uuid::new_v4(),
            Preset::new("Menu", MealType::All),
        )
    }

    #[tokio::test]
    async fn test_hub_start() {
        let hub = Hub::start(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        assert!(hub.addr().port() > 0);
        assert_eq!(hub.room_count().await, 0);
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_room_is_rejected() {
        let state = hub_state().await;
        let room = make_room("ABCDEF");

        let first = handle_request(Request::CreateRoom { room: room.clone() }, 0, &state).await;
        assert_eq!(first, Reply::Ok);
        let second = handle_request(Request::CreateRoom { room }, 0, &state).await;
        assert!(matches!(
            second,
            Reply::Rejected {
                kind: RejectKind::RoomExists,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_subscribers_get_snapshots_and_close() {
        let state = hub_state().await;
        let (tx, mut rx) = mpsc::channel(8);
        state.write().await.connections.insert(1, Outbox::new(tx));

        let room = make_room("ABCDEF");
        let code = room.code.clone();
        handle_request(Request::CreateRoom { room }, 0, &state).await;

        let reply = handle_request(Request::Subscribe { code: code.clone() }, 1, &state).await;
        assert_eq!(reply, Reply::Ok);
        assert!(matches!(rx.recv().await, Some(Message::RoomSnapshot { .. })));

        let roulette = RouletteState::spinning(1, 45.0);
        handle_request(
            Request::Publish {
                code: code.clone(),
                roulette: roulette.clone(),
            },
            0,
            &state,
        )
        .await;
        match rx.recv().await {
            Some(Message::RoomSnapshot { room }) => assert_eq!(room.roulette, roulette),
            other => panic!("expected snapshot, got {:?}", other),
        }

        handle_request(Request::DestroyRoom { code: code.clone() }, 0, &state).await;
        assert_eq!(rx.recv().await, Some(Message::RoomClosed { code }));
    }

    #[tokio::test]
    async fn test_full_outbox_evicts_connection() {
        let state = hub_state().await;
        let (tx, mut rx) = mpsc::channel(1);
        let outbox = Outbox::new(tx);
        let evict = outbox.evict.clone();
        state.write().await.connections.insert(1, outbox);

        let room = make_room("ABCDEF");
        let code = room.code.clone();
        handle_request(Request::CreateRoom { room }, 0, &state).await;
        handle_request(Request::Subscribe { code: code.clone() }, 1, &state).await;

        // The subscribe snapshot fills the outbox; the settled state cannot fit
        handle_request(
            Request::Publish {
                code,
                roulette: RouletteState::settled(1, "Curry", 10.0),
            },
            0,
            &state,
        )
        .await;

        tokio::time::timeout(std::time::Duration::from_secs(1), evict.notified())
            .await
            .expect("slow connection was not evicted");
        assert!(matches!(rx.recv().await, Some(Message::RoomSnapshot { .. })));
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let state = hub_state().await;
        let reply = handle_request(
            Request::JoinRoom {
                code: RoomCode::parse("ZZZZZZ").unwrap(),
                participant: Uuid::new_v4(),
            },
            0,
            &state,
        )
        .await;
        assert_eq!(reply, Reply::Joined { room: None });
    }

    #[tokio::test]
    async fn test_recent_history_newest_first() {
        let state = hub_state().await;
        let user = Uuid::new_v4();
        let mut older = HistoryEntry::new("Ramen", "Lunch", MealType::Lunch);
        older.timestamp -= chrono::Duration::minutes(5);
        let newer = HistoryEntry::new("Curry", "Lunch", MealType::Lunch);

        for entry in [newer.clone(), older.clone()] {
            handle_request(Request::AppendHistory { user, entry }, 0, &state).await;
        }
        let reply = handle_request(Request::RecentHistory { user, limit: 1 }, 0, &state).await;
        assert_eq!(
            reply,
            Reply::History {
                entries: vec![newer]
            }
        );
    }
}
