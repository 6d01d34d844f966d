//! TCP client for a BiteVibes hub
//!
//! One connection carries both room traffic and cloud document requests.
//! Requests are matched to replies by id; room snapshots are routed to the
//! feeds handed out by [`RoomTransport::subscribe`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use bitevibes_core::cloud::CloudStore;
use bitevibes_core::menu::MenuData;
use bitevibes_core::models::{HistoryEntry, RoomCode, RoomDocument, RouletteState};
use bitevibes_core::room::{RoomFeed, RoomTransport};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, Reply, Request};

/// How long a request waits for its reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

struct ClientState {
    connection: ConnectionState,
    pending: HashMap<u64, oneshot::Sender<Reply>>,
    routes: HashMap<RoomCode, Vec<mpsc::UnboundedSender<RoomDocument>>>,
}

enum ClientCommand {
    Send(Message),
    Disconnect,
}

/// Client handle; clones share one connection
#[derive(Clone)]
pub struct HubClient {
    state: Arc<Mutex<ClientState>>,
    cmd_tx: mpsc::Sender<ClientCommand>,
    next_id: Arc<AtomicU64>,
    timeout: Duration,
}

impl HubClient {
    /// Connect to a hub
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to hub");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let state = Arc::new(Mutex::new(ClientState {
            connection: ConnectionState::Connected,
            pending: HashMap::new(),
            routes: HashMap::new(),
        }));
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(reader, state.clone(), cmd_tx.clone()));
        tokio::spawn(writer_task(writer, cmd_rx));

        Ok(HubClient {
            state,
            cmd_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Round-trip a ping
    pub async fn ping(&self) -> Result<()> {
        match self.request(Request::Ping).await? {
            Reply::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Disconnect from the hub
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    /// Send a request and wait for its reply; rejections become errors
    async fn request(&self, request: Request) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut s = self.state.lock().await;
            if s.connection != ConnectionState::Connected {
                return Err(Error::NotConnected);
            }
            s.pending.insert(id, reply_tx);
        }

        if self
            .cmd_tx
            .send(ClientCommand::Send(Message::Request { id, request }))
            .await
            .is_err()
        {
            self.state.lock().await.pending.remove(&id);
            return Err(Error::NotConnected);
        }

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(Reply::Rejected { kind, message })) => Err(Error::Rejected { kind, message }),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.state.lock().await.pending.remove(&id);
                warn!(id, "Hub request timed out");
                Err(Error::Timeout)
            }
        }
    }

    async fn expect_ok(&self, request: Request) -> Result<()> {
        match self.request(request).await? {
            Reply::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> Error {
    Error::Protocol(format!("Unexpected reply: {:?}", reply))
}

/// Reader task - dispatches replies and room pushes
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    state: Arc<Mutex<ClientState>>,
    cmd_tx: mpsc::Sender<ClientCommand>,
) {
    loop {
        match read_frame::<Message, _>(&mut reader).await {
            Ok(msg) => handle_hub_message(msg, &state, &cmd_tx).await,
            Err(Error::ConnectionClosed) => {
                info!("Hub closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Read error");
                break;
            }
        }
    }

    // Dropping the senders fails every waiter and ends every feed
    let mut s = state.lock().await;
    s.connection = ConnectionState::Disconnected;
    s.pending.clear();
    s.routes.clear();
    let _ = cmd_tx.try_send(ClientCommand::Disconnect);
}

/// Writer task - sends queued messages to the hub
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut cmd_rx: mpsc::Receiver<ClientCommand>) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            ClientCommand::Send(msg) => {
                if let Err(e) = write_frame(&mut writer, &msg).await {
                    debug!(error = %e, "Write failed");
                    break;
                }
            }
            ClientCommand::Disconnect => {
                debug!("Disconnecting from hub");
                break;
            }
        }
    }
    let _ = tokio::io::AsyncWriteExt::shutdown(&mut writer).await;
}

async fn handle_hub_message(
    msg: Message,
    state: &Arc<Mutex<ClientState>>,
    cmd_tx: &mpsc::Sender<ClientCommand>,
) {
    match msg {
        Message::Reply { id, reply } => {
            let waiter = state.lock().await.pending.remove(&id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(reply);
                }
                None => debug!(id, "Reply for unknown or expired request"),
            }
        }
        Message::RoomSnapshot { room } => {
            let code = room.code.clone();
            let unsubscribe = {
                let mut s = state.lock().await;
                match s.routes.get_mut(&code) {
                    Some(feeds) => {
                        feeds.retain(|tx| tx.send(room.clone()).is_ok());
                        if feeds.is_empty() {
                            s.routes.remove(&code);
                            true
                        } else {
                            false
                        }
                    }
                    None => true,
                }
            };
            if unsubscribe {
                debug!(code = %code, "No local feeds left, unsubscribing");
                let _ = cmd_tx.try_send(ClientCommand::Send(Message::Unsubscribe { code }));
            }
        }
        Message::RoomClosed { code } => {
            debug!(code = %code, "Room closed by hub");
            state.lock().await.routes.remove(&code);
        }
        other => {
            warn!("Unexpected message from hub: {:?}", other);
        }
    }
}

impl RoomTransport for HubClient {
    async fn create(&self, room: &RoomDocument) -> bitevibes_core::Result<()> {
        Ok(self
            .expect_ok(Request::CreateRoom { room: room.clone() })
            .await?)
    }

    async fn join(
        &self,
        code: &RoomCode,
        participant: Uuid,
    ) -> bitevibes_core::Result<Option<RoomDocument>> {
        let reply = self
            .request(Request::JoinRoom {
                code: code.clone(),
                participant,
            })
            .await?;
        match reply {
            Reply::Joined { room } => Ok(room),
            other => Err(unexpected(other).into()),
        }
    }

    async fn subscribe(&self, code: &RoomCode) -> bitevibes_core::Result<RoomFeed> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Route first so the initial snapshot has somewhere to go
        self.state
            .lock()
            .await
            .routes
            .entry(code.clone())
            .or_default()
            .push(tx);

        if let Err(e) = self.expect_ok(Request::Subscribe { code: code.clone() }).await {
            drop(rx);
            let mut s = self.state.lock().await;
            if let Some(feeds) = s.routes.get_mut(code) {
                feeds.retain(|tx| !tx.is_closed());
                if feeds.is_empty() {
                    s.routes.remove(code);
                }
            }
            return Err(e.into());
        }
        Ok(rx)
    }

    async fn publish(&self, code: &RoomCode, roulette: &RouletteState) -> bitevibes_core::Result<()> {
        Ok(self
            .expect_ok(Request::Publish {
                code: code.clone(),
                roulette: roulette.clone(),
            })
            .await?)
    }

    async fn destroy(&self, code: &RoomCode) -> bitevibes_core::Result<()> {
        Ok(self
            .expect_ok(Request::DestroyRoom { code: code.clone() })
            .await?)
    }
}

impl CloudStore for HubClient {
    async fn sign_in_anonymous(&self) -> bitevibes_core::Result<Uuid> {
        match self.request(Request::SignIn).await? {
            Reply::SignedIn { user } => Ok(user),
            other => Err(unexpected(other).into()),
        }
    }

    async fn load_menu(&self, user: Uuid) -> bitevibes_core::Result<Option<MenuData>> {
        match self.request(Request::LoadMenu { user }).await? {
            Reply::Menu { data } => Ok(data),
            other => Err(unexpected(other).into()),
        }
    }

    async fn save_menu(&self, user: Uuid, data: &MenuData) -> bitevibes_core::Result<()> {
        Ok(self
            .expect_ok(Request::SaveMenu {
                user,
                data: data.clone(),
            })
            .await?)
    }

    async fn append_history(&self, user: Uuid, entry: &HistoryEntry) -> bitevibes_core::Result<()> {
        Ok(self
            .expect_ok(Request::AppendHistory {
                user,
                entry: entry.clone(),
            })
            .await?)
    }

    async fn recent_history(
        &self,
        user: Uuid,
        limit: usize,
    ) -> bitevibes_core::Result<Vec<HistoryEntry>> {
        match self.request(Request::RecentHistory { user, limit }).await? {
            Reply::History { entries } => Ok(entries),
            other => Err(unexpected(other).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Hub;
    use bitevibes_core::models::{Item, MealType, Preset};
    use bitevibes_core::room::{RoomEvent, RoomSynchronizer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    async fn start_hub() -> Hub {
        Hub::start(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap()
    }

    fn make_room(code: &str, host: Uuid) -> RoomDocument {
        RoomDocument::new(
            RoomCode::parse(code).unwrap(),
            host,
            Preset::new("Menu", MealType::All),
        )
    }

    #[tokio::test]
    async fn test_client_connect() {
        let hub = start_hub().await;
        let client = HubClient::connect(hub.addr()).await.unwrap();

        client.ping().await.unwrap();
        assert_eq!(client.connection_state().await, ConnectionState::Connected);

        client.disconnect().await;
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_room_flow_between_clients() {
        let hub = start_hub().await;
        let host = HubClient::connect(hub.addr()).await.unwrap();
        let guest = HubClient::connect(hub.addr()).await.unwrap();

        let host_id = Uuid::new_v4();
        let room = make_room("ABCDEF", host_id);
        let code = room.code.clone();
        host.create(&room).await.unwrap();

        let err = host.create(&room).await.unwrap_err();
        assert!(matches!(err, bitevibes_core::Error::RoomExists(_)));

        let guest_id = Uuid::new_v4();
        let joined = guest.join(&code, guest_id).await.unwrap().unwrap();
        assert!(joined.has_participant(guest_id));

        let mut feed = guest.subscribe(&code).await.unwrap();
        let first = feed.recv().await.unwrap();
        assert!(first.has_participant(host_id));

        let roulette = RouletteState::settled(1, "Ramen", 120.0);
        host.publish(&code, &roulette).await.unwrap();
        let update = feed.recv().await.unwrap();
        assert_eq!(update.roulette, roulette);

        host.destroy(&code).await.unwrap();
        assert!(feed.recv().await.is_none());
        assert_eq!(hub.room_count().await, 0);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_missing_room() {
        let hub = start_hub().await;
        let client = HubClient::connect(hub.addr()).await.unwrap();
        let code = RoomCode::parse("ZZZZZZ").unwrap();

        assert!(client.join(&code, Uuid::new_v4()).await.unwrap().is_none());
        let err = client.subscribe(&code).await.unwrap_err();
        assert!(matches!(err, bitevibes_core::Error::RoomNotFound(_)));

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_cloud_documents() {
        let hub = start_hub().await;
        let client = HubClient::connect(hub.addr()).await.unwrap();

        let user = client.sign_in_anonymous().await.unwrap();
        assert!(client.load_menu(user).await.unwrap().is_none());

        let data = MenuData::default();
        client.save_menu(user, &data).await.unwrap();
        assert_eq!(client.load_menu(user).await.unwrap(), Some(data));

        let entry = HistoryEntry::new("Soba", "Lunch", MealType::Lunch);
        client.append_history(user, &entry).await.unwrap();
        assert_eq!(client.recent_history(user, 10).await.unwrap(), vec![entry]);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_requests_fail_after_hub_shutdown() {
        let hub = start_hub().await;
        let client = HubClient::connect(hub.addr())
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        client.ping().await.unwrap();

        hub.shutdown();
        // Wait for the reader task to notice the close
        for _ in 0..50 {
            if client.connection_state().await == ConnectionState::Disconnected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = client.ping().await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotConnected | Error::ConnectionClosed | Error::Timeout
        ));
    }

    async fn wait_for<F>(sync: &mut RoomSynchronizer<HubClient>, mut pick: F) -> RoomEvent
    where
        F: FnMut(&RoomEvent) -> bool,
    {
        loop {
            let mut event = tokio::time::timeout(Duration::from_secs(5), sync.next_event())
                .await
                .expect("room event timed out")
                .expect("left the room");
            if event == RoomEvent::RevealDue {
                match sync.publish_reveal().await {
                    Some(failed) => event = failed,
                    None => continue,
                }
            }
            if pick(&event) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_synchronized_spin_over_hub() {
        let hub = start_hub().await;
        let preset = Preset::new("Lunch", MealType::Lunch).with_items(vec![
            Item::with_id("a", "Ramen"),
            Item::with_id("b", "Soba"),
            Item::with_id("c", "Curry"),
        ]);
        let mut rng = StdRng::seed_from_u64(7);

        let mut host = RoomSynchronizer::new(
            HubClient::connect(hub.addr()).await.unwrap(),
            Uuid::new_v4(),
        )
        .with_reveal_delay(Duration::from_millis(50));
        let mut guest = RoomSynchronizer::new(
            HubClient::connect(hub.addr()).await.unwrap(),
            Uuid::new_v4(),
        );

        let code = host.create_room(&mut rng, preset).await.unwrap();
        guest.join_room(&code).await.unwrap();

        assert!(!guest.request_spin(&mut rng).await.unwrap());
        assert!(host.request_spin(&mut rng).await.unwrap());

        let host_result = match wait_for(&mut host, |e| {
            matches!(e, RoomEvent::ResultRevealed { .. })
        })
        .await
        {
            RoomEvent::ResultRevealed { result, episode, .. } => {
                assert_eq!(episode, 1);
                result
            }
            other => panic!("unexpected {:?}", other),
        };
        let guest_result = match wait_for(&mut guest, |e| {
            matches!(e, RoomEvent::ResultRevealed { .. })
        })
        .await
        {
            RoomEvent::ResultRevealed { result, .. } => result,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(host_result, guest_result);

        host.leave().await.unwrap();
        wait_for(&mut guest, |e| matches!(e, RoomEvent::Closed)).await;
        assert!(guest.room().is_none());

        hub.shutdown();
    }
}
