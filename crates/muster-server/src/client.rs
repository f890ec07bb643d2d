use muster_lib::net::connection::{self, ConnectionRx, ConnectionTx, FrameWriter};
use muster_lib::net::{FrameError, LobbyMessage, Message, ProtocolError};
use muster_lib::{ConnectionId, ParticipantId};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::lobby::{LobbyError, LobbyHandle};
use crate::state::{OwnedId, ServerState};

/// Capacity of the queue the lobby pushes this connection's messages onto.
const OUTBOUND_QUEUE: usize = 64;

/// Take a socket for a newly connected client and begin serving it.
pub async fn handle_new_connection(state: ServerState, socket: TcpStream) {
    let client = match ConnectingClient::new(state, socket).handshake().await {
        Some(c) => c,
        None => return,
    };
    client.run().await;
}

/// A client that connected but has not identified itself yet.
struct ConnectingClient {
    state: ServerState,
    connection_id: OwnedId<ConnectionId>,
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
}

impl ConnectingClient {
    fn new(state: ServerState, socket: TcpStream) -> Self {
        let connection_id = state.add_connection();
        let (conn_tx, conn_rx) = connection::from_socket(socket);
        Self {
            state,
            connection_id,
            conn_tx,
            conn_rx,
        }
    }

    async fn handshake(mut self) -> Option<ParticipantClient> {
        match self.try_handshake().await {
            Ok((lobby_handle, lobby_rx)) => Some(ParticipantClient::from_connecting(
                self,
                lobby_handle,
                lobby_rx,
            )),
            Err(error) => {
                tracing::error!(connection_id = %self.connection_id, %error, "Handshake failed");
                let _ = self.conn_tx.write_frame(Message::Error { error }).await;
                None
            }
        }
    }

    async fn try_handshake(
        &mut self,
    ) -> Result<(LobbyHandle, mpsc::Receiver<Message>), ProtocolError> {
        let version = match self.conn_rx.read_frame().await? {
            Some(Message::Version { version }) => version,
            Some(_) => return Err(ProtocolError::InvalidMessage),
            None => return Err(ProtocolError::Disconnected),
        };

        if version != crate::VERSION {
            return Err(ProtocolError::VersionMismatch(
                version,
                crate::VERSION.to_owned(),
            ));
        }

        self.conn_tx
            .write_frame(Message::ConnectionAccept {
                connection_id: *self.connection_id,
            })
            .await?;
        tracing::info!("New connection {} opened", self.connection_id);

        let participant_id = match self.conn_rx.read_frame().await? {
            Some(Message::Login { participant_id }) => participant_id,
            Some(_) => return Err(ProtocolError::InvalidMessage),
            None => return Err(ProtocolError::Disconnected),
        };

        let (lobby_tx, lobby_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let lobby_handle = self
            .state
            .lobby()
            .join(participant_id, *self.connection_id, lobby_tx)
            .await
            .map_err(|err| ProtocolError::Message(err.to_string()))?;
        Ok((lobby_handle, lobby_rx))
    }
}

async fn send_task<W: AsyncWrite + Unpin>(
    mut conn_tx: FrameWriter<W>,
    mut lobby_rx: mpsc::Receiver<Message>,
    mut local_rx: mpsc::Receiver<Message>,
) {
    loop {
        let m = select! {
            Some(m) = lobby_rx.recv() => m,
            Some(m) = local_rx.recv() => m,
            else => return,
        };

        match conn_tx.write_frame(m).await {
            Ok(()) => (),
            // Nothing was written, the stream is still in sync
            Err(FrameError::FrameLength) => {
                tracing::warn!("Dropped a message too large to fit in a frame");
            }
            Err(_) => return,
        }
    }
}

/// A client that logged in and is sitting in the lobby.
struct ParticipantClient {
    participant_id: ParticipantId,
    connection_id: OwnedId<ConnectionId>,
    conn_rx: ConnectionRx,
    local_tx: mpsc::Sender<Message>,
    task_handle: JoinHandle<()>,
    lobby_handle: LobbyHandle,
}

impl ParticipantClient {
    fn from_connecting(
        client: ConnectingClient,
        lobby_handle: LobbyHandle,
        lobby_rx: mpsc::Receiver<Message>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let task_handle = tokio::spawn(send_task(client.conn_tx, lobby_rx, rx));

        Self {
            participant_id: lobby_handle.participant_id(),
            connection_id: client.connection_id,
            conn_rx: client.conn_rx,
            local_tx: tx,
            task_handle,
            lobby_handle,
        }
    }

    /// Takes ownership of self to guarantee that client will be dropped when it's
    /// message loop ends
    #[instrument(skip_all, fields(participant_id = %self.participant_id, connection_id = %self.connection_id))]
    async fn run(mut self) {
        loop {
            let incoming = match self.conn_rx.read_frame().await {
                Ok(Some(Message::Lobby(x))) => x,
                Ok(Some(m)) => {
                    tracing::error!("Invalid message received: {m:?}");
                    let _ = self
                        .local_tx
                        .send(Message::Error {
                            error: ProtocolError::InvalidMessage,
                        })
                        .await;
                    continue;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading message, Closing connection\n{e:?}");
                    break;
                }
            };

            tracing::debug!("Received message: {incoming:?}");
            if let Err(e) = self.process(incoming).await {
                tracing::error!("Encountered error processing message: {e:?}");
                let _ = self
                    .local_tx
                    .send(Message::Error {
                        error: ProtocolError::Message(e.to_string()),
                    })
                    .await;
            }
        }
        tracing::info!("Participant disconnected");
    }

    async fn process(&mut self, msg: LobbyMessage) -> Result<(), LobbyError> {
        match msg {
            LobbyMessage::LoadComplete => self.lobby_handle.load_complete().await,
            LobbyMessage::SetReady(ready) => self.lobby_handle.set_ready(ready).await,
        }
    }
}

impl Drop for ParticipantClient {
    fn drop(&mut self) {
        // The lobby handle detaches itself and the connection id is released by its owner.
        self.task_handle.abort();
    }
}
