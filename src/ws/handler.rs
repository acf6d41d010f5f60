//! WebSocket upgrade handler and per-connection session

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::registry::SharedGame;
use crate::game::GameError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Outbound queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Room membership of one connection, established by the join flow
struct Membership {
    room_id: String,
    user_id: Uuid,
    /// Pipes the room's broadcast channel into this connection
    forwarder: JoinHandle<()>,
}

/// One connected client
struct Session {
    state: AppState,
    out_tx: mpsc::Sender<ServerMsg>,
    membership: Option<Membership>,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    debug!("New WebSocket connection");

    let (ws_sink, mut ws_stream) = socket.split();

    // A single writer task owns the sink; direct replies and room
    // broadcasts both funnel through the same outbound queue.
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_loop(ws_sink, out_rx));

    let mut session = Session {
        state,
        out_tx,
        membership: None,
    };
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!("Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => session.handle(msg).await,
                    Err(e) => {
                        debug!(error = %e, "Failed to parse client message");
                        session.send_error("Invalid message format").await;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Client initiated close");
                break;
            }
            Ok(_) => {
                // Binary, ping and pong frames are ignored
            }
            Err(e) => {
                debug!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.disconnect();
    writer.abort();
    debug!("WebSocket connection closed");
}

impl Session {
    async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::Join { room_id, user_name } => self.handle_join(room_id, user_name).await,
            ClientMsg::Vote { value } => self.handle_vote(value).await,
            ClientMsg::Reveal => self.handle_reveal().await,
            ClientMsg::Reset => self.handle_reset().await,
            ClientMsg::ResetRoom => self.handle_reset_room().await,
            ClientMsg::StartGame => self.handle_start_game().await,
            ClientMsg::SubmitInput { input } => self.handle_submit_input(input),
            ClientMsg::RestartGame => self.handle_restart_game().await,
            ClientMsg::ExitGame => self.handle_exit_game().await,
        }
    }

    async fn handle_join(&mut self, room_id: String, user_name: String) {
        if room_id.is_empty() || user_name.is_empty() {
            self.send_error("Room ID and username are required").await;
            return;
        }
        if self.membership.is_some() {
            self.send_error("Already in a room").await;
            return;
        }

        let (user_id, view) = self.state.rooms.join(&room_id, &user_name);

        // Existing members hear about the join before the newcomer
        // subscribes, so nobody is told about themselves
        if let Some(user) = view.users.last().cloned() {
            self.state
                .channels
                .broadcast(&room_id, ServerMsg::UserJoined { user });
        }

        let forwarder = spawn_forwarder(
            self.state.channels.subscribe(&room_id),
            self.out_tx.clone(),
            user_id,
        );
        self.membership = Some(Membership {
            room_id: room_id.clone(),
            user_id,
            forwarder,
        });

        self.send(ServerMsg::RoomState {
            room: view,
            user_id: Some(user_id),
        })
        .await;

        // Late joiners drop straight into a running game
        if let Some(game) = self.state.games.get(&room_id) {
            let (running, started_by) = {
                let game = game.lock();
                (!game.game_over, game.started_by)
            };
            if running {
                self.state
                    .games
                    .add_player(&room_id, user_id, user_name.clone());
                self.send(ServerMsg::GameStarted { started_by }).await;
            }
        }
    }

    async fn handle_vote(&mut self, value: String) {
        let Some(m) = &self.membership else {
            return;
        };
        if let Some(view) = self.state.rooms.vote(&m.room_id, m.user_id, value) {
            self.state.channels.broadcast(
                &m.room_id,
                ServerMsg::RoomState {
                    room: view,
                    user_id: None,
                },
            );
        }
    }

    async fn handle_reveal(&mut self) {
        let Some(m) = &self.membership else {
            return;
        };
        if let Some(view) = self.state.rooms.reveal(&m.room_id) {
            self.state.channels.broadcast(
                &m.room_id,
                ServerMsg::RoomState {
                    room: view,
                    user_id: None,
                },
            );
        }
    }

    async fn handle_reset(&mut self) {
        let Some(m) = &self.membership else {
            return;
        };
        if let Some(view) = self.state.rooms.reset(&m.room_id) {
            self.state.channels.broadcast(
                &m.room_id,
                ServerMsg::RoomState {
                    room: view,
                    user_id: None,
                },
            );
        }
    }

    async fn handle_reset_room(&mut self) {
        let Some(m) = self.membership.take() else {
            return;
        };
        let room_id = m.room_id;

        // Any running game dies with the room
        self.state.scheduler.cancel(&room_id);
        self.state.games.stop(&room_id);

        if self.state.rooms.reset_room(&room_id) {
            self.state.channels.broadcast(&room_id, ServerMsg::RoomReset);
            self.state.channels.remove(&room_id);
        }

        m.forwarder.abort();
    }

    async fn handle_start_game(&mut self) {
        let Some(m) = &self.membership else {
            self.send_error("Join a room first").await;
            return;
        };
        let room_id = m.room_id.clone();
        let user_id = m.user_id;

        let Some(roster) = self.state.rooms.roster(&room_id) else {
            self.send_error("Room not found").await;
            return;
        };

        match self
            .state
            .games
            .start(&room_id, &roster, user_id, unix_millis(), rand::random())
        {
            Ok(game) => {
                info!(room_id = %room_id, started_by = %user_id, "Arena game starting");
                self.state
                    .channels
                    .broadcast(&room_id, ServerMsg::GameStarted {
                        started_by: user_id,
                    });
                self.spawn_loop(&room_id, game);
            }
            Err(GameError::AlreadyActive) => {
                self.send_error("Game already active").await;
            }
        }
    }

    fn handle_submit_input(&mut self, input: crate::game::InputUpdate) {
        // Unknown room or player: silent no-op
        if let Some(m) = &self.membership {
            self.state.games.apply_input(&m.room_id, m.user_id, &input);
        }
    }

    async fn handle_restart_game(&mut self) {
        let Some(m) = &self.membership else {
            self.send_error("Join a room first").await;
            return;
        };
        let room_id = m.room_id.clone();
        let user_id = m.user_id;

        let Some(game) = self.state.games.get(&room_id) else {
            self.send_error("No active game").await;
            return;
        };
        if !holds_authority(&game, user_id) {
            self.send_error("Not authorized").await;
            return;
        }

        let Some(roster) = self.state.rooms.roster(&room_id) else {
            self.send_error("Room not found").await;
            return;
        };

        // The old timer must be gone before the new game is seeded
        self.state.scheduler.cancel(&room_id);
        let game = self
            .state
            .games
            .restart(&room_id, &roster, user_id, unix_millis(), rand::random());

        info!(room_id = %room_id, started_by = %user_id, "Arena game restarting");
        self.state
            .channels
            .broadcast(&room_id, ServerMsg::GameStarted {
                started_by: user_id,
            });
        self.spawn_loop(&room_id, game);
    }

    async fn handle_exit_game(&mut self) {
        let Some(m) = &self.membership else {
            self.send_error("Join a room first").await;
            return;
        };
        let room_id = m.room_id.clone();
        let user_id = m.user_id;

        let Some(game) = self.state.games.get(&room_id) else {
            self.send_error("No active game").await;
            return;
        };
        if !holds_authority(&game, user_id) {
            self.send_error("Not authorized").await;
            return;
        }

        self.state.scheduler.cancel(&room_id);
        self.state.games.stop(&room_id);
        self.state
            .channels
            .broadcast(&room_id, ServerMsg::GameStopped);
        info!(room_id = %room_id, "Arena game exited");
    }

    fn spawn_loop(&self, room_id: &str, game: SharedGame) {
        self.state.scheduler.start_loop(
            room_id.to_string(),
            game,
            self.state.games.clone(),
            self.state.channels.sender(room_id),
        );
    }

    /// Cleanup when the connection goes away
    fn disconnect(&mut self) {
        let Some(m) = self.membership.take() else {
            return;
        };
        m.forwarder.abort();

        // A disconnect mid-game counts as an elimination
        self.state.games.remove_player(&m.room_id, m.user_id);

        if let Some(outcome) = self.state.rooms.leave(&m.room_id, m.user_id) {
            self.state.channels.broadcast(
                &m.room_id,
                ServerMsg::UserLeft {
                    user_id: m.user_id,
                },
            );

            if outcome.room_deleted {
                self.state.scheduler.cancel(&m.room_id);
                self.state.games.stop(&m.room_id);
                self.state.channels.remove(&m.room_id);
            }
        }
    }

    async fn send(&self, msg: ServerMsg) {
        if self.out_tx.send(msg).await.is_err() {
            debug!("Outbound queue closed");
        }
    }

    async fn send_error(&self, message: &str) {
        self.send(ServerMsg::Error {
            message: message.to_string(),
        })
        .await;
    }
}

fn holds_authority(game: &SharedGame, user_id: Uuid) -> bool {
    game.lock().started_by == user_id
}

/// Pipe room broadcasts into one connection's outbound queue
fn spawn_forwarder(
    mut rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
    user_id: Uuid,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(user_id = %user_id, lagged = n, "Client lagged, skipping {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Write queued messages out to the socket
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<ServerMsg>) {
    while let Some(msg) = rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize server message");
            }
        }
    }
}
