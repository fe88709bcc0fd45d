//! WebSocket upgrade handler and per-connection session loop

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::room::{RoomCmd, RoomHandle};
use crate::lobby::{Lobby, LobbyError};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    // Players are anonymous; identity is per-connection
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let mut session = Session {
        player_id,
        state,
        room: None,
        lobby: None,
        rate_limiter: PlayerRateLimiter::new(),
    };

    session.run(ws_sink, ws_stream).await;

    // Disconnect is an implicit leave from both the room and the lobby
    session.disconnect().await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Per-connection session state
struct Session {
    player_id: Uuid,
    state: AppState,
    room: Option<RoomHandle>,
    lobby: Option<Arc<Lobby>>,
    rate_limiter: PlayerRateLimiter,
}

impl Session {
    /// Run the session: multiplex the client stream with the room and lobby
    /// broadcast subscriptions over the single socket.
    async fn run(
        &mut self,
        mut ws_sink: SplitSink<WebSocket, Message>,
        mut ws_stream: SplitStream<WebSocket>,
    ) {
        let mut room_rx: Option<broadcast::Receiver<ServerMsg>> = None;
        let mut lobby_rx: Option<broadcast::Receiver<ServerMsg>> = None;

        loop {
            tokio::select! {
                incoming = ws_stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if self
                                .handle_text(&text, &mut ws_sink, &mut room_rx, &mut lobby_rx)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!(player_id = %self.player_id, "Client initiated close");
                            break;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            warn!(player_id = %self.player_id, "Received binary message, ignoring");
                        }
                        Some(Ok(_)) => {
                            // Ping/Pong frames are handled by the transport
                        }
                        Some(Err(e)) => {
                            error!(player_id = %self.player_id, error = %e, "WebSocket error");
                            break;
                        }
                        None => break,
                    }
                }

                forwarded = recv_opt(room_rx.as_mut()) => {
                    match forwarded {
                        Some(msg) => {
                            if send_msg(&mut ws_sink, &msg).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            debug!(player_id = %self.player_id, "Room channel closed");
                            self.room = None;
                            room_rx = None;
                        }
                    }
                }

                forwarded = recv_opt(lobby_rx.as_mut()) => {
                    match forwarded {
                        Some(msg) => {
                            if send_msg(&mut ws_sink, &msg).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            debug!(player_id = %self.player_id, "Lobby channel closed");
                            self.lobby = None;
                            lobby_rx = None;
                        }
                    }
                }
            }
        }
    }

    /// Parse and dispatch one client message. An Err return means the socket
    /// is no longer writable and the session should end.
    async fn handle_text(
        &mut self,
        text: &str,
        ws_sink: &mut SplitSink<WebSocket, Message>,
        room_rx: &mut Option<broadcast::Receiver<ServerMsg>>,
        lobby_rx: &mut Option<broadcast::Receiver<ServerMsg>>,
    ) -> Result<(), String> {
        if !self.rate_limiter.check_input() {
            warn!(player_id = %self.player_id, "Rate limited client message");
            return Ok(());
        }

        let msg = match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(player_id = %self.player_id, error = %e, "Failed to parse client message");
                return Ok(());
            }
        };

        match msg {
            ClientMsg::Ping { t } => {
                send_msg(ws_sink, &ServerMsg::Pong { t }).await?;
            }

            ClientMsg::Input { input, t: _ } => {
                if let Some(room) = &self.room {
                    let cmd = RoomCmd::Input {
                        player_id: self.player_id,
                        input,
                    };
                    if room.cmd_tx.send(cmd).await.is_err() {
                        debug!(player_id = %self.player_id, "Room gone, dropping input");
                        self.room = None;
                        *room_rx = None;
                    }
                }
            }

            ClientMsg::ListRooms => {
                let rooms = self.state.rooms.room_list();
                send_msg(ws_sink, &ServerMsg::RoomList { rooms }).await?;
            }

            ClientMsg::CreateRoom {
                room_id,
                room_name,
                character,
            } => {
                if self.room.is_some() {
                    return send_error(ws_sink, "already_in_room", "Leave the current room first")
                        .await;
                }
                let handle = self.state.rooms.get_or_create(&room_id, room_name);
                send_msg(
                    ws_sink,
                    &ServerMsg::RoomCreated {
                        room_id: handle.id.clone(),
                        name: handle.name.clone(),
                    },
                )
                .await?;
                self.join_room(handle, character, ws_sink, room_rx).await?;
            }

            ClientMsg::JoinRoom { room_id, character } => {
                if self.room.is_some() {
                    return send_error(ws_sink, "already_in_room", "Leave the current room first")
                        .await;
                }
                let handle = self.state.rooms.get_or_create(&room_id, None);
                self.join_room(handle, character, ws_sink, room_rx).await?;
            }

            ClientMsg::LeaveRoom => {
                if let Some(room) = self.room.take() {
                    let _ = room
                        .cmd_tx
                        .send(RoomCmd::Leave {
                            player_id: self.player_id,
                        })
                        .await;
                }
                *room_rx = None;
            }

            ClientMsg::JoinLobby { room_id } => {
                if self.lobby.is_some() {
                    return send_error(ws_sink, "already_in_lobby", "Leave the current lobby first")
                        .await;
                }
                let lobby = self.state.lobbies.get_or_create(&room_id);
                // Subscribe first so the join's own state broadcast arrives
                let rx = lobby.subscribe();
                match lobby.join(self.player_id) {
                    Ok(()) => {
                        self.lobby = Some(lobby);
                        *lobby_rx = Some(rx);
                    }
                    Err(e) => {
                        self.state.lobbies.remove_if_empty(&room_id);
                        send_error(ws_sink, lobby_error_code(&e), &e.to_string()).await?;
                    }
                }
            }

            ClientMsg::LeaveLobby => {
                if let Some(lobby) = self.lobby.take() {
                    lobby.leave(self.player_id);
                    self.state.lobbies.remove_if_empty(&lobby.id);
                }
                *lobby_rx = None;
            }

            ClientMsg::SelectCharacter { character } => {
                if let Some(lobby) = &self.lobby {
                    lobby.select_character(self.player_id, character);
                }
            }

            ClientMsg::SetReady { ready } => {
                if let Some(lobby) = &self.lobby {
                    lobby.set_ready(self.player_id, ready);
                }
            }

            ClientMsg::StartBattle => {
                if let Some(lobby) = &self.lobby {
                    if let Err(e) = lobby.start(self.player_id) {
                        send_error(ws_sink, lobby_error_code(&e), &e.to_string()).await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Join a game room: subscribe, ask the room task, report the outcome.
    async fn join_room(
        &mut self,
        handle: RoomHandle,
        character: crate::ws::protocol::Character,
        ws_sink: &mut SplitSink<WebSocket, Message>,
        room_rx: &mut Option<broadcast::Receiver<ServerMsg>>,
    ) -> Result<(), String> {
        // Subscribe before joining so the first snapshot is not missed
        let rx = handle.events_tx.subscribe();
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RoomCmd::Join {
            player_id: self.player_id,
            character,
            reply: reply_tx,
        };

        if handle.cmd_tx.send(cmd).await.is_err() {
            return send_error(ws_sink, "room_closed", "Room is no longer available").await;
        }

        match reply_rx.await {
            Ok(Ok(())) => {
                send_msg(
                    ws_sink,
                    &ServerMsg::RoomJoined {
                        room_id: handle.id.clone(),
                        name: handle.name.clone(),
                        stage: (*handle.stage).clone(),
                    },
                )
                .await?;
                self.room = Some(handle);
                *room_rx = Some(rx);
                Ok(())
            }
            Ok(Err(e)) => {
                let code = match e {
                    crate::game::room::JoinError::RoomFull => "room_full",
                    crate::game::room::JoinError::AlreadyJoined => "already_in_room",
                };
                send_error(ws_sink, code, &e.to_string()).await
            }
            Err(_) => send_error(ws_sink, "room_closed", "Room is no longer available").await,
        }
    }

    /// Cleanup after the socket closes
    async fn disconnect(&mut self) {
        if let Some(room) = self.room.take() {
            let _ = room
                .cmd_tx
                .send(RoomCmd::Leave {
                    player_id: self.player_id,
                })
                .await;
        }
        if let Some(lobby) = self.lobby.take() {
            lobby.leave(self.player_id);
            self.state.lobbies.remove_if_empty(&lobby.id);
        }
    }
}

/// Receive from an optional broadcast subscription; pending when absent.
/// Lagged receivers skip ahead rather than disconnect.
async fn recv_opt(rx: Option<&mut broadcast::Receiver<ServerMsg>>) -> Option<ServerMsg> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(lagged_count = n, "Client lagged, skipping {} broadcasts", n);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

/// Send a session-scoped error to this client only
async fn send_error(
    sink: &mut SplitSink<WebSocket, Message>,
    code: &str,
    message: &str,
) -> Result<(), String> {
    send_msg(
        sink,
        &ServerMsg::Error {
            code: code.to_string(),
            message: message.to_string(),
        },
    )
    .await
}

fn lobby_error_code(e: &LobbyError) -> &'static str {
    match e {
        LobbyError::LobbyFull => "lobby_full",
        LobbyError::AlreadyStarted => "lobby_started",
        LobbyError::AlreadyJoined => "already_in_lobby",
        LobbyError::NotHost => "not_host",
        LobbyError::NotEnoughReady => "not_enough_ready",
    }
}
