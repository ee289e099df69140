//! Player WebSocket lifecycle: identification, action dispatch, and teardown.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::GameKind,
    dto::{action::ClientAction, event::ServerEvent},
    error::ServiceError,
    services::{
        broadcast_service, catch_word_service, game_service, word_chain_service,
    },
    state::{PlayerConnection, SharedState},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let action = match ClientAction::from_json_str(&initial_message) {
        Ok(action) => action,
        Err(err) => {
            warn!(error = %err, "failed to parse or validate player message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientAction::Identify {
        player_id,
        room_id,
        owner,
    } = action
    else {
        warn!("first message was not an identification");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let connection_id = Uuid::new_v4();
    state.connections().insert(
        connection_id,
        PlayerConnection {
            id: connection_id,
            player_id: player_id.clone(),
            room_id: room_id.clone(),
            owner,
            tx: outbound_tx.clone(),
        },
    );
    info!(player = %player_id, room = %room_id, owner, "player connected");

    // Late joiners catch up on the game already in progress.
    let game = match game_service::session_snapshot(&state, &room_id).await {
        Ok(snapshot) => Some(snapshot),
        Err(ServiceError::NotFound(_)) | Err(ServiceError::Degraded) => None,
        Err(err) => {
            warn!(room = %room_id, error = %err, "could not load game snapshot for welcome");
            None
        }
    };
    let welcome = ServerEvent::Welcome {
        player_id: player_id.clone(),
        room_id: room_id.clone(),
        game,
    };
    if broadcast_service::send_to_connection(&outbound_tx, &welcome).is_err() {
        state.connections().remove(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientAction::from_json_str(&text) {
                Ok(ClientAction::Identify { .. }) => {
                    warn!(player = %player_id, "ignoring duplicate identification");
                }
                Ok(action) => {
                    if let Err(err) = dispatch(&state, &room_id, &player_id, action).await {
                        let rejection = ServerEvent::ActionRejected {
                            code: err.code().to_string(),
                            message: err.to_string(),
                        };
                        let _ = broadcast_service::send_to_connection(&outbound_tx, &rejection);
                    }
                }
                Err(err) => {
                    warn!(player = %player_id, error = %err, "failed to parse or validate player message");
                    let rejection = ServerEvent::ActionRejected {
                        code: "invalid_input".to_string(),
                        message: err.to_string(),
                    };
                    let _ = broadcast_service::send_to_connection(&outbound_tx, &rejection);
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&connection_id);
    info!(player = %player_id, room = %room_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route one gameplay action to its service.
async fn dispatch(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    action: ClientAction,
) -> Result<(), ServiceError> {
    match action {
        ClientAction::StartGame { kind, difficulty } => {
            game_service::start_game(state, room_id, player_id, kind, difficulty).await
        }
        ClientAction::SubmitAnswer { answer } => {
            catch_word_service::submit_answer(state, room_id, player_id, &answer).await
        }
        ClientAction::SubmitWord { word } => {
            word_chain_service::submit_word(state, room_id, player_id, &word).await
        }
        ClientAction::TurnTimeout => {
            let session = game_service::load_session(state, room_id).await?;
            match session.kind {
                GameKind::CatchWord => {
                    catch_word_service::round_timeout(state, room_id, player_id).await
                }
                GameKind::WordChain => {
                    word_chain_service::handle_timeout(state, room_id, player_id).await
                }
            }
        }
        ClientAction::StopGame => game_service::stop_game(state, room_id, player_id).await,
        ClientAction::RequestHint => {
            catch_word_service::provide_hint(state, room_id, player_id).await
        }
        ClientAction::SkipTurn => catch_word_service::skip_turn(state, room_id, player_id).await,
        ClientAction::Identify { .. } | ClientAction::Unknown => Err(ServiceError::InvalidInput(
            "unsupported action".to_string(),
        )),
    }
}

/// Close the writer channel and wait for the writer task to drain.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    if let Err(err) = writer_task.await {
        warn!(error = %err, "websocket writer task failed");
    }
}
