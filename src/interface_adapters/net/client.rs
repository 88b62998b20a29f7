use crate::domain::{DecisionRecord, SessionStatus, Vec2};
use crate::interface_adapters::protocol::{
    ClientMessage, IntentDto, ServerMessage, session_dto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::next_id;
use crate::use_cases::session::SessionError;
use crate::use_cases::{EngineUpdate, RosterState, SessionHandle, SwarmEvent};

use axum::{
    Error,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
// SinkExt provides `close` on the socket; send/recv are inherent.
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    EventsClosed,
    UpdatesClosed,
    RosterClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SessionQuery {
    // The session the participant wants to join.
    pub session_id: String,
    // Optional participant id when the client has a persisted identity.
    #[serde(default)]
    pub participant_id: Option<u64>,
}

/// Serializes each engine update once and broadcasts the shared bytes to
/// every connection of the session.
pub async fn update_serializer(
    mut update_rx: broadcast::Receiver<EngineUpdate>,
    bytes_tx: broadcast::Sender<Utf8Bytes>,
    latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match update_rx.recv().await {
            Ok(update) => {
                let is_puck = matches!(update, EngineUpdate::Puck(_));
                let msg = match update {
                    EngineUpdate::Puck(sample) => ServerMessage::PuckUpdate(sample.into()),
                    EngineUpdate::Intent(report) => ServerMessage::IntentUpdate(report.into()),
                };
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize engine update");
                        continue;
                    }
                };

                // Convert once and broadcast shared UTF-8 bytes to all
                // connections. Only puck samples feed lag recovery; an
                // intent echo is useless as a resync point.
                let bytes = Utf8Bytes::from(txt);
                if is_puck {
                    let _ = latest_tx.send(bytes.clone());
                }
                let _ = bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    missed = n,
                    "update serializer lagged; skipping to latest update"
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("engine updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

/// Spawns the serializer task for a freshly opened session.
pub fn spawn_session_serializer(session: &SessionHandle) {
    tokio::spawn(update_serializer(
        session.update_tx.subscribe(),
        session.bytes_tx.clone(),
        session.latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let session = match state.session_registry.get_session(&query.session_id).await {
        Some(session) => session,
        None => match revive_session(&state, &query.session_id).await {
            Some(session) => session,
            None => return StatusCode::NOT_FOUND.into_response(),
        },
    };

    ws.on_upgrade(move |socket| handle_socket(socket, session, query.participant_id))
}

// Sessions persisted by an external store can outlive this process;
// re-open an engine for them on first contact. Completed sessions stay
// closed so a finished swarm can never decide twice.
async fn revive_session(state: &AppState, session_id: &str) -> Option<SessionHandle> {
    let record = match state.store.get_session(session_id).await {
        Ok(Some(record)) if record.status != SessionStatus::Completed => record,
        Ok(_) => return None,
        Err(error) => {
            warn!(%error, session_id, "failed to look up session in store");
            return None;
        }
    };

    match state
        .session_registry
        .open_session(record, state.store.clone())
        .await
    {
        Ok(session) => {
            spawn_session_serializer(&session);
            Some(session)
        }
        // Lost the race with a concurrent connection; use the winner's engine.
        Err(SessionError::AlreadyExists) => state.session_registry.get_session(session_id).await,
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    session: SessionHandle,
    requested_participant_id: Option<u64>,
) {
    // Separate connection id for correlating logs before/after a
    // participant_id exists.
    let conn_id = next_id();
    let span = info_span!("conn", conn_id, participant_id = tracing::field::Empty);
    let _enter = span.enter();

    let mut ctx = match bootstrap_connection(&mut socket, &session, requested_participant_id).await
    {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    span.record("participant_id", ctx.participant_id);
    info!("participant connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub participant_id: u64,
    pub event_tx: mpsc::Sender<SwarmEvent>,
    pub bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub latest_rx: watch::Receiver<Utf8Bytes>,
    pub roster_rx: watch::Receiver<RosterState>,
    pub decision_rx: watch::Receiver<Option<DecisionRecord>>,
    pub has_joined: bool,
    // Count lag recovery snapshots sent to this connection.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_event_full_log: Instant,
    pub last_update_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    session: &SessionHandle,
    requested_participant_id: Option<u64>,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* doing anything else (awaits) to not
    // miss packets.
    let bytes_rx = session.bytes_tx.subscribe();
    let latest_rx = session.latest_tx.subscribe();
    let roster_rx = session.roster_tx.subscribe();
    let decision_rx = session.decision_tx.subscribe();

    // Handshake & ID assignment. If the client carries a persisted
    // identity, prefer it; otherwise generate one. `next_id()` is
    // process-unique, so IDs won't collide within a running server.
    let participant_id = requested_participant_id.unwrap_or_else(next_id);

    let identity_msg = ServerMessage::Identity { participant_id };
    let _ = send_message(socket, &identity_msg).await?;

    // Notify the engine before the snapshot so the roster it reflects can
    // already include this participant. If anything after Join fails,
    // compensate with Leave to avoid "joined but never connected".
    session
        .event_tx
        .send(SwarmEvent::Join { participant_id })
        .await
        .map_err(|_| NetError::EventsClosed)?;

    // Full session snapshot: labels, option positions, status, and the
    // decision when the session already finished. Clone out of the watch
    // borrows before awaiting.
    let roster = *roster_rx.borrow();
    let decision = decision_rx.borrow().clone();
    let snapshot = ServerMessage::Session(session_dto(
        &session.record,
        &session.option_points,
        roster,
        decision.as_ref(),
    ));
    if let Err(e) = send_message(socket, &snapshot).await {
        session
            .event_tx
            .send(SwarmEvent::Leave { participant_id })
            .await
            .map_err(|_| NetError::EventsClosed)?; // EventsClosed takes precedence
        return Err(e);
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        participant_id,
        event_tx: session.event_tx.clone(),
        bytes_rx,
        latest_rx,
        roster_rx,
        decision_rx,
        has_joined: false,
        lag_recovery_count: 0,

        msgs_in: 0,
        msgs_out: 0,
        bytes_in: 0,
        bytes_out: 0,

        invalid_json: 0,

        last_event_full_log: now,
        last_update_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_DISPLAY_NAME_LEN: usize = 32;
const DEFAULT_DISPLAY_NAME: &str = "Participant";

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

// Out-of-range targets are clamped by the intent ledger; only non-finite
// values are malformed enough to drop.
fn sanitize_intent(intent: IntentDto) -> Option<Vec2> {
    if !intent.x.is_finite() || !intent.y.is_finite() {
        return None;
    }
    Some(intent.into())
}

fn forward_event(
    participant_id: u64,
    event_tx: &mpsc::Sender<SwarmEvent>,
    event: SwarmEvent,
    last_event_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match event_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            // Drop under pressure; the next report supersedes this one.
            if should_log(last_event_full_log) {
                warn!(participant_id, "event channel full; dropping event");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::EventsClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let participant_id = ctx.participant_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        event_tx,
        bytes_rx,
        latest_rx,
        roster_rx,
        decision_rx,
        has_joined,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_event_full_log,
        last_update_lag_log,
        last_invalid_input_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming message from the participant
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    participant_id,
                    event_tx,
                    has_joined,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_event_full_log,
                    last_invalid_input_log,
                    close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing engine update (puck samples, intent echoes)
            update = bytes_rx.recv() => {
                match update {
                    Ok(bytes) => match forward_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_update_lag_log) {
                            warn!(missed = n, "engine updates lagged; sending snapshot");
                        }

                        // Resync strategy: send the latest puck sample.
                        let latest = latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            *lag_recovery_count += 1;
                            match forward_bytes(latest, socket, msgs_out, bytes_out).await {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::UpdatesClosed);
                        true
                    }
                }
            }

            // Roster/status transitions
            changed = roster_rx.changed() => {
                match changed {
                    Ok(()) => {
                        let roster = *roster_rx.borrow_and_update();
                        let msg = ServerMessage::SessionState(roster.into());
                        match send_message(socket, &msg).await {
                            Ok(bytes) => {
                                *msgs_out += 1;
                                *bytes_out += bytes as u64;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send session state");
                                true
                            }
                        }
                    }
                    Err(_) => {
                        warn!(participant_id, "roster channel closed; disconnecting");
                        fatal = Some(NetError::RosterClosed);
                        true
                    }
                }
            }

            // The finalized decision, exactly once
            changed = decision_rx.changed() => {
                match changed {
                    Ok(()) => {
                        let decision = decision_rx.borrow_and_update().clone();
                        match decision {
                            Some(record) => {
                                let msg = ServerMessage::Decision((&record).into());
                                match send_message(socket, &msg).await {
                                    Ok(bytes) => {
                                        *msgs_out += 1;
                                        *bytes_out += bytes as u64;
                                        false
                                    }
                                    Err(err) => {
                                        warn!(error = ?err, "failed to send decision");
                                        true
                                    }
                                }
                            }
                            None => false,
                        }
                    }
                    // The engine holds its decision sender for the session's
                    // lifetime; closure just means the session is gone.
                    Err(_) => true,
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(
        participant_id,
        event_tx,
        *msgs_in,
        *msgs_out,
        *bytes_in,
        *bytes_out,
        *invalid_json,
        *lag_recovery_count,
    )
    .await
    {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal { Err(err) } else { Ok(()) }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    participant_id: u64,
    event_tx: &mpsc::Sender<SwarmEvent>,
    has_joined: &mut bool,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_event_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => {
                        // Join is the only time we accept identity metadata.
                        let mut name = payload.display_name.trim();
                        if name.is_empty() {
                            name = DEFAULT_DISPLAY_NAME;
                        }
                        if name.len() > MAX_DISPLAY_NAME_LEN {
                            // Avoid disconnecting on oversized names; fall
                            // back to the default.
                            if should_log(last_invalid_input_log) {
                                warn!(participant_id, "display name too long; defaulting");
                            }
                            name = DEFAULT_DISPLAY_NAME;
                        }
                        info!(participant_id, display_name = name, "participant joined");
                        *has_joined = true;
                        Ok(LoopControl::Continue)
                    }
                    Ok(ClientMessage::Intent(intent)) => {
                        if !*has_joined {
                            if should_log(last_invalid_input_log) {
                                warn!(participant_id, "received intent before join");
                            }
                            return Ok(LoopControl::Continue);
                        }

                        let Some(target) = sanitize_intent(intent) else {
                            if should_log(last_invalid_input_log) {
                                warn!(participant_id, "non-finite intent values; dropping");
                            }
                            return Ok(LoopControl::Continue);
                        };

                        forward_event(
                            participant_id,
                            event_tx,
                            SwarmEvent::Intent {
                                participant_id,
                                target,
                            },
                            last_event_full_log,
                        )
                    }
                    Ok(ClientMessage::Reset) => {
                        if !*has_joined {
                            if should_log(last_invalid_input_log) {
                                warn!(participant_id, "received reset before join");
                            }
                            return Ok(LoopControl::Continue);
                        }
                        info!(participant_id, "reset requested");
                        forward_event(
                            participant_id,
                            event_tx,
                            SwarmEvent::Reset,
                            last_event_full_log,
                        )
                    }
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                participant_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(participant_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(participant_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(
    bytes: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect follows immediately.
            warn!(error = ?err, "failed to send engine update");
            LoopControl::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn disconnect_cleanup(
    participant_id: u64,
    event_tx: &mpsc::Sender<SwarmEvent>,
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    lag_recovery_count: u64,
) -> Result<(), NetError> {
    event_tx
        .send(SwarmEvent::Leave { participant_id })
        .await
        .map_err(|_| NetError::EventsClosed)?;

    debug!(
        participant_id,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        lag_recovery_count,
        "connection stats"
    );
    info!(participant_id, "participant disconnected");
    Ok(())
}
