//! # WebSocket Loopback Endpoint
//!
//! Accepts connections on `/live/{path}` and runs one echo session per connection.
//! The `{path}` segment is the session identity used to name the recording.
//!
//! ## Actor / task split:
//! The actix actor owns the socket. It forwards every inbound binary frame (and the
//! close or protocol error that ends the stream) into a channel, and writes outbound
//! text when asked via [`SendText`]. The session controller runs in its own task and
//! sees the socket only through [`SocketPort`], so it can await receives, sends and
//! pacing waits strictly one after another.
//!
//! ## Message Format:
//! - **Client → Server**: Binary PCM16LE mono audio, 16kHz
//! - **Server → Client**: `{"type":"streamAudio","data":{...}}` text messages
//! - Text frames from the client are ignored

use crate::audio::port::{AudioStreamPort, InboundEvent, TransportError};
use crate::audio::session::{SessionController, SessionReport};
use crate::error::AppError;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

type EventSender = mpsc::UnboundedSender<Result<InboundEvent, TransportError>>;
type EventReceiver = mpsc::UnboundedReceiver<Result<InboundEvent, TransportError>>;

/// Message for sending text to the WebSocket client.
#[derive(Message)]
#[rtype(result = "()")]
struct SendText(String);

/// The session task is done; close the connection.
#[derive(Message)]
#[rtype(result = "()")]
struct SessionFinished;

/// WebSocket actor for one loopback connection.
///
/// The session controller is only built in `started`, once the handshake has
/// succeeded; a rejected upgrade never creates a session.
pub struct LoopbackSocket {
    id: Uuid,
    identity: String,
    state: AppState,
    events: Option<EventSender>,
    /// Taken by `started` and handed to the session task
    pending: Option<EventReceiver>,
}

impl LoopbackSocket {
    pub fn new(state: &AppState, identity: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4(),
            identity,
            state: state.clone(),
            events: Some(tx),
            pending: Some(rx),
        }
    }

    /// Hand an inbound event to the session task.
    fn forward(&mut self, event: Result<InboundEvent, TransportError>) {
        let delivered = match &self.events {
            Some(events) => events.send(event).is_ok(),
            None => return,
        };
        if !delivered {
            debug!("session task already finished; dropping inbound event");
            self.events = None;
        }
    }
}

/// Session-side view of the socket.
struct SocketPort {
    events: EventReceiver,
    socket: Addr<LoopbackSocket>,
}

#[async_trait]
impl AudioStreamPort for SocketPort {
    async fn receive(&mut self) -> Result<InboundEvent, TransportError> {
        match self.events.recv().await {
            Some(event) => event,
            // Actor stopped without a close frame (e.g. the TCP connection dropped).
            None => Ok(InboundEvent::Closed {
                code: None,
                reason: None,
            }),
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(SendText(text))
            .await
            .map_err(|_| TransportError::Closed)
    }
}

fn close_event(reason: Option<ws::CloseReason>) -> InboundEvent {
    match reason {
        Some(reason) => InboundEvent::Closed {
            code: Some(u16::from(reason.code)),
            reason: reason.description,
        },
        None => InboundEvent::Closed {
            code: None,
            reason: None,
        },
    }
}

async fn run_session(mut controller: SessionController, mut port: SocketPort) -> SessionReport {
    controller.run(&mut port).await
}

impl Actor for LoopbackSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Called when the WebSocket connection starts.
    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session_id = %self.id, identity = %self.identity, "WebSocket connection started");

        let events = match self.pending.take() {
            Some(events) => events,
            None => return,
        };

        let controller = self.state.new_session(&self.identity);
        let port = SocketPort {
            events,
            socket: ctx.address(),
        };
        let span = info_span!("session", id = %self.id, identity = %self.identity);
        let metrics = self.state.metrics.clone();
        let socket = ctx.address();

        metrics.session_started();
        let session = tokio::spawn(run_session(controller, port).instrument(span));

        tokio::spawn(async move {
            match session.await {
                Ok(report) => {
                    debug!(
                        identity = %report.identity,
                        echoed_frames = report.echoed_frames,
                        "session finished: {:?}",
                        report.outcome
                    );
                    metrics.record_report(&report);
                }
                Err(err) => {
                    error!("session task failed: {}", err);
                    metrics.session_aborted();
                }
            }
            socket.do_send(SessionFinished);
        });
    }

    /// Called when the WebSocket connection stops.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.events = None;
        info!(session_id = %self.id, "WebSocket connection stopped");
    }
}

/// Handle incoming WebSocket messages.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LoopbackSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.forward(Ok(InboundEvent::Frame(data.to_vec())));
            }
            Ok(ws::Message::Text(text)) => {
                warn!("ignoring {}-byte text frame; only binary audio is accepted", text.len());
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                self.forward(Ok(close_event(reason.clone())));
                self.events = None;
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!("WebSocket protocol error: {}", err);
                self.forward(Err(TransportError::Protocol(err.to_string())));
                self.events = None;
                ctx.stop();
            }
        }
    }
}

/// Handle SendText messages.
impl Handler<SendText> for LoopbackSocket {
    type Result = ();

    fn handle(&mut self, msg: SendText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// Handle SessionFinished messages.
impl Handler<SessionFinished> for LoopbackSocket {
    type Result = ();

    fn handle(&mut self, _msg: SessionFinished, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

/// WebSocket endpoint handler.
///
/// ## HTTP to WebSocket Upgrade:
/// Upgrades the request and starts a [`LoopbackSocket`] actor for it. A failed
/// handshake is answered with a 400 JSON error.
pub async fn live_socket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let identity = path.into_inner();
    info!(
        "New WebSocket connection request for '{}' from: {:?}",
        identity,
        req.connection_info().peer_addr()
    );

    let socket = LoopbackSocket::new(&state, identity);
    ws::start(socket, &req, stream).map_err(|err| AppError::BadRequest(err.to_string()))
}
