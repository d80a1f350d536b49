//! # Streaming I/O Port
//!
//! The session controller never touches the WebSocket directly. It talks to an
//! [`AudioStreamPort`]: receive the next inbound event, send one outbound text
//! message. The WebSocket glue in `websocket.rs` implements it for live
//! connections; tests implement it with plain channels.
//!
//! ## Suspension points:
//! - `receive` suspends until a frame arrives, the peer disconnects or the transport fails
//! - `send_text` suspends only while the transport applies backpressure
//!
//! Both methods are cancel-safe: dropping a pending `receive` (e.g. on a drain
//! timeout) must not lose a frame.

use async_trait::async_trait;
use std::fmt;

/// Something arriving from the far end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Opaque PCM16LE bytes, exactly as the transport delivered them
    Frame(Vec<u8>),
    /// Clean disconnect; code and reason are reported when the peer sent them
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
}

/// Channel failure other than a clean disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is gone; nothing can be sent anymore
    Closed,
    /// The transport reported a protocol or I/O failure
    Protocol(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait AudioStreamPort: Send {
    async fn receive(&mut self) -> Result<InboundEvent, TransportError>;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Channel-backed port for driving a controller from tests.

    use super::*;
    use tokio::sync::mpsc;

    pub struct ChannelPort {
        inbound: mpsc::UnboundedReceiver<Result<InboundEvent, TransportError>>,
        outbound: mpsc::UnboundedSender<String>,
        /// Number of upcoming sends that fail with a protocol error
        pub failing_sends: usize,
    }

    pub struct PeerHandle {
        pub inbound: mpsc::UnboundedSender<Result<InboundEvent, TransportError>>,
        pub outbound: mpsc::UnboundedReceiver<String>,
    }

    impl PeerHandle {
        pub fn send_frame(&self, data: &[u8]) {
            let _ = self.inbound.send(Ok(InboundEvent::Frame(data.to_vec())));
        }

        pub fn close(&self, code: u16, reason: &str) {
            let _ = self.inbound.send(Ok(InboundEvent::Closed {
                code: Some(code),
                reason: Some(reason.to_string()),
            }));
        }

        pub fn fail(&self, message: &str) {
            let _ = self.inbound.send(Err(TransportError::Protocol(message.to_string())));
        }

        /// Everything sent so far, without waiting.
        pub fn sent(&mut self) -> Vec<String> {
            let mut sent = Vec::new();
            while let Ok(text) = self.outbound.try_recv() {
                sent.push(text);
            }
            sent
        }
    }

    pub fn channel_port() -> (ChannelPort, PeerHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            ChannelPort {
                inbound: inbound_rx,
                outbound: outbound_tx,
                failing_sends: 0,
            },
            PeerHandle {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }

    #[async_trait]
    impl AudioStreamPort for ChannelPort {
        async fn receive(&mut self) -> Result<InboundEvent, TransportError> {
            match self.inbound.recv().await {
                Some(event) => event,
                None => Ok(InboundEvent::Closed {
                    code: None,
                    reason: None,
                }),
            }
        }

        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            if self.failing_sends > 0 {
                self.failing_sends -= 1;
                return Err(TransportError::Protocol("send rejected".to_string()));
            }
            self.outbound.send(text).map_err(|_| TransportError::Closed)
        }
    }
}
