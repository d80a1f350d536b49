//! # Audio Loopback Module
//!
//! Everything a single echo session needs, independent of the WebSocket transport.
//!
//! ## Key Components:
//! - **Session Controller**: greeting, drain, echo and finalize phases (`session`)
//! - **Streaming I/O Port**: the receive/send seam the controller runs against (`port`)
//! - **Greeting Clip**: shared, decoded-once greeting audio (`greeting`)
//! - **Session Buffer**: ordered accumulation of received samples (`buffer`)
//! - **Recording Writer**: WAV output with collision-free naming (`recording`)
//! - **Audio Frames / Messages**: chunking and the `streamAudio` JSON envelope
//!
//! ## Audio Format:
//! - **Sample Rate**: 16kHz session rate (greeting chunks keep the clip's own rate)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono
//! - **Encoding**: Little-endian signed integers

pub mod buffer;
pub mod frame;
pub mod greeting;
pub mod message;
pub mod pcm;
pub mod port;
pub mod recording;
pub mod session;
