//! Outbound wire message.
//!
//! Every audio frame sent to the client, greeting chunk or echo, is one compact JSON
//! text message:
//!
//! ```json
//! {"type":"streamAudio","data":{"audioDataType":"raw","sampleRate":16000,"audioData":"<base64>"}}
//! ```

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "streamAudio")]
    StreamAudio(StreamAudio),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamAudio {
    pub audio_data_type: AudioDataType,
    pub sample_rate: u32,
    /// Base64 (standard alphabet, padded) of the PCM16LE bytes
    pub audio_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioDataType {
    Raw,
}

impl OutboundMessage {
    pub fn stream_audio(pcm: &[u8], sample_rate: u32) -> Self {
        OutboundMessage::StreamAudio(StreamAudio {
            audio_data_type: AudioDataType::Raw,
            sample_rate,
            audio_data: BASE64_STANDARD.encode(pcm),
        })
    }

    /// Compact JSON text, no embedded whitespace.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decoded PCM payload carried by this message.
    #[cfg(test)]
    pub fn audio_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            OutboundMessage::StreamAudio(audio) => BASE64_STANDARD.decode(&audio.audio_data),
        }
    }

    #[cfg(test)]
    pub fn sample_rate(&self) -> u32 {
        match self {
            OutboundMessage::StreamAudio(audio) => audio.sample_rate,
        }
    }
}
