//! JSON messages exchanged with the live endpoint.
//!
//! Client messages are externally tagged (`{"setup": {...}}`,
//! `{"realtimeInput": {...}}`). Server messages are a bag of optional keys;
//! anything we do not understand is ignored.

use crate::audio::encode::AudioChunk;
use crate::error::Result;
use crate::session::event::{
    AudioFragment, ControlSignal, InboundEvent, Speaker, TextFragment, TransportEvent,
};
use serde::{Deserialize, Serialize};

/// What the remote model answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    #[default]
    Audio,
    Text,
}

impl ResponseModality {
    fn wire_name(self) -> &'static str {
        match self {
            ResponseModality::Audio => "AUDIO",
            ResponseModality::Text => "TEXT",
        }
    }
}

/// Everything needed to configure one live session on the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub model: String,
    pub modality: ResponseModality,
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
}

impl SessionSetup {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            modality: ResponseModality::Audio,
            voice: None,
            system_instruction: None,
            transcribe_input: true,
            transcribe_output: true,
        }
    }

    pub fn with_modality(mut self, modality: ResponseModality) -> Self {
        self.modality = modality;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_transcription(mut self, input: bool, output: bool) -> Self {
        self.transcribe_input = input;
        self.transcribe_output = output;
        self
    }

    pub fn to_message(&self) -> ClientMessage {
        // Voice selection only applies to spoken responses.
        let speech_config = match (self.modality, &self.voice) {
            (ResponseModality::Audio, Some(voice)) => Some(SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice.clone(),
                    },
                },
            }),
            _ => None,
        };

        ClientMessage::Setup(SetupPayload {
            model: self.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![self.modality.wire_name().to_string()],
                speech_config,
            },
            system_instruction: self.system_instruction.as_ref().map(|text| Content {
                parts: vec![TextPart { text: text.clone() }],
            }),
            input_audio_transcription: self.transcribe_input.then(Empty::default),
            output_audio_transcription: (self.transcribe_output
                && self.modality == ResponseModality::Audio)
                .then(Empty::default),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Empty>,
}

/// Base64 payload with its MIME label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(SetupPayload),
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    pub fn audio(chunk: &AudioChunk) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: Some(Blob {
                mime_type: Some(chunk.mime_type.clone()),
                data: chunk.data.clone(),
            }),
            text: None,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: None,
            text: Some(text.into()),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub inline_data: Option<Blob>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

/// Server to client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

fn text_event(speaker: Speaker, text: String) -> Option<TransportEvent> {
    (!text.is_empty()).then(|| InboundEvent::Text(TextFragment { speaker, text }).into())
}

impl ServerMessage {
    pub fn parse(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }

    /// Flatten into events: setup, model parts, input transcript, output
    /// transcript, interruption, turn completion, go-away.
    pub fn into_events(self) -> Vec<TransportEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(TransportEvent::Opened);
        }

        if let Some(content) = self.server_content {
            for part in content.model_turn.map(|t| t.parts).unwrap_or_default() {
                if let Some(blob) = part.inline_data {
                    events.push(
                        InboundEvent::Audio(AudioFragment {
                            data: blob.data,
                            mime_type: blob.mime_type,
                        })
                        .into(),
                    );
                }
                if let Some(text) = part.text {
                    events.extend(text_event(Speaker::Assistant, text));
                }
            }
            if let Some(text) = content.input_transcription.and_then(|t| t.text) {
                events.extend(text_event(Speaker::User, text));
            }
            if let Some(text) = content.output_transcription.and_then(|t| t.text) {
                events.extend(text_event(Speaker::Assistant, text));
            }
            if content.interrupted {
                events.push(InboundEvent::Control(ControlSignal::Interrupted).into());
            }
            if content.turn_complete {
                events.push(InboundEvent::Control(ControlSignal::TurnComplete).into());
            }
        }

        if let Some(go_away) = self.go_away {
            events.push(TransportEvent::GoAway {
                time_left: go_away.time_left,
            });
        }

        events
    }
}

/// Parse one frame into the events it carries.
pub fn parse_server_frame(frame: &[u8]) -> Result<Vec<TransportEvent>> {
    Ok(ServerMessage::parse(frame)?.into_events())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode::encode_block;
    use serde_json::{Value, json};

    fn to_value(msg: &ClientMessage) -> Value {
        serde_json::from_str(&msg.to_json().unwrap()).unwrap()
    }

    #[test]
    fn setup_message_shape() {
        let setup = SessionSetup::new("models/test")
            .with_voice("Puck")
            .with_system_instruction("Teach me");
        assert_eq!(
            to_value(&setup.to_message()),
            json!({
                "setup": {
                    "model": "models/test",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Puck"}}
                        }
                    },
                    "systemInstruction": {"parts": [{"text": "Teach me"}]},
                    "inputAudioTranscription": {},
                    "outputAudioTranscription": {}
                }
            })
        );
    }

    #[test]
    fn text_modality_omits_voice_and_output_transcription() {
        let setup = SessionSetup::new("m")
            .with_modality(ResponseModality::Text)
            .with_voice("Puck")
            .with_transcription(false, true);
        let value = to_value(&setup.to_message());
        let payload = &value["setup"];
        assert_eq!(payload["generationConfig"]["responseModalities"], json!(["TEXT"]));
        assert!(payload["generationConfig"].get("speechConfig").is_none());
        assert!(payload.get("inputAudioTranscription").is_none());
        assert!(payload.get("outputAudioTranscription").is_none());
        assert!(payload.get("systemInstruction").is_none());
    }

    #[test]
    fn realtime_audio_and_text_messages() {
        let chunk = encode_block(&[0.0, 0.5], 0);
        assert_eq!(
            to_value(&ClientMessage::audio(&chunk)),
            json!({"realtimeInput": {"audio": {"mimeType": "audio/pcm;rate=16000", "data": chunk.data}}})
        );
        assert_eq!(
            to_value(&ClientMessage::text("Begin now.")),
            json!({"realtimeInput": {"text": "Begin now."}})
        );
    }

    #[test]
    fn setup_complete_opens() {
        let events = parse_server_frame(br#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(events, vec![TransportEvent::Opened]);
    }

    #[test]
    fn server_content_event_order() {
        let frame = json!({
            "serverContent": {
                "modelTurn": {"parts": [
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}},
                    {"text": "hi"}
                ]},
                "inputTranscription": {"text": "question"},
                "outputTranscription": {"text": "answer"},
                "interrupted": true,
                "turnComplete": true
            }
        })
        .to_string();

        let events = parse_server_frame(frame.as_bytes()).unwrap();
        assert_eq!(
            events,
            vec![
                InboundEvent::Audio(AudioFragment {
                    data: "AAA=".into(),
                    mime_type: Some("audio/pcm;rate=24000".into()),
                })
                .into(),
                InboundEvent::Text(TextFragment {
                    speaker: Speaker::Assistant,
                    text: "hi".into()
                })
                .into(),
                InboundEvent::Text(TextFragment {
                    speaker: Speaker::User,
                    text: "question".into()
                })
                .into(),
                InboundEvent::Text(TextFragment {
                    speaker: Speaker::Assistant,
                    text: "answer".into()
                })
                .into(),
                InboundEvent::Control(ControlSignal::Interrupted).into(),
                InboundEvent::Control(ControlSignal::TurnComplete).into(),
            ]
        );
    }

    #[test]
    fn unknown_keys_and_empty_text_are_ignored() {
        let frame = br#"{"usageMetadata": {"totalTokenCount": 3},
            "serverContent": {"outputTranscription": {"text": ""}, "generationComplete": true}}"#;
        assert!(parse_server_frame(frame).unwrap().is_empty());
    }

    #[test]
    fn go_away_carries_time_left() {
        let events = parse_server_frame(br#"{"goAway": {"timeLeft": "10s"}}"#).unwrap();
        assert_eq!(
            events,
            vec![TransportEvent::GoAway {
                time_left: Some("10s".into())
            }]
        );
    }

    #[test]
    fn malformed_frame_is_protocol_error() {
        let err = parse_server_frame(b"not json").unwrap_err();
        assert!(matches!(err, crate::error::CognitaError::Protocol { .. }));
    }
}
