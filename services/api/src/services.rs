//! Speech service adapters: transcription of caller utterances and synthesis
//! of assistant replies, both behind traits so the pipeline can run against
//! fakes in tests.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        AudioInput, CreateSpeechRequestArgs, CreateTranscriptionRequestArgs, SpeechModel,
        SpeechResponseFormat, Voice,
    },
};
use async_trait::async_trait;
use bytes::Bytes;

use crate::audio;

#[derive(Debug, thiserror::Error)]
#[error("transcription failed: {0}")]
pub struct TranscriptionError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// Turns one caller utterance (raw PCM16 mono) into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes) -> Result<String, TranscriptionError>;
}

/// Turns one assistant reply into PCM16 mono audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SynthesisError>;
}

pub struct OpenAiTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Bytes) -> Result<String, TranscriptionError> {
        // The transcription endpoint wants a container, not raw samples.
        let wav = audio::pcm16_to_wav(&audio);
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8("utterance.wav".to_string(), wav))
            .model(&self.model)
            .build()
            .map_err(|e| TranscriptionError(e.to_string()))?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| TranscriptionError(e.to_string()))?;
        Ok(response.text)
    }
}

pub struct OpenAiSynthesizer {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiSynthesizer {
    pub fn new(config: OpenAIConfig, model: &str, voice: &str) -> Self {
        Self {
            client: Client::with_config(config),
            model: speech_model(model),
            voice: speech_voice(voice),
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SynthesisError> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .model(self.model.clone())
            .voice(self.voice.clone())
            .response_format(SpeechResponseFormat::Pcm)
            .build()
            .map_err(|e| SynthesisError(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| SynthesisError(e.to_string()))?;
        Ok(response.bytes)
    }
}

fn speech_model(model: &str) -> SpeechModel {
    match model {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

// Config validation guarantees one of the six names; the fallback only
// matters for callers that bypass Config.
fn speech_voice(voice: &str) -> Voice {
    match voice {
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => Voice::Alloy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_speech_models_map_to_variants() {
        assert!(matches!(speech_model("tts-1"), SpeechModel::Tts1));
        assert!(matches!(speech_model("tts-1-hd"), SpeechModel::Tts1Hd));
        assert!(
            matches!(speech_model("gpt-4o-mini-tts"), SpeechModel::Other(name) if name == "gpt-4o-mini-tts")
        );
    }

    #[test]
    fn voices_map_with_alloy_fallback() {
        assert!(matches!(speech_voice("nova"), Voice::Nova));
        assert!(matches!(speech_voice("shimmer"), Voice::Shimmer));
        assert!(matches!(speech_voice("unknown"), Voice::Alloy));
    }
}
