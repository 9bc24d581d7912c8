//! Google Cloud Text-to-Speech implementation
//!
//! Unlike Polly, the audio arrives base64-encoded inside a JSON body, so the
//! response is decoded up front and served from memory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::provider::SpeechProvider;
use super::types::{AudioStream, SynthesisInput, Voice};
use crate::error::SpeechError;

#[derive(Debug, Clone)]
pub struct GoogleTtsConfig {
    pub api_key: String,
    pub language_code: String,
    pub ssml_gender: String,
    pub endpoint: String,
}

impl GoogleTtsConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            language_code: "en-US".to_string(),
            ssml_gender: "FEMALE".to_string(),
            endpoint: "https://texttospeech.googleapis.com/v1".to_string(),
        }
    }
}

pub struct GoogleTtsProvider {
    config: GoogleTtsConfig,
    client: Client,
}

impl GoogleTtsProvider {
    pub fn new(config: GoogleTtsConfig) -> Result<Self, SpeechError> {
        if config.api_key.is_empty() {
            return Err(SpeechError::Credentials);
        }

        Ok(Self {
            config,
            client: Client::new(),
        })
    }

    fn build_request<'a>(&'a self, input: &'a SynthesisInput) -> Result<SynthesizeRequest<'a>> {
        let text = if input.text_type == "ssml" {
            SynthesisText::Ssml(&input.markup)
        } else {
            SynthesisText::Text(&input.markup)
        };

        Ok(SynthesizeRequest {
            input: text,
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: &input.voice,
                ssml_gender: &self.config.ssml_gender,
            },
            audio_config: AudioConfig {
                audio_encoding: audio_encoding(&input.output_format)?,
                sample_rate_hertz: input.sample_rate_hz,
            },
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisText<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum SynthesisText<'a> {
    Ssml(&'a str),
    Text(&'a str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceData {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
}

fn audio_encoding(format: &str) -> Result<&'static str> {
    match format.to_ascii_lowercase().as_str() {
        "pcm" | "linear16" => Ok("LINEAR16"),
        "mp3" => Ok("MP3"),
        "ogg_vorbis" | "ogg_opus" => Ok("OGG_OPUS"),
        _ => anyhow::bail!("unsupported output format: {format}"),
    }
}

fn decode_audio_content(body: &str) -> Result<Vec<u8>> {
    let response: SynthesizeResponse =
        serde_json::from_str(body).context("Failed to parse synthesis response")?;
    let audio = base64::engine::general_purpose::STANDARD
        .decode(response.audio_content)
        .context("Failed to decode audio content")?;
    Ok(strip_wav_header(audio))
}

/// LINEAR16 responses carry a RIFF/WAVE header. Return only the samples of
/// the `data` chunk; anything that is not a WAVE file is returned unchanged.
fn strip_wav_header(audio: Vec<u8>) -> Vec<u8> {
    if audio.len() < 12 || &audio[0..4] != b"RIFF" || &audio[8..12] != b"WAVE" {
        return audio;
    }

    let mut pos = 12;
    while pos + 8 <= audio.len() {
        let id = &audio[pos..pos + 4];
        let size = u32::from_le_bytes([
            audio[pos + 4],
            audio[pos + 5],
            audio[pos + 6],
            audio[pos + 7],
        ]) as usize;
        let start = pos + 8;

        if id == b"data" {
            let end = start.saturating_add(size).min(audio.len());
            return audio[start..end].to_vec();
        }
        // chunks are word aligned
        pos = start.saturating_add(size).saturating_add(size & 1);
    }

    audio
}

#[async_trait]
impl SpeechProvider for GoogleTtsProvider {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<AudioStream> {
        let request_body = self.build_request(input)?;
        let url = format!("{}/text:synthesize", self.config.endpoint);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to Google Text-to-Speech")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google Text-to-Speech API error {status}: {body}");
        }

        let body = response
            .text()
            .await
            .context("Failed to read synthesis response")?;
        let audio = decode_audio_content(&body)?;

        tracing::debug!(bytes = audio.len(), "google synthesis decoded");

        Ok(Box::new(Cursor::new(audio)))
    }

    async fn list_voices(&self) -> Result<Vec<Voice>> {
        let url = format!("{}/voices", self.config.endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("languageCode", &self.config.language_code)])
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .context("Failed to list voices from Google Text-to-Speech")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google Text-to-Speech API error {status}: {body}");
        }

        let voices_response: VoicesResponse = response
            .json()
            .await
            .context("Failed to parse voices response")?;

        let voices = voices_response
            .voices
            .into_iter()
            .map(|v| Voice {
                id: v.name.clone(),
                name: v.name,
                language_code: v.language_codes.into_iter().next().unwrap_or_default(),
            })
            .collect();

        Ok(voices)
    }
}
