//! Outbound speech synthesis.
//!
//! Replies are read aloud through the Azure TTS REST endpoint when speech
//! credentials are configured. Playback is strictly best-effort: synthesis
//! failures are logged and swallowed, and the audio travels to the client
//! as a base64 frame on the session socket.

use crate::config::SpeechConfig;
use anyhow::{Context, Result, bail};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

const OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";
const SYNTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Removes emoji and pictographs before synthesis so the voice does not
/// read out glyph names.
pub fn strip_emojis(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            !matches!(u32::from(c),
                0x1F300..=0x1F5FF   // symbols and pictographs
                | 0x1F600..=0x1F64F // emoticons
                | 0x1F680..=0x1F6FF // transport
                | 0x1F700..=0x1F77F
                | 0x1F900..=0x1F9FF // supplemental symbols
                | 0x1FA00..=0x1FAFF
                | 0x2600..=0x26FF   // misc symbols
                | 0x2700..=0x27BF   // dingbats
                | 0x1F100..=0x1F2FF // enclosed alphanumerics and regional indicators
                | 0x2B00..=0x2BFF
                | 0xFE00..=0xFE0F   // variation selectors
                | 0x200D            // zero-width joiner
            )
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A client for the Azure speech synthesis REST endpoint.
pub struct AzureSynthesizer {
    http: reqwest::Client,
    key: String,
    endpoint: String,
    voice: String,
}

impl AzureSynthesizer {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            key: config.key.clone(),
            endpoint: format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                config.region
            ),
            voice: config.voice.clone(),
        }
    }

    /// Synthesizes the text to a WAV byte buffer. Returns an error when the
    /// cleaned text is empty or the service rejects the request.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let clean = strip_emojis(text);
        if clean.is_empty() {
            bail!("nothing to synthesize after emoji removal");
        }
        let ssml = format!(
            "<speak version='1.0' xml:lang='da-DK'><voice name='{}'>{}</voice></speak>",
            self.voice,
            escape_xml(&clean)
        );
        let response = self
            .http
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .timeout(SYNTH_TIMEOUT)
            .body(ssml)
            .send()
            .await
            .context("Speech synthesis request failed")?;
        if !response.status().is_success() {
            bail!("speech synthesis returned status {}", response.status());
        }
        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
