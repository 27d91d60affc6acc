//! HTTP client for the text-to-speech service
//!
//! Two routing modes selected by configuration: a local server (no auth
//! header) and the cloud service (API-key header). The response is a binary
//! audio blob, or an error body with an HTTP status.
//!
//! No timeout is enforced on synthesis calls: a hung request stalls only the
//! preload slot for its segment, never the rest of the pipeline.

use crate::error::{Error, Result};
use crate::synth::resolver::SynthesisRequest;
use futures::future::BoxFuture;
use futures::FutureExt;
use narravox_common::settings::SettingsStore;
use tracing::debug;

const SYNTHESIS_PATH: &str = "/v1/audio/text-to-speech";
const USER_AGENT: &str = concat!("narravox/", env!("CARGO_PKG_VERSION"));

/// Seam between the playback scheduler and the synthesis transport
///
/// The production implementation is [`HttpSpeechBackend`]; tests substitute
/// an in-memory fake.
pub trait SpeechBackend: Send + Sync {
    /// Synthesize one request into an encoded audio blob
    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// reqwest-based backend talking to the configured synthesis service
pub struct HttpSpeechBackend {
    client: reqwest::Client,
    settings: SettingsStore,
}

impl HttpSpeechBackend {
    pub fn new(settings: SettingsStore) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client, settings })
    }
}

/// Join the configured base URL with the synthesis path
fn endpoint_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), SYNTHESIS_PATH)
}

impl SpeechBackend for HttpSpeechBackend {
    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'static, Result<Vec<u8>>> {
        let settings = self.settings.get();
        let client = self.client.clone();

        async move {
            // The cloud service cannot succeed without credentials; failing
            // here lets the scheduler abort the whole queue instead of
            // skipping segment by segment.
            if !settings.use_local_api && settings.api_key.is_empty() {
                return Err(Error::MissingApiKey);
            }

            let url = endpoint_url(settings.synthesis_base_url());
            debug!(
                url = %url,
                model = %request.model,
                text_len = request.text.len(),
                "Sending synthesis request"
            );

            let mut builder = client.post(&url).json(&request);
            if !settings.use_local_api {
                builder = builder.header("X-API-Key", &settings.api_key);
            }

            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Synthesis {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response.bytes().await?;
            debug!("Received {} bytes of synthesized audio", bytes.len());
            Ok(bytes.to_vec())
        }
        .boxed()
    }
}
