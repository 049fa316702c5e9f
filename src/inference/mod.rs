//! Streaming client for a locally hosted model's generate endpoint.
//!
//! The endpoint accepts `POST /api/generate` with `{model, prompt, stream}`
//! and answers with newline-delimited JSON records of the form
//! `{"response": "...", "done": false}`. Tokens are surfaced as they arrive;
//! the stream ends at the first record with `done = true` or when the server
//! closes the body, whichever comes first.
//!
//! ## Usage
//!
//! ```no_run
//! use futures::StreamExt;
//! use narrate::inference::InferenceClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = InferenceClient::new("http://localhost:11434", "llama3")?;
//! let mut tokens = client.generate("Say hi").await?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?.text);
//! }
//! # Ok(())
//! # }
//! ```

mod ndjson;

pub use ndjson::{GenerateChunk, NdjsonDecoder, StreamLine};

use crate::errors::InferenceError;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Url;
use serde::Serialize;
use std::collections::VecDeque;

/// Default base URL of a local model server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default model name.
pub const DEFAULT_MODEL: &str = "llama3";

const GENERATE_PATH: &str = "api/generate";

/// One piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToken {
    pub text: String,
    /// True when this token came from the final record
    pub done: bool,
}

/// Lazily evaluated sequence of tokens for one request.
pub type TokenStream = BoxStream<'static, Result<StreamToken, InferenceError>>;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// HTTP client bound to one endpoint and model.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl InferenceClient {
    /// Create a client for `base_url` (scheme, host and optional port).
    ///
    /// No request timeout is set: generation on a local model can take
    /// arbitrarily long.
    pub fn new(base_url: &str, model: &str) -> Result<Self, InferenceError> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: generate_url(base_url)?,
            model: model.to_string(),
        })
    }

    /// Full URL requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start generating for `prompt`.
    ///
    /// Fails up front on transport errors and on any status >= 400; the
    /// response is dropped in that case so the connection is released.
    pub async fn generate(&self, prompt: &str) -> Result<TokenStream, InferenceError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };

        tracing::debug!(endpoint = %self.endpoint, model = %self.model, prompt_chars = prompt.len(), "sending generate request");
        let response = self.http.post(self.endpoint.clone()).json(&body).send().await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(InferenceError::UpstreamHttp {
                status: status.as_u16(),
            });
        }

        Ok(token_stream(response))
    }
}

/// Resolve `base_url` to its generate endpoint.
pub fn generate_url(base_url: &str) -> Result<Url, InferenceError> {
    let invalid = |reason: String| InferenceError::InvalidEndpoint {
        url: base_url.to_string(),
        reason,
    };

    let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }
    if base.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(GENERATE_PATH).map_err(|e| invalid(e.to_string()))
}

/// Reading state carried between polls of the token stream.
struct StreamState {
    /// `None` once the connection has been released
    response: Option<reqwest::Response>,
    decoder: NdjsonDecoder,
    ready: VecDeque<StreamToken>,
}

impl StreamState {
    /// Queue tokens from decoded lines; returns true once `done` is seen.
    ///
    /// Anything after the final record is discarded.
    fn absorb(&mut self, lines: Vec<StreamLine>) -> bool {
        for line in lines {
            match line {
                StreamLine::Parsed(chunk) => {
                    if let Some(text) = chunk.response.filter(|t| !t.is_empty()) {
                        self.ready.push_back(StreamToken {
                            text,
                            done: chunk.done,
                        });
                    }
                    if chunk.done {
                        return true;
                    }
                }
                StreamLine::Unparsed(raw) => {
                    tracing::warn!(line = %raw, "unparseable stream record, passing through raw text");
                    self.ready.push_back(StreamToken {
                        text: raw,
                        done: false,
                    });
                }
            }
        }
        false
    }

    /// Drop the response, closing the connection.
    fn release(&mut self) {
        self.response = None;
    }
}

fn token_stream(response: reqwest::Response) -> TokenStream {
    let state = StreamState {
        response: Some(response),
        decoder: NdjsonDecoder::new(),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.ready.pop_front() {
                return Some((Ok(token), state));
            }
            let response = state.response.as_mut()?;

            match response.chunk().await {
                Ok(Some(bytes)) => {
                    let lines = state.decoder.push(&bytes);
                    if state.absorb(lines) {
                        state.release();
                    }
                }
                Ok(None) => {
                    let tail = state.decoder.finish().into_iter().collect();
                    state.absorb(tail);
                    state.release();
                }
                Err(e) => {
                    state.release();
                    return Some((Err(InferenceError::Request(e)), state));
                }
            }
        }
    })
    .boxed()
}
