//! Drives one request against a deployed endpoint, in unary or streaming
//! mode, and hands back adapter-normalized results.
//!
//! Each call is an independent unit of work: the executable configuration
//! is immutable, the frame decoder is created per call, and nothing is
//! shared across concurrent invocations. The network read is the only
//! suspension point; decoding and adapter transformation run synchronously
//! on whatever bytes have arrived.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::constants::DEFAULT_INVOKE_TIMEOUT;
use crate::deploy::naming;
use crate::error::InvokeError;
use crate::invoke::backend::BackendAdapter;
use crate::invoke::frame::{parse_record, FrameDecoder};
use crate::invoke::{ChatRequest, CompletionOutcome, StreamEvent};
use crate::registry::ServiceType;
use crate::resolver::ExecutableConfig;

/// Network location of a deployed endpoint. Produced by the deployment
/// layer; opaque here beyond being an HTTP base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    pub base_url: String,
}

impl EndpointAddress {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// How a service frames records on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireDialect {
    /// Raw newline-delimited JSON records (SageMaker response streams).
    JsonLines,
    /// Server-sent events: `data: <json>` lines with `[DONE]` as the
    /// terminal sentinel (the framework shim's event-stream route).
    EventStream,
}

impl WireDialect {
    pub fn for_service(service: ServiceType) -> Self {
        match service {
            ServiceType::Sagemaker => WireDialect::JsonLines,
            ServiceType::Ec2 | ServiceType::Ecs | ServiceType::Local => WireDialect::EventStream,
        }
    }

    /// Extract the JSON payload from one framed record. `None` drops SSE
    /// framing (blank separators, comments, the `[DONE]` sentinel) before
    /// it ever reaches the structured decode.
    pub fn unwrap_record<'a>(&self, raw: &'a [u8]) -> Option<&'a [u8]> {
        let trimmed = trim_ascii(raw);
        if trimmed.is_empty() {
            return None;
        }
        match self {
            WireDialect::JsonLines => Some(trimmed),
            WireDialect::EventStream => {
                let payload = trim_ascii(trimmed.strip_prefix(b"data:")?);
                if payload == b"[DONE]" {
                    None
                } else {
                    Some(payload)
                }
            }
        }
    }
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

/// Turn a raw chunk stream into normalized completion events.
///
/// Transport-independent so tests can drive it from in-memory chunk
/// sequences. Event order is exactly record order, which is exactly
/// delimiter order in the byte stream. A record that fails structured
/// decode is reported as an `Err` item and the stream continues; protocol
/// and transport errors terminate the stream after being reported. The
/// decoder is driven to `Closed` on every exit path, including
/// cancellation and deadline expiry, because it is owned by this stream.
pub fn decode_event_stream<S>(
    chunks: S,
    adapter: BackendAdapter,
    dialect: WireDialect,
    cancel: CancellationToken,
    deadline: Option<Deadline>,
) -> impl Stream<Item = Result<StreamEvent, InvokeError>>
where
    S: Stream<Item = Result<Bytes, InvokeError>>,
{
    // One decoded record becomes at most one item: either a normalized
    // event, a localized decode error, or a fatal protocol error.
    enum Step {
        Chunk(Bytes),
        Eos,
        Cancelled,
        TimedOut,
        Failed(InvokeError),
    }

    async_stream::stream! {
        let mut decoder = FrameDecoder::newline();
        futures::pin_mut!(chunks);
        'drive: loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                _ = sleep_until_deadline(deadline) => Step::TimedOut,
                next = chunks.next() => match next {
                    Some(Ok(chunk)) => Step::Chunk(chunk),
                    Some(Err(err)) => Step::Failed(err),
                    None => Step::Eos,
                },
            };
            match step {
                Step::Chunk(chunk) => {
                    decoder.push(&chunk);
                    while let Some(raw) = decoder.next_record() {
                        match transform_record(&adapter, dialect, &raw) {
                            None => {}
                            Some(Ok(event)) => yield Ok(event),
                            Some(Err(err @ InvokeError::Decode { .. })) => {
                                // Localized: report and keep scanning.
                                yield Err(err);
                            }
                            Some(Err(err)) => {
                                decoder.finish();
                                yield Err(err);
                                break 'drive;
                            }
                        }
                    }
                }
                Step::Eos => {
                    if let Some(raw) = decoder.finish() {
                        if let Some(item) = transform_record(&adapter, dialect, &raw) {
                            yield item;
                        }
                    }
                    break 'drive;
                }
                Step::Failed(err) => {
                    decoder.finish();
                    yield Err(err);
                    break 'drive;
                }
                Step::Cancelled => {
                    debug!("streaming invocation cancelled");
                    decoder.finish();
                    break 'drive;
                }
                Step::TimedOut => {
                    decoder.finish();
                    yield Err(InvokeError::Timeout(
                        deadline.map(|d| d.budget).unwrap_or_default(),
                    ));
                    break 'drive;
                }
            }
        }
    }
}

/// Unwrap wire framing, parse and normalize one record. `None` when the
/// record is framing or a keep-alive that must be skipped.
fn transform_record(
    adapter: &BackendAdapter,
    dialect: WireDialect,
    raw: &[u8],
) -> Option<Result<StreamEvent, InvokeError>> {
    let payload = dialect.unwrap_record(raw)?;
    match parse_record(payload) {
        Ok(value) => adapter.transform_streaming_event(&value).transpose(),
        Err(err) => Some(Err(err)),
    }
}

/// Absolute cutoff for a streaming drive plus the budget it came from, so
/// the timeout error can name what was configured.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    pub budget: Duration,
}

async fn sleep_until_deadline(deadline: Option<Deadline>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d.at).await,
        None => futures::future::pending().await,
    }
}

/// Client for one deployed endpoint.
pub struct InvocationClient {
    http: reqwest::Client,
    config: ExecutableConfig,
    endpoint: EndpointAddress,
    adapter: BackendAdapter,
    dialect: WireDialect,
    timeout: Duration,
}

impl InvocationClient {
    pub fn new(
        config: ExecutableConfig,
        endpoint: EndpointAddress,
    ) -> Result<Self, InvokeError> {
        Self::with_timeout(config, endpoint, DEFAULT_INVOKE_TIMEOUT)
    }

    /// `timeout` is the hard upper bound on total call duration: connection
    /// setup plus, for streaming calls, the full stream drain.
    pub fn with_timeout(
        config: ExecutableConfig,
        endpoint: EndpointAddress,
        timeout: Duration,
    ) -> Result<Self, InvokeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        let adapter = BackendAdapter::for_config(&config);
        let dialect = WireDialect::for_service(config.service.service_type);
        Ok(Self {
            http,
            config,
            endpoint,
            adapter,
            dialect,
            timeout,
        })
    }

    pub fn config(&self) -> &ExecutableConfig {
        &self.config
    }

    fn invocation_url(&self) -> String {
        match self.config.service.service_type {
            // SageMaker endpoint URLs are handed over complete.
            ServiceType::Sagemaker => self.endpoint.base_url.clone(),
            _ => format!(
                "{}{}",
                self.endpoint.base_url.trim_end_matches('/'),
                naming::invocation_path(&self.config.model.model_id, &self.config.model_tag),
            ),
        }
    }

    /// Unary call: send, await the whole body, decode once.
    pub async fn invoke(&self, request: &ChatRequest) -> Result<CompletionOutcome, InvokeError> {
        let mut request = request.clone();
        request.stream = false;
        let body = self.adapter.transform_request(&request)?;
        let url = self.invocation_url();
        let call_id = uuid::Uuid::new_v4();
        debug!(%call_id, %url, "unary invocation");

        let call = async {
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| InvokeError::Transport(e.to_string()))?;
            let bytes = response.bytes().await?;
            let value: serde_json::Value =
                serde_json::from_slice(&bytes).map_err(|e| InvokeError::BackendProtocol {
                    engine: self.config.engine.engine_type.to_string(),
                    message: format!("response body is not JSON: {e}"),
                })?;
            self.adapter.transform_response(&value)
        };
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%call_id, %url, "unary invocation timed out");
                Err(InvokeError::Timeout(self.timeout))
            }
        }
    }

    /// Streaming call: open the chunked channel and hand back the lazy
    /// event sequence. The returned stream owns a fresh frame decoder bound
    /// to this one response; cancelling `cancel` closes the transport
    /// promptly.
    pub async fn invoke_stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = Result<StreamEvent, InvokeError>>, InvokeError> {
        let mut request = request.clone();
        request.stream = true;
        let body = self.adapter.transform_request(&request)?;
        let url = self.invocation_url();
        let call_id = uuid::Uuid::new_v4();
        debug!(%call_id, %url, "streaming invocation");

        let deadline = Instant::now() + self.timeout;
        let send = async {
            self.http
                .post(&url)
                .json(&body)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| InvokeError::Transport(e.to_string()))
        };
        let response = match tokio::time::timeout_at(deadline, send).await {
            Ok(response) => response?,
            Err(_) => return Err(InvokeError::Timeout(self.timeout)),
        };

        let chunks = response.bytes_stream().map(|r| r.map_err(InvokeError::from));
        Ok(decode_event_stream(
            chunks,
            self.adapter.clone(),
            self.dialect,
            cancel,
            Some(Deadline {
                at: deadline,
                budget: self.timeout,
            }),
        ))
    }
}
