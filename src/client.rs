use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, IMAGES_EMPTY,
    IMAGES_GENERATED, STREAM_FRAGMENTS,
};
use crate::persona::{ADVISOR_SYSTEM_INSTRUCTION, DEFAULT_THINKING_BUDGET};
use crate::sse::process_sse;
use crate::types::{
    Content, ConversationTurn, FragmentStream, GenerateContentRequest, GenerateContentResponse,
    GenerationRequest, GenerationResult, ImagePayload, ImageSize, Modality, Model,
};

pub(crate) const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// The generative backend as seen by sessions and the advisor.
///
/// [`Gemini`] is the production implementation; tests substitute fakes.
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Stream one reply to `prompt`, given every earlier turn in `history`.
    async fn stream_text(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        credential: &Credential,
    ) -> Result<FragmentStream>;

    /// Generate one square image.
    async fn generate_image(
        &self,
        prompt: &str,
        size: ImageSize,
        credential: &Credential,
    ) -> Result<ImagePayload>;

    /// Dispatch a [`GenerationRequest`] on its modality.
    async fn generate(
        &self,
        request: GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResult> {
        request.validate()?;
        match request.modality {
            Modality::Text => Ok(GenerationResult::Text(
                self.stream_text(&request.prompt, &request.history, credential)
                    .await?,
            )),
            Modality::Image => Ok(GenerationResult::Image(
                self.generate_image(
                    &request.prompt,
                    request.image_size.unwrap_or_default(),
                    credential,
                )
                .await?,
            )),
        }
    }
}

/// Client for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct Gemini {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    text_model: Model,
    image_model: Model,
    system_instruction: Option<String>,
    thinking_budget: Option<u32>,
}

impl Gemini {
    /// Create a client for the public endpoint with default settings.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with a custom endpoint or timeout.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            text_model: Model::default_text(),
            image_model: Model::default_image(),
            system_instruction: Some(ADVISOR_SYSTEM_INSTRUCTION.to_string()),
            thinking_budget: Some(DEFAULT_THINKING_BUDGET),
        })
    }

    /// Sets the model used for streamed replies.
    pub fn with_text_model(mut self, model: Model) -> Self {
        self.text_model = model;
        self
    }

    /// Sets the model used for images.
    pub fn with_image_model(mut self, model: Model) -> Self {
        self.image_model = model;
        self
    }

    /// Replaces or removes the system instruction.
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    /// Sets or disables the thinking budget.
    pub fn with_thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// The model used for streamed replies.
    pub fn text_model(&self) -> &Model {
        &self.text_model
    }

    /// The model used for images.
    pub fn image_model(&self) -> &Model {
        &self.image_model
    }

    /// The endpoint base, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of `models/{model}:{method}`.
    fn endpoint(&self, model: &Model, method: &str, sse: bool) -> Result<Url> {
        let mut url = self.base_url.join(&format!("models/{model}:{method}"))?;
        if sse {
            url.query_pairs_mut().append_pair("alt", "sse");
        }
        Ok(url)
    }

    fn headers(credential: &Credential, sse: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let accept = if sse {
            "text/event-stream"
        } else {
            "application/json"
        };
        headers.insert(header::ACCEPT, HeaderValue::from_static(accept));
        let mut key = HeaderValue::from_str(credential.expose()).map_err(|_| {
            Error::authorization("credential contains characters not allowed in a header")
        })?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    /// The body of a streamed reply request.
    pub(crate) fn text_request(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
    ) -> GenerateContentRequest {
        let contents = history
            .iter()
            .filter(|turn| !turn.text.trim().is_empty())
            .map(Content::from)
            .chain(std::iter::once(Content::user(prompt)))
            .collect();
        GenerateContentRequest::text(
            contents,
            self.system_instruction.as_deref(),
            self.thinking_budget,
        )
    }

    async fn post(
        &self,
        url: Url,
        body: &GenerateContentRequest,
        credential: &Credential,
        sse: bool,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(%url, sse, "sending generation request");

        let result = self
            .client
            .post(url)
            .headers(Self::headers(credential, sse)?)
            .json(body)
            .send()
            .await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {e}"),
                    Some(self.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
            }
        })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "generation request rejected");
            return Err(err);
        }
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<GoogleErrorEnvelope>(&error_body)
            .map(|envelope| envelope.error)
            .unwrap_or_else(|_| GoogleErrorBody {
                code: None,
                message: Some(error_body),
                status: None,
            });

        error_for_status(status_code, retry_after, detail)
    }

    /// Stream one advisor reply.
    ///
    /// The request carries every non-empty turn of `history` followed by
    /// `prompt` as the newest user message.
    pub async fn stream_text(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        credential: &Credential,
    ) -> Result<FragmentStream> {
        if prompt.trim().is_empty() {
            return Err(Error::validation(
                "prompt must not be blank",
                Some("prompt".to_string()),
            ));
        }
        let url = self.endpoint(&self.text_model, "streamGenerateContent", true)?;
        let body = self.text_request(prompt, history);
        let response = self.post(url, &body, credential, true).await?;
        let chunks = process_sse(response.bytes_stream());
        Ok(Box::pin(text_fragments(chunks)))
    }

    /// Generate one square image at the requested size.
    pub async fn generate_image(
        &self,
        prompt: &str,
        size: ImageSize,
        credential: &Credential,
    ) -> Result<ImagePayload> {
        GenerationRequest::image(prompt, size).validate()?;
        let url = self.endpoint(&self.image_model, "generateContent", false)?;
        let body = GenerateContentRequest::image(prompt, size);
        let response = self.post(url, &body, credential, false).await?;
        let response = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| {
                Error::serialization(
                    format!("Failed to parse response: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        image_from_response(&response)
    }
}

#[async_trait::async_trait]
impl GenerationBackend for Gemini {
    async fn stream_text(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        credential: &Credential,
    ) -> Result<FragmentStream> {
        Gemini::stream_text(self, prompt, history, credential).await
    }

    async fn generate_image(
        &self,
        prompt: &str,
        size: ImageSize,
        credential: &Credential,
    ) -> Result<ImagePayload> {
        Gemini::generate_image(self, prompt, size, credential).await
    }
}

/// Google's error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorEnvelope {
    pub(crate) error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorBody {
    #[serde(default)]
    pub(crate) code: Option<u16>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// Map an HTTP status and error body to the appropriate error type.
pub(crate) fn error_for_status(
    status_code: u16,
    retry_after: Option<u64>,
    detail: GoogleErrorBody,
) -> Error {
    let message = detail
        .message
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP {status_code}"));
    match status_code {
        400 => Error::bad_request(message),
        401 | 403 => Error::authorization(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, detail.status, message),
    }
}

/// Reduce response chunks to non-empty reply fragments.
///
/// The stream ends with a generation error if the backend blocked the reply
/// or finished without producing any text.
///
/// ```
/// # use futures::{StreamExt, stream};
/// # use nexus::{Content, GenerateContentResponse, text_fragments};
/// # use nexus::types::Candidate;
/// # tokio_test::block_on(async {
/// let chunk = |text: &str| -> nexus::Result<GenerateContentResponse> {
///     Ok(GenerateContentResponse {
///         candidates: vec![Candidate {
///             content: Some(Content::user(text)),
///             ..Candidate::default()
///         }],
///         ..GenerateContentResponse::default()
///     })
/// };
/// let chunks = vec![chunk("Perda"), chunk(""), chunk(" impermanente")];
/// let fragments = text_fragments(stream::iter(chunks));
/// let text: Vec<_> = fragments.map(|f| f.unwrap()).collect().await;
/// assert_eq!(text, ["Perda", " impermanente"]);
/// # });
/// ```
pub fn text_fragments<S>(chunks: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<GenerateContentResponse>> + Send + 'static,
{
    let chunks = Box::pin(chunks);
    stream::unfold(
        (chunks, false, false),
        |(mut chunks, produced, done)| async move {
            if done {
                return None;
            }
            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        if let (Some(usage), Some(reason)) =
                            (&chunk.usage_metadata, chunk.finish_reason())
                        {
                            tracing::debug!(?usage, ?reason, "reply finished");
                        }
                        let text = chunk.text();
                        if text.is_empty() {
                            if let Some(reason) = chunk.block_reason() {
                                return Some((
                                    Err(Error::generation(reason)),
                                    (chunks, produced, true),
                                ));
                            }
                            continue;
                        }
                        STREAM_FRAGMENTS.click();
                        return Some((Ok(text), (chunks, true, false)));
                    }
                    Some(Err(err)) => return Some((Err(err), (chunks, produced, true))),
                    None if produced => return None,
                    None => {
                        return Some((
                            Err(Error::generation("no text produced")),
                            (chunks, produced, true),
                        ));
                    }
                }
            }
        },
    )
}

/// Pull the first image out of a `generateContent` response.
pub(crate) fn image_from_response(response: &GenerateContentResponse) -> Result<ImagePayload> {
    match response.inline_data() {
        Some(inline) => {
            IMAGES_GENERATED.click();
            tracing::debug!(usage = ?response.usage_metadata, "image generated");
            Ok(ImagePayload::from(inline))
        }
        None => {
            IMAGES_EMPTY.click();
            match response.block_reason() {
                Some(reason) => Err(Error::generation(format!("no image produced ({reason})"))),
                None => Err(Error::generation("no image produced")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnownModel, Speaker};
    use serde_json::{json, to_value};
    use std::env;

    fn chunk(text: &str) -> Result<GenerateContentResponse> {
        Ok(serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }))
        .unwrap())
    }

    async fn collect(chunks: Vec<Result<GenerateContentResponse>>) -> Vec<Result<String>> {
        text_fragments(stream::iter(chunks)).collect().await
    }

    #[test]
    fn client_creation() {
        let client = Gemini::new().unwrap();
        assert_eq!(client.base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert_eq!(client.text_model(), &Model::Known(KnownModel::Gemini3ProPreview));
        assert_eq!(
            client.image_model(),
            &Model::Known(KnownModel::Gemini3ProImagePreview)
        );
        assert_eq!(client.thinking_budget, Some(1024));

        let client = Gemini::with_options(
            Some("http://localhost:8080/v1beta".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/v1beta/");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_base_url() {
        let err = Gemini::with_options(Some("not a url".to_string()), None).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn endpoints() {
        let client = Gemini::new().unwrap();
        let url = client
            .endpoint(client.text_model(), "streamGenerateContent", true)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-pro-preview:streamGenerateContent?alt=sse"
        );
        let url = client
            .endpoint(client.image_model(), "generateContent", false)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    #[test]
    fn headers_carry_key() {
        let credential = Credential::new("secret").unwrap();
        let headers = Gemini::headers(&credential, true).unwrap();
        assert_eq!(headers["x-goog-api-key"], "secret");
        assert!(headers["x-goog-api-key"].is_sensitive());
        assert_eq!(headers[header::ACCEPT], "text/event-stream");

        let credential = Credential::new("bad\nkey").unwrap();
        assert!(Gemini::headers(&credential, false).unwrap_err().is_authorization());
    }

    #[test]
    fn text_request_appends_prompt_after_history() {
        let client = Gemini::new().unwrap();
        let history = vec![
            ConversationTurn::assistant("Olá!"),
            ConversationTurn::user("Oi"),
            ConversationTurn::assistant(""),
        ];
        let request = client.text_request("What is impermanent loss?", &history);

        let roles: Vec<_> = request.contents.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![Some(Speaker::Assistant), Some(Speaker::User), Some(Speaker::User)]
        );
        assert_eq!(request.contents[2].text(), "What is impermanent loss?");
        assert_eq!(
            request.system_instruction.as_ref().map(Content::text).as_deref(),
            Some(ADVISOR_SYSTEM_INSTRUCTION)
        );

        let value = to_value(&request).unwrap();
        assert_eq!(
            value["generationConfig"],
            json!({"thinkingConfig": {"thinkingBudget": 1024}})
        );
    }

    #[test]
    fn text_request_without_persona() {
        let client = Gemini::new()
            .unwrap()
            .with_system_instruction(None)
            .with_thinking_budget(None);
        let value = to_value(client.text_request("hi", &[])).unwrap();
        assert_eq!(
            value,
            json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }

    #[test]
    fn status_mapping() {
        let body = |message: &str| GoogleErrorBody {
            code: None,
            message: Some(message.to_string()),
            status: Some("SOME_STATUS".to_string()),
        };
        assert!(matches!(
            error_for_status(400, None, body("bad")),
            Error::BadRequest { .. }
        ));
        assert!(error_for_status(401, None, body("key")).is_authorization());
        assert!(error_for_status(403, None, body("key")).is_authorization());
        assert_eq!(
            error_for_status(429, Some(7), body("slow")).retry_after(),
            Some(7)
        );
        assert!(error_for_status(503, None, body("busy")).is_network());
        assert_eq!(
            error_for_status(409, None, body("conflict")).status_code(),
            Some(409)
        );
        let err = error_for_status(
            500,
            None,
            GoogleErrorBody {
                code: None,
                message: None,
                status: None,
            },
        );
        assert_eq!(err.to_string(), "Internal server error: HTTP 500");
    }

    #[tokio::test]
    async fn fragments_preserve_order() {
        let fragments = collect(vec![
            chunk("Perda"),
            chunk(" impermanente"),
            chunk(" é..."),
        ])
        .await;
        let text: String = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(text, "Perda impermanente é...");
    }

    #[tokio::test]
    async fn empty_chunks_are_skipped() {
        let fragments = collect(vec![chunk("a"), chunk(""), chunk("b")]).await;
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.as_ref().is_ok_and(|t| !t.is_empty())));
    }

    #[tokio::test]
    async fn no_text_is_a_generation_error() {
        let fragments = collect(vec![chunk("")]).await;
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].as_ref().unwrap_err().is_generation());
    }

    #[tokio::test]
    async fn blocked_reply_is_a_generation_error() {
        let blocked = Ok(serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap());
        let fragments = collect(vec![chunk("partial"), blocked, chunk("never")]).await;
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].as_ref().unwrap(), "partial");
        assert!(fragments[1].as_ref().unwrap_err().is_generation());
    }

    #[tokio::test]
    async fn stream_errors_end_the_stream() {
        let fragments = collect(vec![
            chunk("a"),
            Err(Error::streaming("reset", None)),
            chunk("b"),
        ])
        .await;
        assert_eq!(fragments.len(), 2);
        assert!(fragments[1].as_ref().unwrap_err().is_network());
    }

    #[test]
    fn image_extraction() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "A samurai"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
            ]}}]
        }))
        .unwrap();
        let image = image_from_response(&response).unwrap();
        assert!(image.to_data_uri().starts_with("data:image/png;base64,"));

        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "no"}]}}]
        }))
        .unwrap();
        let err = image_from_response(&response).unwrap_err();
        assert!(err.is_generation());
        assert_eq!(err.to_string(), "Generation error: no image produced");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_any_request() {
        let client = Gemini::new().unwrap();
        let credential = Credential::new("unused").unwrap();
        let err = match client.stream_text("  ", &[], &credential).await {
            Ok(_) => panic!("blank prompt should be rejected"),
            Err(err) => err,
        };
        assert!(err.is_validation());
        let err = client
            .generate_image("", ImageSize::Small, &credential)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    #[ignore] // Ignore by default as this requires a real API key
    async fn live_stream_text() {
        let Some(credential) = env::var("NEXUS_API_KEY").ok().and_then(Credential::new) else {
            println!("Skipping live_stream_text: NEXUS_API_KEY not set");
            return;
        };

        let client = Gemini::new().unwrap();
        let mut stream = client
            .stream_text("Responda apenas: olá", &[], &credential)
            .await
            .unwrap();
        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment.unwrap());
        }
        assert!(!reply.is_empty());
    }
}
