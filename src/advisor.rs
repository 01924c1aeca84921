//! The advisor facade.
//!
//! An [`Advisor`] ties one generation backend to one credential gate. It
//! hands out conversation sessions that share both, and serves one-shot
//! image requests.

use std::sync::Arc;

use crate::chat::{AdvisorConfig, ConversationSession};
use crate::client::GenerationBackend;
use crate::credential::{Authorizer, CredentialGate};
use crate::error::Result;
use crate::persona::ADVISOR_GREETING;
use crate::types::{
    ConversationTurn, GenerationRequest, GenerationResult, ImagePayload, ImageSize,
};

/// Entry point for embedding the Nexus advisor.
#[derive(Clone)]
pub struct Advisor {
    backend: Arc<dyn GenerationBackend>,
    authorizer: Arc<dyn Authorizer>,
}

impl Advisor {
    /// Creates an advisor over the given backend and credential gate.
    pub fn new(backend: Arc<dyn GenerationBackend>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            backend,
            authorizer,
        }
    }

    /// Creates an advisor on the Gemini API that reads its key from the
    /// environment.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(config.client()?),
            Arc::new(CredentialGate::from_env()),
        ))
    }

    /// The credential gate shared by every session.
    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    /// Starts a new conversation seeded with the advisor greeting.
    pub fn create_session(&self) -> ConversationSession {
        ConversationSession::with_turns(
            Arc::clone(&self.backend),
            Arc::clone(&self.authorizer),
            vec![ConversationTurn::assistant(ADVISOR_GREETING)],
        )
    }

    /// Generates one square image.
    ///
    /// Unlike a session reply, failures are returned to the caller.
    pub async fn generate_image(&self, prompt: &str, size: ImageSize) -> Result<ImagePayload> {
        GenerationRequest::image(prompt, size).validate()?;
        let credential = self.authorizer.ensure_authorized().await?;
        let result = self.backend.generate_image(prompt, size, &credential).await;
        self.observe(result).await
    }

    /// Runs any [`GenerationRequest`] once, outside of a session.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;
        let credential = self.authorizer.ensure_authorized().await?;
        let result = self.backend.generate(request, &credential).await;
        self.observe(result).await
    }

    async fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            tracing::warn!(error = %err, kind = %err.kind(), "generation failed");
            if err.is_authorization() {
                self.authorizer.invalidate().await;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{Credential, StaticCredentialStore};
    use crate::error::Error;
    use crate::persona::FALLBACK_REPLY;
    use crate::types::FragmentStream;
    use futures::{StreamExt, stream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeBackend {
        image: Option<ImagePayload>,
        image_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GenerationBackend for FakeBackend {
        async fn stream_text(
            &self,
            _: &str,
            history: &[ConversationTurn],
            _: &Credential,
        ) -> Result<FragmentStream> {
            let echo = format!("{} turns", history.len());
            Ok(Box::pin(stream::iter(vec![Ok(echo)])))
        }

        async fn generate_image(
            &self,
            _: &str,
            _: ImageSize,
            _: &Credential,
        ) -> Result<ImagePayload> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            self.image
                .clone()
                .ok_or_else(|| Error::generation("no image produced"))
        }
    }

    fn advisor(
        image: Option<ImagePayload>,
        store: StaticCredentialStore,
    ) -> (Advisor, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend {
            image,
            image_calls: AtomicUsize::new(0),
        });
        let advisor = Advisor::new(backend.clone(), Arc::new(CredentialGate::new(store)));
        (advisor, backend)
    }

    #[tokio::test]
    async fn sessions_start_with_the_greeting() {
        let (advisor, _) = advisor(None, StaticCredentialStore::stored("k"));
        let session = advisor.create_session();
        let snapshot = session.snapshot();
        assert!(!snapshot.is_busy);
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.turns[0].text, ADVISOR_GREETING);

        session.send("oi").unwrap().await;
        assert_eq!(session.snapshot().last_turn().unwrap().text, "1 turns");
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let (advisor, _) = advisor(None, StaticCredentialStore::stored("k"));
        let first = advisor.create_session();
        let second = advisor.create_session();
        first.send("oi").unwrap().await;
        assert_eq!(first.snapshot().turns.len(), 3);
        assert_eq!(second.snapshot().turns.len(), 1);
    }

    #[tokio::test]
    async fn image_as_data_uri() {
        let payload = ImagePayload::from_bytes("image/png", b"\x89PNG");
        let (advisor, _) = advisor(Some(payload), StaticCredentialStore::stored("k"));
        let image = advisor
            .generate_image("a cyberpunk samurai", ImageSize::Medium)
            .await
            .unwrap();
        assert!(image.to_data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(image.decode().unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn missing_image_is_a_generation_error() {
        let (advisor, _) = advisor(None, StaticCredentialStore::stored("k"));
        let err = advisor
            .generate_image("a cyberpunk samurai", ImageSize::Small)
            .await
            .unwrap_err();
        assert!(err.is_generation());
    }

    #[tokio::test]
    async fn image_requires_authorization() {
        let (advisor, backend) = advisor(None, StaticCredentialStore::declining());
        let err = advisor
            .generate_image("a cyberpunk samurai", ImageSize::Small)
            .await
            .unwrap_err();
        assert!(err.is_authorization());
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);

        let session = advisor.create_session();
        session.send("oi").unwrap().await;
        assert_eq!(session.snapshot().last_turn().unwrap().text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn blank_image_prompt_is_rejected() {
        let (advisor, backend) = advisor(None, StaticCredentialStore::stored("k"));
        let err = advisor.generate_image("  ", ImageSize::Small).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generate_dispatches_on_modality() {
        let payload = ImagePayload::from_bytes("image/png", b"png");
        let (advisor, _) = advisor(Some(payload.clone()), StaticCredentialStore::stored("k"));

        match advisor
            .generate(GenerationRequest::image("cat", ImageSize::Small))
            .await
            .unwrap()
        {
            GenerationResult::Image(image) => assert_eq!(image, payload),
            other => panic!("unexpected result: {other:?}"),
        }

        match advisor
            .generate(GenerationRequest::text("hi", Vec::new()))
            .await
            .unwrap()
        {
            GenerationResult::Text(mut fragments) => {
                assert_eq!(fragments.next().await.unwrap().unwrap(), "0 turns");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
