// Public modules
pub mod advisor;
pub mod chat;
pub mod client;
pub mod credential;
pub mod error;
pub mod persona;
pub mod render;
pub mod sse;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use advisor::Advisor;
pub use chat::{ConversationSession, ReplyHandle, ReplyOutcome, SessionSnapshot};
pub use client::{Gemini, GenerationBackend, text_fragments};
pub use credential::{
    API_KEY_ENV, Authorizer, Credential, CredentialGate, CredentialStore, EnvCredentialStore,
    GEMINI_API_KEY_ENV, StaticCredentialStore,
};
pub use error::{Error, ErrorKind, Result};
pub use observability::register_biometrics;
pub use types::*;
