mod dispatcher;
mod error;
mod outcome;
mod policy;
pub mod secrets;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use outcome::{Completion, CompletionPlan, ScoredCandidate};
pub use policy::{MatchPolicy, TextPolicy};
pub use secrets::{
    ChainedSecretProvider, EnvSecretProvider, FileSecretStore, SecretError, SecretProvider,
    StaticSecretProvider, OPENAI_SECRET,
};
