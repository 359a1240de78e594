mod openai;
mod traits;

pub use openai::OpenAiClient;
pub use traits::{
    Choice, ClientConfig, ClientError, CompletionClient, CompletionRequest, CompletionResponse,
    DEFAULT_BASE_URL,
};
