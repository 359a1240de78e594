use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No prompts found for user text '{user_text}' and use case '{use_case_name}'")]
    NotFound {
        user_text: String,
        use_case_name: String,
    },

    #[error("User text contains no tokens to match prompts against")]
    EmptyInput,

    #[error("Completion API returned no choices")]
    EmptyResponse,

    #[error("Storage error: {0}")]
    Storage(#[from] gptoolkit_db::DbError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] gptoolkit_client::ClientError),
}
