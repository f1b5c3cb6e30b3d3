/// Failures raised while turning text into vectors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} answered with status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} returned {got} embeddings for {expected} inputs")]
    CountMismatch {
        provider: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("missing API key for {provider}")]
    MissingApiKey { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Check the number of vectors a provider sent back against the number of inputs.
    pub(crate) fn check_count<T>(
        provider: &'static str,
        vectors: Vec<T>,
        expected: usize,
    ) -> Result<Vec<T>> {
        match vectors.len() {
            0 if expected > 0 => Err(Self::EmptyResponse { provider }),
            got if got != expected => Err(Self::CountMismatch {
                provider,
                expected,
                got,
            }),
            _ => Ok(vectors),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_check() {
        assert!(matches!(
            LlmError::check_count::<u8>("ollama", vec![], 2),
            Err(LlmError::EmptyResponse { provider: "ollama" })
        ));
        assert!(matches!(
            LlmError::check_count("openai", vec![1, 2, 3], 2),
            Err(LlmError::CountMismatch {
                expected: 2,
                got: 3,
                ..
            })
        ));
        assert_eq!(LlmError::check_count("openai", vec![7], 1).unwrap(), [7]);
    }

    #[test]
    fn status_message_names_provider() {
        let err = LlmError::Status {
            provider: "openai",
            status: 429,
        };
        assert_eq!(err.to_string(), "openai answered with status 429");
    }
}
