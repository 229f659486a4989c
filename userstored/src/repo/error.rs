#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error :: {0}")]
    Config(#[from] crate::params::ConfigError),
    #[error("mongodb error :: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("http error :: {0}")]
    Http(#[from] reqwest::Error),
    #[error("data api error `{code}` :: {message}")]
    DataApi { code: String, message: String },
    #[error("resource `{0}` already exists")]
    AlreadyExists(String),
    #[error("database `{db_id}` not active after {attempts} checks, last status `{status}`")]
    NotActive {
        db_id: String,
        status: String,
        attempts: usize,
    },
    #[error("unexpected response :: {0}")]
    UnexpectedResponse(String),
    #[error("invalid endpoint :: {0}")]
    InvalidEndpoint(String),
    #[error("invalid endpoint :: {0}")]
    Url(#[from] url::ParseError),
    #[error("record error :: {0}")]
    Record(#[from] crate::types::RecordError),
    #[error("backend error :: {0}")]
    Backend(String),
}

impl Error {
    /// Returns `true` when the backend refused to create a resource because
    /// it is already there.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists(_) => true,
            Self::DataApi { code, .. } => {
                code.contains("ALREADY_EXISTS") || code.starts_with("EXISTING_")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_api(code: &str) -> Error {
        Error::DataApi {
            code: code.to_owned(),
            message: String::new(),
        }
    }

    #[test]
    fn already_exists() {
        assert!(Error::AlreadyExists("users".into()).is_already_exists());
        assert!(data_api("COLLECTION_ALREADY_EXISTS").is_already_exists());
        assert!(data_api("EXISTING_COLLECTION_DIFFERENT_SETTINGS").is_already_exists());

        assert!(!data_api("UNAUTHENTICATED_REQUEST").is_already_exists());
        assert!(!Error::Backend("boom".into()).is_already_exists());
    }
}
