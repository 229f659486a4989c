#[derive(thiserror::Error, Debug)]
pub enum FacadeError {
    #[error("configuration error :: {0}")]
    ConfigError(#[from] crate::params::ConfigError),
    #[error("repository error :: {0}")]
    RepositoryError(#[from] crate::repo::Error),
    #[error("record error :: {0}")]
    RecordError(#[from] crate::types::RecordError),
}
