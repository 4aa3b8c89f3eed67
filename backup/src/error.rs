use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("unknown backup component: {0}")]
    UnknownComponent(String),

    #[error("no backup found with id {0}")]
    NotFound(String),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("component '{0}' is not registered; cannot restore its data")]
    ComponentNotRegistered(String),
}
