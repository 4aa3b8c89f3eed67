use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected in resource graph")]
    Cycle,

    #[error("vertex '{0}' depends on unknown parent '{1}'")]
    UnknownParent(String, String),

    #[error("vertex '{0}' ran twice")]
    DoubleEvaluation(String),

    #[error("output '{0}' was never published")]
    MissingOutput(String),

    #[error("output '{0}' has an unexpected type")]
    TypeMismatch(String),

    #[error("vertex '{0}' failed: {1}")]
    VertexFailed(String, String),

    #[error("{failed} vertices failed: {}", .details.iter().map(|(id, msg)| format!("{id}: {msg}")).collect::<Vec<_>>().join("; "))]
    Aggregated {
        failed: usize,
        details: Vec<(String, String)>,
    },
}
