use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no manifest registered under name '{0}'")]
    NotFound(String),

    #[error("export aggregate hash did not match its contents; the export is corrupt")]
    CorruptExport,
}
