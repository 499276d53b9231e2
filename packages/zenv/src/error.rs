use std::path::PathBuf;
use std::sync::Arc;

use zenv_primitives::{DescriptorError, InputRefError, System};

use crate::report::ResolutionFailures;

#[derive(thiserror::Error, Clone, Debug)]
pub enum Error {
    #[error("Failed to lock input '{0}' ({1})")]
    InputLockingFailed(String, String),

    #[error("no inputs found to search for packages")]
    EmptyRegistry,

    #[error("{0}")]
    ResolutionFailed(ResolutionFailures),

    #[error(transparent)]
    InvalidInputRef(#[from] InputRefError),

    #[error(transparent)]
    InvalidDescriptor(#[from] DescriptorError),

    #[error("Manifest not found ({0})")]
    ManifestNotFound(PathBuf),

    #[error("Lockfile not found ({0})")]
    LockfileNotFound(PathBuf),

    #[error("Unknown registry input '{0}'")]
    UnknownInput(String),

    #[error("Catalog not found for input '{input}'; expected '{path}' (has the input been scraped?)")]
    CatalogNotFound { input: String, path: PathBuf },

    #[error("Catalog has not been scraped for system '{0}'")]
    SystemNotScraped(System),

    #[error("An error occurred while reading '{path}' ({inner})")]
    FileReadError { path: PathBuf, inner: Arc<std::io::Error> },

    #[error("An error occurred while writing '{path}' ({inner})")]
    FileWriteError { path: PathBuf, inner: Arc<std::io::Error> },

    #[error("Invalid JSON data ({0})")]
    InvalidJsonData(#[from] Arc<serde_json::Error>),

    #[error("Internal invariant violated ({0})")]
    Internal(&'static str),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Arc::new(error).into()
    }
}

impl Error {
    /// The structured failure aggregate, for programmatic consumers.
    pub fn resolution_failures(&self) -> Option<&ResolutionFailures> {
        match self {
            Error::ResolutionFailed(failures) => Some(failures),
            _ => None,
        }
    }
}
