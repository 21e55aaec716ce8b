//! Error types for `dswatch-scheduler`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("the catalog is empty")]
  EmptyCatalog,

  #[error("no candidate domains to probe")]
  NoCandidates,

  #[error("invalid duration: {0:?}")]
  InvalidDuration(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
