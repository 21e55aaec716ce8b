//! Error types for `dswatch-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("domain not found: {0}")]
  DomainNotFound(String),

  #[error("domain id not found: {0}")]
  DomainIdNotFound(i64),

  #[error("class setting {0:?} is not in domain,xyz format")]
  InvalidClassSetting(String),

  #[error("unknown class code: {0:?}")]
  UnknownClass(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
