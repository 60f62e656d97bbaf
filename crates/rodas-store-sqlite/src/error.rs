//! Error type for `rodas-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain guard failed inside a transaction.
  #[error(transparent)]
  Core(#[from] rodas_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decimal parse error: {0}")]
  Decimal(#[from] rust_decimal::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value in database: {value:?}")]
  UnknownVariant { column: &'static str, value: String },
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(tokio_rusqlite::Error::Rusqlite(e)) }
}

impl From<Error> for rodas_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      other => rodas_core::Error::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
