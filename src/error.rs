use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;

use crate::event::DoctrineCycleEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum DoctrineError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl DoctrineError {
    /// Unknown node, loop or connection endpoint. Callers are expected to check for this and
    /// carry on; the engine state is untouched whenever it is returned.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DoctrineError::NotFound(_))
    }
}

impl From<toml::de::Error> for DoctrineError {
    fn from(src: toml::de::Error) -> DoctrineError {
        DoctrineError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for DoctrineError {
    fn from(src: toml::ser::Error) -> DoctrineError {
        DoctrineError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for DoctrineError {
    fn from(src: JsonError) -> DoctrineError {
        DoctrineError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<uuid::Error> for DoctrineError {
    fn from(src: uuid::Error) -> DoctrineError {
        DoctrineError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for DoctrineError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => DoctrineError::NotFound(format!("{x}")),
            _ => DoctrineError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for DoctrineError {
    fn from(x: fmt::Error) -> Self {
        DoctrineError::Custom(format!("{x}"))
    }
}

impl From<TokioSendError<DoctrineCycleEvent>> for DoctrineError {
    fn from(x: TokioSendError<DoctrineCycleEvent>) -> Self {
        DoctrineError::Io(format!(
            "Channel update send Error, could not transmit cycle event {:?}",
            x.0.event_type
        ))
    }
}
