use log::warn;
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::sync::fetch::FetchError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Upstream returned {status} for {url}")]
    Upstream { url: String, status: u16 },
    #[error("Could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: rocket::serde::json::serde_json::Error,
    },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid postcode: {0}")]
    InvalidPostcode(String),
    #[error("Unknown address: {0}")]
    UnknownAddress(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        warn!("{self}");
        Err(match self {
            Self::InvalidPostcode(_) => Status::BadRequest,
            Self::NotFound(_) | Self::UnknownAddress(_) => Status::NotFound,
            Self::Fetch(_) | Self::Upstream { .. } | Self::Decode { .. } => Status::BadGateway,
            Self::Db(_) | Self::Io(_) | Self::Validation(_) => Status::InternalServerError,
        })
    }
}
