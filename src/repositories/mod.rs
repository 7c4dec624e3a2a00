//! # Repository Layer
//!
//! SeaORM access for every entity. Each method takes the caller's company id
//! explicitly; rows belonging to another company surface as
//! [`RepositoryError::Forbidden`].

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{self, ApiError};

pub mod bank_account;
pub mod category;
pub mod connection_token;
pub mod contact;
pub mod financial_entry;
pub mod ml_integration;
pub mod ml_listing;
pub mod ml_mapping;
pub mod oauth_state;
pub mod product;
pub mod recurring_rule;

pub use bank_account::BankAccountRepository;
pub use category::CategoryRepository;
pub use connection_token::ConnectionTokenRepository;
pub use contact::ContactRepository;
pub use financial_entry::FinancialEntryRepository;
pub use ml_integration::MlIntegrationRepository;
pub use ml_listing::MlListingRepository;
pub use ml_mapping::MlMappingRepository;
pub use oauth_state::OAuthStateRepository;
pub use product::ProductRepository;
pub use recurring_rule::RecurringRuleRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} belongs to another company")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    /// Business precondition failed; rendered as 400 with a stable code.
    #[error("{message}")]
    Rejected {
        code: &'static str,
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn rejected(code: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
            details: None,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => error::not_found(what),
            RepositoryError::Forbidden(what) => ApiError::new(
                StatusCode::FORBIDDEN,
                "forbidden",
                format!("{what} belongs to another company"),
            ),
            RepositoryError::Validation(message) => error::validation(message),
            RepositoryError::Rejected {
                code,
                message,
                details,
            } => {
                let api = error::rejected(code, message);
                match details {
                    Some(details) => api.with_details(details),
                    None => api,
                }
            }
            RepositoryError::Conflict(message) => error::conflict(message),
            RepositoryError::Database(db) => db.into(),
        }
    }
}

/// Scopes a row looked up by primary key to `company_id`.
pub(crate) fn owned<M>(
    found: Option<M>,
    company_id: Uuid,
    row_company: impl Fn(&M) -> Uuid,
    what: &'static str,
) -> RepositoryResult<M> {
    match found {
        None => Err(RepositoryError::NotFound(what)),
        Some(model) if row_company(&model) != company_id => Err(RepositoryError::Forbidden(what)),
        Some(model) => Ok(model),
    }
}

/// Like [`owned`] for ids supplied inside request bodies: a dangling
/// reference is a validation error rather than a 404.
pub(crate) fn referenced<M>(
    found: Option<M>,
    company_id: Uuid,
    row_company: impl Fn(&M) -> Uuid,
    what: &'static str,
) -> RepositoryResult<M> {
    match owned(found, company_id, row_company, what) {
        Err(RepositoryError::NotFound(what)) => Err(RepositoryError::Validation(format!(
            "{what} does not exist"
        ))),
        other => other,
    }
}
