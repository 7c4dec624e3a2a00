//! # Data Models
//!
//! SeaORM entities for every table owned by the `migration` crate.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod bank_account;
pub mod bank_transaction;
pub mod category;
pub mod company;
pub mod connection_token;
pub mod contact;
pub mod financial_entry;
pub mod ml_integration;
pub mod ml_listing;
pub mod ml_product_mapping;
pub mod oauth_state;
pub mod product;
pub mod product_component;
pub mod recurring_rule;
pub mod user;

pub use bank_account::Entity as BankAccount;
pub use bank_transaction::Entity as BankTransaction;
pub use category::Entity as Category;
pub use company::Entity as Company;
pub use connection_token::Entity as ConnectionToken;
pub use contact::Entity as Contact;
pub use financial_entry::Entity as FinancialEntry;
pub use ml_integration::Entity as MlIntegration;
pub use ml_listing::Entity as MlListing;
pub use ml_product_mapping::Entity as MlProductMapping;
pub use oauth_state::Entity as OAuthState;
pub use product::Entity as Product;
pub use product_component::Entity as ProductComponent;
pub use recurring_rule::Entity as RecurringRule;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}
