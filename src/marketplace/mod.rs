//! Mercado Livre integration: OAuth, token lifecycle, paginated fetching
//! and the listing sync.

pub mod error;
pub mod fetcher;
pub mod oauth;
pub mod sync;
pub mod token;
pub mod types;

pub use error::MarketplaceError;
pub use fetcher::Fetcher;
pub use oauth::{MercadoLivreOAuth, Pkce};
pub use sync::{ListingSync, SyncSummary};
pub use token::{Bearer, TokenManager};
