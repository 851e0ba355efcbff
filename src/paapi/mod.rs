//! Typed wrapper around the vendor's product-advertising API.

pub mod client;
pub mod errors;
pub(crate) mod sign;
pub mod types;

use async_trait::async_trait;

use crate::paapi::errors::PaapiError;
use crate::paapi::types::{ItemDetail, ResourceBundle, SearchRequest};
use crate::store::model::Asin;

/// Seam between the pipeline and the vendor API; mocked in tests.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Per-ASIN detail. `ItemNotAccessible` is a soft error: the caller
    /// drops the candidate and continues.
    async fn get_item(&self, asin: &Asin, bundle: ResourceBundle)
    -> Result<ItemDetail, PaapiError>;

    /// One page of a keyword search; up to 10 items.
    async fn search(&self, req: &SearchRequest) -> Result<Vec<ItemDetail>, PaapiError>;
}
