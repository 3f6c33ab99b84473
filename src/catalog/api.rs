// src/catalog/api.rs

//! Endpoint client for the catalog backend
//!
//! All paths are relative to the configured base address, which always ends
//! with a slash. Every read checks for a 2xx status before decoding.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::platform::{NetworkArc, NetworkRequest, NetworkResponse};

use super::models::{Brand, Category, NewBrand, Product, Reference, ReferenceId, SubmissionPayload};

pub const CATEGORIES_PATH: &str = "categories";
pub const BRANDS_PATH: &str = "brands";
pub const CREATE_ITEM_PATH: &str = "item/create";
pub const CREATE_BRAND_PATH: &str = "brand/create";

/// Status the backend answers a successful brand creation with
pub const BRAND_CREATED_STATUS: u16 = 200;

/// Status the backend answers a successful item creation with
pub const ITEM_CREATED_STATUS: u16 = 201;

#[derive(Clone)]
pub struct CatalogApi {
    base_url: Option<String>,
    network: NetworkArc,
    timeout_ms: Option<u64>,
}

impl fmt::Debug for CatalogApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogApi")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl CatalogApi {
    /// `base_url` must already be normalized (trailing slash); `None` leaves
    /// the client unconfigured
    pub fn new(base_url: Option<String>, network: NetworkArc) -> Self {
        Self {
            base_url,
            network,
            timeout_ms: None,
        }
    }

    pub fn from_config(config: &ApiConfig, network: NetworkArc) -> Self {
        Self {
            base_url: config.normalized_base_url(),
            network,
            timeout_ms: Some(config.request_timeout_ms),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Absolute URL for `path`, or `Unconfigured` without a base address
    pub fn endpoint(&self, path: &str) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| Error::unconfigured("Backend address is not configured"))?;
        Ok(format!("{}{}", base, path))
    }

    /// The full product collection, `GET {base}`
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let url = self.endpoint("")?;
        self.get_json(&url).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let url = self.endpoint(CATEGORIES_PATH)?;
        self.get_json(&url).await
    }

    pub async fn list_brands(&self) -> Result<Vec<Brand>> {
        let url = self.endpoint(BRANDS_PATH)?;
        self.get_json(&url).await
    }

    /// Resolves a reference id into its full record with one request to
    /// `{base}{kind}/{id}`. No retry.
    pub async fn resolve<T: Reference>(&self, id: &ReferenceId) -> Result<T> {
        let kind = T::KIND;
        let url = self.endpoint(&format!("{}/{}", kind.path_segment(), id.path_encoded()))?;
        tracing::debug!(kind = %kind, id = %id, "Resolving reference");
        self.get_json(&url).await
    }

    pub async fn get_category(&self, id: &ReferenceId) -> Result<Category> {
        self.resolve(id).await
    }

    pub async fn get_brand(&self, id: &ReferenceId) -> Result<Brand> {
        self.resolve(id).await
    }

    /// Sends the multipart create call. The raw response is returned for the
    /// caller to classify; only transport failures are errors here.
    pub async fn create_item(&self, payload: SubmissionPayload) -> Result<NetworkResponse> {
        let url = self.endpoint(CREATE_ITEM_PATH)?;
        tracing::debug!(url = %url, "Creating item");

        let response = self
            .network
            .send_multipart(&url, payload.into_form(), self.timeout_ms)
            .await?;

        tracing::debug!(url = %url, status = response.status_code, "Create item answered");
        Ok(response)
    }

    /// `POST {base}brand/create` with `{name}`. Any status other than 200 is
    /// reported as "Already exists". Invalid names are rejected locally.
    ///
    /// A 200 is a success whatever its body; the created brand is returned
    /// only when the body describes one.
    pub async fn create_brand(&self, name: impl Into<String>) -> Result<Option<Brand>> {
        let brand = NewBrand::new(name)?;
        let url = self.endpoint(CREATE_BRAND_PATH)?;
        let body = serde_json::to_vec(&brand)
            .map_err(|e| Error::decode(&url, format!("Failed to encode brand: {}", e)))?;

        let response = self
            .network
            .request(NetworkRequest::post_json(&url, body).with_timeout(self.timeout_ms))
            .await?;

        if response.status_code != BRAND_CREATED_STATUS {
            tracing::info!(status = response.status_code, "Brand creation rejected");
            let mut error = Error::status(response.status_code, &url);
            error.message = "Already exists".to_string();
            return Err(error);
        }

        match decode::<Brand>(&url, &response.body) {
            Ok(created) => Ok(Some(created)),
            Err(error) => {
                tracing::debug!(error = %error, "Brand created, response carried no brand");
                Ok(None)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .network
            .request(NetworkRequest::get(url).with_timeout(self.timeout_ms))
            .await?;

        if !response.is_success() {
            tracing::debug!(url = %url, status = response.status_code, "Non-success status");
            return Err(Error::status(response.status_code, url));
        }

        decode(url, &response.body)
    }
}

/// Decodes a JSON body, mapping malformed input to `ErrorKind::Decode`
pub fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::decode(url, format!("Failed to decode response from {}: {}", url, e)))
}
