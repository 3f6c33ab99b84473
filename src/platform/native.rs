// src/platform/native.rs - reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::platform::network::{
    HttpMethod, MultipartForm, NetworkProvider, NetworkRequest, NetworkResponse, PartValue,
};

/// Native network implementation
#[derive(Debug, Clone)]
pub struct NativeNetwork {
    client: reqwest::Client,
}

impl NativeNetwork {
    /// Client with a default per-request timeout; requests may override it
    pub fn new(default_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(default_timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn into_response(url: &str, response: reqwest::Response) -> Result<NetworkResponse> {
        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(url, format!("Failed to read response body: {}", e)))?
            .to_vec();

        Ok(NetworkResponse {
            status_code,
            headers,
            body,
        })
    }

    fn build_form(url: &str, form: MultipartForm) -> Result<reqwest::multipart::Form> {
        let mut multipart = reqwest::multipart::Form::new();

        for part in form.parts() {
            multipart = match &part.value {
                PartValue::Text(value) => multipart.text(part.name.clone(), value.clone()),
                PartValue::File {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let file_part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(content_type)
                        .map_err(|e| {
                            Error::network(url, format!("Invalid content type '{}': {}", content_type, e))
                        })?;
                    multipart.part(part.name.clone(), file_part)
                }
            };
        }

        Ok(multipart)
    }
}

#[async_trait]
impl NetworkProvider for NativeNetwork {
    async fn request(&self, request: NetworkRequest) -> Result<NetworkResponse> {
        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout_ms) = request.timeout_ms {
            req = req.timeout(Duration::from_millis(timeout_ms));
        }

        tracing::trace!(method = %request.method, url = %request.url, "Sending request");
        let response = req
            .send()
            .await
            .map_err(|e| Error::network(&request.url, format!("HTTP request failed: {}", e)))?;

        Self::into_response(&request.url, response).await
    }

    async fn send_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        timeout_ms: Option<u64>,
    ) -> Result<NetworkResponse> {
        let multipart = Self::build_form(url, form)?;
        let mut req = self.client.post(url).multipart(multipart);

        if let Some(timeout_ms) = timeout_ms {
            req = req.timeout(Duration::from_millis(timeout_ms));
        }

        tracing::trace!(url = %url, "Sending multipart request");
        let response = req
            .send()
            .await
            .map_err(|e| Error::network(url, format!("HTTP request failed: {}", e)))?;

        Self::into_response(url, response).await
    }
}
