// src/catalog/submission.rs

//! Item submission pipeline and the form helpers around it
//!
//! A submit resolves the draft's category and brand concurrently, builds the
//! multipart payload from the resolved records and sends the create call.
//! Every failure ends up as a single message on the [`MessageSurface`] (or no
//! message, when the backend rejects without one). Nothing is retried.

use crate::error::{Error, ErrorKind, ReferenceKind, Result};
use crate::platform::NetworkResponse;

use super::api::{decode, CatalogApi, CREATE_ITEM_PATH, ITEM_CREATED_STATUS};
use super::loading::LoadingFlag;
use super::message::MessageSurface;
use super::models::{Brand, Category, CreatedItem, ProductDraft, ServerMessage, SubmissionPayload};

/// Why a submission did not produce an item
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitFailure {
    /// The category or brand lookup failed; the create call was never sent
    #[error("{0}")]
    ReferenceResolution(Error),
    /// The backend answered with a status other than the expected one
    #[error("Rejected with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    /// Transport or decode failure on the create call
    #[error("{0}")]
    Transport(Error),
    /// Input rejected before anything was sent
    #[error("{0}")]
    Invalid(Error),
}

impl SubmitFailure {
    /// Text to show the user, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::ReferenceResolution(error) | Self::Transport(error) | Self::Invalid(error) => {
                Some(error.message.as_str())
            }
            Self::Rejected { message, .. } => message.as_deref(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Choices offered by the create-item form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormOptions {
    pub categories: Vec<Category>,
    pub brands: Vec<Brand>,
}

impl FormOptions {
    /// Loads categories and brands concurrently
    pub async fn load(api: &CatalogApi) -> Result<Self> {
        let (categories, brands) =
            futures::future::try_join(api.list_categories(), api.list_brands())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to load form options");
                    e
                })?;

        tracing::debug!(
            categories = categories.len(),
            brands = brands.len(),
            "Form options loaded"
        );
        Ok(Self { categories, brands })
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionOrchestrator {
    api: CatalogApi,
    loading: LoadingFlag,
    messages: MessageSurface,
}

impl SubmissionOrchestrator {
    pub fn new(api: CatalogApi, messages: MessageSurface) -> Self {
        Self {
            api,
            loading: LoadingFlag::new(),
            messages,
        }
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    pub fn messages(&self) -> &MessageSurface {
        &self.messages
    }

    /// Submits `draft` and returns the created item id.
    ///
    /// The loading flag is raised for the whole call and lowered on every
    /// exit path. Concurrent submits are not serialized.
    pub async fn submit(&self, draft: ProductDraft) -> std::result::Result<String, SubmitFailure> {
        let _loading = self.loading.guard();
        let name = draft.name.clone();

        let result = self.submit_draft(draft).await;
        match &result {
            Ok(id) => tracing::info!(item = %name, id = %id, "Item created"),
            Err(failure) => {
                tracing::warn!(item = %name, failure = %failure, "Item submission failed");
                if let Some(message) = failure.message() {
                    self.messages.show(message);
                }
            }
        }
        result
    }

    async fn submit_draft(&self, draft: ProductDraft) -> std::result::Result<String, SubmitFailure> {
        let (category, brand) = self
            .resolve_references(&draft)
            .await
            .map_err(SubmitFailure::ReferenceResolution)?;

        let url = self
            .api
            .endpoint(CREATE_ITEM_PATH)
            .map_err(SubmitFailure::Transport)?;
        let payload = SubmissionPayload::from(draft.resolve(category, brand));
        let response = self
            .api
            .create_item(payload)
            .await
            .map_err(SubmitFailure::Transport)?;

        classify(&url, response)
    }

    async fn resolve_references(&self, draft: &ProductDraft) -> Result<(Category, Brand)> {
        let category = async {
            self.api
                .get_category(&draft.category_id)
                .await
                .map_err(|e| Error::reference(ReferenceKind::Category, draft.category_id.as_str(), e))
        };
        let brand = async {
            self.api
                .get_brand(&draft.brand_id)
                .await
                .map_err(|e| Error::reference(ReferenceKind::Brand, draft.brand_id.as_str(), e))
        };

        tokio::try_join!(category, brand)
    }

    /// Creates a brand, showing "Already exists" when the backend refuses.
    /// The created record is returned when the backend sent one back.
    pub async fn create_brand(
        &self,
        name: impl Into<String>,
    ) -> std::result::Result<Option<Brand>, SubmitFailure> {
        let _loading = self.loading.guard();
        let name = name.into();

        match self.api.create_brand(name.clone()).await {
            Ok(created) => {
                let id = created.as_ref().map(|brand| brand.id.as_str());
                tracing::info!(brand = %name, id = ?id, "Brand created");
                Ok(created)
            }
            Err(error) => {
                tracing::warn!(brand = %name, error = %error, "Brand creation failed");
                self.messages.show(error.message.clone());
                let invalid = matches!(error.kind, ErrorKind::Validation { .. });
                match error.status_code() {
                    Some(status) => Err(SubmitFailure::Rejected {
                        status,
                        message: Some(error.message),
                    }),
                    None if invalid => Err(SubmitFailure::Invalid(error)),
                    None => Err(SubmitFailure::Transport(error)),
                }
            }
        }
    }
}

fn classify(url: &str, response: NetworkResponse) -> std::result::Result<String, SubmitFailure> {
    if response.status_code == ITEM_CREATED_STATUS {
        let created: CreatedItem = decode(url, &response.body).map_err(SubmitFailure::Transport)?;
        return Ok(created.id);
    }

    let body: ServerMessage = decode(url, &response.body).map_err(SubmitFailure::Transport)?;
    Err(SubmitFailure::Rejected {
        status: response.status_code,
        message: body.message.filter(|m| !m.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::PictureFile;
    use crate::platform::mock::{Reply, ScriptedNetwork};
    use crate::platform::HttpMethod;
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "http://localhost:4000/";

    fn orchestrator(network: &Arc<ScriptedNetwork>) -> SubmissionOrchestrator {
        let api = CatalogApi::new(Some(BASE.to_string()), network.clone());
        SubmissionOrchestrator::new(api, MessageSurface::default())
    }

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Widget".to_string(),
            description: "A small widget".to_string(),
            price_raw: "12".to_string(),
            stock_raw: "3".to_string(),
            picture: PictureFile::new("w.png", "image/png", vec![1, 2, 3]),
            category_id: "c1".into(),
            brand_id: "b1".into(),
        }
    }

    fn script_references(network: &ScriptedNetwork) {
        network
            .on_get(
                format!("{}category/c1", BASE),
                Reply::json(200, json!({"_id": "c1", "name": "Tools"})),
            )
            .on_get(
                format!("{}brand/b1", BASE),
                Reply::json(200, json!({"_id": "b1", "name": "Acme"})),
            );
    }

    #[tokio::test]
    async fn test_submit_success() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(
            format!("{}item/create", BASE),
            Reply::json(201, json!({"id": "item123"})),
        );

        let orchestrator = orchestrator(&network);
        let id = orchestrator.submit(draft()).await.unwrap();

        assert_eq!(id, "item123");
        assert!(!orchestrator.loading().is_loading());
        assert!(orchestrator.messages().is_empty());

        let create = network
            .calls()
            .into_iter()
            .find(|c| c.method == HttpMethod::Post)
            .unwrap();
        let form = create.form.unwrap();
        assert_eq!(form.text_value("category"), Some("c1"));
        assert_eq!(form.text_value("brand"), Some("b1"));
    }

    #[tokio::test]
    async fn test_brand_failure_skips_create() {
        let network = Arc::new(ScriptedNetwork::new());
        network
            .on_get(
                format!("{}category/c1", BASE),
                Reply::json(200, json!({"_id": "c1", "name": "Tools"})),
            )
            .on_get(format!("{}brand/b1", BASE), Reply::network_error("connection refused"));

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.submit(draft()).await.unwrap_err();

        match &failure {
            SubmitFailure::ReferenceResolution(error) => {
                assert!(matches!(
                    error.kind,
                    ErrorKind::ReferenceResolution { kind: ReferenceKind::Brand, .. }
                ));
            }
            other => panic!("unexpected failure: {:?}", other),
        }
        assert_eq!(orchestrator.messages().current(), "connection refused");
        assert_eq!(network.calls_to(HttpMethod::Post, &format!("{}item/create", BASE)), 0);
        assert!(!orchestrator.loading().is_loading());
    }

    #[tokio::test]
    async fn test_rejection_with_message() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(
            format!("{}item/create", BASE),
            Reply::json(422, json!({"message": "Out of stock"})),
        );

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.submit(draft()).await.unwrap_err();

        assert_eq!(failure.status(), Some(422));
        assert_eq!(orchestrator.messages().current(), "Out of stock");
        assert!(!orchestrator.loading().is_loading());
    }

    #[tokio::test]
    async fn test_rejection_without_message_is_silent() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(format!("{}item/create", BASE), Reply::json(422, json!({})));

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.submit(draft()).await.unwrap_err();

        assert!(matches!(failure, SubmitFailure::Rejected { status: 422, message: None }));
        assert!(orchestrator.messages().is_empty());
        assert!(!orchestrator.loading().is_loading());
    }

    #[tokio::test]
    async fn test_created_without_id_is_transport_failure() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(format!("{}item/create", BASE), Reply::raw(201, "ok"));

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.submit(draft()).await.unwrap_err();

        assert!(matches!(failure, SubmitFailure::Transport(_)));
        let message = failure.message().unwrap();
        assert!(message.contains("http://localhost:4000/item/create"));
        assert_eq!(orchestrator.messages().current(), message);
    }

    #[tokio::test]
    async fn test_created_body_with_both_ids() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(
            format!("{}item/create", BASE),
            Reply::json(201, json!({"_id": "item123", "id": "item123"})),
        );

        let orchestrator = orchestrator(&network);
        assert_eq!(orchestrator.submit(draft()).await.unwrap(), "item123");
        assert!(orchestrator.messages().is_empty());
    }

    #[tokio::test]
    async fn test_create_transport_error_surfaces_raw_message() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(format!("{}item/create", BASE), Reply::network_error("connection reset by peer"));

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.submit(draft()).await.unwrap_err();

        assert!(matches!(failure, SubmitFailure::Transport(_)));
        assert_eq!(failure.message(), Some("connection reset by peer"));
        assert_eq!(orchestrator.messages().current(), "connection reset by peer");
        assert!(!orchestrator.loading().is_loading());
        assert_eq!(network.calls_to(HttpMethod::Post, &format!("{}item/create", BASE)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_lookups_run_concurrently() {
        let lookup = std::time::Duration::from_secs(1);
        let network = Arc::new(ScriptedNetwork::new());
        network
            .on_get(
                format!("{}category/c1", BASE),
                Reply::json(200, json!({"_id": "c1", "name": "Tools"})).after(lookup),
            )
            .on_get(
                format!("{}brand/b1", BASE),
                Reply::json(200, json!({"_id": "b1", "name": "Acme"})).after(lookup),
            )
            .on_post(format!("{}item/create", BASE), Reply::json(201, json!({"_id": "item123"})));

        let started = tokio::time::Instant::now();
        let id = orchestrator(&network).submit(draft()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(id, "item123");
        assert!(elapsed >= lookup);
        assert!(elapsed < std::time::Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_loading_raised_during_submit() {
        let network = Arc::new(ScriptedNetwork::new());
        script_references(&network);
        network.on_post(
            format!("{}item/create", BASE),
            Reply::json(201, json!({"_id": "x"})).after(std::time::Duration::from_millis(100)),
        );

        let orchestrator = orchestrator(&network);
        let mut rx = orchestrator.loading().subscribe();
        let handle = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.submit(draft()).await }
        });

        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        assert_eq!(handle.await.unwrap().unwrap(), "x");
        assert!(!orchestrator.loading().is_loading());
    }

    #[tokio::test]
    async fn test_form_options_load() {
        let network = Arc::new(ScriptedNetwork::new());
        network
            .on_get(
                format!("{}categories", BASE),
                Reply::json(200, json!([{"_id": "c1", "name": "Tools"}])),
            )
            .on_get(
                format!("{}brands", BASE),
                Reply::json(200, json!([{"_id": "b1", "name": "Acme"}, {"_id": "b2", "name": "Nova"}])),
            );

        let api = CatalogApi::new(Some(BASE.to_string()), network.clone());
        let options = FormOptions::load(&api).await.unwrap();

        assert_eq!(options.categories.len(), 1);
        assert_eq!(options.brands.len(), 2);
    }

    #[tokio::test]
    async fn test_form_options_failure() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_get(format!("{}categories", BASE), Reply::json(200, json!([])));

        let api = CatalogApi::new(Some(BASE.to_string()), network.clone());
        assert!(FormOptions::load(&api).await.is_err());
    }

    #[tokio::test]
    async fn test_create_brand_invalid_name() {
        let network = Arc::new(ScriptedNetwork::new());

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.create_brand("").await.unwrap_err();

        assert!(matches!(failure, SubmitFailure::Invalid(_)));
        assert_eq!(orchestrator.messages().current(), "Name is required.");
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_brand_conflict_shows_message() {
        let network = Arc::new(ScriptedNetwork::new());
        network.on_post(format!("{}brand/create", BASE), Reply::json(400, json!({})));

        let orchestrator = orchestrator(&network);
        let failure = orchestrator.create_brand("Acme").await.unwrap_err();

        assert_eq!(failure.message(), Some("Already exists"));
        assert_eq!(orchestrator.messages().current(), "Already exists");
        assert!(!orchestrator.loading().is_loading());
    }

    #[tokio::test]
    async fn test_create_brand_accepts_any_ok_body() {
        let network = Arc::new(ScriptedNetwork::new());
        network
            .on_post(format!("{}brand/create", BASE), Reply::json(200, json!({"message": "Brand created"})))
            .on_post(format!("{}brand/create", BASE), Reply::json(200, json!({"_id": "b2", "name": "Nova"})));

        let orchestrator = orchestrator(&network);
        assert_eq!(orchestrator.create_brand("Nova").await.unwrap(), None);
        assert!(orchestrator.messages().is_empty());

        let created = orchestrator.create_brand("Nova").await.unwrap().unwrap();
        assert_eq!(created.id.as_str(), "b2");
        assert!(!orchestrator.loading().is_loading());
    }
}
