// src/catalog/mod.rs - Catalog admin orchestration

//! Listing retrieval, reference resolution and item submission against the
//! catalog backend.

pub mod api;
pub mod deadline;
pub mod fetcher;
pub mod loading;
pub mod message;
pub mod models;
pub mod submission;

pub use api::CatalogApi;
pub use deadline::Deadline;
pub use fetcher::{FetchPhase, ListingAction, ListingState, RetryFetcher, Settlement};
pub use loading::{LoadingFlag, LoadingGuard};
pub use message::{ClearPolicy, MessageSurface};
pub use models::{
    Brand, Category, CreatedItem, PictureFile, Product, ProductDraft, RecordRef, ReferenceId,
    ResolvedProductDraft, SubmissionPayload,
};
pub use submission::{FormOptions, SubmissionOrchestrator, SubmitFailure};
