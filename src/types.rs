use std::collections::HashMap;
use uuid::Uuid;
use serde_json::Value;

/// Unique identifier for submissions, fetch runs, log entries
pub type Id = Uuid;

/// Generic metadata container
pub type Metadata = HashMap<String, Value>;
