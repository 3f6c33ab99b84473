// src/catalog/models.rs

use std::fmt;
use std::path::Path;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, ReferenceKind, Result, ResultExt};
use crate::platform::MultipartForm;

/// Opaque backend identifier of a category or brand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form suitable for a single URL path segment
    pub fn path_encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ReferenceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct Category {
    pub id: ReferenceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct Brand {
    pub id: ReferenceId,
    pub name: String,
    /// Display fields the client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record that can be looked up by id through the resolver
pub trait Reference: DeserializeOwned + Send + 'static {
    const KIND: ReferenceKind;

    fn reference_id(&self) -> &ReferenceId;
}

impl Reference for Category {
    const KIND: ReferenceKind = ReferenceKind::Category;

    fn reference_id(&self) -> &ReferenceId {
        &self.id
    }
}

impl Reference for Brand {
    const KIND: ReferenceKind = ReferenceKind::Brand;

    fn reference_id(&self) -> &ReferenceId {
        &self.id
    }
}

/// A product field that the backend sends either as a bare id or populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordRef<T> {
    Id(ReferenceId),
    Record(T),
}

impl<T: Reference> RecordRef<T> {
    pub fn id(&self) -> &ReferenceId {
        match self {
            Self::Id(id) => id,
            Self::Record(record) => record.reference_id(),
        }
    }
}

/// A listed product. Optional fields the backend sends in an unexpected
/// shape decode as `None` instead of failing the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub picture: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<RecordRef<Category>>,
    #[serde(default, deserialize_with = "lenient")]
    pub brand: Option<RecordRef<Brand>>,
}

/// Body of a successful create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct CreatedItem {
    pub id: String,
}

/// Collapses `_id` and `id` into a single `id` key, preferring `_id`.
/// Numeric ids become strings.
fn normalize_record_id(mut object: Map<String, Value>) -> std::result::Result<Map<String, Value>, String> {
    let mongo = object.remove("_id").filter(|v| !v.is_null());
    let plain = object.remove("id").filter(|v| !v.is_null());

    let id = match mongo.or(plain) {
        Some(Value::String(id)) => id,
        Some(Value::Number(id)) => id.to_string(),
        Some(other) => return Err(format!("invalid record id: {}", other)),
        None => return Err("missing field `_id`".to_string()),
    };

    object.insert("id".to_string(), Value::String(id));
    Ok(object)
}

macro_rules! backend_record {
    ($($record:ty),+ $(,)?) => {$(
        impl Serialize for $record {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                <$record>::serialize(self, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $record {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let object = normalize_record_id(Map::deserialize(deserializer)?).map_err(de::Error::custom)?;
                <$record>::deserialize(Value::Object(object)).map_err(de::Error::custom)
            }
        }
    )+};
}

backend_record!(Category, Brand, Product, CreatedItem);

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Accepts a JSON number or a numeric string
fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    let number = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

/// Accepts a whole JSON number or a string holding one
fn lenient_integer<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    let whole = |n: f64| (n.is_finite() && n.fract() == 0.0).then_some(n as i64);

    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    })
}

/// Body of a rejected create call; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub message: Option<String>,
}

pub const BRAND_NAME_MAX_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBrand {
    pub name: String,
}

impl NewBrand {
    /// Brand names are 1 to 30 letters, digits or spaces
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("name", "Name is required."));
        }
        if name.chars().count() > BRAND_NAME_MAX_LEN {
            return Err(Error::validation(
                "name",
                format!("Name must be at most {} characters", BRAND_NAME_MAX_LEN),
            ));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c.is_whitespace()) {
            return Err(Error::validation(
                "name",
                "Please only use alphanumeric characters",
            ));
        }
        Ok(Self { name })
    }
}

/// Binary picture attached to an item
#[derive(Clone, PartialEq, Eq)]
pub struct PictureFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for PictureFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PictureFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Reads a picture from disk, guessing its content type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read picture {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "picture".to_string());

        Ok(Self::new(file_name, guess_content_type(path), bytes))
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Raw form input for one submission attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price_raw: String,
    pub stock_raw: String,
    pub picture: PictureFile,
    pub category_id: ReferenceId,
    pub brand_id: ReferenceId,
}

impl ProductDraft {
    /// Replaces both reference ids with their resolved records
    pub(crate) fn resolve(self, category: Category, brand: Brand) -> ResolvedProductDraft {
        ResolvedProductDraft {
            name: self.name,
            description: self.description,
            price_raw: self.price_raw,
            stock_raw: self.stock_raw,
            picture: self.picture,
            category,
            brand,
        }
    }
}

/// Draft whose references both resolved. Only built by the submission
/// pipeline after a successful join.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProductDraft {
    name: String,
    description: String,
    price_raw: String,
    stock_raw: String,
    picture: PictureFile,
    category: Category,
    brand: Brand,
}

impl ResolvedProductDraft {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn brand(&self) -> &Brand {
        &self.brand
    }
}

/// Transport-ready create body. The create call accepts nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPayload {
    form: MultipartForm,
}

impl SubmissionPayload {
    pub fn form(&self) -> &MultipartForm {
        &self.form
    }

    pub(crate) fn into_form(self) -> MultipartForm {
        self.form
    }
}

impl From<ResolvedProductDraft> for SubmissionPayload {
    fn from(draft: ResolvedProductDraft) -> Self {
        let form = MultipartForm::new()
            .text("name", draft.name)
            .text("brand", draft.brand.id.as_str())
            .text("category", draft.category.id.as_str())
            .text("description", draft.description)
            .text("price", draft.price_raw)
            .text("stock", draft.stock_raw)
            .file(
                "picture",
                draft.picture.file_name,
                draft.picture.content_type,
                draft.picture.bytes,
            );

        Self { form }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Widget".to_string(),
            description: "A small widget".to_string(),
            price_raw: "12".to_string(),
            stock_raw: "3".to_string(),
            picture: PictureFile::new("w.png", "image/png", vec![0x89, 0x50]),
            category_id: "c1".into(),
            brand_id: "b1".into(),
        }
    }

    #[test]
    fn test_product_accepts_mongo_ids() {
        let products: Vec<Product> = serde_json::from_str(
            r#"[{"_id":"p1","name":"Widget","price":12,"category":"c1"},
                {"id":"p2","name":"Gadget","brand":{"_id":"b1","name":"Acme","logo":"a.png"}}]"#,
        )
        .unwrap();

        assert_eq!(products[0].id, "p1");
        assert_eq!(products[0].category.as_ref().map(|c| c.id().as_str()), Some("c1"));
        assert_eq!(products[1].brand.as_ref().map(|b| b.id().as_str()), Some("b1"));
    }

    #[test]
    fn test_records_with_both_ids() {
        let created: CreatedItem = serde_json::from_str(r#"{"_id":"item123","id":"item123"}"#).unwrap();
        assert_eq!(created.id, "item123");

        let brand: Brand = serde_json::from_str(r#"{"_id":"b1","id":"b1","name":"A"}"#).unwrap();
        assert_eq!(brand.id.as_str(), "b1");
        assert!(brand.extra.is_empty());

        let category: Category = serde_json::from_str(r#"{"id":"legacy","_id":"c1","name":"Tools"}"#).unwrap();
        assert_eq!(category.id.as_str(), "c1");

        let products: Vec<Product> = serde_json::from_str(
            r#"[{"_id":"p1","id":"p1","name":"Widget","category":{"_id":"c1","id":"c1","name":"Tools"}}]"#,
        )
        .unwrap();
        assert_eq!(products[0].id, "p1");
        assert_eq!(products[0].category.as_ref().map(|c| c.id().as_str()), Some("c1"));
    }

    #[test]
    fn test_record_id_required() {
        let missing = serde_json::from_str::<CreatedItem>(r#"{"name":"x"}"#).unwrap_err();
        assert!(missing.to_string().contains("_id"));

        let null_ids = serde_json::from_str::<Brand>(r#"{"_id":null,"id":null,"name":"A"}"#);
        assert!(null_ids.is_err());

        let numeric: CreatedItem = serde_json::from_str(r#"{"id":42}"#).unwrap();
        assert_eq!(numeric.id, "42");
    }

    #[test]
    fn test_product_optional_fields_are_lenient() {
        let products: Vec<Product> = serde_json::from_str(
            r#"[{"_id":"p1","name":"Widget","price":"12","stock":"3","picture":{"url":"w.png"}},
                {"_id":"p2","name":"Gadget","price":"n/a","stock":2.0,"description":7,"brand":null},
                {"_id":"p3","name":"Gizmo","price":9.5,"stock":"1.5"}]"#,
        )
        .unwrap();

        assert_eq!(products[0].price, Some(12.0));
        assert_eq!(products[0].stock, Some(3));
        assert_eq!(products[0].picture, None);
        assert_eq!(products[1].price, None);
        assert_eq!(products[1].stock, Some(2));
        assert_eq!(products[1].description, None);
        assert_eq!(products[1].brand, None);
        assert_eq!(products[2].price, Some(9.5));
        assert_eq!(products[2].stock, None);
    }

    #[test]
    fn test_brand_keeps_display_fields() {
        let brand: Brand = serde_json::from_str(r#"{"_id":"b1","name":"Acme","logo":"a.png"}"#).unwrap();
        assert_eq!(brand.id.as_str(), "b1");
        assert_eq!(brand.extra.get("logo"), Some(&Value::String("a.png".to_string())));
    }

    #[test]
    fn test_reference_id_path_encoding() {
        let id = ReferenceId::new("a/b c");
        assert_eq!(id.path_encoded(), "a%2Fb%20c");
        assert_eq!(id.to_string(), "a/b c");
    }

    #[test]
    fn test_payload_field_order() {
        let category = Category {
            id: "c1".into(),
            name: "Tools".to_string(),
            description: None,
        };
        let brand = Brand {
            id: "b1".into(),
            name: "Acme".to_string(),
            extra: Map::new(),
        };

        let payload = SubmissionPayload::from(draft().resolve(category, brand));
        let form = payload.form();

        assert_eq!(
            form.field_names(),
            vec!["name", "brand", "category", "description", "price", "stock", "picture"]
        );
        assert_eq!(form.text_value("brand"), Some("b1"));
        assert_eq!(form.text_value("category"), Some("c1"));
        assert_eq!(form.text_value("price"), Some("12"));
    }

    #[test]
    fn test_brand_name_rules() {
        assert_eq!(NewBrand::new("Acme 2").unwrap().name, "Acme 2");
        assert!(NewBrand::new("  ").is_err());
        assert!(NewBrand::new("Acme!").is_err());
        assert!(NewBrand::new("x".repeat(31)).is_err());
        assert!(NewBrand::new("x".repeat(30)).is_ok());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("a.png")), "image/png");
        assert_eq!(guess_content_type(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_picture_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.webp");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let picture = PictureFile::from_path(&path).await.unwrap();
        assert_eq!(picture.file_name, "shot.webp");
        assert_eq!(picture.content_type, "image/webp");
        assert_eq!(picture.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_picture_missing_file() {
        let result = PictureFile::from_path("/definitely/not/here.png").await;
        assert!(result.is_err());
    }
}
