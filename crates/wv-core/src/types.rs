//! Schema and search types exchanged with Weaviate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A property of a collection, as reported by `GET /v1/schema/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,

    /// Weaviate data types (`["text"]`, `["int[]"]`, or a referenced collection name).
    #[serde(default, rename(serialize = "data_type", deserialize = "dataType"))]
    pub data_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Fields of an `object` or `object[]` property.
    #[serde(
        default,
        rename(serialize = "nested_properties", deserialize = "nestedProperties"),
        skip_serializing_if = "Vec::is_empty"
    )]
    pub nested_properties: Vec<PropertyInfo>,
}

/// Subfields Weaviate returns for a `phoneNumber` property.
const PHONE_NUMBER_FIELDS: &str =
    "input internationalFormatted defaultCountry countryCode national nationalFormatted valid";

impl PropertyInfo {
    /// Cross-reference properties name another collection, which starts uppercase.
    pub fn is_reference(&self) -> bool {
        self.data_type
            .first()
            .and_then(|t| t.chars().next())
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
    }

    /// GraphQL selection for this property in a `Get` query.
    ///
    /// Composite types select their subfields. `None` for references and for
    /// objects with no selectable fields.
    pub fn selection(&self) -> Option<String> {
        if self.is_reference() {
            return None;
        }

        match self.data_type.first().map(String::as_str) {
            Some("geoCoordinates") => Some(format!("{} {{ latitude longitude }}", self.name)),
            Some("phoneNumber") => Some(format!("{} {{ {} }}", self.name, PHONE_NUMBER_FIELDS)),
            Some("object") | Some("object[]") => {
                let nested: Vec<String> = self
                    .nested_properties
                    .iter()
                    .filter_map(PropertyInfo::selection)
                    .collect();
                if nested.is_empty() {
                    None
                } else {
                    Some(format!("{} {{ {} }}", self.name, nested.join(" ")))
                }
            }
            _ => Some(self.name.clone()),
        }
    }
}

/// Multi-tenancy section of a collection config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiTenancyConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Collection (Weaviate class) definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name.
    #[serde(rename = "class")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub properties: Vec<PropertyInfo>,

    /// Absent on servers or collections without multi-tenancy support.
    #[serde(
        default,
        rename = "multiTenancyConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub multi_tenancy: Option<MultiTenancyConfig>,
}

impl CollectionConfig {
    pub fn multi_tenancy_enabled(&self) -> bool {
        self.multi_tenancy.map(|m| m.enabled).unwrap_or(false)
    }

    /// Field selections for a GraphQL `Get` query over this collection.
    pub fn selection_fields(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter_map(PropertyInfo::selection)
            .collect()
    }
}

/// A tenant of a multi-tenant collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_status: Option<String>,
}

/// One entry of a [`SchemaReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub name: String,
    pub properties: Vec<PropertyInfo>,

    /// Set when this collection's config could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Schema overview across all collections.
///
/// Never an `Err`: a failed listing is carried in `error` with no collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub collections: Vec<CollectionSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SchemaReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            collections: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Search strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    /// Vector similarity against the query text (`nearText`).
    NearText,

    /// BM25 keyword ranking.
    Bm25,

    /// Weighted blend; `alpha = 0` is pure keyword, `alpha = 1` pure vector.
    Hybrid { alpha: f32 },
}

/// A search request against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub mode: SearchMode,
    pub limit: u32,
}

impl SearchQuery {
    pub fn near_text(text: impl Into<String>, limit: u32) -> Self {
        Self {
            text: text.into(),
            mode: SearchMode::NearText,
            limit,
        }
    }

    pub fn bm25(text: impl Into<String>, limit: u32) -> Self {
        Self {
            text: text.into(),
            mode: SearchMode::Bm25,
            limit,
        }
    }

    pub fn hybrid(text: impl Into<String>, alpha: f32, limit: u32) -> Self {
        Self {
            text: text.into(),
            mode: SearchMode::Hybrid { alpha },
            limit,
        }
    }
}

/// A single object returned by a search or fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Object UUID.
    pub id: String,

    /// Collection the object belongs to.
    pub collection: String,

    pub properties: Map<String, Value>,

    /// Ranking score (BM25 and hybrid).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Vector distance (near-text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// A page of objects from `GET /v1/objects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPage {
    pub collection: String,
    pub limit: u32,
    pub offset: u32,
    pub objects: Vec<SearchHit>,
}
