//! Document store abstraction.
//!
//! The HTTP layer only ever talks to a [`DocumentStore`]: a single collection
//! of JSON objects queried with exact-match [`Predicate`]s. Two backends ship
//! with the crate: [`PostgresStore`] (JSONB table) and [`MemoryStore`].

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Field holding the store-assigned identifier
pub const ID_FIELD: &str = "_id";

/// Field holding the tenant token
pub const AUTHORIZATION_FIELD: &str = "authorization";

/// A stored document: an arbitrary JSON object
pub type Document = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Opaque document identifier (UUID v4 rendered as a string in `_id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client supplied id. Malformed input yields `None` so callers
    /// can treat it as a lookup miss.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DocumentId> for Value {
    fn from(id: DocumentId) -> Self {
        Value::String(id.to_string())
    }
}

/// Conjunction of exact field equalities.
///
/// An empty predicate matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    fields: Document,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn id(self, id: DocumentId) -> Self {
        self.field(ID_FIELD, id)
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Minimal document-store contract used by the request handlers.
///
/// Implementations assign `_id` on insert and treat it as immutable on update.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents matching `predicate`, in insertion order
    async fn find(&self, predicate: &Predicate) -> StoreResult<Vec<Document>>;

    /// First matching document, if any
    async fn find_one(&self, predicate: &Predicate) -> StoreResult<Option<Document>>;

    /// Insert a single document, returning it with its assigned `_id`
    async fn insert_one(&self, document: Document) -> StoreResult<Document>;

    /// Insert a batch atomically, returning the documents with their `_id`s
    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Document>>;

    /// Merge the top-level fields of `set` into the first matching document.
    /// Returns the number of documents matched (0 or 1).
    async fn update_one(&self, predicate: &Predicate, set: Document) -> StoreResult<u64>;

    /// Delete the first matching document; returns the number deleted
    async fn delete_one(&self, predicate: &Predicate) -> StoreResult<u64>;

    /// Delete every matching document; returns the number deleted
    async fn delete_many(&self, predicate: &Predicate) -> StoreResult<u64>;

    async fn count(&self, predicate: &Predicate) -> StoreResult<u64>;

    /// Connectivity check used by `/health`
    async fn health_check(&self) -> StoreResult<()>;
}

/// Stamp a freshly generated identifier on a document about to be inserted.
/// Any client supplied `_id` is replaced.
pub(crate) fn assign_id(mut document: Document) -> (DocumentId, Document) {
    let id = DocumentId::new();
    document.insert(ID_FIELD.to_string(), id.into());
    (id, document)
}

/// Strip the immutable identifier out of an update payload
pub(crate) fn without_id(mut set: Document) -> Document {
    set.remove(ID_FIELD);
    set
}
