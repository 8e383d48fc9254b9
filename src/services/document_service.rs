use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::middleware::TenantKey;
use crate::store::{Document, DocumentId, DocumentStore, Predicate, AUTHORIZATION_FIELD};

/// Document operations scoped to one partition.
///
/// Every predicate built here carries `authorization == key` and every write
/// has its `authorization` field overwritten with the key, so a request can
/// neither see nor tag documents outside its own partition.
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    key: TenantKey,
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>, key: TenantKey) -> Self {
        Self { store, key }
    }

    fn partition(&self) -> Predicate {
        Predicate::new().field(AUTHORIZATION_FIELD, self.key.as_str())
    }

    /// `None` when the raw id is not a well-formed identifier
    fn record(&self, raw_id: &str) -> Option<Predicate> {
        DocumentId::parse(raw_id).map(|id| self.partition().id(id))
    }

    fn stamp(&self, document: &mut Document) {
        document.insert(
            AUTHORIZATION_FIELD.to_string(),
            Value::String(self.key.as_str().to_string()),
        );
    }

    /// Look up `raw_id` inside the partition, failing with a 400 on a miss
    async fn find_record(&self, raw_id: &str) -> Result<(Predicate, Document), ApiError> {
        let not_found = || ApiError::record_not_found(raw_id, self.key.as_str());

        let predicate = self.record(raw_id).ok_or_else(not_found)?;
        match self.store.find_one(&predicate).await? {
            Some(document) => Ok((predicate, document)),
            None => Err(not_found()),
        }
    }

    pub async fn list(&self) -> Result<Vec<Document>, ApiError> {
        Ok(self.store.find(&self.partition()).await?)
    }

    pub async fn get(&self, raw_id: &str) -> Result<Document, ApiError> {
        let (_, document) = self.find_record(raw_id).await?;
        Ok(document)
    }

    /// Create one document (object body) or a batch (array body).
    ///
    /// Only the top-level value is checked for emptiness: `{}` and `[]` are
    /// rejected, `[{}]` stores a document holding just the key.
    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        if !has_keys(&body) {
            return Err(ApiError::empty_body());
        }

        match body {
            Value::Array(items) => {
                let mut documents = Vec::with_capacity(items.len());
                for item in items {
                    let Value::Object(mut document) = item else {
                        return Err(ApiError::bad_request(
                            "Every element of the request body array must be a JSON object.",
                        ));
                    };
                    self.stamp(&mut document);
                    documents.push(document);
                }

                let inserted = self.store.insert_many(documents).await?;
                info!("Created {} documents for key '{}'", inserted.len(), self.key);
                Ok(Value::Array(inserted.into_iter().map(Value::Object).collect()))
            }
            Value::Object(mut document) => {
                self.stamp(&mut document);
                let inserted = self.store.insert_one(document).await?;
                info!("Created document for key '{}'", self.key);
                Ok(Value::Object(inserted))
            }
            _ => Err(not_an_object()),
        }
    }

    /// Merge the body's top-level fields into an existing document. Fields
    /// absent from the body are left untouched. Returns the body as applied.
    pub async fn update(&self, raw_id: &str, body: Value) -> Result<Document, ApiError> {
        if !has_keys(&body) {
            return Err(ApiError::empty_body());
        }
        let Value::Object(mut changes) = body else {
            return Err(not_an_object());
        };

        let (predicate, _) = self.find_record(raw_id).await?;

        self.stamp(&mut changes);
        let matched = self.store.update_one(&predicate, changes.clone()).await?;
        if matched == 0 {
            // Deleted between lookup and write
            debug!("Update of '{}' for key '{}' matched nothing", raw_id, self.key);
        }

        Ok(changes)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), ApiError> {
        let (predicate, _) = self.find_record(raw_id).await?;
        self.store.delete_one(&predicate).await?;
        info!("Deleted document '{}' for key '{}'", raw_id, self.key);
        Ok(())
    }

    /// Remove the whole partition, returning how many documents it held.
    /// An empty partition skips the delete entirely.
    pub async fn delete_all(&self) -> Result<u64, ApiError> {
        let partition = self.partition();
        let count = self.store.count(&partition).await?;

        if count > 0 {
            self.store.delete_many(&partition).await?;
            info!("Deleted {} documents for key '{}'", count, self.key);
        }

        Ok(count)
    }
}

/// A write body needs at least one key (objects) or element (arrays)
fn has_keys(body: &Value) -> bool {
    match body {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

fn not_an_object() -> ApiError {
    ApiError::bad_request("The request body must be a JSON object or an array of objects.")
}
