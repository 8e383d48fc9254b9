use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{assign_id, without_id, Document, DocumentStore, Predicate, StoreResult};

/// In-process document store.
///
/// Documents live in a `Vec` so scans come back in insertion order, matching
/// the ordering of the Postgres backend. Intended for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of documents across all partitions
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, predicate: &Predicate) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| predicate.matches(doc))
            .cloned()
            .collect())
    }

    async fn find_one(&self, predicate: &Predicate) -> StoreResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|doc| predicate.matches(doc)).cloned())
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        let (id, document) = assign_id(document);
        self.documents.write().await.push(document.clone());
        debug!("memory store inserted {}", id);
        Ok(document)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Document>> {
        let stamped: Vec<Document> = documents
            .into_iter()
            .map(|doc| assign_id(doc).1)
            .collect();

        self.documents.write().await.extend(stamped.iter().cloned());
        debug!("memory store inserted {} documents", stamped.len());
        Ok(stamped)
    }

    async fn update_one(&self, predicate: &Predicate, set: Document) -> StoreResult<u64> {
        let set = without_id(set);
        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|doc| predicate.matches(doc)) {
            Some(existing) => {
                for (field, value) in set {
                    existing.insert(field, value);
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, predicate: &Predicate) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        match documents.iter().position(|doc| predicate.matches(doc)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, predicate: &Predicate) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|doc| !predicate.matches(doc));
        Ok((before - documents.len()) as u64)
    }

    async fn count(&self, predicate: &Predicate) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        Ok(documents.iter().filter(|doc| predicate.matches(doc)).count() as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentId, ID_FIELD};
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object literal")
    }

    fn id_of(document: &Document) -> DocumentId {
        document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(DocumentId::parse)
            .expect("assigned id")
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.insert_one(doc(json!({"n": 1}))).await.unwrap();
        let b = store.insert_one(doc(json!({"n": 2}))).await.unwrap();

        assert_ne!(id_of(&a), id_of(&b));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn find_keeps_insertion_order() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![
                doc(json!({"k": "t", "n": 1})),
                doc(json!({"k": "t", "n": 2})),
                doc(json!({"k": "u", "n": 3})),
            ])
            .await
            .unwrap();

        let found = store.find(&Predicate::new().field("k", "t")).await.unwrap();
        let ns: Vec<_> = found.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn update_merges_top_level_fields_and_keeps_id() {
        let store = MemoryStore::new();
        let created = store
            .insert_one(doc(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        let id = id_of(&created);

        let matched = store
            .update_one(
                &Predicate::new().id(id),
                doc(json!({"b": 3, "c": 4, "_id": "other"})),
            )
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let updated = store
            .find_one(&Predicate::new().id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["a"], json!(1));
        assert_eq!(updated["b"], json!(3));
        assert_eq!(updated["c"], json!(4));
        assert_eq!(id_of(&updated), id);
    }

    #[tokio::test]
    async fn update_without_match_is_a_noop() {
        let store = MemoryStore::new();
        let matched = store
            .update_one(&Predicate::new().id(DocumentId::new()), doc(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(matched, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_one_removes_only_first_match() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![doc(json!({"k": "t"})), doc(json!({"k": "t"}))])
            .await
            .unwrap();

        let pred = Predicate::new().field("k", "t");
        assert_eq!(store.delete_one(&pred).await.unwrap(), 1);
        assert_eq!(store.count(&pred).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_many_scopes_to_predicate() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![
                doc(json!({"k": "t"})),
                doc(json!({"k": "t"})),
                doc(json!({"k": "u"})),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_many(&Predicate::new().field("k", "t")).await.unwrap(), 2);
        assert_eq!(store.count(&Predicate::new()).await.unwrap(), 1);
    }
}
