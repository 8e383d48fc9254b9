use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use tracing::{debug, info};

use super::{
    assign_id, without_id, Document, DocumentStore, Predicate, StoreError, StoreResult,
};
use crate::config::DatabaseConfig;

/// Document store backed by a single Postgres table.
///
/// Each row keeps the whole document in a JSONB `body` column; `seq` gives a
/// stable insertion order and `id` mirrors `_id` for uniqueness. Predicates
/// are evaluated with JSONB containment (`body @> $1`), which for scalar
/// values is exact equality on every listed field.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    collection: String,
    table: String,
}

impl PostgresStore {
    /// Connect using the configured credentials and ensure the collection
    /// table exists.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let url = build_connection_string(config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&url)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self::with_pool(pool, &config.collection)?;
        store.ensure_table().await?;

        info!("Connected document store to collection '{}'", config.collection);
        Ok(store)
    }

    /// Wrap an existing pool. The collection name is validated here since it
    /// ends up interpolated into SQL.
    pub fn with_pool(pool: PgPool, collection: &str) -> StoreResult<Self> {
        if !is_valid_collection_name(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        Ok(Self {
            pool,
            collection: collection.to_string(),
            table: quote_identifier(collection),
        })
    }

    async fn ensure_table(&self) -> StoreResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL PRIMARY KEY,
                id UUID NOT NULL UNIQUE,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            self.table
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING GIN (body jsonb_path_ops)",
            quote_identifier(&format!("{}_body_idx", self.collection)),
            self.table
        );
        sqlx::query(&index).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed document store pool for '{}'", self.collection);
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find(&self, predicate: &Predicate) -> StoreResult<Vec<Document>> {
        let sql = format!(
            "SELECT body FROM {} WHERE body @> $1 ORDER BY seq",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(Json(predicate.to_value()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|row| row_to_document(&row)).collect()
    }

    async fn find_one(&self, predicate: &Predicate) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT body FROM {} WHERE body @> $1 ORDER BY seq LIMIT 1",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(Json(predicate.to_value()))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_document(&row)).transpose()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        let (id, document) = assign_id(document);
        let sql = format!("INSERT INTO {} (id, body) VALUES ($1, $2)", self.table);
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(Json(&document))
            .execute(&self.pool)
            .await?;

        debug!("Inserted document {}", id);
        Ok(document)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Document>> {
        let sql = format!("INSERT INTO {} (id, body) VALUES ($1, $2)", self.table);
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(documents.len());

        for document in documents {
            let (id, document) = assign_id(document);
            sqlx::query(&sql)
                .bind(id.as_uuid())
                .bind(Json(&document))
                .execute(&mut *tx)
                .await?;
            inserted.push(document);
        }

        tx.commit().await?;
        debug!("Inserted {} documents", inserted.len());
        Ok(inserted)
    }

    async fn update_one(&self, predicate: &Predicate, set: Document) -> StoreResult<u64> {
        let sql = format!(
            "UPDATE {table} SET body = body || $2
             WHERE seq = (SELECT seq FROM {table} WHERE body @> $1 ORDER BY seq LIMIT 1)",
            table = self.table
        );
        let result = sqlx::query(&sql)
            .bind(Json(predicate.to_value()))
            .bind(Json(without_id(set)))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_one(&self, predicate: &Predicate) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM {table}
             WHERE seq = (SELECT seq FROM {table} WHERE body @> $1 ORDER BY seq LIMIT 1)",
            table = self.table
        );
        let result = sqlx::query(&sql)
            .bind(Json(predicate.to_value()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_many(&self, predicate: &Predicate) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {} WHERE body @> $1", self.table);
        let result = sqlx::query(&sql)
            .bind(Json(predicate.to_value()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self, predicate: &Predicate) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {} WHERE body @> $1", self.table);
        let row = sqlx::query(&sql)
            .bind(Json(predicate.to_value()))
            .fetch_one(&self.pool)
            .await?;

        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> StoreResult<Document> {
    let Json(document): Json<Document> = row.try_get("body")?;
    Ok(document)
}

/// `DATABASE_URL` wins when present; otherwise the URL is composed from the
/// individual `DB_*` settings.
pub fn build_connection_string(config: &DatabaseConfig) -> StoreResult<String> {
    if let Some(url) = &config.url {
        url::Url::parse(url).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        return Ok(url.clone());
    }

    let host = config
        .host
        .as_deref()
        .ok_or(StoreError::ConfigMissing("DB_HOST"))?;
    let name = config
        .name
        .as_deref()
        .ok_or(StoreError::ConfigMissing("DB_NAME"))?;

    let mut url = url::Url::parse(&format!("postgres://{}", host))
        .map_err(|_| StoreError::InvalidDatabaseUrl)?;
    url.set_path(&format!("/{}", name));

    if let Some(user) = &config.user {
        url.set_username(user)
            .map_err(|_| StoreError::InvalidDatabaseUrl)?;
    }
    if let Some(password) = &config.password {
        url.set_password(Some(password))
            .map_err(|_| StoreError::InvalidDatabaseUrl)?;
    }

    Ok(url.into())
}

/// Collection names become table names: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes
fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentId, ID_FIELD};
    use serde_json::{json, Value};

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            user: Some("blue".into()),
            password: Some("p@ss/word".into()),
            host: Some("db.internal:5432".into()),
            name: Some("documents".into()),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn validates_collection_names() {
        assert!(is_valid_collection_name("main"));
        assert!(is_valid_collection_name("_docs_2"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("2main"));
        assert!(!is_valid_collection_name("main-docs"));
        assert!(!is_valid_collection_name("main\"; DROP TABLE x"));
    }

    #[test]
    fn composes_url_from_parts() {
        let url = build_connection_string(&config()).unwrap();
        assert!(url.starts_with("postgres://blue:"));
        assert!(url.ends_with("@db.internal:5432/documents"));
        // reserved characters in the password are escaped
        assert!(!url.contains("p@ss/word"));
    }

    #[test]
    fn explicit_url_takes_precedence() {
        let cfg = DatabaseConfig {
            url: Some("postgres://u:p@localhost/other".into()),
            ..config()
        };
        assert_eq!(
            build_connection_string(&cfg).unwrap(),
            "postgres://u:p@localhost/other"
        );
    }

    #[test]
    fn missing_host_is_reported() {
        let cfg = DatabaseConfig {
            host: None,
            ..config()
        };
        assert!(matches!(
            build_connection_string(&cfg),
            Err(StoreError::ConfigMissing("DB_HOST"))
        ));
    }

    // Backend tests below need a live database:
    // DATABASE_URL=postgres://... cargo test -- --ignored

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

    /// Store on a fresh, uniquely named table
    async fn scratch_store() -> PostgresStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");

        let collection = format!("test_{}", uuid::Uuid::new_v4().simple());
        let store = PostgresStore::with_pool(pool, &collection).unwrap();
        store.ensure_table().await.unwrap();
        store
    }

    async fn drop_table(store: PostgresStore) {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", store.table))
            .execute(&store.pool)
            .await
            .unwrap();
        store.close().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn update_merges_fields_and_keeps_id() {
        let store = scratch_store().await;
        let created = store
            .insert_one(doc(json!({"authorization": "t", "a": 1, "b": 2})))
            .await
            .unwrap();
        let id = id_of(&created);
        let record = Predicate::new().field("authorization", "t").id(id);

        let matched = store
            .update_one(&record, doc(json!({"b": 3, "c": 4, "_id": "forged"})))
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let stored = store.find_one(&record).await.unwrap().expect("still findable by id");
        assert_eq!(stored["a"], json!(1));
        assert_eq!(stored["b"], json!(3));
        assert_eq!(stored["c"], json!(4));
        assert_eq!(id_of(&stored), id);

        drop_table(store).await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn record_predicates_do_not_cross_partitions() {
        let store = scratch_store().await;
        let created = store
            .insert_one(doc(json!({"authorization": "owner", "a": 1})))
            .await
            .unwrap();
        let foreign = Predicate::new().field("authorization", "intruder").id(id_of(&created));

        assert!(store.find_one(&foreign).await.unwrap().is_none());
        assert_eq!(store.update_one(&foreign, doc(json!({"a": 2}))).await.unwrap(), 0);
        assert_eq!(store.delete_one(&foreign).await.unwrap(), 0);

        let owner = Predicate::new().field("authorization", "owner");
        let stored = store.find(&owner).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["a"], json!(1));

        drop_table(store).await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn insert_many_keeps_order_and_count_scopes() {
        let store = scratch_store().await;
        let inserted = store
            .insert_many(vec![
                doc(json!({"authorization": "a", "n": 1})),
                doc(json!({"authorization": "a", "n": 2})),
                doc(json!({"authorization": "b", "n": 3})),
            ])
            .await
            .unwrap();
        assert_eq!(inserted.len(), 3);

        let a = Predicate::new().field("authorization", "a");
        let ns: Vec<_> = store.find(&a).await.unwrap().iter().map(|d| d["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2)]);
        assert_eq!(store.count(&a).await.unwrap(), 2);
        assert_eq!(store.count(&Predicate::new()).await.unwrap(), 3);

        drop_table(store).await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn deletes_respect_predicate_and_limit() {
        let store = scratch_store().await;
        store
            .insert_many(vec![
                doc(json!({"authorization": "a"})),
                doc(json!({"authorization": "a"})),
                doc(json!({"authorization": "a"})),
                doc(json!({"authorization": "b"})),
            ])
            .await
            .unwrap();

        let a = Predicate::new().field("authorization", "a");
        let b = Predicate::new().field("authorization", "b");

        assert_eq!(store.delete_one(&a).await.unwrap(), 1);
        assert_eq!(store.count(&a).await.unwrap(), 2);

        assert_eq!(store.delete_many(&a).await.unwrap(), 2);
        assert_eq!(store.count(&a).await.unwrap(), 0);
        assert_eq!(store.count(&b).await.unwrap(), 1);

        store.health_check().await.unwrap();
        drop_table(store).await;
    }
}
