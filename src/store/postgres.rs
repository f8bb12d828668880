//! PostgreSQL-backed UtilityStore. Documents live in JSONB columns keyed by
//! their path (address → year → service / reading).

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{address_missing, user_missing, year_missing, UtilityStore};
use crate::errors::AppError;
use crate::models::address::{AddressDoc, AddressEntry};
use crate::models::document::merge_document;
use crate::models::reading::MeterReadingRecord;
use crate::models::user::{UserProfile, UserRole};
use crate::models::utility::UtilityServiceRecord;
use crate::models::year::YearRecord;

/// Child collections stored under a year.
#[derive(Debug, Clone, Copy)]
enum Collection {
    Services,
    Readings,
}

impl Collection {
    fn table(self) -> &'static str {
        match self {
            Collection::Services => "utility_services",
            Collection::Readings => "meter_readings",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_docs(
        &self,
        collection: Collection,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<(String, Value)>, AppError> {
        let sql = format!(
            "SELECT id, doc FROM {} WHERE address_id = $1 AND year_id = $2 ORDER BY id",
            collection.table()
        );
        let rows = sqlx::query_as::<_, (String, Value)>(&sql)
            .bind(address_id)
            .bind(year_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Read-modify-write of one child document inside a transaction.
    ///
    /// The seed row is inserted first so that `FOR UPDATE` always has a row to
    /// lock; concurrent merges into a new document then serialize on it.
    async fn merge_doc(
        &self,
        collection: Collection,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
        seed: Value,
        patch: Value,
    ) -> Result<Value, AppError> {
        let table = collection.table();
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            "INSERT INTO {table} (address_id, year_id, id, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (address_id, year_id, id) DO NOTHING"
        );
        sqlx::query(&insert)
            .bind(address_id)
            .bind(year_id)
            .bind(doc_id)
            .bind(&seed)
            .execute(&mut *tx)
            .await
            .map_err(|e| missing_parent(e, || year_missing(address_id, year_id)))?;

        let select = format!(
            "SELECT doc FROM {table} WHERE address_id = $1 AND year_id = $2 AND id = $3 FOR UPDATE"
        );
        let mut doc = sqlx::query_scalar::<_, Value>(&select)
            .bind(address_id)
            .bind(year_id)
            .bind(doc_id)
            .fetch_one(&mut *tx)
            .await?;

        merge_document(&mut doc, patch);

        let update = format!(
            "UPDATE {table} SET doc = $4, updated_at = NOW()
             WHERE address_id = $1 AND year_id = $2 AND id = $3"
        );
        sqlx::query(&update)
            .bind(address_id)
            .bind(year_id)
            .bind(doc_id)
            .bind(&doc)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(doc)
    }

    async fn delete_doc(
        &self,
        collection: Collection,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE address_id = $1 AND year_id = $2 AND id = $3",
            collection.table()
        );
        let result = sqlx::query(&sql)
            .bind(address_id)
            .bind(year_id)
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Foreign key violations mean the parent address or year does not exist.
fn missing_parent(e: sqlx::Error, not_found: impl FnOnce() -> AppError) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => not_found(),
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl UtilityStore for PgStore {
    async fn list_addresses(&self) -> Result<Vec<AddressEntry>, AppError> {
        let rows = sqlx::query_as::<_, (String, Value)>("SELECT id, doc FROM addresses ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, doc)| {
                let data = AddressDoc::from_document(&id, &doc);
                AddressEntry { id, data }
            })
            .collect())
    }

    async fn get_address(&self, address_id: &str) -> Result<Option<AddressDoc>, AppError> {
        let doc = sqlx::query_scalar::<_, Value>("SELECT doc FROM addresses WHERE id = $1")
            .bind(address_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|d| AddressDoc::from_document(address_id, &d)))
    }

    async fn upsert_address(&self, address_id: &str, doc: &AddressDoc) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO addresses (id, doc) VALUES ($1, '{}'::jsonb) ON CONFLICT (id) DO NOTHING")
            .bind(address_id)
            .execute(&mut *tx)
            .await?;

        let mut current =
            sqlx::query_scalar::<_, Value>("SELECT doc FROM addresses WHERE id = $1 FOR UPDATE")
                .bind(address_id)
                .fetch_one(&mut *tx)
                .await?;

        merge_document(&mut current, doc.to_document());

        sqlx::query("UPDATE addresses SET doc = $2, updated_at = NOW() WHERE id = $1")
            .bind(address_id)
            .bind(&current)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_address(&self, address_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(address_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_years(&self, address_id: &str) -> Result<Vec<YearRecord>, AppError> {
        let rows = sqlx::query_as::<_, YearRecord>(
            "SELECT id, year FROM address_years WHERE address_id = $1 ORDER BY id",
        )
        .bind(address_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_year(&self, address_id: &str, year: &YearRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO address_years (address_id, id, year) VALUES ($1, $2, $3)
            ON CONFLICT (address_id, id) DO UPDATE SET year = EXCLUDED.year
            "#,
        )
        .bind(address_id)
        .bind(&year.id)
        .bind(year.year)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_parent(e, || address_missing(address_id)))?;
        Ok(())
    }

    async fn delete_year(&self, address_id: &str, year_id: &str) -> Result<bool, AppError> {
        // Services and readings go with the year through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM address_years WHERE address_id = $1 AND id = $2")
            .bind(address_id)
            .bind(year_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_service_records(
        &self,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<UtilityServiceRecord>, AppError> {
        let docs = self
            .list_docs(Collection::Services, address_id, year_id)
            .await?;
        Ok(docs
            .iter()
            .map(|(id, doc)| UtilityServiceRecord::from_document(id, doc))
            .collect())
    }

    async fn get_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
    ) -> Result<Option<UtilityServiceRecord>, AppError> {
        let doc = sqlx::query_scalar::<_, Value>(
            "SELECT doc FROM utility_services WHERE address_id = $1 AND year_id = $2 AND id = $3",
        )
        .bind(address_id)
        .bind(year_id)
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc.map(|d| UtilityServiceRecord::from_document(service_id, &d)))
    }

    async fn set_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
        record: &UtilityServiceRecord,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO utility_services (address_id, year_id, id, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (address_id, year_id, id)
            DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(address_id)
        .bind(year_id)
        .bind(service_id)
        .bind(record.to_document())
        .execute(&self.pool)
        .await
        .map_err(|e| missing_parent(e, || year_missing(address_id, year_id)))?;
        Ok(())
    }

    async fn merge_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
        patch: Value,
    ) -> Result<UtilityServiceRecord, AppError> {
        let doc = self
            .merge_doc(
                Collection::Services,
                address_id,
                year_id,
                service_id,
                json!({ "name": service_id }),
                patch,
            )
            .await?;
        Ok(UtilityServiceRecord::from_document(service_id, &doc))
    }

    async fn delete_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
    ) -> Result<bool, AppError> {
        self.delete_doc(Collection::Services, address_id, year_id, service_id)
            .await
    }

    async fn list_reading_records(
        &self,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, AppError> {
        let docs = self
            .list_docs(Collection::Readings, address_id, year_id)
            .await?;
        Ok(docs
            .iter()
            .map(|(id, doc)| MeterReadingRecord::from_document(id, doc))
            .collect())
    }

    async fn merge_reading_record(
        &self,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
        patch: Value,
    ) -> Result<MeterReadingRecord, AppError> {
        let doc = self
            .merge_doc(
                Collection::Readings,
                address_id,
                year_id,
                doc_id,
                json!({}),
                patch,
            )
            .await?;
        Ok(MeterReadingRecord::from_document(doc_id, &doc))
    }

    async fn delete_reading_record(
        &self,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
    ) -> Result<bool, AppError> {
        self.delete_doc(Collection::Readings, address_id, year_id, doc_id)
            .await
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, AppError> {
        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT uid, email, display_name, role, allowed_addresses, created_at
            FROM user_profiles
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT uid, email, display_name, role, allowed_addresses, created_at
            FROM user_profiles
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (uid, email, display_name, role, allowed_addresses, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (uid) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                role = EXCLUDED.role,
                allowed_addresses = EXCLUDED.allowed_addresses
            "#,
        )
        .bind(&profile.uid)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.role)
        .bind(&profile.allowed_addresses)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user_role(&self, uid: &str, role: UserRole) -> Result<UserProfile, AppError> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles SET role = $2 WHERE uid = $1
            RETURNING uid, email, display_name, role, allowed_addresses, created_at
            "#,
        )
        .bind(uid)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_missing(uid))
    }

    async fn update_allowed_addresses(
        &self,
        uid: &str,
        address_ids: &[String],
    ) -> Result<UserProfile, AppError> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles SET allowed_addresses = $2 WHERE uid = $1
            RETURNING uid, email, display_name, role, allowed_addresses, created_at
            "#,
        )
        .bind(uid)
        .bind(address_ids)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_missing(uid))
    }

    async fn update_display_name(
        &self,
        uid: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile, AppError> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles SET display_name = $2 WHERE uid = $1
            RETURNING uid, email, display_name, role, allowed_addresses, created_at
            "#,
        )
        .bind(uid)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_missing(uid))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
