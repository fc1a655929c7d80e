//! Collection CRUD and derived-count maintenance.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_rfc3339, Collection, Store};
use crate::error::{RecallError, Result};

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        file_count: row.get::<_, i64>(3)? as u64,
        chunk_count: row.get::<_, i64>(4)? as u64,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const COLLECTION_COLS: &str =
    "id, name, description, file_count, chunk_count, created_at, updated_at";

impl Store {
    /// Create a new collection. Fails with [`RecallError::Duplicate`] if the
    /// name is already taken.
    pub fn create_collection(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection> {
        if name.is_empty() {
            return Err(RecallError::Input("collection name must not be empty".into()));
        }
        if self.get_collection(name)?.is_some() {
            return Err(RecallError::Duplicate(name.to_string()));
        }

        let now = now_rfc3339();
        let collection = Collection {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            file_count: 0,
            chunk_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO collections (id, name, description, file_count, chunk_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 0, 0, ?4, ?4)",
            params![
                collection.id,
                collection.name,
                collection.description,
                collection.created_at,
            ],
        )?;

        tracing::debug!(name = %collection.name, id = %collection.id, "collection created");
        Ok(collection)
    }

    /// Fetch the collection named `name`, or create it with no description.
    pub fn get_or_create_collection(&mut self, name: &str) -> Result<Collection> {
        if let Some(existing) = self.get_collection(name)? {
            return Ok(existing);
        }
        self.create_collection(name, None)
    }

    pub fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {COLLECTION_COLS} FROM collections WHERE name = ?1"),
                params![name],
                collection_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_collection_by_id(&self, id: &str) -> Result<Option<Collection>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {COLLECTION_COLS} FROM collections WHERE id = ?1"),
                params![id],
                collection_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All collections, name-ordered.
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {COLLECTION_COLS} FROM collections ORDER BY name"))?;
        let rows = stmt
            .query_map([], collection_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete a collection by name, cascading to its chunks. Returns whether
    /// a row was removed.
    pub fn delete_collection(&mut self, name: &str) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;
        let removed = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;
        if removed > 0 {
            tracing::info!(name, "collection deleted");
        }
        Ok(removed > 0)
    }

    /// Recompute `file_count` and `chunk_count` for a collection and bump its
    /// `updated_at`.
    pub fn update_collection_stats(&mut self, collection_id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE collections SET \
                 file_count = (SELECT COUNT(DISTINCT source_file) FROM chunks WHERE collection_id = ?1), \
                 chunk_count = (SELECT COUNT(*) FROM chunks WHERE collection_id = ?1), \
                 updated_at = ?2 \
             WHERE id = ?1",
            params![collection_id, now_rfc3339()],
        )?;
        Ok(())
    }
}
