use super::{Db, IndexError, check_vector, models::*, serialize_vector};
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

/// Row id and established dimension of a collection.
pub(crate) fn lookup(
    conn: &Connection,
    name: &str,
) -> Result<Option<(i64, Option<usize>)>, IndexError> {
    let row = conn
        .query_row(
            "SELECT id, dimensions FROM collections WHERE name = ?",
            params![name],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?)),
        )
        .optional()?;
    Ok(row.map(|(id, dims)| (id, dims.map(|d| d as usize))))
}

fn map_collection_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectionInfo> {
    Ok(CollectionInfo {
        name: row.get(0)?,
        dimensions: row.get::<_, Option<i64>>(1)?.map(|d| d as usize),
        created_at: row.get(2)?,
        count: row.get::<_, i64>(3)? as usize,
    })
}

const COLLECTION_INFO_SQL: &str = r#"
    SELECT c.name, c.dimensions, c.created_at,
           (SELECT COUNT(*) FROM entries e WHERE e.collection_id = c.id)
    FROM collections c
"#;

impl Db {
    /// Create an empty collection. Fails if the name is taken.
    pub fn create_collection(&mut self, name: &str) -> Result<CollectionInfo, IndexError> {
        let tx = self.conn.transaction()?;
        if lookup(&tx, name)?.is_some() {
            return Err(IndexError::CollectionExists(name.to_string()));
        }
        let created_at = Utc::now();
        tx.execute(
            "INSERT INTO collections (name, dimensions, created_at) VALUES (?, NULL, ?)",
            params![name, created_at],
        )?;
        tx.commit()?;

        Ok(CollectionInfo {
            name: name.to_string(),
            dimensions: None,
            count: 0,
            created_at,
        })
    }

    /// Delete a collection and all its entries. Returns `false` if there was
    /// nothing to delete.
    pub fn delete_collection(&self, name: &str) -> Result<bool, IndexError> {
        let rows = self
            .conn
            .execute("DELETE FROM collections WHERE name = ?", params![name])?;
        Ok(rows > 0)
    }

    pub fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(lookup(&self.conn, name)?.is_some())
    }

    pub fn get_collection(&self, name: &str) -> Result<CollectionInfo, IndexError> {
        self.conn
            .query_row(
                &format!("{COLLECTION_INFO_SQL} WHERE c.name = ?"),
                params![name],
                map_collection_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COLLECTION_INFO_SQL} ORDER BY c.name"))?;
        let rows = stmt.query_map([], map_collection_row)?;

        let mut collections = Vec::new();
        for row in rows {
            collections.push(row?);
        }
        Ok(collections)
    }

    pub fn count(&self, name: &str) -> Result<usize, IndexError> {
        Ok(self.get_collection(name)?.count)
    }

    /// Append tuples to a collection in one transaction: either every tuple is
    /// stored or none is.
    ///
    /// The first non-empty `add` fixes the collection's dimension; every later
    /// vector must match it.
    pub fn add(
        &mut self,
        name: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> Result<(), IndexError> {
        if ids.len() != vectors.len()
            || ids.len() != documents.len()
            || ids.len() != metadatas.len()
        {
            return Err(IndexError::LengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
                documents: documents.len(),
                metadatas: metadatas.len(),
            });
        }

        let tx = self.conn.transaction()?;
        let (collection_id, established) =
            lookup(&tx, name)?.ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let expected = established.unwrap_or(first.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected || v.is_empty()) {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        for vector in vectors {
            check_vector(vector)?;
        }

        if established.is_none() {
            tx.execute(
                "UPDATE collections SET dimensions = ? WHERE id = ?",
                params![expected as i64, collection_id],
            )?;
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (collection_id, entry_id, document, metadata, embedding) VALUES (?, ?, ?, ?, ?)",
            )?;
            for (i, id) in ids.iter().enumerate() {
                let metadata = serde_json::to_string(&metadatas[i])?;
                let result = stmt.execute(params![
                    collection_id,
                    id,
                    documents[i],
                    metadata,
                    serialize_vector(&vectors[i]),
                ]);
                match result {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        return Err(IndexError::DuplicateId(id.clone()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Atomically make `staging` the collection known as `target`, dropping
    /// whatever `target` held before. Readers see either the old or the new
    /// collection, never a missing one.
    pub fn replace_collection(&mut self, staging: &str, target: &str) -> Result<(), IndexError> {
        let tx = self.conn.transaction()?;
        if lookup(&tx, staging)?.is_none() {
            return Err(IndexError::CollectionNotFound(staging.to_string()));
        }
        tx.execute("DELETE FROM collections WHERE name = ?", params![target])?;
        tx.execute(
            "UPDATE collections SET name = ? WHERE name = ?",
            params![target, staging],
        )?;
        tx.commit()?;
        Ok(())
    }
}
