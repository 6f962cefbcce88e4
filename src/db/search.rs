use super::collections::lookup;
use super::{Db, IndexError, check_vector, models::*, serialize_vector};
use rusqlite::params;

fn map_match_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, f64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl Db {
    /// Return the `k` entries nearest to `query_vector` by cosine distance,
    /// closest first. Equal distances keep insertion order. Returns fewer than
    /// `k` entries when the collection is smaller.
    pub fn query(
        &self,
        name: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let (collection_id, dimensions) = lookup(&self.conn, name)?
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        let Some(expected) = dimensions else {
            // Nothing has been added yet
            return Ok(Vec::new());
        };
        if query_vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }
        check_vector(query_vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                e.entry_id,
                e.document,
                e.metadata,
                vec_distance_cosine(e.embedding, ?) AS distance
            FROM entries e
            WHERE e.collection_id = ?
            ORDER BY distance ASC, e.id ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(
            params![serialize_vector(query_vector), collection_id, k as i64],
            map_match_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            let (id, document, metadata, distance) = row?;
            results.push(QueryMatch {
                id,
                document,
                metadata: serde_json::from_str(&metadata)?,
                distance,
            });
        }

        Ok(results)
    }
}
