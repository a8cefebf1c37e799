//! Slug generation behavior.
//!
//! # Responsibility
//! - Derive URL-safe slugs from a configured source column and keep them
//!   unique across the table.
//! - Regenerate only when the source value changed on save.
//!
//! # Invariants
//! - Slugs are lowercase, transliterated, with punctuation and whitespace
//!   collapsed to `-`.
//! - Collisions are disambiguated with numeric suffixes: `base`, `base-2`,
//!   `base-3`, ...
//! - Updates that leave the source untouched keep the stored slug
//!   byte-identical.

use crate::behavior::{BehaviorError, BehaviorResult, ID_COLUMN};
use crate::schema::{column_exists, require_column, require_identifier, require_table, ConfigError};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use slug::slugify;

const DEFAULT_SOURCE_FIELD: &str = "name";
const SLUG_FIELD: &str = "slug";
const TITLE_FALLBACK_FIELD: &str = "title";

/// Validated slug configuration for one table.
#[derive(Debug, Clone)]
pub struct Sluggable {
    table: String,
    source_field: String,
    has_title_fallback: bool,
}

impl Sluggable {
    /// Declares slug generation on `table` sourced from the default `name`
    /// column.
    pub fn declare(conn: &Connection, table: &str) -> Result<Self, ConfigError> {
        Self::declare_from(conn, table, DEFAULT_SOURCE_FIELD)
    }

    /// Declares slug generation on `table` sourced from the given column.
    /// Fails fast when the source column, the `slug` column, or the identity
    /// column is absent.
    pub fn declare_from(
        conn: &Connection,
        table: &str,
        source_field: &str,
    ) -> Result<Self, ConfigError> {
        require_identifier(table)?;
        require_identifier(source_field)?;
        require_table(conn, table)?;
        require_column(conn, table, ID_COLUMN)?;
        require_column(conn, table, source_field)?;
        require_column(conn, table, SLUG_FIELD)?;
        let has_title_fallback = source_field != TITLE_FALLBACK_FIELD
            && column_exists(conn, table, TITLE_FALLBACK_FIELD)?;

        info!(
            "event=behavior_declare module=slug status=ok table={table} source_field={source_field}"
        );

        Ok(Self {
            table: table.to_string(),
            source_field: source_field.to_string(),
            has_title_fallback,
        })
    }

    /// Derives a unique slug for a source value that is not persisted yet.
    /// Used on the create path, before the row's first insert.
    pub fn slug_for(&self, conn: &Connection, source_value: &str) -> BehaviorResult<String> {
        let base = self.base_slug(source_value);
        self.unique_slug(conn, &base, None)
    }

    /// Generates and persists a slug for an existing row from its current
    /// source value, using the fallback chain when the source is unset.
    pub fn assign(&self, conn: &Connection, id: i64) -> BehaviorResult<String> {
        let source = self.resolve_source(conn, id)?;
        let base = self.base_slug(&source);
        let slug = self.unique_slug(conn, &base, Some(id))?;
        self.write_slug(conn, id, &slug)?;
        Ok(slug)
    }

    /// Save-path regeneration: called after the host updated the row.
    ///
    /// `previous_source` is the source value before the update; when the
    /// persisted value still equals it the stored slug is retained untouched
    /// and `None` is returned. Pass `None` to force regeneration.
    pub fn refresh(
        &self,
        conn: &Connection,
        id: i64,
        previous_source: Option<&str>,
    ) -> BehaviorResult<Option<String>> {
        let source = self.resolve_source(conn, id)?;
        if previous_source == Some(source.as_str()) {
            return Ok(None);
        }

        let base = self.base_slug(&source);
        let slug = self.unique_slug(conn, &base, Some(id))?;
        self.write_slug(conn, id, &slug)?;
        Ok(Some(slug))
    }

    /// Resolves the slug source for a persisted row: configured source
    /// column, then a `title` column when the table has one, then a generic
    /// `<table> <id>` representation.
    fn resolve_source(&self, conn: &Connection, id: i64) -> BehaviorResult<String> {
        let value = self.read_text(conn, id, &self.source_field)?;
        if let Some(text) = value.filter(|text| !text.trim().is_empty()) {
            return Ok(text);
        }

        if self.has_title_fallback {
            let title = self.read_text(conn, id, TITLE_FALLBACK_FIELD)?;
            if let Some(text) = title.filter(|text| !text.trim().is_empty()) {
                return Ok(text);
            }
        }

        Ok(format!("{} {id}", self.table))
    }

    fn read_text(
        &self,
        conn: &Connection,
        id: i64,
        column: &str,
    ) -> BehaviorResult<Option<String>> {
        let value: Option<Option<String>> = conn
            .query_row(
                &format!(
                    "SELECT {column} FROM {table} WHERE {ID_COLUMN} = ?1;",
                    table = self.table
                ),
                [id],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(text) => Ok(text),
            None => Err(BehaviorError::NotFound {
                table: self.table.clone(),
                id,
            }),
        }
    }

    fn base_slug(&self, source: &str) -> String {
        let base = slugify(source);
        if base.is_empty() {
            self.table.clone()
        } else {
            base
        }
    }

    /// Appends numeric suffixes until the candidate is unused. `exclude`
    /// skips the row being regenerated so it can keep its own slug.
    fn unique_slug(
        &self,
        conn: &Connection,
        base: &str,
        exclude: Option<i64>,
    ) -> BehaviorResult<String> {
        let mut candidate = base.to_string();
        let mut counter = 2;
        while self.slug_taken(conn, &candidate, exclude)? {
            candidate = format!("{base}-{counter}");
            counter += 1;
        }
        Ok(candidate)
    }

    fn slug_taken(
        &self,
        conn: &Connection,
        candidate: &str,
        exclude: Option<i64>,
    ) -> BehaviorResult<bool> {
        let taken: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(
                    SELECT 1 FROM {table}
                    WHERE {SLUG_FIELD} = ?1 AND (?2 IS NULL OR {ID_COLUMN} <> ?2)
                 );",
                table = self.table
            ),
            params![candidate, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    fn write_slug(&self, conn: &Connection, id: i64, slug: &str) -> BehaviorResult<()> {
        let changed = conn.execute(
            &format!(
                "UPDATE {table} SET {SLUG_FIELD} = ?1 WHERE {ID_COLUMN} = ?2;",
                table = self.table
            ),
            params![slug, id],
        )?;
        if changed == 0 {
            return Err(BehaviorError::NotFound {
                table: self.table.clone(),
                id,
            });
        }
        Ok(())
    }
}
