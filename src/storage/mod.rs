//! SQLite persistence for entities, light state history and the pixel buffer.
//!
//! Three tables back the controller:
//! - `entity`: the hierarchy (id, name, address range, parent link)
//! - `light_state`: append-only history, newest row per entity wins
//! - `address`: last rendered state of every pixel, keyed by index
//!
//! The store is strongly consistent for a single process: every call runs on
//! one connection behind a mutex.

use crate::entity::{Entity, EntityDraft, EntityId};
use crate::render::PixelState;
use crate::state::LightState;
use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Mutex, MutexGuard};

/// Persists entity, history and pixel records in SQLite.
pub struct LightStore {
    conn: Mutex<Connection>,
}

impl LightStore {
    /// Opens (or creates) the SQLite database and ensures the tables exist.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open light DB at {}", db_path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    /// Private database that lives as long as the store (tests, dry runs).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("light DB connection lock poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entity (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL,
                start_addr INTEGER NOT NULL,
                end_addr   INTEGER NOT NULL,
                parent_id  INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_entity_parent ON entity(parent_id);

            CREATE TABLE IF NOT EXISTS light_state (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id  INTEGER NOT NULL,
                is_on      INTEGER NOT NULL,
                red        INTEGER NOT NULL,
                green      INTEGER NOT NULL,
                blue       INTEGER NOT NULL,
                brightness INTEGER NOT NULL,
                timestamp  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_light_state_entity
                ON light_state(entity_id, timestamp);

            CREATE TABLE IF NOT EXISTS address (
                id         INTEGER PRIMARY KEY,
                red        INTEGER NOT NULL,
                green      INTEGER NOT NULL,
                blue       INTEGER NOT NULL,
                brightness INTEGER NOT NULL
            );",
        )
        .context("Failed to create light tables")?;
        Ok(())
    }

    /// Inserts a new entity and returns the id assigned by SQLite.
    pub fn insert_entity(&self, draft: &EntityDraft) -> Result<EntityId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entity (name, start_addr, end_addr, parent_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.name,
                draft.start_addr as i64,
                draft.end_addr as i64,
                draft.parent_id
            ],
        )
        .context("Failed to insert entity")?;
        Ok(conn.last_insert_rowid())
    }

    /// Inserts or replaces an entity under its existing id.
    pub fn save_entity(&self, entity: &Entity) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entity (id, name, start_addr, end_addr, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                start_addr = excluded.start_addr,
                end_addr = excluded.end_addr,
                parent_id = excluded.parent_id",
            params![
                entity.id,
                entity.name,
                entity.start_addr as i64,
                entity.end_addr as i64,
                entity.parent_id
            ],
        )
        .with_context(|| format!("Failed to save entity {}", entity.id))?;
        Ok(())
    }

    pub fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, start_addr, end_addr, parent_id FROM entity WHERE id = ?1",
            params![id],
            entity_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to load entity {}", id))
    }

    /// Returns all entities ordered by id.
    pub fn list_entities(&self) -> Result<Vec<Entity>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, start_addr, end_addr, parent_id FROM entity ORDER BY id")
            .context("Failed to prepare entity query")?;
        let entities = stmt
            .query_map([], entity_from_row)
            .context("Failed to query entities")?
            .collect::<rusqlite::Result<Vec<Entity>>>()
            .context("Failed to read entities")?;
        Ok(entities)
    }

    /// Deletes an entity together with its history and detaches its
    /// children. Returns false when no such entity exists.
    pub fn delete_entity(&self, id: EntityId) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin delete")?;

        tx.execute(
            "UPDATE entity SET parent_id = NULL WHERE parent_id = ?1 AND id != ?1",
            params![id],
        )
        .context("Failed to detach children")?;
        tx.execute("DELETE FROM light_state WHERE entity_id = ?1", params![id])
            .context("Failed to delete light state history")?;
        let rows = tx
            .execute("DELETE FROM entity WHERE id = ?1", params![id])
            .context("Failed to delete entity")?;

        tx.commit().context("Failed to commit delete")?;
        Ok(rows > 0)
    }

    pub fn append_light_state(&self, state: &LightState) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO light_state (entity_id, is_on, red, green, blue, brightness, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                state.entity_id,
                state.is_on,
                state.red,
                state.green,
                state.blue,
                state.brightness,
                state.timestamp.timestamp_millis()
            ],
        )
        .with_context(|| format!("Failed to append light state for entity {}", state.entity_id))?;
        Ok(())
    }

    /// Most recent light state; ties on timestamp go to the later insert.
    pub fn latest_light_state(&self, entity_id: EntityId) -> Result<Option<LightState>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT entity_id, is_on, red, green, blue, brightness, timestamp
                 FROM light_state WHERE entity_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![entity_id],
                |row| {
                    Ok((
                        LightState {
                            entity_id: row.get(0)?,
                            is_on: row.get(1)?,
                            red: row.get(2)?,
                            green: row.get(3)?,
                            blue: row.get(4)?,
                            brightness: row.get(5)?,
                            timestamp: Default::default(),
                        },
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("Failed to load light state for entity {}", entity_id))?;

        row.map(|(mut state, millis)| {
            state.timestamp = DateTime::from_timestamp_millis(millis)
                .with_context(|| format!("Invalid light state timestamp {}", millis))?;
            Ok(state)
        })
        .transpose()
    }

    /// Number of history rows recorded for an entity.
    pub fn history_len(&self, entity_id: EntityId) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM light_state WHERE entity_id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
            .context("Failed to count light states")?;
        Ok(count as usize)
    }

    pub fn get_pixel(&self, index: usize) -> Result<Option<PixelState>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT red, green, blue, brightness FROM address WHERE id = ?1",
            params![index as i64],
            pixel_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to load pixel {}", index))
    }

    /// Loads `strip_length` pixels; indices without a row are all-zero and
    /// rows beyond the strip are ignored.
    pub fn load_pixels(&self, strip_length: usize) -> Result<Vec<PixelState>> {
        let mut pixels = vec![PixelState::OFF; strip_length];

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, red, green, blue, brightness FROM address WHERE id < ?1")
            .context("Failed to prepare pixel query")?;
        let rows = stmt
            .query_map(params![strip_length as i64], |row| {
                let index: i64 = row.get(0)?;
                Ok((index, pixel_from_offset(row, 1)?))
            })
            .context("Failed to query pixels")?;

        for row in rows {
            let (index, pixel) = row.context("Failed to read pixel")?;
            if let Some(slot) = usize::try_from(index).ok().and_then(|i| pixels.get_mut(i)) {
                *slot = pixel;
            }
        }

        Ok(pixels)
    }

    /// Upserts every pixel by index in a single transaction.
    pub fn upsert_pixels(&self, pixels: &[PixelState]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin pixel upsert")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO address (id, red, green, blue, brightness)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        red = excluded.red,
                        green = excluded.green,
                        blue = excluded.blue,
                        brightness = excluded.brightness",
                )
                .context("Failed to prepare pixel upsert")?;
            for (index, pixel) in pixels.iter().enumerate() {
                stmt.execute(params![
                    index as i64,
                    pixel.red,
                    pixel.green,
                    pixel.blue,
                    pixel.brightness
                ])
                .with_context(|| format!("Failed to upsert pixel {}", index))?;
            }
        }
        tx.commit().context("Failed to commit pixel upsert")?;
        Ok(())
    }
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        name: row.get(1)?,
        start_addr: row.get(2)?,
        end_addr: row.get(3)?,
        parent_id: row.get(4)?,
    })
}

fn pixel_from_row(row: &Row<'_>) -> rusqlite::Result<PixelState> {
    pixel_from_offset(row, 0)
}

fn pixel_from_offset(row: &Row<'_>, offset: usize) -> rusqlite::Result<PixelState> {
    Ok(PixelState {
        red: row.get(offset)?,
        green: row.get(offset + 1)?,
        blue: row.get(offset + 2)?,
        brightness: row.get(offset + 3)?,
    })
}
