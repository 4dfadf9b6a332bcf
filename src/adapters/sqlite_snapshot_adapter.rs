//! SQLite snapshot adapter.
//!
//! One row in `ledger_state` plus one row per open position. Each save rewrites both tables in a
//! single transaction.

use crate::domain::error::TraderError;
use crate::domain::ledger::Snapshot;
use crate::domain::position::{Position, Side};
use crate::domain::sizing::StreakTracker;
use crate::ports::config_port::ConfigPort;
use crate::ports::snapshot_port::SnapshotPort;
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

pub struct SqliteSnapshotAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: impl std::fmt::Display) -> TraderError {
    TraderError::Database {
        reason: e.to_string(),
    }
}

fn conversion_err(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

impl SqliteSnapshotAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path =
            config
                .get_string("storage", "snapshot_path")
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "storage".into(),
                    key: "snapshot_path".into(),
                })?;
        let pool_size = u32::try_from(config.get_int("storage", "pool_size", 2))
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                TraderError::invalid("storage", "pool_size", "pool_size must be at least 1")
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        let conn = self.pool.get().map_err(db_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ledger_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL,
                balance REAL NOT NULL,
                initial_balance REAL NOT NULL,
                daily_pnl REAL NOT NULL,
                daily_start_balance REAL NOT NULL,
                last_reset_date TEXT NOT NULL,
                cooldown_until TEXT,
                win_streak INTEGER NOT NULL,
                lose_streak INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS positions (
                key TEXT PRIMARY KEY,
                market_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                size REAL NOT NULL,
                shares REAL NOT NULL,
                entry_time TEXT NOT NULL,
                high_water_mark REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL,
                trailing_stop_pct REAL NOT NULL,
                trailing_activation_pct REAL NOT NULL
            );",
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn load_positions(
        conn: &rusqlite::Connection,
    ) -> Result<BTreeMap<String, Position>, TraderError> {
        let mut stmt = conn
            .prepare(
                "SELECT key, market_id, title, category, side, entry_price, size, shares,
                        entry_time, high_water_mark, stop_loss, take_profit,
                        trailing_stop_pct, trailing_activation_pct
                 FROM positions ORDER BY key",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                let side_str: String = row.get(4)?;
                let side = side_str.parse::<Side>().map_err(|e| {
                    conversion_err(4, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })?;
                let time_str: String = row.get(8)?;
                let entry_time = DateTime::parse_from_rfc3339(&time_str)
                    .map_err(|e| conversion_err(8, e))?
                    .with_timezone(&Utc);
                Ok(Position {
                    key: row.get(0)?,
                    market_id: row.get(1)?,
                    title: row.get(2)?,
                    category: row.get(3)?,
                    side,
                    entry_price: row.get(5)?,
                    size: row.get(6)?,
                    shares: row.get(7)?,
                    entry_time,
                    high_water_mark: row.get(9)?,
                    stop_loss: row.get(10)?,
                    take_profit: row.get(11)?,
                    trailing_stop_pct: row.get(12)?,
                    trailing_activation_pct: row.get(13)?,
                })
            })
            .map_err(db_err)?;

        let mut positions = BTreeMap::new();
        for row in rows {
            let position = row.map_err(db_err)?;
            positions.insert(position.key.clone(), position);
        }
        Ok(positions)
    }
}

type StateRow = (u32, f64, f64, f64, f64, String, Option<String>, u32, u32);

impl SnapshotPort for SqliteSnapshotAdapter {
    fn load(&self) -> Result<Option<Snapshot>, TraderError> {
        let conn = self.pool.get().map_err(db_err)?;
        let state: Option<StateRow> = conn
            .query_row(
                "SELECT version, balance, initial_balance, daily_pnl, daily_start_balance,
                        last_reset_date, cooldown_until, win_streak, lose_streak
                 FROM ledger_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let Some((version, balance, initial, daily_pnl, daily_start, reset, cooldown, wins, losses)) =
            state
        else {
            return Ok(None);
        };

        let last_reset_date = NaiveDate::parse_from_str(&reset, "%Y-%m-%d").map_err(db_err)?;
        let cooldown_until = cooldown
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)))
            .transpose()
            .map_err(db_err)?;

        Ok(Some(Snapshot {
            version,
            balance,
            initial_balance: initial,
            daily_pnl,
            daily_start_balance: daily_start,
            last_reset_date,
            cooldown_until,
            streak: StreakTracker { wins, losses },
            positions: Self::load_positions(&conn)?,
        }))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), TraderError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT OR REPLACE INTO ledger_state
                (id, version, balance, initial_balance, daily_pnl, daily_start_balance,
                 last_reset_date, cooldown_until, win_streak, lose_streak)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                snapshot.version,
                snapshot.balance,
                snapshot.initial_balance,
                snapshot.daily_pnl,
                snapshot.daily_start_balance,
                snapshot.last_reset_date.format("%Y-%m-%d").to_string(),
                snapshot.cooldown_until.map(|t| t.to_rfc3339()),
                snapshot.streak.wins,
                snapshot.streak.losses,
            ],
        )
        .map_err(db_err)?;

        tx.execute("DELETE FROM positions", []).map_err(db_err)?;
        for pos in snapshot.positions.values() {
            tx.execute(
                "INSERT INTO positions
                    (key, market_id, title, category, side, entry_price, size, shares,
                     entry_time, high_water_mark, stop_loss, take_profit,
                     trailing_stop_pct, trailing_activation_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    pos.key,
                    pos.market_id,
                    pos.title,
                    pos.category,
                    pos.side.to_string(),
                    pos.entry_price,
                    pos.size,
                    pos.shares,
                    pos.entry_time.to_rfc3339(),
                    pos.high_water_mark,
                    pos.stop_loss,
                    pos.take_profit,
                    pos.trailing_stop_pct,
                    pos.trailing_activation_pct,
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(())
    }
}
