//! `PostgreSQL` implementation of `ActionBoardRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prioritize_core::error::DomainError;
use prioritize_core::event::Event;
use prioritize_core::listener::{Destination, DestinationCategory};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::aggregates::{ActionBoard, ActionBoardEntry};
use crate::domain::repository::ActionBoardRepository;

const BOARD_COLUMNS: &str = "board_id, name, description, owner_category, owner_id";

const ENTRY_COLUMNS: &str = "entry_id, board_id, title, message, source, posted_at";

const UNIQUE_VIOLATION: &str = "23505";

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

fn name_conflict(err: sqlx::Error, name: &str) -> DomainError {
    let unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if unique {
        DomainError::Validation(format!("action board name already in use: {name}"))
    } else {
        infrastructure(err)
    }
}

fn board_from_row(row: &PgRow) -> Result<ActionBoard, DomainError> {
    let category: Option<String> = row.try_get("owner_category").map_err(infrastructure)?;
    let owner_id: Option<i64> = row.try_get("owner_id").map_err(infrastructure)?;
    let owner = match (category, owner_id) {
        (Some(category), Some(id)) => Some(Destination::new(
            category.parse::<DestinationCategory>()?,
            id,
        )),
        _ => None,
    };
    Ok(ActionBoard::new(
        row.try_get("board_id").map_err(infrastructure)?,
        row.try_get::<String, _>("name").map_err(infrastructure)?,
        row.try_get::<String, _>("description")
            .map_err(infrastructure)?,
        owner,
    ))
}

fn entry_from_row(row: &PgRow) -> Result<ActionBoardEntry, DomainError> {
    let source: Option<Json<Event>> = row.try_get("source").map_err(infrastructure)?;
    let posted_at: DateTime<Utc> = row.try_get("posted_at").map_err(infrastructure)?;
    Ok(ActionBoardEntry {
        id: row.try_get("entry_id").map_err(infrastructure)?,
        board_id: row.try_get("board_id").map_err(infrastructure)?,
        title: row.try_get("title").map_err(infrastructure)?,
        message: row.try_get("message").map_err(infrastructure)?,
        source: source.map(|Json(event)| event),
        posted_at,
    })
}

/// PostgreSQL-backed action board repository.
#[derive(Debug, Clone)]
pub struct PgActionBoardRepository {
    pool: PgPool,
}

impl PgActionBoardRepository {
    /// Creates a new `PgActionBoardRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_entries(&self, row: Option<PgRow>) -> Result<Option<ActionBoard>, DomainError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut board = board_from_row(&row)?;
        let entries = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM action_board_entries \
             WHERE board_id = $1 ORDER BY posted_at, entry_id"
        ))
        .bind(board.id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        board.entries = entries
            .iter()
            .map(entry_from_row)
            .collect::<Result<_, _>>()?;
        Ok(Some(board))
    }
}

#[async_trait]
impl ActionBoardRepository for PgActionBoardRepository {
    async fn create_board(
        &self,
        name: &str,
        description: &str,
        owner: Option<Destination>,
    ) -> Result<ActionBoard, DomainError> {
        let row = sqlx::query(&format!(
            "INSERT INTO action_boards (name, description, owner_category, owner_id) \
             VALUES ($1, $2, $3, $4) RETURNING {BOARD_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(owner.map(|o| o.category.as_str()))
        .bind(owner.map(|o| o.id))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| name_conflict(e, name))?;
        board_from_row(&row)
    }

    async fn find_board_by_id(&self, board_id: i64) -> Result<Option<ActionBoard>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {BOARD_COLUMNS} FROM action_boards WHERE board_id = $1"
        ))
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        self.with_entries(row).await
    }

    async fn find_board_by_name(&self, name: &str) -> Result<Option<ActionBoard>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {BOARD_COLUMNS} FROM action_boards WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        self.with_entries(row).await
    }

    async fn find_board_by_owner(
        &self,
        owner: Destination,
    ) -> Result<Option<ActionBoard>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {BOARD_COLUMNS} FROM action_boards \
             WHERE owner_category = $1 AND owner_id = $2 ORDER BY board_id LIMIT 1"
        ))
        .bind(owner.category.as_str())
        .bind(owner.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        self.with_entries(row).await
    }

    async fn update_board(&self, board: &ActionBoard) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE action_boards SET name = $2, description = $3, owner_category = $4, \
             owner_id = $5 WHERE board_id = $1",
        )
        .bind(board.id)
        .bind(board.name.as_str())
        .bind(board.description.as_str())
        .bind(board.owner.map(|o| o.category.as_str()))
        .bind(board.owner.map(|o| o.id))
        .execute(&self.pool)
        .await
        .map_err(|e| name_conflict(e, &board.name))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::ActionBoardNotFound(board.id));
        }
        Ok(())
    }

    async fn remove_board(&self, board_id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM action_boards WHERE board_id = $1")
            .bind(board_id)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_entry(&self, entry: &ActionBoardEntry) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO action_board_entries (entry_id, board_id, title, message, source, posted_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.board_id)
        .bind(entry.title.as_str())
        .bind(entry.message.as_str())
        .bind(entry.source.as_ref().map(Json))
        .bind(entry.posted_at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<ActionBoardEntry>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM action_board_entries WHERE entry_id = $1"
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn remove_entry(&self, entry_id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM action_board_entries WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected() > 0)
    }
}
