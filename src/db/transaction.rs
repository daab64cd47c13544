//! Atomic application of position plans.
//!
//! Every reordering mutation reads the affected siblings, plans the new
//! positions with the shared ordering engine and writes the plan back, all
//! inside one `BEGIN IMMEDIATE` transaction. A failing statement rolls the
//! whole unit back and the original error reaches the caller.

use chrono::NaiveDateTime;
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl, SqliteConnection};
use ordering::PositionChange;
use tracing::debug;

use crate::db::schema::{board_columns, issues};
use crate::errors::ServiceError;

pub fn atomically<T, F>(conn: &mut SqliteConnection, operation: F) -> Result<T, ServiceError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, ServiceError>,
{
    conn.immediate_transaction(operation)
}

pub fn write_issue_positions(
    conn: &mut SqliteConnection,
    changes: &[PositionChange<String, String>],
    now: NaiveDateTime,
) -> Result<(), ServiceError> {
    debug!(changes = changes.len(), "writing issue positions");
    for change in changes {
        let updated = diesel::update(issues::table.find(&change.id))
            .set((
                issues::column_id.eq(change.parent.clone()),
                issues::position.eq(change.position),
                issues::updated_at.eq(now),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(ServiceError::NotFound("Issue"));
        }
    }
    Ok(())
}

/// Columns never leave their board, so only positions are written.
pub fn write_column_positions(
    conn: &mut SqliteConnection,
    changes: &[PositionChange<String, String>],
    now: NaiveDateTime,
) -> Result<(), ServiceError> {
    debug!(changes = changes.len(), "writing column positions");
    for change in changes {
        let updated = diesel::update(board_columns::table.find(&change.id))
            .set((
                board_columns::position.eq(change.position),
                board_columns::updated_at.eq(now),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(ServiceError::NotFound("Column"));
        }
    }
    Ok(())
}
