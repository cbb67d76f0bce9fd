//! Yearly document numbering (`WM-2025-0001`, `CT-2025-0001`).
//!
//! Numbers come from a per-scope, per-year counter row that is incremented in
//! the caller's transaction. The row write lock serializes concurrent callers
//! on Postgres; SQLite serializes all writers.

use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::{debug, error, instrument};

use crate::entities::document_sequence::{self, Column, Entity as DocumentSequence};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentScope {
    Order,
    Contract,
}

impl DocumentScope {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentScope::Order => "order",
            DocumentScope::Contract => "contract",
        }
    }
}

/// Reserves the next value for `scope` in `year`. Runs inside the caller's
/// transaction, so a rollback also releases the number.
#[instrument(skip(conn), fields(scope = scope.as_str()))]
pub async fn next_number<C>(conn: &C, scope: DocumentScope, year: i32) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    let seed = document_sequence::ActiveModel {
        scope: Set(scope.as_str().to_string()),
        year: Set(year),
        last_value: Set(0),
    };

    DocumentSequence::insert(seed)
        .on_conflict(
            OnConflict::columns([Column::Scope, Column::Year])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map(|_| ())
        .or_else(|e| match e {
            // Row already exists for this scope and year.
            DbErr::RecordNotInserted => Ok(()),
            other => Err(other),
        })
        .map_err(|e| {
            error!("Failed to seed document sequence: {}", e);
            ServiceError::DatabaseError(e)
        })?;

    DocumentSequence::update_many()
        .col_expr(Column::LastValue, Expr::col(Column::LastValue).add(1))
        .filter(Column::Scope.eq(scope.as_str()))
        .filter(Column::Year.eq(year))
        .exec(conn)
        .await
        .map_err(|e| {
            error!("Failed to advance document sequence: {}", e);
            ServiceError::DatabaseError(e)
        })?;

    let row = DocumentSequence::find_by_id((scope.as_str().to_string(), year))
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Document sequence {}/{} missing after increment",
                scope.as_str(),
                year
            ))
        })?;

    debug!(value = row.last_value, "Reserved document number");
    Ok(row.last_value)
}

/// `{prefix}-{year}-{seq:04}`; sequences past 9999 simply grow wider.
pub fn format_document_number(prefix: &str, year: i32, seq: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection, run_migrations};
    use sea_orm::TransactionTrait;

    #[test]
    fn formats_with_zero_padding() {
        assert_eq!(format_document_number("WM", 2025, 7), "WM-2025-0007");
        assert_eq!(format_document_number("CT", 2024, 1234), "CT-2024-1234");
        assert_eq!(format_document_number("WM", 2025, 12345), "WM-2025-12345");
    }

    #[tokio::test]
    async fn sequences_increment_per_scope_and_year() {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();

        assert_eq!(next_number(&db, DocumentScope::Order, 2025).await.unwrap(), 1);
        assert_eq!(next_number(&db, DocumentScope::Order, 2025).await.unwrap(), 2);
        assert_eq!(next_number(&db, DocumentScope::Contract, 2025).await.unwrap(), 1);
        assert_eq!(next_number(&db, DocumentScope::Order, 2026).await.unwrap(), 1);
        assert_eq!(next_number(&db, DocumentScope::Order, 2025).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rolled_back_reservation_is_reused() {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();

        let txn = db.begin().await.unwrap();
        assert_eq!(next_number(&txn, DocumentScope::Order, 2025).await.unwrap(), 1);
        txn.rollback().await.unwrap();

        assert_eq!(next_number(&db, DocumentScope::Order, 2025).await.unwrap(), 1);
    }
}
