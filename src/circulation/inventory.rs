//! Inventory accessor
//!
//! The only mutation path for a book's available-copy count. Both helpers
//! write through the version gate carried on the book that was read in the
//! calling transaction, so a concurrent edit of the same record surfaces as
//! a conflict instead of a lost update.

use tracing::warn;

use crate::{error::AppResult, models::Book, store::StoreTx};

/// Withdraw one available copy for a new loan.
pub async fn withdraw_copy(tx: &mut dyn StoreTx, book: &Book) -> AppResult<()> {
    tx.update_book_availability(book.id, book.version, book.available_copies - 1)
        .await
}

/// Restore one available copy for a returned loan.
///
/// The count is not clamped: when the total was edited downward while the
/// loan was out, the restored count may exceed it. That is logged as a data
/// integrity warning rather than failing the return.
pub async fn restore_copy(tx: &mut dyn StoreTx, book: &Book) -> AppResult<()> {
    let restored = book.available_copies + 1;
    if restored > book.total_copies {
        warn!(
            book_id = %book.id,
            available_copies = restored,
            total_copies = book.total_copies,
            "available copies exceed total after return"
        );
    }
    tx.update_book_availability(book.id, book.version, restored)
        .await
}
