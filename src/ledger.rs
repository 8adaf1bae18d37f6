use crate::api::*;
use crate::db::{cents, get_amount, get_parsed, get_time, now};
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Row, SqliteConnection};

pub const HISTORY_LIMIT: u32 = 50;

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        balance: get_amount(row, "balance")?,
        role: get_parsed(row, "role")?,
    })
}
pub async fn create_account(
    conn: &mut SqliteConnection,
    name: &str,
    role: UserRole,
    balance: Amount,
) -> Result<RowId> {
    let id = query("INSERT INTO accounts (name, balance, role, created_at) VALUES (?,?,?,?)")
        .bind(name)
        .bind(cents(balance)?)
        .bind(role.to_string())
        .bind(now().timestamp())
        .execute(&mut *conn)
        .await
        .with_context(|| format!("couldn't create account {}", name))?
        .last_insert_rowid();
    Ok(id)
}
pub async fn get_account(conn: &mut SqliteConnection, id: RowId) -> Result<Option<Account>> {
    let row = query("SELECT * FROM accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("couldn't get account {}", id))?;
    row.as_ref().map(account_from_row).transpose()
}
pub async fn get_account_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Account>> {
    let row = query("SELECT * FROM accounts WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("couldn't get account {}", name))?;
    row.as_ref().map(account_from_row).transpose()
}
pub async fn set_role(conn: &mut SqliteConnection, id: RowId, role: UserRole) -> Result<()> {
    query("UPDATE accounts SET role = ? WHERE id = ?")
        .bind(role.to_string())
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("couldn't update role of account {}", id))?;
    Ok(())
}

/// Takes `amount` from the account in a single guarded statement.
///
/// Returns false, leaving the balance untouched, if the account can't cover it.
pub async fn debit(conn: &mut SqliteConnection, user: RowId, amount: Amount) -> Result<bool> {
    let amount = cents(amount)?;
    let result = query("UPDATE accounts SET balance = balance - ? WHERE id = ? AND balance >= ?")
        .bind(amount)
        .bind(user)
        .bind(amount)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("couldn't debit account {}", user))?;
    Ok(result.rows_affected() == 1)
}
pub async fn credit(conn: &mut SqliteConnection, user: RowId, amount: Amount) -> Result<()> {
    let result = query("UPDATE accounts SET balance = balance + ? WHERE id = ?")
        .bind(cents(amount)?)
        .bind(user)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("couldn't credit account {}", user))?;
    if result.rows_affected() != 1 {
        bail!("account {} doesn't exist", user)
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: RowId,
    pub amount: Amount,
    pub direction: TxDirection,
    pub method: TxMethod,
    pub status: TxStatus,
    pub note: String,
    pub meta: Value,
}
impl NewTransaction {
    pub fn for_wager(
        user_id: RowId,
        amount: Amount,
        direction: TxDirection,
        method: TxMethod,
        wager: RowId,
        note: String,
    ) -> Self {
        Self {
            user_id,
            amount,
            direction,
            method,
            status: TxStatus::Success,
            note,
            meta: json!({ "wager_id": wager }),
        }
    }
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    let meta: String = row.try_get("meta")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: get_amount(row, "amount")?,
        direction: get_parsed(row, "direction")?,
        method: get_parsed(row, "method")?,
        status: get_parsed(row, "status")?,
        note: row.try_get("note")?,
        meta: serde_json::from_str(&meta).context("invalid transaction metadata")?,
        created_at: get_time(row, "created_at")?,
    })
}
pub async fn append_transaction(
    conn: &mut SqliteConnection,
    transaction: &NewTransaction,
) -> Result<RowId> {
    let id = query(
        "INSERT INTO transactions (\
        user_id, amount, direction, method, status, note, meta, created_at)\
        VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(transaction.user_id)
    .bind(cents(transaction.amount)?)
    .bind(transaction.direction.to_string())
    .bind(transaction.method.to_string())
    .bind(transaction.status.to_string())
    .bind(&transaction.note)
    .bind(transaction.meta.to_string())
    .bind(now().timestamp())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't record transaction for {}", transaction.user_id))?
    .last_insert_rowid();
    Ok(id)
}
pub async fn get_transaction(conn: &mut SqliteConnection, id: RowId) -> Result<Option<Transaction>> {
    let row = query("SELECT * FROM transactions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("couldn't get transaction {}", id))?;
    row.as_ref().map(transaction_from_row).transpose()
}
/// Moves a pending transaction to its final status. Returns false if it wasn't pending.
pub async fn finalize_transaction(
    conn: &mut SqliteConnection,
    id: RowId,
    status: TxStatus,
) -> Result<bool> {
    let result = query("UPDATE transactions SET status = ? WHERE id = ? AND status = 'pending'")
        .bind(status.to_string())
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("couldn't update transaction {}", id))?;
    Ok(result.rows_affected() == 1)
}
pub async fn user_transactions(
    conn: &mut SqliteConnection,
    user: RowId,
    limit: u32,
) -> Result<Vec<Transaction>> {
    let rows = query(
        "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
    .with_context(|| format!("couldn't list transactions of {}", user))?;
    rows.iter().map(transaction_from_row).collect()
}
pub async fn pending_transactions(conn: &mut SqliteConnection, limit: u32) -> Result<Vec<Transaction>> {
    let rows = query(
        "SELECT * FROM transactions WHERE status = 'pending' ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
    .context("couldn't list pending transactions")?;
    rows.iter().map(transaction_from_row).collect()
}
pub async fn wager_transactions(conn: &mut SqliteConnection, wager: RowId) -> Result<Vec<Transaction>> {
    let rows = query("SELECT * FROM transactions WHERE json_extract(meta, '$.wager_id') = ? ORDER BY id")
        .bind(wager)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("couldn't list transactions of wager {}", wager))?;
    rows.iter().map(transaction_from_row).collect()
}
