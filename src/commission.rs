use crate::api::*;
use crate::db::{cents, get_amount, get_decimal, get_parsed, get_time, now, timestamp};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Row, SqliteConnection};

fn commission_from_row(row: &SqliteRow) -> Result<Commission> {
    Ok(Commission {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        user_id: row.try_get("user_id")?,
        wager_id: row.try_get("wager_id")?,
        amount: get_amount(row, "amount")?,
        percent: get_decimal(row, "percent")?,
        status: get_parsed(row, "status")?,
        created_at: get_time(row, "created_at")?,
    })
}

pub async fn record(
    conn: &mut SqliteConnection,
    wager: &Wager,
    user: RowId,
    amount: Amount,
    rate: Decimal,
) -> Result<RowId> {
    let percent = (rate * Decimal::ONE_HUNDRED).normalize();
    let id = query(
        "INSERT INTO commissions (match_id, user_id, wager_id, amount, percent, status, created_at) \
        VALUES (?,?,?,?,?,'pending',?)",
    )
    .bind(&wager.match_id)
    .bind(user)
    .bind(wager.id)
    .bind(cents(amount)?)
    .bind(percent.to_string())
    .bind(now().timestamp())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't record commission for wager {}", wager.id))?
    .last_insert_rowid();
    Ok(id)
}
pub async fn summary(conn: &mut SqliteConnection) -> Result<CommissionSummary> {
    let row = query("SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count FROM commissions")
        .fetch_one(&mut *conn)
        .await
        .context("couldn't summarize commissions")?;
    Ok(CommissionSummary {
        total_commission: get_amount(&row, "total")?,
        count: row.try_get("count")?,
    })
}
pub async fn for_match(conn: &mut SqliteConnection, match_id: &str) -> Result<Vec<Commission>> {
    let rows = query("SELECT * FROM commissions WHERE match_id = ? ORDER BY id")
        .bind(match_id)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("couldn't list commissions of match {}", match_id))?;
    rows.iter().map(commission_from_row).collect()
}
pub async fn report(conn: &mut SqliteConnection) -> Result<Vec<CommissionReportRow>> {
    let rows = query(
        "SELECT match_id, SUM(amount) AS total, COUNT(*) AS count, MAX(created_at) AS last_at \
        FROM commissions GROUP BY match_id ORDER BY last_at DESC, match_id",
    )
    .fetch_all(&mut *conn)
    .await
    .context("couldn't build commission report")?;
    rows.iter()
        .map(|row| {
            Ok(CommissionReportRow {
                match_id: row.try_get("match_id")?,
                total_commission: get_amount(row, "total")?,
                count: row.try_get("count")?,
                last_at: timestamp(row.try_get("last_at")?)?,
            })
        })
        .collect()
}
pub async fn mark_credited(conn: &mut SqliteConnection, match_id: &str) -> Result<u64> {
    let result = query(
        "UPDATE commissions SET status = 'credited' WHERE match_id = ? AND status = 'pending'",
    )
    .bind(match_id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't credit commissions of match {}", match_id))?;
    Ok(result.rows_affected())
}
