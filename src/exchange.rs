use crate::api::*;
use crate::commission;
use crate::db::{self, now, SQLite};
use crate::error::{invalid_argument, invalid_state, not_found, ExchangeError, ExchangeResult};
use crate::ledger::{self, NewTransaction, HISTORY_LIMIT};
use crate::notifier::{Event, MatchSettled, Notifier};
use crate::settings::Settings;
use crate::stake;
use anyhow::Context;
use chrono::Duration;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::SqliteConnection;

pub const SYSTEM_AUTO: &str = "system-auto";

pub struct Exchange {
    db: SQLite,
    notifier: Box<dyn Notifier + Send + Sync>,
    commission_rate: Decimal,
    accept_window: Duration,
}

fn validate_amount(amount: Amount, what: &str) -> ExchangeResult<()> {
    if amount <= Decimal::ZERO {
        return Err(invalid_argument!("{} must be positive, got {}", what, amount));
    }
    if !stake::is_cent_precise(amount) {
        return Err(invalid_argument!("{} has more than two decimals: {}", what, amount));
    }
    if amount > stake::MAX_AMOUNT {
        return Err(invalid_argument!(
            "{} can't exceed {}, got {}",
            what,
            stake::MAX_AMOUNT,
            amount
        ));
    }
    Ok(())
}
fn validate_odds(odds: Odds) -> ExchangeResult<()> {
    if odds <= Decimal::ONE {
        return Err(invalid_argument!("odds must be greater than 1, got {}", odds));
    }
    if odds > stake::MAX_ODDS {
        return Err(invalid_argument!(
            "odds can't exceed {}, got {}",
            stake::MAX_ODDS,
            odds
        ));
    }
    Ok(())
}
fn potential_win(stake: Amount, odds: Odds) -> ExchangeResult<Amount> {
    stake::potential_win(stake, odds)
        .ok_or_else(|| invalid_argument!("{} at {} is out of range", stake, odds))
}
async fn fetch_account(conn: &mut SqliteConnection, id: RowId) -> ExchangeResult<Account> {
    ledger::get_account(conn, id)
        .await?
        .ok_or_else(|| not_found!("account {}", id))
}
async fn fetch_wager(conn: &mut SqliteConnection, id: RowId) -> ExchangeResult<Wager> {
    db::get_wager(conn, id)
        .await?
        .ok_or_else(|| not_found!("wager {}", id))
}
async fn fetch_match(conn: &mut SqliteConnection, id: &str) -> ExchangeResult<Match> {
    db::get_match(conn, id)
        .await?
        .ok_or_else(|| not_found!("match {}", id))
}
/// Fetches the match, creating it from the latest odds quote the first time it is bet on.
async fn resolve_match(conn: &mut SqliteConnection, id: &str) -> ExchangeResult<Match> {
    if let Some(game) = db::get_match(conn, id).await? {
        return Ok(game);
    }
    let quote = db::get_odds(conn, id)
        .await?
        .ok_or_else(|| not_found!("no odds known for match {}", id))?;
    let game = Match {
        id: quote.match_id,
        sport: quote.sport,
        team_a: quote.team_a,
        team_b: quote.team_b,
        odds_a: quote.odds_a,
        odds_b: quote.odds_b,
        status: quote.status,
        winner: quote.winner,
        settled: false,
    };
    db::insert_match(conn, &game).await?;
    debug!("Created match {} from odds data", game.id);
    Ok(game)
}
async fn take_stake(
    conn: &mut SqliteConnection,
    user: RowId,
    amount: Amount,
    wager: RowId,
    note: String,
) -> ExchangeResult<()> {
    if !ledger::debit(conn, user, amount).await? {
        return Err(ExchangeError::InsufficientFunds(format!(
            "account {} can't cover {}",
            user, amount
        )));
    }
    let transaction =
        NewTransaction::for_wager(user, amount, TxDirection::Debit, TxMethod::Bet, wager, note);
    ledger::append_transaction(conn, &transaction).await?;
    Ok(())
}
async fn give_back(
    conn: &mut SqliteConnection,
    user: RowId,
    amount: Amount,
    wager: RowId,
    note: String,
) -> ExchangeResult<()> {
    ledger::credit(conn, user, amount).await?;
    let transaction = NewTransaction::for_wager(
        user,
        amount,
        TxDirection::Credit,
        TxMethod::Refund,
        wager,
        note,
    );
    ledger::append_transaction(conn, &transaction).await?;
    Ok(())
}
/// Returns every stake held by a pending or active wager and marks it refunded.
///
/// Returns `None` if the wager was already closed.
async fn refund_wager(
    conn: &mut SqliteConnection,
    mut wager: Wager,
    by: &str,
) -> ExchangeResult<Option<Wager>> {
    let at = now();
    if !db::mark_refunded(conn, wager.id, at, by).await? {
        return Ok(None);
    }
    let note = format!("refund for wager {}", wager.id);
    give_back(conn, wager.maker_id, wager.maker_stake, wager.id, note.clone()).await?;
    if let (Some(taker), Some(taker_stake)) = (wager.taker_id, wager.taker_stake) {
        give_back(conn, taker, taker_stake, wager.id, note).await?;
    }
    wager.status = WagerStatus::Refunded;
    wager.settled_at = Some(at);
    wager.settled_by = Some(by.to_string());
    Ok(Some(wager))
}

impl Exchange {
    pub async fn new(
        db: SQLite,
        notifier: Box<dyn Notifier + Send + Sync>,
        settings: &Settings,
    ) -> ExchangeResult<Self> {
        let me = Self {
            db,
            notifier,
            commission_rate: settings.commission_rate,
            accept_window: settings.accept_window(),
        };
        for admin in &settings.admins {
            me.promote_admin(admin).await?;
        }
        Ok(me)
    }
    async fn promote_admin(&self, name: &str) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;
        match ledger::get_account_by_name(&mut tx, name).await? {
            Some(account) => ledger::set_role(&mut tx, account.id, UserRole::Admin).await?,
            None => {
                ledger::create_account(&mut tx, name, UserRole::Admin, Decimal::ZERO).await?;
            }
        }
        tx.commit().await?;
        info!("Account {} has admin rights", name);
        Ok(())
    }
    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }
    pub async fn check_admin(&self, admin: RowId) -> ExchangeResult<Account> {
        let mut conn = self.db.pool().acquire().await?;
        match ledger::get_account(&mut conn, admin).await? {
            Some(account) if account.role == UserRole::Admin => Ok(account),
            _ => Err(ExchangeError::PermissionDenied(format!(
                "account {} is not an admin",
                admin
            ))),
        }
    }

    // Wagers

    pub async fn place_wager(&self, request: PlaceWagerRequest) -> ExchangeResult<Wager> {
        validate_amount(request.stake, "stake")?;
        validate_odds(request.odds)?;
        let window = request
            .accept_window_secs
            .map(|secs| Duration::seconds(secs.into()))
            .unwrap_or(self.accept_window);

        let mut tx = self.db.begin().await?;
        fetch_account(&mut tx, request.user).await?;
        let game = resolve_match(&mut tx, &request.match_id).await?;
        if !game.status.accepts_bets() || game.settled {
            return Err(invalid_state!(
                "match {} is {} and no longer takes wagers",
                game.id,
                game.status
            ));
        }
        let (_, opposite_odds) = game.opposite_of(&request.team).ok_or_else(|| {
            invalid_argument!("{} doesn't play in match {}", request.team, game.id)
        })?;
        let created_at = now();
        let mut wager = Wager {
            id: 0,
            match_id: game.id.clone(),
            sport: game.sport.clone(),
            maker_id: request.user,
            maker_team: request.team,
            maker_stake: request.stake,
            maker_odds: request.odds,
            taker_id: None,
            taker_team: None,
            taker_stake: None,
            taker_odds: None,
            opposite_odds,
            potential_win: potential_win(request.stake, request.odds)?,
            status: WagerStatus::Pending,
            created_at,
            expires_at: created_at + window,
            matched_at: None,
            settled_at: None,
            settled_by: None,
            winner_team: None,
            commission: Decimal::ZERO,
        };
        wager.id = db::insert_wager(&mut tx, &wager).await?;
        let note = format!("stake on {} in match {}", wager.maker_team, wager.match_id);
        take_stake(&mut tx, wager.maker_id, wager.maker_stake, wager.id, note).await?;
        tx.commit().await?;

        debug!(
            "User {} placed wager {}: {} on {} at {}",
            wager.maker_id, wager.id, wager.maker_stake, wager.maker_team, wager.maker_odds
        );
        self.notifier.emit(Event::WagerCreated(wager.clone()));
        Ok(wager)
    }
    pub async fn accept_wager(&self, wager_id: RowId, user: RowId) -> ExchangeResult<Wager> {
        let mut tx = self.db.begin().await?;
        let mut wager = fetch_wager(&mut tx, wager_id).await?;
        if wager.status != WagerStatus::Pending {
            return Err(invalid_state!("wager {} is {}", wager.id, wager.status));
        }
        if wager.maker_id == user {
            return Err(invalid_argument!("can't accept your own wager {}", wager.id));
        }
        fetch_account(&mut tx, user).await?;
        let game = fetch_match(&mut tx, &wager.match_id).await?;
        if !game.status.accepts_bets() || game.settled {
            return Err(invalid_state!(
                "match {} is {} and no longer takes wagers",
                game.id,
                game.status
            ));
        }
        let matched_at = now();
        if matched_at > wager.expires_at {
            return Err(invalid_state!(
                "acceptance window of wager {} closed at {}",
                wager.id,
                wager.expires_at
            ));
        }
        let taker_stake =
            stake::taker_stake(wager.maker_stake, wager.maker_odds, wager.opposite_odds)
                .filter(|amount| stake::to_cents(*amount).is_some())
                .ok_or_else(|| {
                    invalid_state!("taker stake of wager {} is out of range", wager.id)
                })?;
        if taker_stake <= Decimal::ZERO {
            return Err(invalid_state!(
                "wager {} leaves nothing for a taker to stake",
                wager.id
            ));
        }
        let (taker_team, _) = game
            .opposite_of(&wager.maker_team)
            .with_context(|| format!("wager {} is on a team not in its match", wager.id))?;

        wager.taker_id = Some(user);
        wager.taker_team = Some(taker_team.to_string());
        wager.taker_stake = Some(taker_stake);
        wager.taker_odds = Some(wager.opposite_odds);
        wager.matched_at = Some(matched_at);
        wager.status = WagerStatus::Active;
        let note = format!("stake on {} in match {}", taker_team, wager.match_id);
        take_stake(&mut tx, user, taker_stake, wager.id, note).await?;
        if !db::fill_taker(&mut tx, &wager).await? {
            return Err(invalid_state!("wager {} was taken meanwhile", wager.id));
        }
        tx.commit().await?;

        debug!(
            "User {} matched wager {} with {}",
            user, wager.id, taker_stake
        );
        self.notifier.emit(Event::WagerMatched(wager.clone()));
        Ok(wager)
    }
    pub async fn edit_wager(&self, request: EditWagerRequest) -> ExchangeResult<Wager> {
        if let Some(stake) = request.stake {
            validate_amount(stake, "stake")?;
        }
        if let Some(odds) = request.odds {
            validate_odds(odds)?;
        }
        let mut tx = self.db.begin().await?;
        let mut wager = fetch_wager(&mut tx, request.wager).await?;
        if wager.maker_id != request.user {
            return Err(ExchangeError::PermissionDenied(format!(
                "only the maker can edit wager {}",
                wager.id
            )));
        }
        if wager.status != WagerStatus::Pending {
            return Err(invalid_state!("wager {} is {}", wager.id, wager.status));
        }
        if let Some(new_stake) = request.stake {
            let delta = new_stake - wager.maker_stake;
            let note = format!("stake change on wager {}", wager.id);
            if delta > Decimal::ZERO {
                take_stake(&mut tx, wager.maker_id, delta, wager.id, note).await?;
            } else if delta < Decimal::ZERO {
                give_back(&mut tx, wager.maker_id, -delta, wager.id, note).await?;
            }
            wager.maker_stake = new_stake;
        }
        if let Some(odds) = request.odds {
            wager.maker_odds = odds;
        }
        wager.potential_win = potential_win(wager.maker_stake, wager.maker_odds)?;
        if !db::update_terms(&mut tx, &wager).await? {
            return Err(invalid_state!("wager {} was taken meanwhile", wager.id));
        }
        tx.commit().await?;
        debug!(
            "Wager {} now {} at {}",
            wager.id, wager.maker_stake, wager.maker_odds
        );
        Ok(wager)
    }
    /// Refunds and deletes a pending wager. The returned record is all that remains of it.
    pub async fn cancel_wager(&self, wager_id: RowId, user: RowId) -> ExchangeResult<Wager> {
        let mut tx = self.db.begin().await?;
        let mut wager = fetch_wager(&mut tx, wager_id).await?;
        if wager.maker_id != user {
            return Err(ExchangeError::PermissionDenied(format!(
                "only the maker can cancel wager {}",
                wager.id
            )));
        }
        if wager.status != WagerStatus::Pending {
            return Err(invalid_state!("wager {} is {}", wager.id, wager.status));
        }
        let note = format!("cancelled wager {}", wager.id);
        give_back(&mut tx, wager.maker_id, wager.maker_stake, wager.id, note).await?;
        if !db::delete_pending_wager(&mut tx, wager.id).await? {
            return Err(invalid_state!("wager {} was taken meanwhile", wager.id));
        }
        tx.commit().await?;
        debug!("User {} cancelled wager {}", user, wager.id);
        wager.status = WagerStatus::Cancelled;
        Ok(wager)
    }

    // Settlement

    /// Pays out one active wager inside the caller's transaction.
    ///
    /// Returns `None` without touching anything if the wager isn't active, or if another
    /// settlement claimed it first.
    async fn settle_in(
        &self,
        conn: &mut SqliteConnection,
        wager: &Wager,
        winner: &str,
        by: &str,
    ) -> ExchangeResult<Option<Wager>> {
        if wager.status != WagerStatus::Active {
            return Ok(None);
        }
        let (taker, taker_stake, taker_team) =
            match (wager.taker_id, wager.taker_stake, &wager.taker_team) {
                (Some(taker), Some(stake), Some(team)) => (taker, stake, team),
                _ => return Ok(None),
            };
        let maker_wins = if winner == wager.maker_team {
            true
        } else if winner == taker_team.as_str() {
            false
        } else {
            return Err(invalid_argument!(
                "{} is neither side of wager {}",
                winner,
                wager.id
            ));
        };
        let split = stake::split(wager.maker_stake, taker_stake, maker_wins, self.commission_rate);
        let beneficiary = if maker_wins { wager.maker_id } else { taker };

        let mut settled = wager.clone();
        settled.status = if maker_wins {
            WagerStatus::Won
        } else {
            WagerStatus::Lost
        };
        settled.winner_team = Some(winner.to_string());
        settled.commission = split.commission;
        settled.settled_at = Some(now());
        settled.settled_by = Some(by.to_string());
        if !db::claim_settlement(conn, &settled).await? {
            debug!("Wager {} was settled by someone else", wager.id);
            return Ok(None);
        }
        ledger::credit(conn, beneficiary, split.payout).await?;
        let transaction = NewTransaction {
            user_id: beneficiary,
            amount: split.payout,
            direction: TxDirection::Credit,
            method: TxMethod::Settlement,
            status: TxStatus::Success,
            note: format!("winnings of wager {}", wager.id),
            meta: json!({
                "wager_id": wager.id,
                "match_id": wager.match_id,
                "pool": split.pool,
                "profit": split.profit,
                "commission": split.commission,
            }),
        };
        ledger::append_transaction(conn, &transaction).await?;
        commission::record(conn, &settled, beneficiary, split.commission, self.commission_rate)
            .await?;
        Ok(Some(settled))
    }
    /// Settles one wager in its own transaction.
    ///
    /// Settling a wager that is already settled or was never matched is a no-op that returns the
    /// stored record. The flag tells whether this call moved any money.
    pub async fn settle_wager_as(
        &self,
        wager_id: RowId,
        winner: &str,
        by: &str,
    ) -> ExchangeResult<(Wager, bool)> {
        let mut tx = self.db.begin().await?;
        let stored = fetch_wager(&mut tx, wager_id).await?;
        let settled = self.settle_in(&mut tx, &stored, winner, by).await?;
        tx.commit().await?;
        match settled {
            Some(settled) => {
                info!(
                    "Settled wager {} for {} by {}: commission {}",
                    settled.id, winner, by, settled.commission
                );
                self.notifier.emit(Event::WagerSettled(settled.clone()));
                Ok((settled, true))
            }
            None => {
                debug!("Wager {} is {}, nothing to settle", stored.id, stored.status);
                Ok((stored, false))
            }
        }
    }
    pub async fn settle_wager(
        &self,
        admin: RowId,
        wager_id: RowId,
        winner: &str,
    ) -> ExchangeResult<Wager> {
        let admin = self.check_admin(admin).await?;
        let (wager, _) = self.settle_wager_as(wager_id, winner, &admin.name).await?;
        Ok(wager)
    }
    pub async fn settle_match_as(
        &self,
        match_id: &str,
        winner: &str,
        by: &str,
    ) -> ExchangeResult<MatchSettlement> {
        let mut tx = self.db.begin().await?;
        let mut game = fetch_match(&mut tx, match_id).await?;
        if game.status == MatchStatus::Cancelled {
            return Err(invalid_state!("match {} was cancelled", game.id));
        }
        if !game.has_team(winner) {
            return Err(invalid_argument!("{} doesn't play in match {}", winner, game.id));
        }
        let eligible = db::match_wagers(&mut tx, match_id, Some(WagerStatus::Active)).await?;
        if eligible.is_empty() {
            return Err(not_found!("no active wagers on match {}", match_id));
        }
        let mut settled = Vec::with_capacity(eligible.len());
        for wager in &eligible {
            if let Some(wager) = self.settle_in(&mut tx, wager, winner, by).await? {
                settled.push(wager);
            }
        }
        game.status = MatchStatus::Finished;
        game.winner = Some(winner.to_string());
        game.settled = true;
        db::save_match(&mut tx, &game).await?;
        tx.commit().await?;

        let total_commission: Amount = settled.iter().map(|wager| wager.commission).sum();
        info!(
            "Settled match {} for {} by {}: {} wagers, commission {}",
            game.id,
            winner,
            by,
            settled.len(),
            total_commission
        );
        for wager in &settled {
            self.notifier.emit(Event::WagerSettled(wager.clone()));
        }
        self.notifier.emit(Event::MatchSettled(MatchSettled {
            match_id: game.id.clone(),
            winner: winner.to_string(),
            wagers: settled.len() as u32,
            total_commission,
        }));
        Ok(MatchSettlement {
            match_id: game.id,
            winner: winner.to_string(),
            wagers: settled,
            total_commission,
        })
    }
    pub async fn settle_match(
        &self,
        admin: RowId,
        match_id: &str,
        winner: &str,
    ) -> ExchangeResult<MatchSettlement> {
        let admin = self.check_admin(admin).await?;
        self.settle_match_as(match_id, winner, &admin.name).await
    }
    pub async fn void_match_as(&self, match_id: &str, by: &str) -> ExchangeResult<Vec<Wager>> {
        let mut tx = self.db.begin().await?;
        let mut game = fetch_match(&mut tx, match_id).await?;
        if game.settled || game.status == MatchStatus::Finished {
            return Err(invalid_state!("match {} is already closed", game.id));
        }
        let mut refunded = vec![];
        for wager in db::match_wagers(&mut tx, match_id, None).await? {
            if let Some(wager) = refund_wager(&mut tx, wager, by).await? {
                refunded.push(wager);
            }
        }
        game.status = MatchStatus::Cancelled;
        game.winner = None;
        game.settled = true;
        db::save_match(&mut tx, &game).await?;
        tx.commit().await?;
        info!(
            "Voided match {} by {}: refunded {} wagers",
            game.id,
            by,
            refunded.len()
        );
        Ok(refunded)
    }
    pub async fn void_match(&self, admin: RowId, match_id: &str) -> ExchangeResult<Vec<Wager>> {
        let admin = self.check_admin(admin).await?;
        self.void_match_as(match_id, &admin.name).await
    }

    // Sweep

    /// Failures are logged and counted, they never stop the pass.
    pub async fn sweep(&self) -> ExchangeResult<SweepReport> {
        let mut report = SweepReport::default();
        let (settleable, cancelled) = {
            let mut conn = self.db.pool().acquire().await?;
            (
                db::settleable_matches(&mut conn).await?,
                db::cancelled_matches(&mut conn).await?,
            )
        };
        for game in settleable {
            let Some(winner) = game.winner.clone() else {
                continue;
            };
            if !game.has_team(&winner) {
                warn!(
                    "Match {} concluded with {} as winner, leaving it for an admin",
                    game.id, winner
                );
                continue;
            }
            if let Err(e) = self.sweep_match(&game, &winner, &mut report).await {
                error!("Couldn't settle match {}: {}", game.id, e);
                report.failures += 1;
            }
        }
        for game in cancelled {
            match self.void_match_as(&game.id, SYSTEM_AUTO).await {
                Ok(refunded) => report.wagers_refunded += refunded.len() as u32,
                Err(e) => {
                    error!("Couldn't void match {}: {}", game.id, e);
                    report.failures += 1;
                }
            }
        }
        self.refund_orphans(&mut report).await?;
        if report != SweepReport::default() {
            info!("Sweep finished: {:?}", report);
        }
        Ok(report)
    }
    async fn sweep_match(
        &self,
        game: &Match,
        winner: &str,
        report: &mut SweepReport,
    ) -> ExchangeResult<()> {
        let eligible = {
            let mut conn = self.db.pool().acquire().await?;
            db::match_wagers(&mut conn, &game.id, Some(WagerStatus::Active)).await?
        };
        let mut settled = 0u32;
        let mut total_commission = Decimal::ZERO;
        let mut failed = false;
        for wager in &eligible {
            match self.settle_wager_as(wager.id, winner, SYSTEM_AUTO).await {
                Ok((wager, true)) => {
                    settled += 1;
                    total_commission += wager.commission;
                }
                Ok((_, false)) => {}
                Err(e) => {
                    error!("Couldn't settle wager {}: {}", wager.id, e);
                    report.failures += 1;
                    failed = true;
                }
            }
        }
        report.wagers_settled += settled;
        if failed {
            // Stays eligible, the next pass retries what's left
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        let mut current = fetch_match(&mut tx, &game.id).await?;
        if current.settled {
            return Ok(());
        }
        if current.status.can_become(MatchStatus::Finished) {
            current.status = MatchStatus::Finished;
        }
        current.settled = true;
        db::save_match(&mut tx, &current).await?;
        tx.commit().await?;
        report.matches_settled += 1;

        if eligible.is_empty() {
            debug!("Match {} closed without wagers", game.id);
            return Ok(());
        }
        info!(
            "Auto-settled match {} for {}: {} wagers, commission {}",
            game.id, winner, settled, total_commission
        );
        self.notifier.emit(Event::MatchSettled(MatchSettled {
            match_id: game.id.clone(),
            winner: winner.to_string(),
            wagers: settled,
            total_commission,
        }));
        Ok(())
    }
    async fn refund_orphans(&self, report: &mut SweepReport) -> ExchangeResult<()> {
        let orphans = {
            let mut conn = self.db.pool().acquire().await?;
            db::orphaned_wagers(&mut conn).await?
        };
        for orphan in orphans {
            let id = orphan.id;
            let result = async {
                let mut tx = self.db.begin().await?;
                let refunded = refund_wager(&mut tx, orphan, SYSTEM_AUTO).await?;
                tx.commit().await?;
                Ok::<_, ExchangeError>(refunded)
            }
            .await;
            match result {
                Ok(Some(_)) => {
                    debug!("Refunded unmatched wager {}", id);
                    report.wagers_refunded += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Couldn't refund wager {}: {}", id, e);
                    report.failures += 1;
                }
            }
        }
        Ok(())
    }

    // Matches and odds

    /// Stores a quote and moves the matching match forward.
    ///
    /// Status never moves backward, the winner is fixed once settled and odds only change
    /// while the match still takes wagers.
    pub async fn apply_quote(&self, quote: &OddsQuote) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;
        db::upsert_odds(&mut tx, quote).await?;
        if let Some(mut game) = db::get_match(&mut tx, &quote.match_id).await? {
            let before = game.clone();
            if game.status.can_become(quote.status) {
                game.status = quote.status;
            } else {
                debug!(
                    "Ignoring {} -> {} for match {}",
                    game.status, quote.status, game.id
                );
            }
            if !game.settled && quote.winner.is_some() {
                game.winner = quote.winner.clone();
            }
            if game.status.accepts_bets() {
                game.odds_a = quote.odds_a;
                game.odds_b = quote.odds_b;
            }
            if game != before {
                db::save_match(&mut tx, &game).await?;
                debug!("Match {} is now {}", game.id, game.status);
            }
        }
        tx.commit().await?;
        Ok(())
    }
    pub async fn apply_feed(&self, quotes: &[OddsQuote]) -> usize {
        let mut applied = 0;
        for quote in quotes {
            match self.apply_quote(quote).await {
                Ok(()) => applied += 1,
                Err(e) => warn!("Couldn't apply odds for match {}: {}", quote.match_id, e),
            }
        }
        applied
    }
    pub async fn publish_odds(&self, admin: RowId, quote: &OddsQuote) -> ExchangeResult<()> {
        self.check_admin(admin).await?;
        validate_odds(quote.odds_a)?;
        validate_odds(quote.odds_b)?;
        if quote.team_a == quote.team_b {
            return Err(invalid_argument!("a team can't play itself"));
        }
        self.apply_quote(quote).await
    }
    pub async fn create_match(&self, request: CreateMatchRequest) -> ExchangeResult<Match> {
        self.check_admin(request.admin).await?;
        validate_odds(request.odds_a)?;
        validate_odds(request.odds_b)?;
        if request.team_a == request.team_b {
            return Err(invalid_argument!("a team can't play itself"));
        }
        let game = Match {
            id: request.match_id,
            sport: request.sport,
            team_a: request.team_a,
            team_b: request.team_b,
            odds_a: request.odds_a,
            odds_b: request.odds_b,
            status: MatchStatus::Upcoming,
            winner: None,
            settled: false,
        };
        let mut tx = self.db.begin().await?;
        if db::get_match(&mut tx, &game.id).await?.is_some() {
            return Err(invalid_argument!("match {} already exists", game.id));
        }
        db::insert_match(&mut tx, &game).await?;
        tx.commit().await?;
        debug!("Created match {}: {} vs {}", game.id, game.team_a, game.team_b);
        Ok(game)
    }
    pub async fn get_match(&self, match_id: &str) -> ExchangeResult<Match> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_match(&mut conn, match_id).await
    }
    pub async fn open_matches(&self) -> ExchangeResult<Vec<Match>> {
        let mut conn = self.db.pool().acquire().await?;
        let matches = db::list_matches(&mut conn, Some(MatchStatus::Upcoming)).await?;
        Ok(matches.into_iter().filter(|game| !game.settled).collect())
    }

    // Wager queries

    pub async fn get_wager(&self, wager_id: RowId) -> ExchangeResult<Wager> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_wager(&mut conn, wager_id).await
    }
    pub async fn open_wagers(&self) -> ExchangeResult<Vec<Wager>> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(db::open_wagers(&mut conn).await?)
    }
    pub async fn user_wagers(&self, user: RowId) -> ExchangeResult<Vec<Wager>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_account(&mut conn, user).await?;
        Ok(db::user_wagers(&mut conn, user).await?)
    }
    pub async fn all_wagers(
        &self,
        admin: RowId,
        status: Option<WagerStatus>,
    ) -> ExchangeResult<Vec<Wager>> {
        self.check_admin(admin).await?;
        let mut conn = self.db.pool().acquire().await?;
        Ok(db::list_wagers(&mut conn, status, HISTORY_LIMIT).await?)
    }
    pub async fn match_wagers(&self, match_id: &str) -> ExchangeResult<Vec<Wager>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_match(&mut conn, match_id).await?;
        Ok(db::match_wagers(&mut conn, match_id, None).await?)
    }

    // Wallet

    pub async fn create_account(
        &self,
        name: &str,
        role: UserRole,
        balance: Amount,
    ) -> ExchangeResult<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid_argument!("account name can't be empty"));
        }
        if balance < Decimal::ZERO || balance > stake::MAX_AMOUNT || !stake::is_cent_precise(balance)
        {
            return Err(invalid_argument!("invalid opening balance {}", balance));
        }
        let mut tx = self.db.begin().await?;
        if ledger::get_account_by_name(&mut tx, name).await?.is_some() {
            return Err(invalid_argument!("account {} already exists", name));
        }
        let id = ledger::create_account(&mut tx, name, role, balance).await?;
        if balance > Decimal::ZERO {
            let transaction = NewTransaction {
                user_id: id,
                amount: balance,
                direction: TxDirection::Credit,
                method: TxMethod::Deposit,
                status: TxStatus::Success,
                note: "opening balance".to_string(),
                meta: json!({}),
            };
            ledger::append_transaction(&mut tx, &transaction).await?;
        }
        tx.commit().await?;
        debug!("Created {} account {} ({})", role, id, name);
        Ok(Account {
            id,
            name: name.to_string(),
            balance,
            role,
        })
    }
    pub async fn get_account(&self, user: RowId) -> ExchangeResult<Account> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_account(&mut conn, user).await
    }
    pub async fn request_deposit(&self, user: RowId, amount: Amount) -> ExchangeResult<Transaction> {
        validate_amount(amount, "deposit")?;
        let mut tx = self.db.begin().await?;
        fetch_account(&mut tx, user).await?;
        let transaction = NewTransaction {
            user_id: user,
            amount,
            direction: TxDirection::Credit,
            method: TxMethod::Deposit,
            status: TxStatus::Pending,
            note: "deposit request".to_string(),
            meta: json!({}),
        };
        let id = ledger::append_transaction(&mut tx, &transaction).await?;
        let stored = ledger::get_transaction(&mut tx, id)
            .await?
            .with_context(|| format!("transaction {} vanished", id))?;
        tx.commit().await?;
        debug!("User {} requested a deposit of {}", user, amount);
        Ok(stored)
    }
    /// Reserves the amount right away so it can't be bet while the request is pending.
    pub async fn request_withdrawal(
        &self,
        user: RowId,
        amount: Amount,
    ) -> ExchangeResult<Transaction> {
        validate_amount(amount, "withdrawal")?;
        let mut tx = self.db.begin().await?;
        fetch_account(&mut tx, user).await?;
        if !ledger::debit(&mut tx, user, amount).await? {
            return Err(ExchangeError::InsufficientFunds(format!(
                "account {} can't withdraw {}",
                user, amount
            )));
        }
        let transaction = NewTransaction {
            user_id: user,
            amount,
            direction: TxDirection::Debit,
            method: TxMethod::Withdraw,
            status: TxStatus::Pending,
            note: "withdrawal request".to_string(),
            meta: json!({}),
        };
        let id = ledger::append_transaction(&mut tx, &transaction).await?;
        let stored = ledger::get_transaction(&mut tx, id)
            .await?
            .with_context(|| format!("transaction {} vanished", id))?;
        tx.commit().await?;
        debug!("User {} requested a withdrawal of {}", user, amount);
        Ok(stored)
    }
    async fn decide_transaction(
        &self,
        admin: RowId,
        id: RowId,
        approve: bool,
    ) -> ExchangeResult<Transaction> {
        self.check_admin(admin).await?;
        let mut tx = self.db.begin().await?;
        let mut transaction = ledger::get_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| not_found!("transaction {}", id))?;
        if transaction.status != TxStatus::Pending {
            return Err(invalid_state!("transaction {} is {}", id, transaction.status));
        }
        match (transaction.method, approve) {
            (TxMethod::Deposit, true) => {
                ledger::credit(&mut tx, transaction.user_id, transaction.amount).await?
            }
            (TxMethod::Withdraw, false) => {
                ledger::credit(&mut tx, transaction.user_id, transaction.amount).await?
            }
            (TxMethod::Deposit, false) | (TxMethod::Withdraw, true) => {}
            (method, _) => {
                return Err(invalid_argument!(
                    "{} transactions aren't approved by hand",
                    method
                ))
            }
        }
        let status = if approve {
            TxStatus::Success
        } else {
            TxStatus::Failed
        };
        if !ledger::finalize_transaction(&mut tx, id, status).await? {
            return Err(invalid_state!("transaction {} was decided meanwhile", id));
        }
        tx.commit().await?;
        info!(
            "{} {} of {} for user {}",
            if approve { "Approved" } else { "Rejected" },
            transaction.method,
            transaction.amount,
            transaction.user_id
        );
        transaction.status = status;
        Ok(transaction)
    }
    pub async fn approve_transaction(&self, admin: RowId, id: RowId) -> ExchangeResult<Transaction> {
        self.decide_transaction(admin, id, true).await
    }
    pub async fn reject_transaction(&self, admin: RowId, id: RowId) -> ExchangeResult<Transaction> {
        self.decide_transaction(admin, id, false).await
    }
    pub async fn pending_transactions(&self, admin: RowId) -> ExchangeResult<Vec<Transaction>> {
        self.check_admin(admin).await?;
        let mut conn = self.db.pool().acquire().await?;
        Ok(ledger::pending_transactions(&mut conn, HISTORY_LIMIT).await?)
    }
    pub async fn transactions(&self, user: RowId) -> ExchangeResult<Vec<Transaction>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_account(&mut conn, user).await?;
        Ok(ledger::user_transactions(&mut conn, user, HISTORY_LIMIT).await?)
    }

    // Commission

    pub async fn commission_summary(&self) -> ExchangeResult<CommissionSummary> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(commission::summary(&mut conn).await?)
    }
    pub async fn commissions_for_match(&self, match_id: &str) -> ExchangeResult<Vec<Commission>> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(commission::for_match(&mut conn, match_id).await?)
    }
    pub async fn commission_report(&self, admin: RowId) -> ExchangeResult<Vec<CommissionReportRow>> {
        self.check_admin(admin).await?;
        let mut conn = self.db.pool().acquire().await?;
        Ok(commission::report(&mut conn).await?)
    }
    pub async fn mark_commissions_credited(
        &self,
        admin: RowId,
        match_id: &str,
    ) -> ExchangeResult<u64> {
        self.check_admin(admin).await?;
        let mut conn = self.db.pool().acquire().await?;
        let credited = commission::mark_credited(&mut conn, match_id).await?;
        debug!("Credited {} commissions of match {}", credited, match_id);
        Ok(credited)
    }
}
