use crate::api::*;
use crate::db::SQLite;
use crate::error::ExchangeError;
use crate::exchange::Exchange;
use crate::feed::{HttpOddsProvider, OddsProvider, StaticOddsProvider};
use crate::notifier::LogNotifier;
use crate::reconciler::Reconciler;
use crate::settings::Settings;
use anyhow::{Context, Result};
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use clap::Parser;
use env_logger::{Builder, Env, WriteStyle};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

mod api;
#[cfg(test)]
mod client;
mod commission;
mod db;
mod error;
mod exchange;
mod feed;
mod ledger;
mod notifier;
mod reconciler;
mod settings;
mod stake;

type ApiResult<T> = Result<Json<T>, ExchangeError>;

#[debug_handler]
async fn place_wager(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<PlaceWagerRequest>,
) -> Result<(StatusCode, Json<Wager>), ExchangeError> {
    let wager = exchange.place_wager(request).await?;
    Ok((StatusCode::CREATED, Json(wager)))
}
#[debug_handler]
async fn accept_wager(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AcceptWagerRequest>,
) -> ApiResult<Wager> {
    let wager = exchange.accept_wager(request.wager, request.user).await?;
    Ok(Json(wager))
}
async fn edit_wager(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<EditWagerRequest>,
) -> ApiResult<Wager> {
    Ok(Json(exchange.edit_wager(request).await?))
}
async fn cancel_wager(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<CancelWagerRequest>,
) -> ApiResult<Wager> {
    let wager = exchange.cancel_wager(request.wager, request.user).await?;
    Ok(Json(wager))
}
#[debug_handler]
async fn settle_wager(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<SettleWagerRequest>,
) -> ApiResult<Wager> {
    let wager = exchange
        .settle_wager(request.admin, request.wager, &request.winner)
        .await?;
    Ok(Json(wager))
}
#[debug_handler]
async fn settle_match(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<SettleMatchRequest>,
) -> ApiResult<MatchSettlement> {
    let settlement = exchange
        .settle_match(request.admin, &request.match_id, &request.winner)
        .await?;
    Ok(Json(settlement))
}
async fn void_match(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<VoidMatchRequest>,
) -> ApiResult<Vec<Wager>> {
    let refunded = exchange.void_match(request.admin, &request.match_id).await?;
    Ok(Json(refunded))
}
async fn run_sweep(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AdminRequest>,
) -> ApiResult<SweepReport> {
    let admin = exchange.check_admin(request.admin).await?;
    debug!("Sweep requested by {}", admin.name);
    Ok(Json(exchange.sweep().await?))
}

#[debug_handler]
async fn create_account(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ExchangeError> {
    let account = exchange
        .create_account(&request.name, request.role, request.balance)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}
async fn get_account(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<Account> {
    Ok(Json(exchange.get_account(request.user).await?))
}
async fn request_deposit(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<FundsRequest>,
) -> ApiResult<Transaction> {
    let transaction = exchange.request_deposit(request.user, request.amount).await?;
    Ok(Json(transaction))
}
async fn request_withdrawal(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<FundsRequest>,
) -> ApiResult<Transaction> {
    let transaction = exchange
        .request_withdrawal(request.user, request.amount)
        .await?;
    Ok(Json(transaction))
}
async fn approve_transaction(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<TransactionDecisionRequest>,
) -> ApiResult<Transaction> {
    let transaction = exchange
        .approve_transaction(request.admin, request.transaction)
        .await?;
    Ok(Json(transaction))
}
async fn reject_transaction(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<TransactionDecisionRequest>,
) -> ApiResult<Transaction> {
    let transaction = exchange
        .reject_transaction(request.admin, request.transaction)
        .await?;
    Ok(Json(transaction))
}
async fn get_pending_transactions(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AdminRequest>,
) -> ApiResult<Vec<Transaction>> {
    Ok(Json(exchange.pending_transactions(request.admin).await?))
}
async fn get_transactions(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<Vec<Transaction>> {
    Ok(Json(exchange.transactions(request.user).await?))
}

#[debug_handler]
async fn publish_odds(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<PublishOddsRequest>,
) -> Result<(), ExchangeError> {
    exchange.publish_odds(request.admin, &request.quote).await?;
    debug!("Published odds for match {}", request.quote.match_id);
    Ok(())
}
async fn create_match(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<Match>), ExchangeError> {
    let game = exchange.create_match(request).await?;
    Ok((StatusCode::CREATED, Json(game)))
}
async fn get_match(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<MatchRequest>,
) -> ApiResult<Match> {
    Ok(Json(exchange.get_match(&request.match_id).await?))
}
async fn get_matches(State(exchange): State<Arc<Exchange>>) -> ApiResult<Vec<Match>> {
    Ok(Json(exchange.open_matches().await?))
}

async fn get_open_wagers(State(exchange): State<Arc<Exchange>>) -> ApiResult<Vec<Wager>> {
    Ok(Json(exchange.open_wagers().await?))
}
async fn get_user_wagers(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<Vec<Wager>> {
    Ok(Json(exchange.user_wagers(request.user).await?))
}
async fn get_all_wagers(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AdminWagersRequest>,
) -> ApiResult<Vec<Wager>> {
    Ok(Json(exchange.all_wagers(request.admin, request.status).await?))
}
async fn get_match_wagers(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<MatchRequest>,
) -> ApiResult<Vec<Wager>> {
    Ok(Json(exchange.match_wagers(&request.match_id).await?))
}

async fn get_commission_summary(
    State(exchange): State<Arc<Exchange>>,
) -> ApiResult<CommissionSummary> {
    Ok(Json(exchange.commission_summary().await?))
}
async fn get_commissions(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<MatchRequest>,
) -> ApiResult<Vec<Commission>> {
    Ok(Json(exchange.commissions_for_match(&request.match_id).await?))
}
async fn get_commission_report(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AdminRequest>,
) -> ApiResult<Vec<CommissionReportRow>> {
    Ok(Json(exchange.commission_report(request.admin).await?))
}
async fn mark_commissions_credited(
    State(exchange): State<Arc<Exchange>>,
    Json(request): Json<AdminMatchRequest>,
) -> ApiResult<u64> {
    let credited = exchange
        .mark_commissions_credited(request.admin, &request.match_id)
        .await?;
    Ok(Json(credited))
}

#[derive(Parser)]
struct Args {
    /// Config file, `apuesta.*` in the working directory is used if present
    #[arg(short, long)]
    config: Option<String>,
    /// Account names with admin rights, on top of the configured ones
    #[arg(short, long)]
    admin: Vec<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// SQLite file, in-memory if neither this nor `database_url` is set
    #[arg(short, long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .write_style(WriteStyle::Always)
        .init();
    let cli = Args::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if cli.db.is_some() {
        settings.database_url = cli.db;
    }
    settings.admins.extend(cli.admin);

    let db = SQLite::new(settings.database_url.clone()).await?;
    let exchange = Arc::new(Exchange::new(db, Box::new(LogNotifier), &settings).await?);
    let provider: Box<dyn OddsProvider + Send + Sync> = match &settings.feed.url {
        Some(url) => Box::new(HttpOddsProvider::new(
            url.clone(),
            settings.feed.api_key.clone(),
            settings.feed_timeout(),
        )?),
        None => {
            info!("No odds feed configured, only published odds are used");
            Box::new(StaticOddsProvider::default())
        }
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Reconciler::new(
        exchange.clone(),
        provider,
        settings.sweep_interval(),
        shutdown_rx,
    );
    let sweeper = tokio::spawn(reconciler.run());
    let (_port, server) = run_server(exchange, Some(settings.port)).await?;

    tokio::signal::ctrl_c()
        .await
        .context("couldn't listen for ctrl-c")?;
    info!("Shutting down");
    shutdown_tx.send(true).ok();
    sweeper.await?;
    server.abort();
    Ok(())
}

fn router(exchange: Arc<Exchange>) -> Router {
    Router::new()
        .route("/place_wager", post(place_wager))
        .route("/accept_wager", post(accept_wager))
        .route("/edit_wager", post(edit_wager))
        .route("/cancel_wager", post(cancel_wager))
        .route("/settle_wager", post(settle_wager))
        .route("/settle_match", post(settle_match))
        .route("/void_match", post(void_match))
        .route("/run_sweep", post(run_sweep))
        .route("/create_account", post(create_account))
        .route("/get_account", post(get_account))
        .route("/request_deposit", post(request_deposit))
        .route("/request_withdrawal", post(request_withdrawal))
        .route("/approve_transaction", post(approve_transaction))
        .route("/reject_transaction", post(reject_transaction))
        .route("/get_transactions", post(get_transactions))
        .route("/get_pending_transactions", post(get_pending_transactions))
        .route("/publish_odds", post(publish_odds))
        .route("/create_match", post(create_match))
        .route("/get_match", post(get_match))
        .route("/get_matches", get(get_matches))
        .route("/get_open_wagers", get(get_open_wagers))
        .route("/get_user_wagers", post(get_user_wagers))
        .route("/get_match_wagers", post(get_match_wagers))
        .route("/get_all_wagers", post(get_all_wagers))
        .route("/get_commission_summary", get(get_commission_summary))
        .route("/get_commissions", post(get_commissions))
        .route("/get_commission_report", post(get_commission_report))
        .route("/mark_commissions_credited", post(mark_commissions_credited))
        .with_state(exchange)
}

/// Serves the exchange on localhost. Port `None` picks a free one.
async fn run_server(exchange: Arc<Exchange>, port: Option<u16>) -> Result<(u16, JoinHandle<()>)> {
    let addr: SocketAddr = format!("127.0.0.1:{}", port.unwrap_or(0)).parse()?;
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("couldn't bind {}", addr))?
        .serve(router(exchange).into_make_service());
    let port = server.local_addr().port();
    info!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Server stopped: {}", e);
        }
    });
    Ok((port, handle))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::Client;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    async fn exchange() -> Arc<Exchange> {
        let db = SQLite::new(None).await.unwrap();
        Arc::new(
            Exchange::new(db, Box::new(LogNotifier), &Settings::default())
                .await
                .unwrap(),
        )
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn error_status_codes() {
        let exchange = exchange().await;
        let user = exchange
            .create_account("alice", UserRole::User, dec!(10))
            .await
            .unwrap();
        let app = router(exchange);

        assert_eq!(
            post_json(app.clone(), "/get_account", r#"{"user": 999}"#).await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            post_json(
                app.clone(),
                "/get_account",
                &format!(r#"{{"user": {}}}"#, user.id)
            )
            .await,
            StatusCode::OK
        );
        assert_eq!(
            post_json(
                app.clone(),
                "/run_sweep",
                &format!(r#"{{"admin": {}}}"#, user.id)
            )
            .await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            post_json(
                app.clone(),
                "/request_withdrawal",
                &format!(r#"{{"user": {}, "amount": "10.01"}}"#, user.id)
            )
            .await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            post_json(
                app.clone(),
                "/request_deposit",
                &format!(r#"{{"user": {}, "amount": "-1"}}"#, user.id)
            )
            .await,
            StatusCode::BAD_REQUEST
        );
        assert!(post_json(app, "/place_wager", "{not json")
            .await
            .is_client_error());
    }

    #[tokio::test]
    async fn all() {
        let (port, _) = run_server(exchange().await, None).await.unwrap();
        let client = Client::new(format!("http://127.0.0.1:{}", port));

        let admin = client
            .create_account(CreateAccountRequest {
                name: "admin".into(),
                role: UserRole::Admin,
                balance: dec!(0),
            })
            .await
            .unwrap();
        let mut users = vec![];
        for name in ["alice", "bob"] {
            let account = client
                .create_account(CreateAccountRequest {
                    name: name.into(),
                    role: UserRole::User,
                    balance: dec!(1000),
                })
                .await
                .unwrap();
            users.push(account.id);
        }
        let (alice, bob) = (users[0], users[1]);

        let game = client
            .create_match(CreateMatchRequest {
                admin: admin.id,
                match_id: "IND_AUS".into(),
                sport: "cricket".into(),
                team_a: "India".into(),
                team_b: "Australia".into(),
                odds_a: dec!(2.0),
                odds_b: dec!(2.0),
            })
            .await
            .unwrap();
        assert_eq!(client.get_matches().await.unwrap(), vec![game]);

        // Odds can be published for matches nobody created yet
        client
            .publish_odds(PublishOddsRequest {
                admin: admin.id,
                quote: OddsQuote {
                    match_id: "ENG_NZ".into(),
                    sport: "cricket".into(),
                    team_a: "England".into(),
                    team_b: "New Zealand".into(),
                    odds_a: dec!(1.5),
                    odds_b: dec!(2.6),
                    status: MatchStatus::Upcoming,
                    winner: None,
                },
            })
            .await
            .unwrap();
        let err = client
            .publish_odds(PublishOddsRequest {
                admin: alice,
                quote: OddsQuote {
                    match_id: "X".into(),
                    sport: "cricket".into(),
                    team_a: "A".into(),
                    team_b: "B".into(),
                    odds_a: dec!(1.5),
                    odds_b: dec!(2.6),
                    status: MatchStatus::Upcoming,
                    winner: None,
                },
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("403"));

        let wager = client
            .place_wager(PlaceWagerRequest {
                user: alice,
                match_id: "IND_AUS".into(),
                team: "India".into(),
                stake: dec!(100),
                odds: dec!(2.0),
                accept_window_secs: None,
            })
            .await
            .unwrap();
        let other = client
            .place_wager(PlaceWagerRequest {
                user: bob,
                match_id: "ENG_NZ".into(),
                team: "England".into(),
                stake: dec!(20),
                odds: dec!(1.5),
                accept_window_secs: Some(600),
            })
            .await
            .unwrap();
        assert_eq!(client.get_open_wagers().await.unwrap().len(), 2);
        let other = client
            .edit_wager(EditWagerRequest {
                wager: other.id,
                user: bob,
                stake: Some(dec!(30)),
                odds: None,
            })
            .await
            .unwrap();
        assert_eq!(other.maker_stake, dec!(30));
        let other = client
            .cancel_wager(CancelWagerRequest {
                wager: other.id,
                user: bob,
            })
            .await
            .unwrap();
        assert_eq!(other.status, WagerStatus::Cancelled);

        let err = client
            .accept_wager(AcceptWagerRequest {
                wager: wager.id,
                user: alice,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("400"));
        let wager = client
            .accept_wager(AcceptWagerRequest {
                wager: wager.id,
                user: bob,
            })
            .await
            .unwrap();
        assert_eq!(wager.taker_stake, Some(dec!(100)));

        let err = client
            .settle_match(SettleMatchRequest {
                admin: bob,
                match_id: "IND_AUS".into(),
                winner: "India".into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("403"));
        let settlement = client
            .settle_match(SettleMatchRequest {
                admin: admin.id,
                match_id: "IND_AUS".into(),
                winner: "India".into(),
            })
            .await
            .unwrap();
        assert_eq!(settlement.total_commission, dec!(5.00));
        let wager = client
            .settle_wager(SettleWagerRequest {
                admin: admin.id,
                wager: wager.id,
                winner: "India".into(),
            })
            .await
            .unwrap();
        assert_eq!(wager.status, WagerStatus::Won);
        let won = client
            .get_all_wagers(AdminWagersRequest {
                admin: admin.id,
                status: Some(WagerStatus::Won),
            })
            .await
            .unwrap();
        assert_eq!(won, vec![wager.clone()]);
        let err = client
            .get_all_wagers(AdminWagersRequest {
                admin: bob,
                status: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("403"));

        let account = client
            .get_account(AccountRequest { user: alice })
            .await
            .unwrap();
        assert_eq!(account.balance, dec!(1095.00));
        let summary = client.get_commission_summary().await.unwrap();
        assert_eq!(summary.total_commission, dec!(5.00));
        assert_eq!(summary.count, 1);
        assert_eq!(
            client
                .get_commissions(MatchRequest {
                    match_id: "IND_AUS".into()
                })
                .await
                .unwrap()
                .len(),
            1
        );
        let report = client
            .get_commission_report(AdminRequest { admin: admin.id })
            .await
            .unwrap();
        assert_eq!(report[0].match_id, "IND_AUS");
        assert_eq!(
            client
                .mark_commissions_credited(AdminMatchRequest {
                    admin: admin.id,
                    match_id: "IND_AUS".into()
                })
                .await
                .unwrap(),
            1
        );
        assert!(client
            .get_match(MatchRequest {
                match_id: "IND_AUS".into()
            })
            .await
            .unwrap()
            .settled);
        assert_eq!(
            client
                .get_match_wagers(MatchRequest {
                    match_id: "IND_AUS".into()
                })
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            client
                .get_user_wagers(AccountRequest { user: bob })
                .await
                .unwrap()
                .len(),
            1
        );

        let deposit = client
            .request_deposit(FundsRequest {
                user: bob,
                amount: dec!(25),
            })
            .await
            .unwrap();
        let pending = client
            .get_pending_transactions(AdminRequest { admin: admin.id })
            .await
            .unwrap();
        assert_eq!(pending, vec![deposit.clone()]);
        client
            .approve_transaction(TransactionDecisionRequest {
                admin: admin.id,
                transaction: deposit.id,
            })
            .await
            .unwrap();
        let withdrawal = client
            .request_withdrawal(FundsRequest {
                user: bob,
                amount: dec!(100),
            })
            .await
            .unwrap();
        let rejected = client
            .reject_transaction(TransactionDecisionRequest {
                admin: admin.id,
                transaction: withdrawal.id,
            })
            .await
            .unwrap();
        assert_eq!(rejected.status, TxStatus::Failed);
        let bob_account = client.get_account(AccountRequest { user: bob }).await.unwrap();
        assert_eq!(bob_account.balance, dec!(925));
        let history = client
            .get_transactions(AccountRequest { user: bob })
            .await
            .unwrap();
        assert_eq!(history[0].id, withdrawal.id);

        assert_eq!(
            client
                .run_sweep(AdminRequest { admin: admin.id })
                .await
                .unwrap(),
            SweepReport::default()
        );
        let voided = client
            .void_match(VoidMatchRequest {
                admin: admin.id,
                match_id: "IND_AUS".into(),
            })
            .await
            .unwrap_err();
        assert!(voided.to_string().starts_with("409"));
    }
}
