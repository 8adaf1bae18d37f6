#![allow(unused)]
use anyhow::Result;
use api::*;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::client::Client;

mod api;
mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    CreateAccount {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "0")]
        balance: Decimal,
        #[arg(short, long, default_value = "user")]
        role: UserRole,
    },
    Account {
        #[arg(short, long)]
        user: RowId,
    },
    Transactions {
        #[arg(short, long)]
        user: RowId,
    },
    PendingTransactions {
        #[arg(short, long)]
        admin: RowId,
    },
    Deposit {
        #[arg(short, long)]
        user: RowId,
        #[arg(short, long)]
        amount: Decimal,
    },
    Withdraw {
        #[arg(short, long)]
        user: RowId,
        #[arg(short, long)]
        amount: Decimal,
    },
    Approve {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        transaction: RowId,
    },
    Reject {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        transaction: RowId,
    },
    PublishOdds {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        match_id: MatchId,
        #[arg(long)]
        team_a: String,
        #[arg(long)]
        team_b: String,
        #[arg(long)]
        odds_a: Odds,
        #[arg(long)]
        odds_b: Odds,
        #[arg(short, long, default_value = "upcoming")]
        status: MatchStatus,
        #[arg(short, long)]
        winner: Option<String>,
        #[arg(long, default_value = "cricket")]
        sport: String,
    },
    CreateMatch {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        match_id: MatchId,
        #[arg(long)]
        team_a: String,
        #[arg(long)]
        team_b: String,
        #[arg(long)]
        odds_a: Odds,
        #[arg(long)]
        odds_b: Odds,
        #[arg(long, default_value = "cricket")]
        sport: String,
    },
    Match {
        #[arg(short, long)]
        match_id: MatchId,
    },
    Matches,
    PlaceWager {
        #[arg(short, long)]
        user: RowId,
        #[arg(short, long)]
        match_id: MatchId,
        #[arg(short, long)]
        team: String,
        #[arg(short, long)]
        stake: Decimal,
        #[arg(short, long)]
        odds: Odds,
        /// Seconds the wager stays open for a taker
        #[arg(short, long)]
        window: Option<u32>,
    },
    AcceptWager {
        #[arg(short, long)]
        wager: RowId,
        #[arg(short, long)]
        user: RowId,
    },
    EditWager {
        #[arg(short, long)]
        wager: RowId,
        #[arg(short, long)]
        user: RowId,
        #[arg(short, long)]
        stake: Option<Decimal>,
        #[arg(short, long)]
        odds: Option<Odds>,
    },
    CancelWager {
        #[arg(short, long)]
        wager: RowId,
        #[arg(short, long)]
        user: RowId,
    },
    OpenWagers,
    UserWagers {
        #[arg(short, long)]
        user: RowId,
    },
    AllWagers {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        status: Option<WagerStatus>,
    },
    MatchWagers {
        #[arg(short, long)]
        match_id: MatchId,
    },
    SettleWager {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        wager: RowId,
        #[arg(long)]
        winner: String,
    },
    SettleMatch {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        match_id: MatchId,
        #[arg(long)]
        winner: String,
    },
    VoidMatch {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        match_id: MatchId,
    },
    Sweep {
        #[arg(short, long)]
        admin: RowId,
    },
    Commissions {
        /// Only the entries of this match, instead of the overall summary
        #[arg(short, long)]
        match_id: Option<MatchId>,
    },
    CommissionReport {
        #[arg(short, long)]
        admin: RowId,
    },
    MarkCredited {
        #[arg(short, long)]
        admin: RowId,
        #[arg(short, long)]
        match_id: MatchId,
    },
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::CreateAccount {
            name,
            balance,
            role,
        } => {
            let request = CreateAccountRequest {
                name,
                role,
                balance,
            };
            let account = client.create_account(request).await?;
            println!("Created account {} ({})", account.id, account.name);
        }
        Commands::Account { user } => {
            print(&client.get_account(AccountRequest { user }).await?)?;
        }
        Commands::Transactions { user } => {
            print(&client.get_transactions(AccountRequest { user }).await?)?;
        }
        Commands::PendingTransactions { admin } => {
            print(&client.get_pending_transactions(AdminRequest { admin }).await?)?;
        }
        Commands::Deposit { user, amount } => {
            let transaction = client
                .request_deposit(FundsRequest { user, amount })
                .await?;
            println!("Deposit request {} awaits approval", transaction.id);
        }
        Commands::Withdraw { user, amount } => {
            let transaction = client
                .request_withdrawal(FundsRequest { user, amount })
                .await?;
            println!("Withdrawal request {} awaits approval", transaction.id);
        }
        Commands::Approve { admin, transaction } => {
            let request = TransactionDecisionRequest { admin, transaction };
            print(&client.approve_transaction(request).await?)?;
        }
        Commands::Reject { admin, transaction } => {
            let request = TransactionDecisionRequest { admin, transaction };
            print(&client.reject_transaction(request).await?)?;
        }
        Commands::PublishOdds {
            admin,
            match_id,
            team_a,
            team_b,
            odds_a,
            odds_b,
            status,
            winner,
            sport,
        } => {
            let quote = OddsQuote {
                match_id,
                sport,
                team_a,
                team_b,
                odds_a,
                odds_b,
                status,
                winner,
            };
            client
                .publish_odds(PublishOddsRequest { admin, quote })
                .await?;
        }
        Commands::CreateMatch {
            admin,
            match_id,
            team_a,
            team_b,
            odds_a,
            odds_b,
            sport,
        } => {
            let request = CreateMatchRequest {
                admin,
                match_id,
                sport,
                team_a,
                team_b,
                odds_a,
                odds_b,
            };
            print(&client.create_match(request).await?)?;
        }
        Commands::Match { match_id } => {
            print(&client.get_match(MatchRequest { match_id }).await?)?;
        }
        Commands::Matches => {
            print(&client.get_matches().await?)?;
        }
        Commands::PlaceWager {
            user,
            match_id,
            team,
            stake,
            odds,
            window,
        } => {
            let request = PlaceWagerRequest {
                user,
                match_id,
                team,
                stake,
                odds,
                accept_window_secs: window,
            };
            let wager = client.place_wager(request).await?;
            println!(
                "Placed wager {}, open for takers until {}",
                wager.id, wager.expires_at
            );
        }
        Commands::AcceptWager { wager, user } => {
            let wager = client
                .accept_wager(AcceptWagerRequest { wager, user })
                .await?;
            println!(
                "Matched wager {} with a stake of {}",
                wager.id,
                wager.taker_stake.unwrap_or_default()
            );
        }
        Commands::EditWager {
            wager,
            user,
            stake,
            odds,
        } => {
            let request = EditWagerRequest {
                wager,
                user,
                stake,
                odds,
            };
            print(&client.edit_wager(request).await?)?;
        }
        Commands::CancelWager { wager, user } => {
            client
                .cancel_wager(CancelWagerRequest { wager, user })
                .await?;
            println!("Cancelled wager {}", wager);
        }
        Commands::OpenWagers => {
            print(&client.get_open_wagers().await?)?;
        }
        Commands::UserWagers { user } => {
            print(&client.get_user_wagers(AccountRequest { user }).await?)?;
        }
        Commands::AllWagers { admin, status } => {
            let request = AdminWagersRequest { admin, status };
            print(&client.get_all_wagers(request).await?)?;
        }
        Commands::MatchWagers { match_id } => {
            print(&client.get_match_wagers(MatchRequest { match_id }).await?)?;
        }
        Commands::SettleWager {
            admin,
            wager,
            winner,
        } => {
            let request = SettleWagerRequest {
                admin,
                wager,
                winner,
            };
            print(&client.settle_wager(request).await?)?;
        }
        Commands::SettleMatch {
            admin,
            match_id,
            winner,
        } => {
            let request = SettleMatchRequest {
                admin,
                match_id,
                winner,
            };
            let settlement = client.settle_match(request).await?;
            println!(
                "Settled {} wagers, commission {}",
                settlement.wagers.len(),
                settlement.total_commission
            );
        }
        Commands::VoidMatch { admin, match_id } => {
            let refunded = client
                .void_match(VoidMatchRequest { admin, match_id })
                .await?;
            println!("Refunded {} wagers", refunded.len());
        }
        Commands::Sweep { admin } => {
            print(&client.run_sweep(AdminRequest { admin }).await?)?;
        }
        Commands::Commissions { match_id } => match match_id {
            Some(match_id) => print(&client.get_commissions(MatchRequest { match_id }).await?)?,
            None => print(&client.get_commission_summary().await?)?,
        },
        Commands::CommissionReport { admin } => {
            print(&client.get_commission_report(AdminRequest { admin }).await?)?;
        }
        Commands::MarkCredited { admin, match_id } => {
            let credited = client
                .mark_commissions_credited(AdminMatchRequest { admin, match_id })
                .await?;
            println!("Marked {} commissions credited", credited);
        }
    }
    Ok(())
}
