use anyhow::Result;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::*;

pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    async fn send<R: Serialize>(&self, path: &str, request: &R) -> Result<Response> {
        let response = self
            .client
            .post(self.url.clone() + path)
            .json(request)
            .send()
            .await?;
        check_response(response).await
    }
    async fn post<R: Serialize, T: DeserializeOwned>(&self, path: &str, request: &R) -> Result<T> {
        Ok(self.send(path, request).await?.json().await?)
    }
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url.clone() + path).send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    pub async fn place_wager(&self, request: PlaceWagerRequest) -> Result<Wager> {
        self.post("/place_wager", &request).await
    }
    pub async fn accept_wager(&self, request: AcceptWagerRequest) -> Result<Wager> {
        self.post("/accept_wager", &request).await
    }
    pub async fn edit_wager(&self, request: EditWagerRequest) -> Result<Wager> {
        self.post("/edit_wager", &request).await
    }
    pub async fn cancel_wager(&self, request: CancelWagerRequest) -> Result<Wager> {
        self.post("/cancel_wager", &request).await
    }
    pub async fn settle_wager(&self, request: SettleWagerRequest) -> Result<Wager> {
        self.post("/settle_wager", &request).await
    }
    pub async fn settle_match(&self, request: SettleMatchRequest) -> Result<MatchSettlement> {
        self.post("/settle_match", &request).await
    }
    pub async fn void_match(&self, request: VoidMatchRequest) -> Result<Vec<Wager>> {
        self.post("/void_match", &request).await
    }
    pub async fn run_sweep(&self, request: AdminRequest) -> Result<SweepReport> {
        self.post("/run_sweep", &request).await
    }
    pub async fn get_open_wagers(&self) -> Result<Vec<Wager>> {
        self.get("/get_open_wagers").await
    }
    pub async fn get_user_wagers(&self, request: AccountRequest) -> Result<Vec<Wager>> {
        self.post("/get_user_wagers", &request).await
    }
    pub async fn get_all_wagers(&self, request: AdminWagersRequest) -> Result<Vec<Wager>> {
        self.post("/get_all_wagers", &request).await
    }
    pub async fn get_match_wagers(&self, request: MatchRequest) -> Result<Vec<Wager>> {
        self.post("/get_match_wagers", &request).await
    }

    pub async fn create_account(&self, request: CreateAccountRequest) -> Result<Account> {
        self.post("/create_account", &request).await
    }
    pub async fn get_account(&self, request: AccountRequest) -> Result<Account> {
        self.post("/get_account", &request).await
    }
    pub async fn request_deposit(&self, request: FundsRequest) -> Result<Transaction> {
        self.post("/request_deposit", &request).await
    }
    pub async fn request_withdrawal(&self, request: FundsRequest) -> Result<Transaction> {
        self.post("/request_withdrawal", &request).await
    }
    pub async fn approve_transaction(
        &self,
        request: TransactionDecisionRequest,
    ) -> Result<Transaction> {
        self.post("/approve_transaction", &request).await
    }
    pub async fn reject_transaction(
        &self,
        request: TransactionDecisionRequest,
    ) -> Result<Transaction> {
        self.post("/reject_transaction", &request).await
    }
    pub async fn get_pending_transactions(&self, request: AdminRequest) -> Result<Vec<Transaction>> {
        self.post("/get_pending_transactions", &request).await
    }
    pub async fn get_transactions(&self, request: AccountRequest) -> Result<Vec<Transaction>> {
        self.post("/get_transactions", &request).await
    }

    pub async fn publish_odds(&self, request: PublishOddsRequest) -> Result<()> {
        self.send("/publish_odds", &request).await?;
        Ok(())
    }
    pub async fn create_match(&self, request: CreateMatchRequest) -> Result<Match> {
        self.post("/create_match", &request).await
    }
    pub async fn get_match(&self, request: MatchRequest) -> Result<Match> {
        self.post("/get_match", &request).await
    }
    pub async fn get_matches(&self) -> Result<Vec<Match>> {
        self.get("/get_matches").await
    }

    pub async fn get_commission_summary(&self) -> Result<CommissionSummary> {
        self.get("/get_commission_summary").await
    }
    pub async fn get_commissions(&self, request: MatchRequest) -> Result<Vec<Commission>> {
        self.post("/get_commissions", &request).await
    }
    pub async fn get_commission_report(
        &self,
        request: AdminRequest,
    ) -> Result<Vec<CommissionReportRow>> {
        self.post("/get_commission_report", &request).await
    }
    pub async fn mark_commissions_credited(&self, request: AdminMatchRequest) -> Result<u64> {
        self.post("/mark_commissions_credited", &request).await
    }
}
