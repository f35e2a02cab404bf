use actix_web::{
    web::{Data, Json},
    HttpRequest, HttpResponse,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sms_gateway_entity::accounts;
use sms_gateway_logic::admission;
use uuid::Uuid;

use super::{authenticate, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub account_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub api_key: String,
    pub balance: i32,
    pub created_at: NaiveDateTime,
}

impl From<accounts::Model> for AccountResponse {
    fn from(account: accounts::Model) -> Self {
        Self {
            id: account.id,
            api_key: account.api_key,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i32,
}

pub async fn create_account(
    state: Data<AppState>,
    body: Json<CreateAccountRequest>,
) -> Result<HttpResponse, ApiError> {
    let account = admission::create_account(&state.db, body.account_id).await?;
    Ok(HttpResponse::Created().json(AccountResponse::from(account)))
}

pub async fn get_balance(
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let account = authenticate(&state, &request).await?;
    let balance = admission::get_balance(&state.db, account.id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { balance }))
}

pub async fn charge(
    state: Data<AppState>,
    request: HttpRequest,
    body: Json<ChargeRequest>,
) -> Result<HttpResponse, ApiError> {
    let account = authenticate(&state, &request).await?;
    let balance = admission::charge(&state.db, account.id, body.amount).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { balance }))
}
