use chrono::NaiveDateTime;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use sms_gateway_entity::{accounts, sms};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    queue, repository,
    types::{SmsStatus, SmsType},
    validation,
    workers::ProcessSms,
};

/// Cost of a single message in balance units.
const SEND_COST: i32 = 1;
const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct SendSmsRequest {
    pub phone_number: String,
    pub message: String,
    #[serde(default)]
    pub sms_type: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSmsQuery {
    pub status: Option<i16>,
    pub sms_type: Option<i16>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug)]
pub struct SmsPage {
    pub items: Vec<sms::Model>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

pub async fn create_account(
    db: &DatabaseConnection,
    account_id: Uuid,
) -> Result<accounts::Model, ServiceError> {
    if repository::accounts::get_by_id(db, account_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::AccountExists);
    }
    repository::accounts::create(db, account_id).await
}

/// Reads the balance from the store rather than the auth snapshot, so
/// charges and debits are visible immediately.
pub async fn get_balance(
    db: &DatabaseConnection,
    account_id: Uuid,
) -> Result<i32, ServiceError> {
    let account = repository::accounts::get_by_id(db, account_id)
        .await?
        .ok_or(ServiceError::NotFound("account"))?;
    Ok(account.balance)
}

pub async fn charge(
    db: &DatabaseConnection,
    account_id: Uuid,
    amount: i32,
) -> Result<i32, ServiceError> {
    if amount <= 0 {
        return Err(ServiceError::validation(
            "amount",
            "amount must be positive",
        ));
    }
    let account = repository::accounts::charge(db, account_id, amount)
        .await?
        .ok_or(ServiceError::NotFound("account"))?;
    Ok(account.balance)
}

/// Admits a message: validates, then debits the balance, inserts the PENDING
/// row and writes the queue task in one transaction. The task insert is the
/// outbox write; a failure at any step rolls the whole admission back, so a
/// committed debit always has a matching message and queue entry.
pub async fn send_sms(
    db: &DatabaseConnection,
    account_id: Uuid,
    request: &SendSmsRequest,
) -> Result<sms::Model, ServiceError> {
    validation::validate_phone_number(&request.phone_number)?;
    validation::validate_message(&request.message)?;
    let sms_type = validation::parse_sms_type(request.sms_type)?;

    let txn = db.begin().await?;

    if !repository::accounts::debit(&txn, account_id, SEND_COST).await? {
        txn.rollback().await?;
        return Err(ServiceError::InsufficientBalance);
    }

    let sms = repository::sms::insert(
        &txn,
        account_id,
        &request.phone_number,
        &request.message,
        sms_type,
    )
    .await?;

    let task = ProcessSms {
        sms_id: sms.id,
        account_id,
        phone_number: sms.phone_number.clone(),
        message: sms.message.clone(),
        sms_type,
    };
    queue::enqueue_in(&txn, &task).await?;

    txn.commit().await?;

    tracing::info!(
        sms_id = %sms.id,
        account_id = %account_id,
        queue = queue::queue_for(sms_type),
        "message admitted"
    );
    Ok(sms)
}

pub async fn get_sms(
    db: &DatabaseConnection,
    account_id: Uuid,
    sms_id: Uuid,
) -> Result<sms::Model, ServiceError> {
    let sms = repository::sms::get(db, sms_id)
        .await?
        .ok_or(ServiceError::NotFound("sms"))?;
    if sms.account_id != account_id {
        return Err(ServiceError::Forbidden);
    }
    Ok(sms)
}

pub async fn list_sms(
    db: &DatabaseConnection,
    account_id: Uuid,
    query: &ListSmsQuery,
) -> Result<SmsPage, ServiceError> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(ServiceError::validation("page", "page must be at least 1"));
    }
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ServiceError::validation(
            "page_size",
            format!("page_size must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    let filter = repository::sms::ListFilter {
        status: query
            .status
            .map(SmsStatus::try_from)
            .transpose()
            .map_err(|_| ServiceError::validation("status", "status must be 1, 2 or 3"))?,
        sms_type: query
            .sms_type
            .map(SmsType::try_from)
            .transpose()
            .map_err(|_| {
                ServiceError::validation("sms_type", "sms_type must be 1 (regular) or 2 (express)")
            })?,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let (items, total) = repository::sms::list(db, account_id, &filter, page, page_size).await?;
    Ok(SmsPage {
        items,
        total,
        page,
        page_size,
    })
}
