use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Statement, TransactionTrait,
};
use sms_gateway_entity::sms::{self, Entity as Sms};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    types::{SmsStatus, SmsType},
};

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<SmsStatus>,
    pub sms_type: Option<SmsType>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
    phone_number: &str,
    message: &str,
    sms_type: SmsType,
) -> Result<sms::Model, ServiceError> {
    let active = sms::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(account_id),
        phone_number: Set(phone_number.to_string()),
        message: Set(message.to_string()),
        sms_type: Set(sms_type.into()),
        status: Set(SmsStatus::Pending.into()),
        created_at: Set(chrono::Utc::now().naive_utc()),
        sent_at: Set(None),
    };
    Ok(active.insert(db).await?)
}

/// Looks a message up by id alone. Ids are minted as UUIDv4 and unique in
/// practice even though the table's primary key is (id, created_at).
pub async fn get<C: ConnectionTrait>(
    db: &C,
    sms_id: Uuid,
) -> Result<Option<sms::Model>, ServiceError> {
    Ok(Sms::find()
        .filter(sms::Column::Id.eq(sms_id))
        .one(db)
        .await?)
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
    filter: &ListFilter,
    page: u64,
    page_size: u64,
) -> Result<(Vec<sms::Model>, u64), ServiceError> {
    let mut query = Sms::find().filter(sms::Column::AccountId.eq(account_id));
    if let Some(status) = filter.status {
        query = query.filter(sms::Column::Status.eq(i16::from(status)));
    }
    if let Some(sms_type) = filter.sms_type {
        query = query.filter(sms::Column::SmsType.eq(i16::from(sms_type)));
    }
    if let Some(start_date) = filter.start_date {
        query = query.filter(sms::Column::CreatedAt.gte(start_date));
    }
    if let Some(end_date) = filter.end_date {
        query = query.filter(sms::Column::CreatedAt.lte(end_date));
    }

    let paginator = query
        .order_by_desc(sms::Column::CreatedAt)
        .paginate(db, page_size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((items, total))
}

/// Applies terminal statuses for a drained settlement batch: at most one
/// UPDATE for the SENT ids and one for the FAILED ids, both in a single
/// transaction. The `status = PENDING` guard keeps transitions monotonic and
/// makes redelivered settlements a no-op.
pub async fn batch_update<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    sent_ids: &[Uuid],
    failed_ids: &[Uuid],
    sent_at: NaiveDateTime,
) -> Result<(u64, u64), ServiceError> {
    if sent_ids.is_empty() && failed_ids.is_empty() {
        return Ok((0, 0));
    }

    let txn = db.begin().await?;
    let mut sent_count = 0;
    if !sent_ids.is_empty() {
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"UPDATE "sms" SET "status" = $1, "sent_at" = $2 WHERE "id" = ANY($3) AND "status" = $4"#,
                [
                    i16::from(SmsStatus::Sent).into(),
                    sent_at.into(),
                    sent_ids.to_vec().into(),
                    i16::from(SmsStatus::Pending).into(),
                ],
            ))
            .await?;
        sent_count = result.rows_affected();
    }
    let mut failed_count = 0;
    if !failed_ids.is_empty() {
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"UPDATE "sms" SET "status" = $1 WHERE "id" = ANY($2) AND "status" = $3"#,
                [
                    i16::from(SmsStatus::Failed).into(),
                    failed_ids.to_vec().into(),
                    i16::from(SmsStatus::Pending).into(),
                ],
            ))
            .await?;
        failed_count = result.rows_affected();
    }
    txn.commit().await?;
    Ok((sent_count, failed_count))
}
