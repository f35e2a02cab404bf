//! Store-level pipeline tests. They need a live Postgres reachable through
//! `DATABASE_URL` and are ignored by default; accounts are minted per test so
//! a shared database is fine.

use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use sms_gateway_logic::{
    admission::{self, SendSmsRequest},
    error::ServiceError,
    repository,
    types::SmsStatus,
};
use uuid::Uuid;

async fn init_db() -> DatabaseConnection {
    let url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must point to a postgres instance");
    let db = Database::connect(url).await.expect("failed to connect");
    Migrator::up(&db, None).await.expect("failed to run migrations");
    db
}

async fn account_with_balance(db: &DatabaseConnection, balance: i32) -> Uuid {
    let account = repository::accounts::create(db, Uuid::new_v4())
        .await
        .expect("failed to create account");
    if balance > 0 {
        repository::accounts::charge(db, account.id, balance)
            .await
            .expect("failed to charge account");
    }
    account.id
}

fn send_request(sms_type: Option<i16>) -> SendSmsRequest {
    SendSmsRequest {
        phone_number: "+15551234567".to_string(),
        message: "hi".to_string(),
        sms_type,
    }
}

#[derive(FromQueryResult)]
struct CountRow {
    count: i64,
}

async fn queued_task_count(db: &DatabaseConnection, sms_id: Uuid, task_type: &str) -> i64 {
    CountRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"SELECT count(*) AS "count" FROM "fang_tasks" WHERE "metadata"->>'sms_id' = $1 AND "task_type" = $2"#,
        [sms_id.to_string().into(), task_type.into()],
    ))
    .one(db)
    .await
    .unwrap()
    .unwrap()
    .count
}

#[tokio::test]
#[ignore = "needs a live postgres (set DATABASE_URL)"]
async fn concurrent_sends_never_overdraw() {
    let db = init_db().await;
    let account_id = account_with_balance(&db, 10).await;

    let sends = (0..100).map(|_| {
        let db = db.clone();
        async move { admission::send_sms(&db, account_id, &send_request(None)).await }
    });
    let results = futures::future::join_all(sends).await;

    let admitted = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(ServiceError::InsufficientBalance)))
        .count();
    assert_eq!(admitted, 10);
    assert_eq!(rejected, 90);

    assert_eq!(admission::get_balance(&db, account_id).await.unwrap(), 0);

    let page = admission::list_sms(&db, account_id, &Default::default())
        .await
        .unwrap();
    assert_eq!(page.total, 10);
}

#[tokio::test]
#[ignore = "needs a live postgres (set DATABASE_URL)"]
async fn admission_commits_message_and_queue_task_atomically() {
    let db = init_db().await;
    let account_id = account_with_balance(&db, 1).await;

    let sms = admission::send_sms(&db, account_id, &send_request(Some(2)))
        .await
        .unwrap();
    assert_eq!(sms.status, i16::from(SmsStatus::Pending));
    assert_eq!(sms.sms_type, 2);
    assert!(sms.sent_at.is_none());
    // the outbox row committed with the message, on the express queue
    assert_eq!(queued_task_count(&db, sms.id, "express").await, 1);

    // the balance is spent; a further send leaves no partial writes behind
    let err = admission::send_sms(&db, account_id, &send_request(None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientBalance));
    let page = admission::list_sms(&db, account_id, &Default::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
#[ignore = "needs a live postgres (set DATABASE_URL)"]
async fn terminal_statuses_are_monotonic() {
    let db = init_db().await;
    let account_id = account_with_balance(&db, 1).await;
    let sms = admission::send_sms(&db, account_id, &send_request(None))
        .await
        .unwrap();

    let sent_at = chrono::Utc::now().naive_utc();
    let (sent, failed) = repository::sms::batch_update(&db, &[sms.id], &[], sent_at)
        .await
        .unwrap();
    assert_eq!((sent, failed), (1, 0));

    // a redelivered FAILED settlement must not demote the SENT row
    let (sent, failed) = repository::sms::batch_update(&db, &[], &[sms.id], sent_at)
        .await
        .unwrap();
    assert_eq!((sent, failed), (0, 0));

    // repeating the SENT settlement is a no-op as well
    let (sent, failed) = repository::sms::batch_update(&db, &[sms.id], &[], sent_at)
        .await
        .unwrap();
    assert_eq!((sent, failed), (0, 0));

    let stored = repository::sms::get(&db, sms.id).await.unwrap().unwrap();
    assert_eq!(stored.status, i16::from(SmsStatus::Sent));
    assert!(stored.sent_at.is_some());
}

#[tokio::test]
#[ignore = "needs a live postgres (set DATABASE_URL)"]
async fn debit_is_conditional_and_charge_is_atomic() {
    let db = init_db().await;
    let account_id = account_with_balance(&db, 0).await;

    assert!(!repository::accounts::debit(&db, account_id, 1).await.unwrap());

    let account = repository::accounts::charge(&db, account_id, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.balance, 5);

    for _ in 0..5 {
        assert!(repository::accounts::debit(&db, account_id, 1).await.unwrap());
    }
    assert!(!repository::accounts::debit(&db, account_id, 1).await.unwrap());
    assert_eq!(admission::get_balance(&db, account_id).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "needs a live postgres (set DATABASE_URL)"]
async fn creating_the_same_account_twice_conflicts() {
    let db = init_db().await;
    let account_id = Uuid::new_v4();

    admission::create_account(&db, account_id).await.unwrap();
    let err = admission::create_account(&db, account_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::AccountExists));
}
