use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    QueryFilter, SqlErr, Statement,
};
use sms_gateway_entity::accounts::{self, Entity as Accounts};
use uuid::Uuid;

use crate::error::ServiceError;

const API_KEY_BYTES: usize = 32;
const KEY_GENERATION_ATTEMPTS: usize = 5;

/// Inserts a new account with a freshly generated API key and zero balance.
/// The UNIQUE constraint on api_key arbitrates concurrent generation; on a
/// collision a new key is generated, up to [`KEY_GENERATION_ATTEMPTS`] times.
pub async fn create<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
) -> Result<accounts::Model, ServiceError> {
    for _ in 0..KEY_GENERATION_ATTEMPTS {
        let active = accounts::ActiveModel {
            id: Set(account_id),
            api_key: Set(generate_api_key()),
            balance: Set(0),
            created_at: Set(chrono::Utc::now().naive_utc()),
        };
        match active.insert(db).await {
            Ok(model) => return Ok(model),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(message))
                    if message.contains("api_key") =>
                {
                    continue;
                }
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    return Err(ServiceError::AccountExists)
                }
                _ => return Err(err.into()),
            },
        }
    }
    Err(ServiceError::KeyGenerationExhausted)
}

pub async fn get_by_api_key<C: ConnectionTrait>(
    db: &C,
    api_key: &str,
) -> Result<Option<accounts::Model>, ServiceError> {
    Ok(Accounts::find()
        .filter(accounts::Column::ApiKey.eq(api_key))
        .one(db)
        .await?)
}

pub async fn get_by_id<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
) -> Result<Option<accounts::Model>, ServiceError> {
    Ok(Accounts::find_by_id(account_id).one(db).await?)
}

/// Credits the balance with a single atomic UPDATE and returns the refreshed
/// row, or `None` when the account does not exist.
pub async fn charge<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
    amount: i32,
) -> Result<Option<accounts::Model>, ServiceError> {
    let result = db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"UPDATE "accounts" SET "balance" = "balance" + $1 WHERE "id" = $2"#,
            [amount.into(), account_id.into()],
        ))
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_by_id(db, account_id).await
}

/// Conditionally debits the balance. The `balance >= amount` predicate in the
/// UPDATE is the only thing keeping balances non-negative under concurrent
/// sends; row-level locking serializes debits per account.
pub async fn debit<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
    amount: i32,
) -> Result<bool, ServiceError> {
    let result = db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"UPDATE "accounts" SET "balance" = "balance" - $1 WHERE "id" = $2 AND "balance" >= $1"#,
            [amount.into(), account_id.into()],
        ))
        .await?;
    Ok(result.rows_affected() == 1)
}

fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_url_safe_and_unique() {
        let first = generate_api_key();
        let second = generate_api_key();
        // 32 bytes without padding encode to 43 characters
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(first, second);
    }
}
