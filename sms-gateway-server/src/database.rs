use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

use crate::settings::DatabaseSettings;

pub async fn initialize_postgres(
    settings: &DatabaseSettings,
) -> Result<DatabaseConnection, anyhow::Error> {
    if settings.create_database {
        create_database(&settings.url).await?;
    }

    let db = Database::connect(settings.url.as_str()).await?;
    if settings.run_migrations {
        Migrator::up(&db, None).await?;
    }
    Ok(db)
}

async fn create_database(db_url: &str) -> Result<(), anyhow::Error> {
    let (base_url, db_name) = {
        let mut url = url::Url::parse(db_url)?;
        let db_name = url.path().trim_start_matches('/').to_string();
        url.set_path("");
        (url, db_name)
    };

    tracing::info!("creating database '{db_name}'");
    let db = Database::connect(base_url.as_str()).await?;
    let result = db
        .execute(Statement::from_string(
            DbBackend::Postgres,
            format!(r#"CREATE DATABASE "{db_name}""#),
        ))
        .await;
    match result {
        Ok(_) => tracing::info!("database '{db_name}' created"),
        Err(err) if err.to_string().contains("already exists") => {
            tracing::info!("database '{db_name}' already exists")
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
