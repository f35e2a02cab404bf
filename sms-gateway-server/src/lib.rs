mod database;
mod routes;
mod server;
mod settings;
mod tracer;

pub use server::run as run_server;
pub use settings::Settings;

/********** run application **********/

use anyhow::Context;
use sms_gateway_logic::{
    auth::AuthCache, dispatcher::OperatorClient, settlement::buffer::SettlementBuffer, workers,
};

pub async fn run(settings: Settings) -> Result<(), anyhow::Error> {
    tracer::init_logs(&settings.tracing);

    let db_connection = database::initialize_postgres(&settings.database).await?;

    let auth = AuthCache::new(&settings.cache)
        .await
        .context("auth cache initialization failed")?;
    let buffer = SettlementBuffer::new(&settings.buffer)
        .await
        .context("settlement buffer initialization failed")?;
    let dispatcher = OperatorClient::new(settings.dispatcher.clone());

    workers::run(
        db_connection.clone(),
        &settings.database.url,
        dispatcher,
        buffer,
        &settings.workers,
        &settings.settler,
        &settings.sweeper,
    )
    .await?;

    run_server(settings, db_connection, auth)?.await?;
    Ok(())
}
