use std::net::TcpListener;

use actix_web::{
    dev::Server,
    error::InternalError,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use sea_orm::DatabaseConnection;
use sms_gateway_logic::auth::AuthCache;
use tracing_actix_web::TracingLogger;

use crate::{
    routes::{self, AppState},
    settings::Settings,
};

pub fn run(
    settings: Settings,
    db: DatabaseConnection,
    auth: AuthCache,
) -> Result<Server, std::io::Error> {
    let listener = TcpListener::bind(settings.server.addr)?;
    let state = Data::new(AppState { db, auth });
    let prefix = settings.api.prefix.clone();

    let server = HttpServer::new(move || {
        // malformed bodies and query strings are validation failures, not
        // bad requests
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            let message = err.to_string();
            InternalError::from_response(
                err,
                HttpResponse::UnprocessableEntity()
                    .json(serde_json::json!({ "message": message })),
            )
            .into()
        });
        let query_config = web::QueryConfig::default().error_handler(|err, _req| {
            let message = err.to_string();
            InternalError::from_response(
                err,
                HttpResponse::UnprocessableEntity()
                    .json(serde_json::json!({ "message": message })),
            )
            .into()
        });

        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .app_data(json_config)
            .app_data(query_config)
            .route("/health", web::get().to(routes::health))
            .service(
                web::scope(&prefix)
                    .route("/accounts", web::post().to(routes::accounts::create_account))
                    .route(
                        "/accounts/balance",
                        web::get().to(routes::accounts::get_balance),
                    )
                    .route("/accounts/charge", web::post().to(routes::accounts::charge))
                    .route("/sms/send", web::post().to(routes::sms::send_sms))
                    .route("/sms", web::get().to(routes::sms::list_sms))
                    .route("/sms/{sms_id}", web::get().to(routes::sms::get_sms)),
            )
    })
    .listen(listener)?
    .run();
    Ok(server)
}
