use actix_web::{
    web::{Data, Json, Path, Query},
    HttpRequest, HttpResponse,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use sms_gateway_entity::sms;
use sms_gateway_logic::admission::{self, ListSmsQuery, SendSmsRequest, SmsPage};
use uuid::Uuid;

use super::{authenticate, ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct SmsResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub phone_number: String,
    pub message: String,
    pub sms_type: i16,
    pub status: i16,
    pub created_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
}

impl From<sms::Model> for SmsResponse {
    fn from(sms: sms::Model) -> Self {
        Self {
            id: sms.id,
            account_id: sms.account_id,
            phone_number: sms.phone_number,
            message: sms.message,
            sms_type: sms.sms_type,
            status: sms.status,
            created_at: sms.created_at,
            sent_at: sms.sent_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SmsListResponse {
    pub items: Vec<SmsResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl From<SmsPage> for SmsListResponse {
    fn from(page: SmsPage) -> Self {
        Self {
            items: page.items.into_iter().map(SmsResponse::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

pub async fn send_sms(
    state: Data<AppState>,
    request: HttpRequest,
    body: Json<SendSmsRequest>,
) -> Result<HttpResponse, ApiError> {
    let account = authenticate(&state, &request).await?;
    let sms = admission::send_sms(&state.db, account.id, &body).await?;
    Ok(HttpResponse::Created().json(SmsResponse::from(sms)))
}

pub async fn list_sms(
    state: Data<AppState>,
    request: HttpRequest,
    query: Query<ListSmsQuery>,
) -> Result<HttpResponse, ApiError> {
    let account = authenticate(&state, &request).await?;
    let page = admission::list_sms(&state.db, account.id, &query).await?;
    Ok(HttpResponse::Ok().json(SmsListResponse::from(page)))
}

pub async fn get_sms(
    state: Data<AppState>,
    request: HttpRequest,
    sms_id: Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let account = authenticate(&state, &request).await?;
    let sms = admission::get_sms(&state.db, account.id, sms_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SmsResponse::from(sms)))
}
