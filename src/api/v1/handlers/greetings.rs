/*
 * Responsibility
 * - GET  /greeting            有効な bearer token があれば名前入りで返す
 * - POST /greetings           sanitize → validate → 201
 * - GET  /greetings/languages ページング付き一覧
 */
use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::Response,
};
use serde_json::json;

use crate::api::v1::dto::greetings::{
    CreateGreetingRequest, Greeting, GreetingResponse, Language, PageQuery,
};
use crate::error::AppError;
use crate::extractors::MaybeUser;
use crate::logger::Logger;
use crate::response;
use crate::state::AppState;

const SERVICE: &str = "greetings";

pub const LANGUAGES: [Language; 12] = [
    Language { code: "en", greeting: "Hello" },
    Language { code: "es", greeting: "Hola" },
    Language { code: "fr", greeting: "Bonjour" },
    Language { code: "de", greeting: "Hallo" },
    Language { code: "it", greeting: "Ciao" },
    Language { code: "pt", greeting: "Olá" },
    Language { code: "nl", greeting: "Hallo" },
    Language { code: "sv", greeting: "Hej" },
    Language { code: "fi", greeting: "Hei" },
    Language { code: "ja", greeting: "こんにちは" },
    Language { code: "ko", greeting: "안녕하세요" },
    Language { code: "sw", greeting: "Jambo" },
];

pub async fn greeting(MaybeUser(user): MaybeUser) -> Response {
    let body = match user {
        Some(user) => GreetingResponse {
            message: format!("Hello, {}!", user.name),
            authenticated: true,
        },
        None => GreetingResponse {
            message: "Hello, guest!".to_string(),
            authenticated: false,
        },
    };
    response::success(body)
}

pub async fn create_greeting(
    State(state): State<AppState>,
    payload: Result<Json<CreateGreetingRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload.map_err(|rej| AppError::invalid_input(rej.body_text()))?;
    let req = req.sanitized(&state.sanitizer);

    let log = Logger::for_request(SERVICE);
    if let Some(err) = state.validator.validate(&req).to_app_error() {
        log.info(
            "greeting rejected",
            Some(json!({ "details": err.detail_text() })),
        );
        return Ok(response::validation_error(err));
    }

    let greeting = Greeting::from_request(req);
    log.info("greeting created", Some(json!({ "greeting_id": greeting.id })));
    Ok(response::created(greeting))
}

pub async fn list_languages(
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|rej| AppError::invalid_input(rej.body_text()))?;
    let PageQuery { page, page_size } = query.normalized();
    let total = LANGUAGES.len() as u64;

    let start = ((page - 1).saturating_mul(page_size)).min(total) as usize;
    let end = (start as u64 + page_size).min(total) as usize;

    Ok(response::paginated(&LANGUAGES[start..end], page, page_size, total))
}
