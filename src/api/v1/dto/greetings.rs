/*
 * Responsibility
 * - Greetings の request/response DTO
 * - リクエストのバリデーションルール (Validatable)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{Sanitizer, Schema, Validatable};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateGreetingRequest {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

impl CreateGreetingRequest {
    /// Strip markup before validation; `message` keeps basic emphasis tags.
    pub fn sanitized(self, sanitizer: &Sanitizer) -> Self {
        Self {
            name: sanitizer.sanitize_name(&self.name),
            title: self.title.map(|t| sanitizer.sanitize_title(&t)),
            message: sanitizer.sanitize_string(&self.message),
            contact_phone: self.contact_phone.map(|p| p.trim().to_string()),
        }
    }
}

impl Validatable for CreateGreetingRequest {
    fn schema() -> Schema {
        Schema::new()
            .field("name", "required,min=2,max=50,alphanumspace")
            .field("title", "omitempty,max=100")
            .field("message", "required,max=500")
            .field("contact_phone", "omitempty,phone")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Greeting {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Greeting {
    pub fn from_request(req: CreateGreetingRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: req.name,
            title: req.title.filter(|t| !t.is_empty()),
            message: req.message,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GreetingResponse {
    pub message: String,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub greeting: &'static str,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    5
}

impl PageQuery {
    pub const MAX_PAGE_SIZE: u64 = 100;

    /// page >= 1, page_size within 1..=MAX_PAGE_SIZE
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }
}
