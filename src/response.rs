// src/response.rs
//
// JSON envelopes shared by every endpoint.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: Option<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message,
            data,
            error: None,
        }
    }
}

impl Envelope<()> {
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// 200 with data and no message.
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::success(None, Some(data)))
}

pub fn ok_with<T: Serialize>(status: StatusCode, message: &str, data: T) -> HttpResponse {
    HttpResponse::build(status).json(Envelope::success(Some(message.to_string()), Some(data)))
}

pub fn message(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::<()>::success(Some(message.to_string()), None))
}

pub fn paginated<T: Serialize>(data: Vec<T>, page: &Page, total: i64) -> HttpResponse {
    HttpResponse::Ok().json(Paginated {
        success: true,
        data,
        page: page.page,
        limit: page.limit,
        total,
        total_pages: page.total_pages(total),
    })
}

pub const MAX_PAGE_LIMIT: i64 = 100;
/// Keeps `(page - 1) * limit` inside i64 for any accepted limit.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn resolve(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_caps() {
        assert_eq!(Page::resolve(None, None, 12), Page { page: 1, limit: 12 });
        assert_eq!(Page::resolve(Some(0), Some(-5), 20), Page { page: 1, limit: 20 });
        assert_eq!(Page::resolve(Some(3), Some(500), 12), Page { page: 3, limit: MAX_PAGE_LIMIT });
    }

    #[test]
    fn page_offset_and_total_pages() {
        let page = Page::resolve(Some(3), Some(12), 12);
        assert_eq!(page.offset(), 24);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(12), 1);
        assert_eq!(page.total_pages(25), 3);
    }

    #[test]
    fn huge_page_is_clamped() {
        let page = Page::resolve(Some(i64::MAX), Some(12), 12);
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);

        let page = Page::resolve(Some(i64::MAX), Some(500), 12);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * MAX_PAGE_LIMIT);
    }

    #[test]
    fn paginated_uses_camel_case_total_pages() {
        let body = serde_json::to_value(Paginated {
            success: true,
            data: vec![1, 2],
            page: 1,
            limit: 2,
            total: 5,
            total_pages: 3,
        })
        .expect("serialize");
        assert_eq!(body["totalPages"], 3);
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn success_envelope_omits_empty_fields() {
        let body = serde_json::to_value(Envelope::<()>::success(Some("Cart cleared".into()), None)).expect("serialize");
        assert_eq!(body, serde_json::json!({"success": true, "message": "Cart cleared"}));
    }
}
