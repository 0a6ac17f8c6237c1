//! Email classification route: mask PII, then predict the category.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mailmask_pii::EntityRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/classify", post(classify_email))
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email_body: String,
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub input_email_body: String,
    pub list_of_masked_entities: Vec<EntityRecord>,
    pub masked_email: String,
    pub category_of_the_email: String,
}

fn internal_error(detail: impl ToString) -> Response {
    let detail = detail.to_string();
    error!("Classification failed: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}

/// POST /classify
async fn classify_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return internal_error(rejection.body_text()),
    };

    let masked = match state.masker.mask(&req.email_body) {
        Ok(m) => m,
        Err(e) => return internal_error(e),
    };
    let category = match state.classifier.predict(&masked.masked_text) {
        Ok(c) => c,
        Err(e) => return internal_error(e),
    };
    debug!(
        "Classified email: {} entities masked, category={}",
        masked.entities.len(),
        category
    );

    Json(EmailResponse {
        input_email_body: req.email_body,
        list_of_masked_entities: masked.entities,
        masked_email: masked.masked_text,
        category_of_the_email: category,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use mailmask_classify::CategoryClassifier;
    use mailmask_core::{Error, MailMaskConfig};
    use mailmask_pii::{HeuristicRecognizer, Masker};
    use tower::ServiceExt;

    /// Returns "Billing" when the masked text mentions a refund, else "General".
    struct KeywordClassifier {
        classes: Vec<String>,
    }

    impl CategoryClassifier for KeywordClassifier {
        fn predict(&self, text: &str) -> mailmask_core::Result<String> {
            if text.contains("@") {
                return Err(Error::Classifier("raw email address reached the classifier".into()));
            }
            Ok(if text.contains("refund") { "Billing" } else { "General" }.to_string())
        }

        fn classes(&self) -> &[String] {
            &self.classes
        }
    }

    struct FailingClassifier;

    impl CategoryClassifier for FailingClassifier {
        fn predict(&self, _text: &str) -> mailmask_core::Result<String> {
            Err(Error::Classifier("model exploded".into()))
        }

        fn classes(&self) -> &[String] {
            &[]
        }
    }

    fn app(classifier: Arc<dyn CategoryClassifier>) -> Router {
        let dir = std::env::temp_dir();
        let state = AppState::new(
            MailMaskConfig::from_env(dir),
            Masker::new(Arc::new(HeuristicRecognizer::new())),
            classifier,
        );
        crate::routes::build_router(Arc::new(state))
    }

    fn keyword_app() -> Router {
        app(Arc::new(KeywordClassifier {
            classes: vec!["Billing".into(), "General".into()],
        }))
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(
                Request::post("/classify")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_classify_masks_before_predicting() {
        let body = r#"{"email_body":"Please refund me. Contact John Smith at john@x.com"}"#;
        let (status, json) = post_json(keyword_app(), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["input_email_body"],
            "Please refund me. Contact John Smith at john@x.com"
        );
        assert_eq!(
            json["masked_email"],
            "Please refund me. Contact [full_name] at [email]"
        );
        assert_eq!(json["category_of_the_email"], "Billing");

        let entities = json["list_of_masked_entities"].as_array().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0]["classification"], "email");
        assert_eq!(entities[0]["entity"], "john@x.com");
        assert_eq!(entities[1]["classification"], "full_name");
        assert_eq!(entities[1]["position"], serde_json::json!([26, 36]));
    }

    #[tokio::test]
    async fn test_response_fields() {
        let body = r#"{"email_body":"Hi, my phone is +91 9876543210 and DOB 01/02/1990"}"#;
        let (status, json) = post_json(keyword_app(), body).await;
        assert_eq!(status, StatusCode::OK);

        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "category_of_the_email",
                "input_email_body",
                "list_of_masked_entities",
                "masked_email",
            ]
        );
        let masked = json["masked_email"].as_str().unwrap();
        assert!(masked.contains("[phone_number]"));
        assert!(masked.contains("[dob]"));
        assert!(!masked.contains("9876543210"));
    }

    #[tokio::test]
    async fn test_classify_without_pii() {
        let (status, json) = post_json(keyword_app(), r#"{"email_body":"hello there"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["masked_email"], "hello there");
        assert_eq!(json["list_of_masked_entities"], serde_json::json!([]));
        assert_eq!(json["category_of_the_email"], "General");
    }

    #[tokio::test]
    async fn test_classifier_failure_returns_detail() {
        let (status, json) = post_json(app(Arc::new(FailingClassifier)), r#"{"email_body":"hi"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["detail"].as_str().unwrap().contains("model exploded"));
    }

    #[tokio::test]
    async fn test_missing_field_returns_detail() {
        let (status, json) = post_json(keyword_app(), r#"{"body":"hi"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let resp = keyword_app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({ "Status": "Running" }));
    }
}
