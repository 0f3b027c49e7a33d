//! Stripe REST implementation of [`PaymentProvider`].
//!
//! Requests are form encoded the way the Stripe API expects, with nested
//! parameters flattened to `items[0][price]` / `metadata[key]` keys.

use super::payment::PaymentProvider;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use saaskit_core::constants::WEBHOOK_TOLERANCE_SECS;
use saaskit_core::models::{
    CheckoutParams, CheckoutSession, CreatePaymentSubscriptionParams, PaymentSubscription,
    PaymentSubscriptionStatus, PortalSession, WebhookEvent,
};
use saaskit_core::AppError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

type Form = Vec<(String, String)>;

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePortalSession {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    customer: Value,
    status: PaymentSubscriptionStatus,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    items: StripeList<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionItem {
    price: StripeId,
    #[serde(default)]
    current_period_end: Option<i64>,
}

enum StripeFailure {
    Missing,
    Other(String),
}

fn metadata_form(form: &mut Form, metadata: &Map<String, Value>) {
    for (key, value) in metadata {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form.push((format!("metadata[{}]", key), value));
    }
}

fn map_subscription(sub: StripeSubscription) -> Result<PaymentSubscription, AppError> {
    let customer_id = match &sub.customer {
        Value::String(id) => id.clone(),
        Value::Object(obj) => obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    let item = sub.items.data.first();
    let price_id = item.map(|i| i.price.id.clone()).unwrap_or_default();
    let period_end = sub
        .current_period_end
        .or_else(|| item.and_then(|i| i.current_period_end))
        .ok_or_else(|| {
            AppError::payment("Map subscription", "missing current_period_end")
        })?;
    let current_period_end: DateTime<Utc> = Utc
        .timestamp_opt(period_end, 0)
        .single()
        .ok_or_else(|| AppError::payment("Map subscription", "invalid current_period_end"))?;

    Ok(PaymentSubscription {
        id: sub.id,
        customer_id,
        price_id,
        status: sub.status,
        current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
    })
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>]`) against
/// the payload. Any matching `v1` signature passes.
pub fn verify_webhook_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        AppError::WebhookSignature(
            "Unable to extract timestamp and signatures from header".to_string(),
        )
    })?;
    if signatures.is_empty() {
        return Err(AppError::WebhookSignature(
            "No signatures found with expected scheme".to_string(),
        ));
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    let matched = signatures
        .iter()
        .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
    if !matched {
        return Err(AppError::WebhookSignature(
            "No signatures found matching the expected signature for payload".to_string(),
        ));
    }

    if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS {
        return Err(AppError::WebhookSignature(
            "Timestamp outside the tolerance zone".to_string(),
        ));
    }

    Ok(())
}

#[derive(Clone)]
pub struct StripePaymentProvider {
    client: Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
}

impl StripePaymentProvider {
    pub fn new(client: Client, secret_key: &str, webhook_secret: &str) -> Self {
        Self::with_base_url(client, STRIPE_API_BASE, secret_key, webhook_secret)
    }

    /// Point the client at another host (used against mock servers in tests).
    pub fn with_base_url(
        client: Client,
        base_url: &str,
        secret_key: &str,
        webhook_secret: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Option<&Form>,
    ) -> Result<T, StripeFailure> {
        let mut request = self
            .client
            .request(method, format!("{}/v1{}", self.base_url, path))
            .bearer_auth(&self.secret_key);
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StripeFailure::Other(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| StripeFailure::Other(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<StripeErrorBody>(&body) {
            Ok(parsed) if parsed.error.code.as_deref() == Some("resource_missing") => {
                Err(StripeFailure::Missing)
            }
            Ok(parsed) => Err(StripeFailure::Other(
                parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            )),
            Err(_) if status == StatusCode::NOT_FOUND => Err(StripeFailure::Missing),
            Err(_) => Err(StripeFailure::Other(format!("HTTP {}", status.as_u16()))),
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        form: Option<&Form>,
    ) -> Result<T, AppError> {
        self.call(method, path, form).await.map_err(|failure| match failure {
            StripeFailure::Missing => AppError::payment(operation, "No such resource"),
            StripeFailure::Other(msg) => AppError::payment(operation, msg),
        })
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    #[tracing::instrument(skip(self, email, metadata), fields(payment.operation = "create_customer"))]
    async fn create_customer(
        &self,
        email: &str,
        metadata: Map<String, Value>,
    ) -> Result<String, AppError> {
        let mut form: Form = vec![("email".to_string(), email.to_string())];
        metadata_form(&mut form, &metadata);

        let customer: StripeId = self
            .execute("Create customer", Method::POST, "/customers", Some(&form))
            .await?;
        Ok(customer.id)
    }

    #[tracing::instrument(skip(self, params), fields(payment.operation = "create_subscription"))]
    async fn create_subscription(
        &self,
        params: CreatePaymentSubscriptionParams,
    ) -> Result<PaymentSubscription, AppError> {
        let mut form: Form = vec![
            ("customer".to_string(), params.customer_id),
            ("items[0][price]".to_string(), params.price_id),
        ];
        metadata_form(&mut form, &params.metadata);

        let sub: StripeSubscription = self
            .execute("Create subscription", Method::POST, "/subscriptions", Some(&form))
            .await?;
        map_subscription(sub)
    }

    #[tracing::instrument(skip(self), fields(payment.operation = "cancel_subscription"))]
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediately: bool,
    ) -> Result<PaymentSubscription, AppError> {
        let path = format!("/subscriptions/{}", urlencoding::encode(subscription_id));
        let sub: StripeSubscription = if immediately {
            self.execute("Cancel subscription", Method::DELETE, &path, None)
                .await?
        } else {
            let form: Form = vec![("cancel_at_period_end".to_string(), "true".to_string())];
            self.execute("Cancel subscription", Method::POST, &path, Some(&form))
                .await?
        };
        map_subscription(sub)
    }

    #[tracing::instrument(skip(self), fields(payment.operation = "get_subscription"))]
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<PaymentSubscription>, AppError> {
        let path = format!("/subscriptions/{}", urlencoding::encode(subscription_id));
        match self.call::<StripeSubscription>(Method::GET, &path, None).await {
            Ok(sub) => map_subscription(sub).map(Some),
            Err(StripeFailure::Missing) => Ok(None),
            Err(StripeFailure::Other(msg)) => Err(AppError::payment("Get subscription", msg)),
        }
    }

    #[tracing::instrument(skip(self, payload, signature), fields(payment.operation = "handle_webhook"))]
    async fn handle_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookEvent, AppError> {
        verify_webhook_signature(payload, signature, &self.webhook_secret, Utc::now().timestamp())?;

        let event: Value = serde_json::from_str(payload)
            .map_err(|e| AppError::WebhookSignature(format!("Invalid payload: {}", e)))?;
        let id = event.get("id").and_then(Value::as_str);
        let event_type = event.get("type").and_then(Value::as_str);
        let (Some(id), Some(event_type)) = (id, event_type) else {
            return Err(AppError::WebhookSignature(
                "Invalid payload: missing id or type".to_string(),
            ));
        };

        let data = event
            .pointer("/data/object")
            .cloned()
            .unwrap_or(Value::Null);
        tracing::info!(event_id = %id, event_type = %event_type, "Verified Stripe webhook");

        Ok(WebhookEvent {
            id: id.to_string(),
            event_type: event_type.to_string(),
            data,
        })
    }

    #[tracing::instrument(skip(self, params), fields(payment.operation = "create_checkout_session"))]
    async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, AppError> {
        let form: Form = vec![
            ("customer".to_string(), params.customer_id),
            ("line_items[0][price]".to_string(), params.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
        ];

        let session: StripeCheckoutSession = self
            .execute(
                "Create checkout session",
                Method::POST,
                "/checkout/sessions",
                Some(&form),
            )
            .await?;
        let url = session.url.ok_or_else(|| {
            AppError::payment("Create checkout session", "Checkout session URL not generated")
        })?;

        Ok(CheckoutSession {
            url,
            session_id: session.id,
        })
    }

    #[tracing::instrument(skip(self), fields(payment.operation = "create_portal_session"))]
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let form: Form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        let session: StripePortalSession = self
            .execute(
                "Create portal session",
                Method::POST,
                "/billing_portal/sessions",
                Some(&form),
            )
            .await?;
        Ok(PortalSession { url: session.url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "whsec_test";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn provider(server: &MockServer) -> StripePaymentProvider {
        StripePaymentProvider::with_base_url(Client::new(), &server.uri(), "sk_test_real", SECRET)
    }

    fn subscription_body() -> Value {
        json!({
            "id": "sub_123",
            "customer": "cus_123",
            "status": "active",
            "current_period_end": 1_900_000_000i64,
            "cancel_at_period_end": false,
            "items": {"data": [{"price": {"id": "price_pro"}}]}
        })
    }

    #[test]
    fn test_signature_accepts_valid_header() {
        let now = 1_700_000_000;
        let payload = r#"{"id":"evt_1"}"#;
        assert!(verify_webhook_signature(payload, &sign(payload, now), SECRET, now).is_ok());
    }

    #[test]
    fn test_signature_accepts_any_matching_v1() {
        let now = 1_700_000_000;
        let payload = "{}";
        let valid = sign(payload, now);
        let header = format!("{},v1=deadbeef", valid);
        assert!(verify_webhook_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_signature_rejects_tampered_payload() {
        let now = 1_700_000_000;
        let header = sign(r#"{"amount":1}"#, now);
        let err = verify_webhook_signature(r#"{"amount":100}"#, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, AppError::WebhookSignature(_)));
    }

    #[test]
    fn test_signature_rejects_stale_timestamp() {
        let signed_at = 1_700_000_000;
        let header = sign("{}", signed_at);
        let err = verify_webhook_signature("{}", &header, SECRET, signed_at + 301).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_signature_rejects_extreme_timestamps() {
        let now = 1_700_000_000;
        for signed_at in [i64::MIN, i64::MAX] {
            let header = sign("{}", signed_at);
            let err = verify_webhook_signature("{}", &header, SECRET, now).unwrap_err();
            assert!(err.to_string().contains("tolerance"));
        }
    }

    #[test]
    fn test_signature_rejects_malformed_header() {
        assert!(verify_webhook_signature("{}", "garbage", SECRET, 0).is_err());
        assert!(verify_webhook_signature("{}", "t=1", SECRET, 1).is_err());
    }

    #[tokio::test]
    async fn test_handle_webhook_normalizes_data_object() {
        let server = MockServer::start().await;
        let payload = json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_123", "status": "active"}}
        })
        .to_string();
        let header = sign(&payload, Utc::now().timestamp());

        let event = provider(&server)
            .handle_webhook(&payload, &header)
            .await
            .unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "customer.subscription.updated");
        assert_eq!(event.data["id"], "sub_123");
    }

    #[tokio::test]
    async fn test_create_customer_sends_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header("authorization", "Bearer sk_test_real"))
            .and(body_string_contains("email=jane%40example.com"))
            .and(body_string_contains("metadata%5Buser_id%5D=u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cus_123"})))
            .mount(&server)
            .await;

        let mut metadata = Map::new();
        metadata.insert("user_id".to_string(), json!("u1"));
        let id = provider(&server)
            .create_customer("jane@example.com", metadata)
            .await
            .unwrap();
        assert_eq!(id, "cus_123");
    }

    #[tokio::test]
    async fn test_get_subscription_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/subscriptions/sub_gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "resource_missing", "message": "No such subscription"}
            })))
            .mount(&server)
            .await;

        let result = provider(&server).get_subscription("sub_gone").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_subscription_maps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/subscriptions/sub_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(subscription_body()))
            .mount(&server)
            .await;

        let sub = provider(&server)
            .get_subscription("sub_123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.customer_id, "cus_123");
        assert_eq!(sub.price_id, "price_pro");
        assert_eq!(sub.status, PaymentSubscriptionStatus::Active);
        assert_eq!(sub.current_period_end.timestamp(), 1_900_000_000);
    }

    #[tokio::test]
    async fn test_cancel_at_period_end_posts_flag() {
        let server = MockServer::start().await;
        let mut body = subscription_body();
        body["cancel_at_period_end"] = json!(true);
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions/sub_123"))
            .and(body_string_contains("cancel_at_period_end=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let sub = provider(&server)
            .cancel_subscription("sub_123", false)
            .await
            .unwrap();
        assert!(sub.cancel_at_period_end);
    }

    #[tokio::test]
    async fn test_checkout_without_url_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cs_1"})))
            .mount(&server)
            .await;

        let err = provider(&server)
            .create_checkout_session(CheckoutParams {
                customer_id: "cus_123".to_string(),
                price_id: "price_pro".to_string(),
                success_url: "http://localhost:3000/ok".to_string(),
                cancel_url: "http://localhost:3000/cancel".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Create checkout session error: Checkout session URL not generated"
        );
    }

    #[tokio::test]
    async fn test_vendor_error_message_is_prefixed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/billing_portal/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": "parameter_invalid", "message": "No such customer: 'cus_x'"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .create_portal_session("cus_x", "http://localhost:3000")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Create portal session error: No such customer: 'cus_x'"
        );
    }
}
