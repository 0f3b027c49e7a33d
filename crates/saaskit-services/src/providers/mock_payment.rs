//! Payment provider returning canned values. Selected explicitly through
//! `PAYMENT_PROVIDER=mock` or when Stripe credentials are absent outside production.

use super::payment::PaymentProvider;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use saaskit_core::models::{
    CheckoutParams, CheckoutSession, CreatePaymentSubscriptionParams, PaymentSubscription,
    PaymentSubscriptionStatus, PortalSession, WebhookEvent,
};
use saaskit_core::AppError;
use serde_json::{Map, Value};

pub const MOCK_CUSTOMER_ID: &str = "mock_customer_id";
pub const MOCK_SUBSCRIPTION_ID: &str = "mock_sub_id";
pub const MOCK_PRICE_ID: &str = "mock_price_id";
pub const MOCK_CHECKOUT_URL: &str = "https://checkout.mock.com";
pub const MOCK_CHECKOUT_SESSION_ID: &str = "mock_session_id";
pub const MOCK_PORTAL_URL: &str = "https://portal.mock.com";
pub const MOCK_EVENT_ID: &str = "mock_event_id";
pub const MOCK_EVENT_TYPE: &str = "mock.event";

#[derive(Debug, Clone, Default)]
pub struct MockPaymentProvider;

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self
    }

    fn subscription(id: &str, price_id: &str, cancel_at_period_end: bool) -> PaymentSubscription {
        PaymentSubscription {
            id: id.to_string(),
            customer_id: MOCK_CUSTOMER_ID.to_string(),
            price_id: price_id.to_string(),
            status: PaymentSubscriptionStatus::Active,
            current_period_end: Utc::now() + Duration::days(30),
            cancel_at_period_end,
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        email: &str,
        _metadata: Map<String, Value>,
    ) -> Result<String, AppError> {
        tracing::debug!(email = %email, "Mock payment provider: create customer");
        Ok(MOCK_CUSTOMER_ID.to_string())
    }

    async fn create_subscription(
        &self,
        params: CreatePaymentSubscriptionParams,
    ) -> Result<PaymentSubscription, AppError> {
        Ok(Self::subscription(MOCK_SUBSCRIPTION_ID, &params.price_id, false))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediately: bool,
    ) -> Result<PaymentSubscription, AppError> {
        let mut sub = Self::subscription(subscription_id, MOCK_PRICE_ID, !immediately);
        if immediately {
            sub.status = PaymentSubscriptionStatus::Canceled;
        }
        Ok(sub)
    }

    async fn get_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<Option<PaymentSubscription>, AppError> {
        Ok(None)
    }

    async fn handle_webhook(
        &self,
        _payload: &str,
        _signature: &str,
    ) -> Result<WebhookEvent, AppError> {
        Ok(WebhookEvent {
            id: MOCK_EVENT_ID.to_string(),
            event_type: MOCK_EVENT_TYPE.to_string(),
            data: Value::Object(Map::new()),
        })
    }

    async fn create_checkout_session(
        &self,
        _params: CheckoutParams,
    ) -> Result<CheckoutSession, AppError> {
        Ok(CheckoutSession {
            url: MOCK_CHECKOUT_URL.to_string(),
            session_id: MOCK_CHECKOUT_SESSION_ID.to_string(),
        })
    }

    async fn create_portal_session(
        &self,
        _customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, AppError> {
        Ok(PortalSession {
            url: MOCK_PORTAL_URL.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_values() {
        let mock = MockPaymentProvider::new();
        assert_eq!(
            mock.create_customer("a@b.co", Map::new()).await.unwrap(),
            MOCK_CUSTOMER_ID
        );
        assert_eq!(
            mock.create_portal_session("cus", "http://x").await.unwrap().url,
            MOCK_PORTAL_URL
        );
        let event = mock.handle_webhook("{}", "").await.unwrap();
        assert_eq!(event.event_type, "mock.event");
        assert!(mock.get_subscription("sub").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_immediately_marks_canceled() {
        let mock = MockPaymentProvider::new();
        let sub = mock.cancel_subscription("sub_1", true).await.unwrap();
        assert_eq!(sub.status, PaymentSubscriptionStatus::Canceled);
        assert!(!sub.cancel_at_period_end);

        let sub = mock.cancel_subscription("sub_1", false).await.unwrap();
        assert!(sub.cancel_at_period_end);
    }
}
