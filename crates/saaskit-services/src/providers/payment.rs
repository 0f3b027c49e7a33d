use async_trait::async_trait;
use saaskit_core::models::{
    CheckoutParams, CheckoutSession, CreatePaymentSubscriptionParams, PaymentSubscription,
    PortalSession, WebhookEvent,
};
use saaskit_core::AppError;
use serde_json::{Map, Value};

/// Payment vendor operations used by billing.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer and return its vendor id
    async fn create_customer(
        &self,
        email: &str,
        metadata: Map<String, Value>,
    ) -> Result<String, AppError>;

    async fn create_subscription(
        &self,
        params: CreatePaymentSubscriptionParams,
    ) -> Result<PaymentSubscription, AppError>;

    /// Cancel now, or at the end of the current period when `immediately` is false
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediately: bool,
    ) -> Result<PaymentSubscription, AppError>;

    /// `None` when the vendor does not know the subscription
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<PaymentSubscription>, AppError>;

    /// Verify the signature header and decode the event.
    /// Nothing is processed when verification fails.
    async fn handle_webhook(&self, payload: &str, signature: &str)
        -> Result<WebhookEvent, AppError>;

    async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, AppError>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError>;
}
