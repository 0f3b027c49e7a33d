//! Checkout, billing portal and webhook intake.
//!
//! Payment customers are recorded per user in `payment_customers`; a caller
//! can only check out or open the portal with a customer recorded for them.

use super::filters;
use super::subscriptions::SubscriptionService;
use crate::providers::PaymentProvider;
use saaskit_core::constants::tables;
use saaskit_core::models::{
    BillingInterval, CheckoutParams, CheckoutRequest, CheckoutSession, PaymentCustomer,
    PortalSession, User, WebhookEvent,
};
use saaskit_core::AppError;
use saaskit_db::{from_rows, DatabaseProvider};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct BillingService {
    payment: Arc<dyn PaymentProvider>,
    subscriptions: SubscriptionService,
    db: Arc<dyn DatabaseProvider>,
    app_url: String,
}

impl BillingService {
    pub fn new(
        payment: Arc<dyn PaymentProvider>,
        subscriptions: SubscriptionService,
        db: Arc<dyn DatabaseProvider>,
        app_url: &str,
    ) -> Self {
        Self {
            payment,
            subscriptions,
            db,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn success_url(&self) -> String {
        format!(
            "{}/subscription?success=true&session_id={{CHECKOUT_SESSION_ID}}",
            self.app_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/subscription/checkout?canceled=true", self.app_url)
    }

    pub async fn create_customer(
        &self,
        email: &str,
        metadata: Map<String, Value>,
    ) -> Result<String, AppError> {
        self.payment.create_customer(email, metadata).await
    }

    /// Customers recorded for a user
    pub async fn get_user_customers(&self, user_id: Uuid) -> Result<Vec<PaymentCustomer>, AppError> {
        from_rows(
            self.db
                .query(
                    tables::PAYMENT_CUSTOMERS,
                    &filters([("user_id", json!(user_id))]),
                )
                .await?,
        )
    }

    /// Forbidden unless `customer_id` was recorded for `user_id`
    pub async fn ensure_customer_owner(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), AppError> {
        let rows = self
            .db
            .query(
                tables::PAYMENT_CUSTOMERS,
                &filters([("user_id", json!(user_id)), ("customer_id", json!(customer_id))]),
            )
            .await?;
        if rows.is_empty() {
            tracing::warn!(user_id = %user_id, customer_id = %customer_id, "Payment customer not owned by caller");
            return Err(AppError::Forbidden(
                "Payment customer does not belong to the current user".to_string(),
            ));
        }
        Ok(())
    }

    /// The user's recorded customer, or a new one created from their email
    async fn customer_for(&self, user: &User) -> Result<String, AppError> {
        if let Some(existing) = self.get_user_customers(user.id).await?.into_iter().next() {
            return Ok(existing.customer_id);
        }

        let mut metadata = Map::new();
        metadata.insert("user_id".to_string(), json!(user.id));
        let customer_id = self.payment.create_customer(&user.email, metadata).await?;
        self.db
            .insert(
                tables::PAYMENT_CUSTOMERS,
                json!({"user_id": user.id, "customer_id": customer_id}),
            )
            .await?;
        tracing::info!(user_id = %user.id, customer_id = %customer_id, "Payment customer created");
        Ok(customer_id)
    }

    /// Start a checkout for the plan's price at `interval`. A named customer
    /// must belong to the user; otherwise their own customer is used.
    #[tracing::instrument(skip(self, user, request), fields(user_id = %user.id, subscription_type_id = %request.subscription_type_id))]
    pub async fn create_checkout_session(
        &self,
        user: &User,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, AppError> {
        let plan = self
            .subscriptions
            .get_subscription_type_by_id(request.subscription_type_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Subscription type {} not found",
                    request.subscription_type_id
                ))
            })?;

        let price_id = match request.interval {
            BillingInterval::Monthly => plan.stripe_monthly_id,
            BillingInterval::Annual => plan.stripe_annual_id,
        }
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Subscription type '{}' has no {} price",
                plan.name,
                match request.interval {
                    BillingInterval::Monthly => "monthly",
                    BillingInterval::Annual => "annual",
                }
            ))
        })?;

        let customer_id = match request.customer_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                self.ensure_customer_owner(user.id, &id).await?;
                id
            }
            None => self.customer_for(user).await?,
        };

        let session = self
            .payment
            .create_checkout_session(CheckoutParams {
                customer_id,
                price_id,
                success_url: self.success_url(),
                cancel_url: self.cancel_url(),
            })
            .await?;
        tracing::info!(session_id = %session.session_id, "Checkout session created");
        Ok(session)
    }

    #[tracing::instrument(skip(self, user, return_url), fields(user_id = %user.id))]
    pub async fn create_portal_session(
        &self,
        user: &User,
        customer_id: &str,
        return_url: Option<&str>,
    ) -> Result<PortalSession, AppError> {
        self.ensure_customer_owner(user.id, customer_id).await?;
        let default_return = format!("{}/subscription", self.app_url);
        self.payment
            .create_portal_session(customer_id, return_url.unwrap_or(&default_return))
            .await
    }

    /// Verify and decode a webhook delivery. Verification failures propagate
    /// before anything else happens.
    pub async fn handle_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookEvent, AppError> {
        let event = self.payment.handle_webhook(payload, signature).await?;
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Payment webhook received");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        StripePaymentProvider, MOCK_CHECKOUT_URL, MOCK_CUSTOMER_ID, MOCK_PORTAL_URL,
    };
    use crate::testing::RecordingPaymentProvider;
    use saaskit_core::models::CreateSubscriptionTypeRequest;
    use saaskit_db::MemoryDatabaseProvider;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            role: "user".to_string(),
            metadata: json!({}),
        }
    }

    async fn setup() -> (BillingService, RecordingPaymentProvider, Uuid) {
        let db: Arc<dyn DatabaseProvider> = Arc::new(MemoryDatabaseProvider::new());
        let subscriptions = SubscriptionService::new(db.clone());
        let plan = subscriptions
            .create_subscription_type(CreateSubscriptionTypeRequest {
                name: "Pro".to_string(),
                description: None,
                marketing_points: None,
                feature_flags: Default::default(),
                quota_limits: Default::default(),
                price_monthly: Some(19.0),
                price_annual: None,
                stripe_monthly_id: Some("price_pro_monthly".to_string()),
                stripe_annual_id: None,
            })
            .await
            .unwrap();
        let payment = RecordingPaymentProvider::new();
        let billing = BillingService::new(
            Arc::new(payment.clone()),
            subscriptions,
            db,
            "http://localhost:3000/",
        );
        (billing, payment, plan.id)
    }

    #[tokio::test]
    async fn test_checkout_resolves_price_and_urls() {
        let (billing, payment, plan_id) = setup().await;
        let session = billing
            .create_checkout_session(
                &user(),
                CheckoutRequest {
                    subscription_type_id: plan_id,
                    interval: BillingInterval::Monthly,
                    customer_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(session.url, MOCK_CHECKOUT_URL);

        let recorded = payment.checkouts().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].price_id, "price_pro_monthly");
        assert_eq!(recorded[0].customer_id, MOCK_CUSTOMER_ID);
        assert!(recorded[0]
            .success_url
            .starts_with("http://localhost:3000/subscription?success=true"));
        assert_eq!(
            recorded[0].cancel_url,
            "http://localhost:3000/subscription/checkout?canceled=true"
        );
    }

    #[tokio::test]
    async fn test_checkout_without_price_for_interval_is_bad_request() {
        let (billing, _, plan_id) = setup().await;
        let err = billing
            .create_checkout_session(
                &user(),
                CheckoutRequest {
                    subscription_type_id: plan_id,
                    interval: BillingInterval::Annual,
                    customer_id: Some("cus_1".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_checkout_unknown_plan_is_not_found() {
        let (billing, _, _) = setup().await;
        let err = billing
            .create_checkout_session(
                &user(),
                CheckoutRequest {
                    subscription_type_id: Uuid::new_v4(),
                    interval: BillingInterval::Monthly,
                    customer_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_webhook_signature_failure_propagates() {
        let db: Arc<dyn DatabaseProvider> = Arc::new(MemoryDatabaseProvider::new());
        let subscriptions = SubscriptionService::new(db.clone());
        let stripe = StripePaymentProvider::with_base_url(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            "sk_test_x",
            "whsec_x",
        );
        let billing =
            BillingService::new(Arc::new(stripe), subscriptions, db, "http://localhost:3000");
        let err = billing
            .handle_webhook("{}", "t=1,v1=bad")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::WebhookSignature(_)));
    }

    fn checkout(plan_id: Uuid, customer_id: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            subscription_type_id: plan_id,
            interval: BillingInterval::Monthly,
            customer_id: customer_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_checkout_records_and_reuses_customer() {
        let (billing, payment, plan_id) = setup().await;
        let buyer = user();

        billing
            .create_checkout_session(&buyer, checkout(plan_id, None))
            .await
            .unwrap();
        billing
            .create_checkout_session(&buyer, checkout(plan_id, None))
            .await
            .unwrap();
        billing
            .create_checkout_session(&buyer, checkout(plan_id, Some(MOCK_CUSTOMER_ID)))
            .await
            .unwrap();

        assert_eq!(payment.customers().await, vec![buyer.email.clone()]);
        let recorded = billing.get_user_customers(buyer.id).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].customer_id, MOCK_CUSTOMER_ID);
        assert_eq!(payment.checkouts().await.len(), 3);
    }

    #[tokio::test]
    async fn test_foreign_customer_is_forbidden() {
        let (billing, payment, plan_id) = setup().await;
        let owner = user();
        billing
            .create_checkout_session(&owner, checkout(plan_id, None))
            .await
            .unwrap();

        let other = user();
        let err = billing
            .create_checkout_session(&other, checkout(plan_id, Some(MOCK_CUSTOMER_ID)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(payment.checkouts().await.len(), 1);

        let err = billing
            .create_portal_session(&other, MOCK_CUSTOMER_ID, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let portal = billing
            .create_portal_session(&owner, MOCK_CUSTOMER_ID, None)
            .await
            .unwrap();
        assert_eq!(portal.url, MOCK_PORTAL_URL);
    }
}
