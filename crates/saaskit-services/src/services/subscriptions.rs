//! Subscription plans, memberships and monthly usage quotas.
//!
//! Quota checks compare the *largest* limit across a user's active
//! subscriptions with the *sum* of their usage for the current month.

use super::{filters, touch};
use chrono::Utc;
use saaskit_core::constants::{tables, SUBSCRIPTION_OWNER_ROLE};
use saaskit_core::models::{
    CreateSubscriptionRequest, CreateSubscriptionTypeRequest, Subscription,
    SubscriptionConsumption, SubscriptionStatus, SubscriptionType, SubscriptionUser,
    UpdateSubscriptionRequest, UpdateSubscriptionTypeRequest, UserSubscription,
};
use saaskit_core::{month_key, AppError};
use saaskit_db::{from_row, from_rows, to_row, DatabaseProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionService {
    db: Arc<dyn DatabaseProvider>,
}

impl SubscriptionService {
    pub fn new(db: Arc<dyn DatabaseProvider>) -> Self {
        Self { db }
    }

    pub async fn get_subscription_types(&self) -> Result<Vec<SubscriptionType>, AppError> {
        let rows = self
            .db
            .query(tables::SUBSCRIPTION_TYPES, &Default::default())
            .await?;
        from_rows(rows)
    }

    pub async fn get_subscription_type_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<SubscriptionType>, AppError> {
        self.db
            .get_by_id(tables::SUBSCRIPTION_TYPES, &id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    pub async fn get_subscription_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SubscriptionType>, AppError> {
        let rows = self
            .db
            .query(tables::SUBSCRIPTION_TYPES, &filters([("name", json!(name))]))
            .await?;
        rows.into_iter().next().map(from_row).transpose()
    }

    #[tracing::instrument(skip(self, request), fields(subscription_type.name = %request.name))]
    pub async fn create_subscription_type(
        &self,
        request: CreateSubscriptionTypeRequest,
    ) -> Result<SubscriptionType, AppError> {
        let row = self
            .db
            .insert(tables::SUBSCRIPTION_TYPES, to_row(&request)?)
            .await?;
        from_row(row)
    }

    pub async fn update_subscription_type(
        &self,
        id: Uuid,
        request: UpdateSubscriptionTypeRequest,
    ) -> Result<SubscriptionType, AppError> {
        let mut row = to_row(&request)?;
        touch(&mut row);
        let row = self
            .db
            .update(tables::SUBSCRIPTION_TYPES, &id.to_string(), row)
            .await?;
        from_row(row)
    }

    pub async fn delete_subscription_type(&self, id: Uuid) -> Result<(), AppError> {
        self.db
            .delete(tables::SUBSCRIPTION_TYPES, &id.to_string())
            .await
    }

    /// Create an active subscription and attach the user as its owner.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, AppError> {
        let start_date = request.start_date.unwrap_or_else(Utc::now);
        let row = self
            .db
            .insert(
                tables::SUBSCRIPTIONS,
                json!({
                    "subscription_type_id": request.subscription_type_id,
                    "start_date": start_date,
                    "status": SubscriptionStatus::Active,
                }),
            )
            .await?;
        let subscription: Subscription = from_row(row)?;

        self.add_user_to_subscription(subscription.id, request.user_id, SUBSCRIPTION_OWNER_ROLE)
            .await?;

        tracing::info!(subscription_id = %subscription.id, "Subscription created");
        Ok(subscription)
    }

    pub async fn get_subscription_by_id(&self, id: Uuid) -> Result<Option<Subscription>, AppError> {
        self.db
            .get_by_id(tables::SUBSCRIPTIONS, &id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    pub async fn update_subscription(
        &self,
        id: Uuid,
        request: UpdateSubscriptionRequest,
    ) -> Result<Subscription, AppError> {
        let mut row = to_row(&request)?;
        touch(&mut row);
        let row = self
            .db
            .update(tables::SUBSCRIPTIONS, &id.to_string(), row)
            .await?;
        from_row(row)
    }

    pub async fn cancel_subscription(&self, id: Uuid) -> Result<Subscription, AppError> {
        self.update_subscription(
            id,
            UpdateSubscriptionRequest {
                status: Some(SubscriptionStatus::Cancelled),
                end_date: Some(Utc::now()),
            },
        )
        .await
    }

    /// Active subscriptions of a user together with their type and the user's role.
    /// Memberships whose subscription or type no longer resolves are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn get_user_subscriptions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserSubscription>, AppError> {
        let memberships: Vec<SubscriptionUser> = from_rows(
            self.db
                .query(
                    tables::SUBSCRIPTION_USERS,
                    &filters([("user_id", json!(user_id))]),
                )
                .await?,
        )?;

        let mut result = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let Some(subscription) = self.get_subscription_by_id(membership.subscription_id).await?
            else {
                continue;
            };
            if subscription.status != SubscriptionStatus::Active {
                continue;
            }
            let Some(subscription_type) = self
                .get_subscription_type_by_id(subscription.subscription_type_id)
                .await?
            else {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    "Active subscription references a missing subscription type"
                );
                continue;
            };

            result.push(UserSubscription {
                subscription,
                subscription_type,
                role: membership.role,
            });
        }

        Ok(result)
    }

    pub async fn has_feature_access(&self, user_id: Uuid, flag: &str) -> Result<bool, AppError> {
        let subscriptions = self.get_user_subscriptions(user_id).await?;
        Ok(subscriptions
            .iter()
            .any(|s| s.subscription_type.feature_flags.get(flag) == Some(&true)))
    }

    /// Largest limit for `feature` across active subscriptions; `None` is unlimited.
    pub async fn get_quota_limit(
        &self,
        user_id: Uuid,
        feature: &str,
    ) -> Result<Option<i64>, AppError> {
        let subscriptions = self.get_user_subscriptions(user_id).await?;
        Ok(max_quota_limit(&subscriptions, feature))
    }

    pub async fn get_usage(
        &self,
        subscription_id: Uuid,
        feature: &str,
        month: Option<&str>,
    ) -> Result<i64, AppError> {
        let month = month_key(month);
        let rows = self
            .db
            .query(
                tables::SUBSCRIPTION_CONSUMPTION,
                &filters([
                    ("subscription_id", json!(subscription_id)),
                    ("feature", json!(feature)),
                    ("month", json!(month)),
                ]),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("usage"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Add `amount` to the monthly counter in a single atomic upsert.
    #[tracing::instrument(skip(self), fields(month))]
    pub async fn increment_usage(
        &self,
        subscription_id: Uuid,
        feature: &str,
        amount: i64,
        month: Option<&str>,
    ) -> Result<SubscriptionConsumption, AppError> {
        if amount < 1 {
            return Err(AppError::InvalidInput(
                "Usage amount must be positive".to_string(),
            ));
        }
        let month = month_key(month);
        tracing::Span::current().record("month", month.as_str());

        let key = filters([
            ("subscription_id", json!(subscription_id)),
            ("feature", json!(feature)),
            ("month", json!(month)),
        ]);
        let row = self
            .db
            .increment(tables::SUBSCRIPTION_CONSUMPTION, &key, "usage", amount)
            .await?;
        from_row(row)
    }

    /// Sum of current-month usage across active subscriptions compared with the
    /// largest limit. Unlimited features are never exceeded.
    pub async fn has_exceeded_quota(&self, user_id: Uuid, feature: &str) -> Result<bool, AppError> {
        let subscriptions = self.get_user_subscriptions(user_id).await?;
        let Some(limit) = max_quota_limit(&subscriptions, feature) else {
            return Ok(false);
        };

        let mut total = 0i64;
        for sub in &subscriptions {
            total += self.get_usage(sub.subscription.id, feature, None).await?;
        }

        Ok(total >= limit)
    }

    pub async fn add_user_to_subscription(
        &self,
        subscription_id: Uuid,
        user_id: Uuid,
        role: &str,
    ) -> Result<SubscriptionUser, AppError> {
        let row = self
            .db
            .insert(
                tables::SUBSCRIPTION_USERS,
                json!({
                    "subscription_id": subscription_id,
                    "user_id": user_id,
                    "role": role,
                }),
            )
            .await?;
        from_row(row)
    }

    pub async fn remove_user_from_subscription(
        &self,
        subscription_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let memberships: Vec<SubscriptionUser> = from_rows(
            self.db
                .query(
                    tables::SUBSCRIPTION_USERS,
                    &filters([
                        ("subscription_id", json!(subscription_id)),
                        ("user_id", json!(user_id)),
                    ]),
                )
                .await?,
        )?;

        if let Some(membership) = memberships.first() {
            self.db
                .delete(tables::SUBSCRIPTION_USERS, &membership.id.to_string())
                .await?;
        }
        Ok(())
    }

    pub async fn get_subscription_users(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionUser>, AppError> {
        from_rows(
            self.db
                .query(
                    tables::SUBSCRIPTION_USERS,
                    &filters([("subscription_id", json!(subscription_id))]),
                )
                .await?,
        )
    }
}

fn max_quota_limit(subscriptions: &[UserSubscription], feature: &str) -> Option<i64> {
    subscriptions
        .iter()
        .filter_map(|s| s.subscription_type.quota_limits.get(feature).copied())
        .max()
}
