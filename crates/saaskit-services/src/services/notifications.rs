//! Notification types and per-user preferences.
//!
//! A user without an explicit preference row gets the type's
//! `enabled_by_default`; a missing row never means "disabled".

use super::{filters, touch};
use saaskit_core::constants::tables;
use saaskit_core::models::{
    CreateNotificationTypeRequest, NotificationPreference, NotificationType,
    UpdateNotificationTypeRequest, UserNotificationPreference,
};
use saaskit_core::AppError;
use saaskit_db::{from_row, from_rows, DatabaseProvider};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<dyn DatabaseProvider>,
}

impl NotificationService {
    pub fn new(db: Arc<dyn DatabaseProvider>) -> Self {
        Self { db }
    }

    pub async fn get_all_notification_types(&self) -> Result<Vec<NotificationType>, AppError> {
        from_rows(
            self.db
                .query(tables::NOTIFICATION_TYPES, &Default::default())
                .await?,
        )
    }

    pub async fn get_notification_type_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<NotificationType>, AppError> {
        self.db
            .get_by_id(tables::NOTIFICATION_TYPES, &id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    #[tracing::instrument(skip(self, request), fields(notification.name = %request.name))]
    pub async fn create_notification_type(
        &self,
        request: CreateNotificationTypeRequest,
    ) -> Result<NotificationType, AppError> {
        let row = self
            .db
            .insert(
                tables::NOTIFICATION_TYPES,
                json!({
                    "name": request.name,
                    "description": request.description,
                    "enabled_by_default": request.enabled_by_default,
                    "channel": request.channel,
                    "category": request.category,
                }),
            )
            .await?;
        from_row(row)
    }

    pub async fn update_notification_type(
        &self,
        id: Uuid,
        request: UpdateNotificationTypeRequest,
    ) -> Result<NotificationType, AppError> {
        let mut changes = Map::new();
        if let Some(name) = request.name {
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(description) = request.description {
            changes.insert("description".to_string(), json!(description));
        }
        if let Some(enabled) = request.enabled_by_default {
            changes.insert("enabled_by_default".to_string(), json!(enabled));
        }
        if let Some(channel) = request.channel {
            changes.insert("channel".to_string(), json!(channel));
        }
        if let Some(category) = request.category {
            changes.insert("category".to_string(), json!(category));
        }
        let mut row = Value::Object(changes);
        touch(&mut row);

        let row = self
            .db
            .update(tables::NOTIFICATION_TYPES, &id.to_string(), row)
            .await?;
        from_row(row)
    }

    pub async fn delete_notification_type(&self, id: Uuid) -> Result<(), AppError> {
        self.db
            .delete(tables::NOTIFICATION_TYPES, &id.to_string())
            .await
    }

    /// Every notification type with the user's effective setting
    pub async fn get_user_notification_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserNotificationPreference>, AppError> {
        let types = self.get_all_notification_types().await?;
        let preferences: Vec<NotificationPreference> = from_rows(
            self.db
                .query(
                    tables::NOTIFICATION_PREFERENCES,
                    &filters([("user_id", json!(user_id))]),
                )
                .await?,
        )?;
        let explicit: HashMap<Uuid, bool> = preferences
            .into_iter()
            .map(|p| (p.notification_id, p.preference))
            .collect();

        Ok(types
            .into_iter()
            .map(|notification_type| {
                let enabled = explicit
                    .get(&notification_type.id)
                    .copied()
                    .unwrap_or(notification_type.enabled_by_default);
                UserNotificationPreference {
                    notification_type,
                    enabled,
                }
            })
            .collect())
    }

    /// Explicit row, else the type default, else `false` for unknown types
    pub async fn is_notification_enabled(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<bool, AppError> {
        if let Some(preference) = self.find_preference(user_id, notification_id).await? {
            return Ok(preference.preference);
        }

        Ok(self
            .get_notification_type_by_id(notification_id)
            .await?
            .map(|t| t.enabled_by_default)
            .unwrap_or(false))
    }

    /// Update the user's row for this type, or create it
    #[tracing::instrument(skip(self))]
    pub async fn set_user_notification_preference(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
        preference: bool,
    ) -> Result<NotificationPreference, AppError> {
        let row = match self.find_preference(user_id, notification_id).await? {
            Some(existing) => {
                let mut changes = json!({"preference": preference});
                touch(&mut changes);
                self.db
                    .update(
                        tables::NOTIFICATION_PREFERENCES,
                        &existing.id.to_string(),
                        changes,
                    )
                    .await?
            }
            None => {
                self.db
                    .insert(
                        tables::NOTIFICATION_PREFERENCES,
                        json!({
                            "user_id": user_id,
                            "notification_id": notification_id,
                            "preference": preference,
                        }),
                    )
                    .await?
            }
        };
        from_row(row)
    }

    async fn find_preference(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Option<NotificationPreference>, AppError> {
        let rows = self
            .db
            .query(
                tables::NOTIFICATION_PREFERENCES,
                &filters([
                    ("user_id", json!(user_id)),
                    ("notification_id", json!(notification_id)),
                ]),
            )
            .await?;
        rows.into_iter().next().map(from_row).transpose()
    }
}
