//! Administrative user management over the `profiles` table.

use super::touch;
use crate::providers::AuthProvider;
use saaskit_core::constants::{tables, DEFAULT_USER_ROLE, MAX_PAGE_SIZE};
use saaskit_core::models::{
    CreateUserRequest, PaginatedResult, QueryOptions, SignUpParams, UpdateProfileRequest,
    UserProfile,
};
use saaskit_core::AppError;
use saaskit_db::{from_row, from_rows, DatabaseProvider};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

fn name_fields(first_name: Option<String>, last_name: Option<String>) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(first) = first_name {
        fields.insert("first_name".to_string(), json!(first));
    }
    if let Some(last) = last_name {
        fields.insert("last_name".to_string(), json!(last));
    }
    fields
}

#[derive(Clone)]
pub struct UserManagementService {
    db: Arc<dyn DatabaseProvider>,
    auth: Arc<dyn AuthProvider>,
}

impl UserManagementService {
    pub fn new(db: Arc<dyn DatabaseProvider>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { db, auth }
    }

    pub async fn get_user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        self.db
            .get_by_id(tables::PROFILES, &user_id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    /// Register the account with the auth provider, then create its profile row.
    #[tracing::instrument(skip(self, request), fields(user.email = %request.email))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserProfile, AppError> {
        let names = name_fields(request.first_name, request.last_name);
        let role = request
            .role
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ROLE.to_string());

        let mut metadata = names.clone();
        metadata.insert("role".to_string(), json!(role));
        let user = self
            .auth
            .sign_up(SignUpParams {
                email: request.email,
                password: request.password,
                metadata,
            })
            .await?;

        let mut profile = names;
        profile.insert("id".to_string(), json!(user.id));
        profile.insert("email".to_string(), json!(user.email));
        profile.insert("role".to_string(), json!(role));

        let row = self
            .db
            .insert(tables::PROFILES, Value::Object(profile))
            .await?;
        tracing::info!(user_id = %user.id, "User created");
        from_row(row)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, AppError> {
        let mut changes = name_fields(request.first_name, request.last_name);
        if let Some(avatar) = request.avatar_url {
            changes.insert("avatar_url".to_string(), json!(avatar));
        }
        let mut row = Value::Object(changes);
        touch(&mut row);

        let row = self
            .db
            .update(tables::PROFILES, &user_id.to_string(), row)
            .await?;
        from_row(row)
    }

    /// Change a user's role in their profile
    pub async fn set_role(&self, user_id: Uuid, role: &str) -> Result<UserProfile, AppError> {
        let mut row = json!({"role": role});
        touch(&mut row);
        let row = self
            .db
            .update(tables::PROFILES, &user_id.to_string(), row)
            .await?;
        from_row(row)
    }

    /// Deletes the profile row only; the auth account is left untouched.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        self.db.delete(tables::PROFILES, &user_id.to_string()).await
    }

    pub async fn list_users(
        &self,
        filters: &Map<String, Value>,
    ) -> Result<Vec<UserProfile>, AppError> {
        from_rows(self.db.query(tables::PROFILES, filters).await?)
    }

    pub async fn list_users_paginated(
        &self,
        mut options: QueryOptions,
    ) -> Result<PaginatedResult<UserProfile>, AppError> {
        options.page_size = options.page_size.min(MAX_PAGE_SIZE);
        let page = self
            .db
            .query_with_pagination(tables::USER_PROFILES, &options)
            .await?;

        let PaginatedResult {
            data,
            total,
            page,
            page_size,
            total_pages,
        } = page;
        Ok(PaginatedResult {
            data: from_rows(data)?,
            total,
            page,
            page_size,
            total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryAuthProvider;
    use saaskit_db::MemoryDatabaseProvider;

    fn service() -> (UserManagementService, InMemoryAuthProvider) {
        let auth = InMemoryAuthProvider::new();
        let service = UserManagementService::new(
            Arc::new(MemoryDatabaseProvider::new()),
            Arc::new(auth.clone()),
        );
        (service, auth)
    }

    fn create_request(email: &str, role: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "Secret123".to_string(),
            role: role.map(str::to_string),
            first_name: Some("Jane".to_string()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_creates_auth_account_and_profile() {
        let (service, auth) = service();
        let profile = service
            .create_user(create_request("jane@example.com", None))
            .await
            .unwrap();
        assert_eq!(profile.role, "user");
        assert_eq!(profile.first_name.as_deref(), Some("Jane"));

        let session = auth
            .sign_in(saaskit_core::models::SignInParams {
                email: "jane@example.com".to_string(),
                password: "Secret123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.id, profile.id);
    }

    #[tokio::test]
    async fn test_create_user_propagates_auth_failure() {
        let (service, _) = service();
        service
            .create_user(create_request("dup@example.com", None))
            .await
            .unwrap();
        let err = service
            .create_user(create_request("dup@example.com", None))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Sign up error"));
        assert_eq!(service.list_users(&Map::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile_stamps_updated_at() {
        let (service, _) = service();
        let created = service
            .create_user(create_request("jane@example.com", Some("admin")))
            .await
            .unwrap();

        let updated = service
            .update_profile(
                created.id,
                UpdateProfileRequest {
                    last_name: Some("Doe".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.last_name.as_deref(), Some("Doe"));
        assert_eq!(updated.first_name.as_deref(), Some("Jane"));
        assert_eq!(updated.role, "admin");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_list_users_filters_and_paginates() {
        let (service, _) = service();
        for i in 0..5 {
            let role = if i % 2 == 0 { "admin" } else { "user" };
            service
                .create_user(create_request(&format!("user{}@example.com", i), Some(role)))
                .await
                .unwrap();
        }

        let mut filter = Map::new();
        filter.insert("role".to_string(), json!("admin"));
        assert_eq!(service.list_users(&filter).await.unwrap().len(), 3);

        let page = service
            .list_users_paginated(QueryOptions {
                page: 2,
                page_size: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_user_removes_profile() {
        let (service, _) = service();
        let created = service
            .create_user(create_request("gone@example.com", None))
            .await
            .unwrap();
        service.delete_user(created.id).await.unwrap();
        assert!(service.get_user_profile(created.id).await.unwrap().is_none());
    }
}
