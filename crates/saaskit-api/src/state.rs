//! Application state shared by every handler.
//!
//! Built once at startup from the provider bundle; nothing in it is mutated
//! afterwards, so handlers share it through an `Arc`.

use saaskit_core::Config;
use saaskit_services::{
    AuthService, BillingService, NotificationService, PermissionsService, Providers,
    SubscriptionService, SupportService, UserManagementService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub providers: Providers,
    pub auth: AuthService,
    pub users: UserManagementService,
    pub subscriptions: SubscriptionService,
    pub support: SupportService,
    pub notifications: NotificationService,
    pub billing: BillingService,
    pub permissions: PermissionsService,
}

impl AppState {
    /// Wire every service over `providers` with the default permission table.
    pub fn new(config: Config, providers: Providers) -> Self {
        Self::with_permissions(config, providers, PermissionsService::default())
    }

    pub fn with_permissions(
        config: Config,
        providers: Providers,
        permissions: PermissionsService,
    ) -> Self {
        let database = providers.database.clone();
        let subscriptions = SubscriptionService::new(database.clone());
        let billing = BillingService::new(
            providers.payment.clone(),
            subscriptions.clone(),
            database.clone(),
            config.app_url(),
        );

        Self {
            auth: AuthService::new(providers.auth.clone()),
            users: UserManagementService::new(database.clone(), providers.auth.clone()),
            support: SupportService::new(database.clone()),
            notifications: NotificationService::new(database),
            subscriptions,
            billing,
            permissions,
            providers,
            config,
        }
    }
}
