pub mod auth;
pub mod common;
pub mod orders;
pub mod products;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<crate::services::users::UserService>,
    pub catalog: Arc<crate::services::catalog::CatalogService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        auth_service: Arc<AuthService>,
        config: &AppConfig,
    ) -> Self {
        let users = Arc::new(crate::services::users::UserService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let catalog = Arc::new(crate::services::catalog::CatalogService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.api_default_page_size,
            config.api_max_page_size,
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool,
            event_sender,
        ));

        Self {
            users,
            catalog,
            orders,
            auth: auth_service,
        }
    }
}
