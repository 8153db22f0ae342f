use crate::{
    auth::password,
    entities::user::{self, Entity as UserEntity, Model as UserModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Service for account registration and credential checks.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Create a non-privileged account.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserModel, ServiceError> {
        self.insert_user(username, email, password, false).await
    }

    /// Create an account with the staff and superuser flags set. The caller is
    /// responsible for gating access to this path (invite code check in the
    /// handler); any role fields in the request payload are ignored.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn register_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserModel, ServiceError> {
        self.insert_user(username, email, password, true).await
    }

    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        elevated: bool,
    ) -> Result<UserModel, ServiceError> {
        // Uniqueness checks surface as field-level validation errors; the
        // unique indexes remain the backstop under concurrent registration.
        let taken = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::ValidationError(
                "username: already taken".to_string(),
            ));
        }

        let taken = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::ValidationError(
                "email: already registered".to_string(),
            ));
        }

        let user_id = Uuid::new_v4();
        let password_hash = password::hash_password(password)?;
        let now = Utc::now();

        let model = user::ActiveModel {
            id: Set(user_id),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            is_staff: Set(elevated),
            is_superuser: Set(elevated),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        let event = if elevated {
            Event::AdminRegistered(user_id)
        } else {
            Event::UserRegistered(user_id)
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(user_id = %user_id, "Failed to send registration event: {}", e);
        }

        info!(user_id = %user_id, elevated = elevated, "User registered");
        Ok(model)
    }

    /// Check credentials by email. Both an unknown email and a wrong password
    /// produce the same generic error so callers cannot probe for accounts.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserModel, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid credentials".to_string());

        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(invalid)?;

        if password::verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(invalid())
        }
    }

    /// Fetch an account by id.
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}
