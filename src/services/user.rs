//! User service implementation
//!
//! Admin-side account management: listing users and changing role or
//! active flag.

use tracing::{info, debug};
use crate::database::repositories::UserRepository;
use crate::models::{Pagination, UpdateUserRequest, User, UserRole};
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::helpers::normalize_phone;
use crate::utils::logging::log_admin_action;

/// User service for managing user operations
#[derive(Clone)]
pub struct UserService {
    user_repository: UserRepository,
}

impl UserService {
    pub fn new(user_repository: UserRepository) -> Self {
        Self { user_repository }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.user_repository.find_by_id(user_id).await?
            .ok_or(MaabaraError::UserNotFound { user_id })
    }

    pub async fn list_users(&self, pagination: Pagination) -> Result<Vec<User>> {
        debug!(page = pagination.page, "Listing users");
        self.user_repository.list(pagination.limit(), pagination.offset()).await
    }

    /// Update a user on behalf of an admin
    ///
    /// Admins cannot demote or deactivate themselves.
    pub async fn update_user(&self, user_id: i64, mut request: UpdateUserRequest, admin_id: i64) -> Result<User> {
        if user_id == admin_id {
            if request.role.is_some_and(|role| role != UserRole::Admin) {
                return Err(MaabaraError::InvalidInput("You cannot remove your own admin role".to_string()));
            }
            if request.is_active == Some(false) {
                return Err(MaabaraError::InvalidInput("You cannot deactivate your own account".to_string()));
            }
        }

        if let Some(phone) = request.phone.as_deref() {
            request.phone = Some(normalize_phone(phone)?);
        }

        let user = self.user_repository.update(user_id, request).await?;
        info!(user_id = user.id, role = %user.role, is_active = user.is_active, "User updated");
        log_admin_action(admin_id, "user_updated", Some(&user_id.to_string()), None);

        Ok(user)
    }
}
