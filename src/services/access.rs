//! Address visibility and user administration.

use crate::errors::AppError;
use crate::models::address::AddressEntry;
use crate::models::user::{UserProfile, UserRole};
use crate::store::UtilityStore;

/// Addresses the user may see: all of them for admins, the allowed list otherwise.
pub async fn visible_addresses(
    store: &dyn UtilityStore,
    user: &UserProfile,
) -> Result<Vec<AddressEntry>, AppError> {
    Ok(user.visible(store.list_addresses().await?))
}

/// Fail with `Forbidden` unless the user may work with this address.
pub fn ensure_access(user: &UserProfile, address_id: &str) -> Result<(), AppError> {
    if user.can_access(address_id) {
        Ok(())
    } else {
        tracing::warn!(uid = %user.uid, address_id, "Address access denied");
        Err(AppError::Forbidden(format!(
            "No access to address '{address_id}'"
        )))
    }
}

pub async fn set_role(
    store: &dyn UtilityStore,
    uid: &str,
    role: UserRole,
) -> Result<UserProfile, AppError> {
    let user = store.update_user_role(uid, role).await?;
    tracing::info!(uid, role = ?role, "User role updated");
    Ok(user)
}

/// Replace a user's allowed addresses. Every id must name an existing address.
pub async fn set_allowed_addresses(
    store: &dyn UtilityStore,
    uid: &str,
    address_ids: &[String],
) -> Result<UserProfile, AppError> {
    let known = store.list_addresses().await?;
    if let Some(unknown) = address_ids
        .iter()
        .find(|id| !known.iter().any(|a| &a.id == *id))
    {
        return Err(AppError::Validation(format!("Unknown address '{unknown}'")));
    }

    let mut ids = address_ids.to_vec();
    ids.sort();
    ids.dedup();
    let user = store.update_allowed_addresses(uid, &ids).await?;
    tracing::info!(uid, count = ids.len(), "Allowed addresses updated");
    Ok(user)
}
