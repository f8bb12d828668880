//! Authentication service: bearer token issue/validation and profile resolution.
//!
//! Tokens are HS256 JWTs shared with the identity provider; `sub` carries the
//! user uid. Roles and allowed addresses are not trusted from the token but
//! read from the stored profile on every request.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::AppError;
use crate::models::user::{UpdateProfile, UserProfile, UserRole};
use crate::store::UtilityStore;

/// JWT claims carried by access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issue an access token for a uid. Used by the seed tool and tests; in
/// production tokens come from the identity provider.
pub fn issue_token(
    uid: &str,
    email: &str,
    jwt_secret: &str,
    expiry_secs: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: uid.to_string(),
        email: email.to_string(),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    };
    let key = EncodingKey::from_secret(jwt_secret.as_bytes());
    jsonwebtoken::encode(&Header::default(), &claims, &key)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
}

/// Validate a JWT and return the claims.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let validation = Validation::default();

    jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

/// Load the stored profile for validated claims, provisioning a plain user
/// profile with no address access on first sign-in.
pub async fn resolve_profile(
    store: &dyn UtilityStore,
    claims: &Claims,
) -> Result<UserProfile, AppError> {
    if let Some(profile) = store.get_user(&claims.sub).await? {
        return Ok(profile);
    }

    let profile = UserProfile {
        uid: claims.sub.clone(),
        email: claims.email.clone(),
        display_name: None,
        role: UserRole::User,
        allowed_addresses: Vec::new(),
        created_at: Utc::now(),
    };
    store.upsert_user(&profile).await?;
    tracing::info!(uid = %profile.uid, "Provisioned user profile on first sign-in");
    Ok(profile)
}

/// Update the caller's own display name.
pub async fn update_profile(
    store: &dyn UtilityStore,
    user: &UserProfile,
    update: &UpdateProfile,
) -> Result<UserProfile, AppError> {
    update.validate()?;
    let display_name = update
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let profile = store.update_display_name(&user.uid, display_name).await?;
    tracing::info!(uid = %profile.uid, "Profile updated");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn token_generation_and_validation() {
        let secret = "test-secret-key-for-jwt";
        let token = issue_token("uid-1", "owner@example.com", secret, 900).unwrap();

        let claims = validate_token(&token, secret).unwrap();
        assert_eq!(claims.sub, "uid-1");
        assert_eq!(claims.email, "owner@example.com");
    }

    #[test]
    fn invalid_token_rejected() {
        let result = validate_token("garbage.token.here", "secret");
        assert!(result.is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_token("uid-1", "a@b.c", "secret-a", 900).unwrap();
        assert!(matches!(
            validate_token(&token, "secret-b"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_rejected() {
        let secret = "test-secret";
        // Expired well beyond the 60s leeway window
        let token = issue_token("uid-1", "a@b.c", secret, -3600).unwrap();
        assert!(validate_token(&token, secret).is_err());
    }

    #[tokio::test]
    async fn first_sign_in_provisions_plain_user() {
        let store = InMemoryStore::new();
        let claims = Claims {
            sub: "new-uid".to_string(),
            email: "new@example.com".to_string(),
            exp: 0,
            iat: 0,
        };
        let profile = resolve_profile(&store, &claims).await.unwrap();
        assert_eq!(profile.role, UserRole::User);
        assert!(profile.allowed_addresses.is_empty());
        assert!(store.get_user("new-uid").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn profile_update_trims_and_clears_display_name() {
        let store = InMemoryStore::new();
        let claims = Claims {
            sub: "u1".to_string(),
            email: "u1@example.com".to_string(),
            exp: 0,
            iat: 0,
        };
        let user = resolve_profile(&store, &claims).await.unwrap();

        let named = update_profile(
            &store,
            &user,
            &UpdateProfile {
                display_name: Some("  Olena  ".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(named.display_name.as_deref(), Some("Olena"));
        assert_eq!(named.role, UserRole::User);

        let cleared = update_profile(
            &store,
            &user,
            &UpdateProfile {
                display_name: Some("   ".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.display_name, None);

        let err = update_profile(
            &store,
            &user,
            &UpdateProfile {
                display_name: Some("x".repeat(101)),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn existing_profile_is_returned() {
        let store = InMemoryStore::new();
        let mut admin = UserProfile {
            uid: "admin".to_string(),
            email: "admin@example.com".to_string(),
            display_name: Some("Admin".to_string()),
            role: UserRole::Admin,
            allowed_addresses: Vec::new(),
            created_at: Utc::now(),
        };
        store.upsert_user(&admin).await.unwrap();
        admin.email = "ignored@example.com".to_string();

        let claims = Claims {
            sub: "admin".to_string(),
            email: admin.email.clone(),
            exp: 0,
            iat: 0,
        };
        let profile = resolve_profile(&store, &claims).await.unwrap();
        assert!(profile.is_admin());
        assert_eq!(profile.email, "admin@example.com");
    }
}
