//! Caller identity.
//!
//! The gateway in front of the pipeline has already authenticated the caller
//! and hands over an [`AuthContext`]: verified token claims, an API key, or
//! nothing. This module normalizes that into an [`Identity`] for order
//! attribution and renders the [`UserInfo`] profile.
//!
//! Token claims arrive in whatever shape the identity provider emits, so the
//! flag and timestamp claims accept both strings (`"true"`, `"1700000000"`)
//! and native JSON values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Verified token claims supplied by the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (stable user id)
    pub sub: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the email address was verified
    #[serde(default, deserialize_with = "flexible_bool")]
    pub email_verified: bool,
    /// When the user authenticated (epoch seconds)
    #[serde(default, deserialize_with = "flexible_seconds")]
    pub auth_time: Option<i64>,
    /// Token issue time (epoch seconds)
    #[serde(default, deserialize_with = "flexible_seconds")]
    pub iat: Option<i64>,
    /// Token expiry (epoch seconds)
    #[serde(default, deserialize_with = "flexible_seconds")]
    pub exp: Option<i64>,
}

/// What the gateway established about the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthContext {
    /// Token claims from the user pool authorizer
    Claims(Claims),
    /// A bare API key
    ApiKey {
        /// The key value
        key: String,
    },
    /// Nothing was established
    Anonymous,
}

impl AuthContext {
    /// Claims, when the context carries them.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Claims(claims) => Some(claims),
            Self::ApiKey { .. } | Self::Anonymous => None,
        }
    }
}

/// How an identity was established.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    /// Token claims
    Claims,
    /// API key
    ApiKey,
    /// No authentication
    None,
}

impl AuthMethod {
    /// Tag used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Claims => "claims",
            Self::ApiKey => "api-key",
            Self::None => "none",
        }
    }
}

/// Normalized caller identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User id orders are attributed to
    pub user_id: String,
    /// Contact email copied onto orders
    pub email: String,
    /// Display name
    pub name: String,
    /// How the identity was established
    pub auth_method: AuthMethod,
}

impl Identity {
    /// Contact email for API key callers.
    pub const API_KEY_EMAIL: &'static str = "api-key-user@example.com";
    /// Display name for API key callers.
    pub const API_KEY_NAME: &'static str = "API Key User";
    /// User id for unauthenticated callers.
    pub const ANONYMOUS_ID: &'static str = "anonymous";
    /// Contact email for unauthenticated callers.
    pub const ANONYMOUS_EMAIL: &'static str = "anonymous@example.com";
    /// Display name for unauthenticated callers.
    pub const ANONYMOUS_NAME: &'static str = "Anonymous";

    /// Whether this identity was actually authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_method != AuthMethod::None
    }
}

/// Normalize an [`AuthContext`]. Never fails.
#[must_use]
pub fn identify(context: &AuthContext) -> Identity {
    match context {
        AuthContext::Claims(claims) => Identity {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| claims.email.clone()),
            auth_method: AuthMethod::Claims,
        },
        AuthContext::ApiKey { key } => Identity {
            user_id: key.clone(),
            email: Identity::API_KEY_EMAIL.to_string(),
            name: Identity::API_KEY_NAME.to_string(),
            auth_method: AuthMethod::ApiKey,
        },
        AuthContext::Anonymous => Identity {
            user_id: Identity::ANONYMOUS_ID.to_string(),
            email: Identity::ANONYMOUS_EMAIL.to_string(),
            name: Identity::ANONYMOUS_NAME.to_string(),
            auth_method: AuthMethod::None,
        },
    }
}

/// Authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The operation requires an authenticated caller.
    #[error("Unauthorized")]
    Unauthorized,
}

/// Profile returned to a claims-authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Subject
    pub user_id: String,
    /// Email address
    pub email: String,
    /// Display name, if the token carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the email address was verified
    pub email_verified: bool,
    /// Authentication time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<String>,
    /// Token issue time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_issued: Option<String>,
    /// Token expiry (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires: Option<String>,
}

/// Render the caller's profile.
///
/// # Errors
///
/// Returns [`AuthenticationError::Unauthorized`] unless the context carries
/// token claims.
pub fn user_info(context: &AuthContext) -> Result<UserInfo, AuthenticationError> {
    let claims = context.claims().ok_or(AuthenticationError::Unauthorized)?;

    Ok(UserInfo {
        user_id: claims.sub.clone(),
        email: claims.email.clone(),
        name: claims.name.clone(),
        email_verified: claims.email_verified,
        auth_time: claims.auth_time.and_then(epoch_to_rfc3339),
        token_issued: claims.iat.and_then(epoch_to_rfc3339),
        token_expires: claims.exp.and_then(epoch_to_rfc3339),
    })
}

fn epoch_to_rfc3339(seconds: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOr<T> {
    Native(T),
    Text(String),
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOr<bool>>::deserialize(deserializer)? {
        Some(StringOr::Native(flag)) => flag,
        Some(StringOr::Text(text)) => text.eq_ignore_ascii_case("true"),
        None => false,
    })
}

fn flexible_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOr<i64>>::deserialize(deserializer)? {
        Some(StringOr::Native(seconds)) => Some(seconds),
        Some(StringOr::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}
