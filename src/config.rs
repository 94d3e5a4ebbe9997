//! Credential resolution for the facade and its child clients.
//!
//! Explicit constructor arguments always win, unset fields fall back to the
//! AWS environment variables, and anything still unresolved is left to the
//! SDK's own discovery chain (profile files, IMDS, SSO). Resolution is pure:
//! no network call is made and no credential is validated locally. Bad
//! credentials surface from the first remote call as an
//! [`Authentication`](crate::CloudError::Authentication) error.

use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;

/// Environment variable consulted first for the region.
pub const REGION_VAR: &str = "AWS_REGION";
/// Environment variable consulted when [`REGION_VAR`] is unset.
pub const REGION_FALLBACK_VAR: &str = "AWS_DEFAULT_REGION";
/// Environment variable consulted for the access key id.
pub const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable consulted for the secret access key.
pub const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";

/// Effective configuration shared read-only by every child client.
///
/// Immutable once constructed and cheap to clone; safe to share across
/// concurrent callers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AwsCredentials {
    region: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl AwsCredentials {
    /// Merges explicit arguments with environment-derived defaults.
    ///
    /// Per field: the explicit argument wins, then the named environment
    /// variable, then the field stays unset and the SDK's default discovery
    /// applies when the configuration is loaded. Empty environment values
    /// are treated as unset.
    #[must_use]
    pub fn resolve(
        region: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Self {
        Self::resolve_with(region, access_key, secret_key, |name| {
            std::env::var(name).ok().filter(|value| !value.is_empty())
        })
    }

    fn resolve_with<F>(
        region: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            region: region
                .or_else(|| lookup(REGION_VAR))
                .or_else(|| lookup(REGION_FALLBACK_VAR)),
            access_key: access_key.or_else(|| lookup(ACCESS_KEY_VAR)),
            secret_key: secret_key.or_else(|| lookup(SECRET_KEY_VAR)),
        }
    }

    /// Resolved region, if any source provided one.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Resolved access key id, if any source provided one.
    #[must_use]
    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref()
    }

    /// Resolved secret access key, if any source provided one.
    #[must_use]
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    /// Lowers the resolved values onto the SDK configuration loader.
    ///
    /// A static credentials provider is installed only when both keys
    /// resolved; a lone key falls through to the SDK discovery chain. The
    /// optional operation timeout is a pass-through to the SDK transport,
    /// which otherwise keeps its defaults.
    pub async fn load_sdk_config(&self, operation_timeout: Option<Duration>) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(access_key), Some(secret_key)) = (&self.access_key, &self.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "stratus",
            ));
        }
        if let Some(timeout) = operation_timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder().operation_timeout(timeout).build(),
            );
        }
        loader.load().await
    }
}
