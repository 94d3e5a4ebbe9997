//! Single entry point composing the object store and compute clients.

use std::time::Duration;

use aws_config::SdkConfig;

use crate::config::AwsCredentials;
use crate::ec2::Ec2;
use crate::s3::S3;

/// Facade over the resolved configuration and the SDK connection shared by
/// every child client.
///
/// Immutable after construction and safe to share across concurrent
/// callers; child clients borrow nothing and can outlive the facade.
#[derive(Clone, Debug)]
pub struct Aws {
    credentials: AwsCredentials,
    sdk_config: SdkConfig,
}

impl Aws {
    /// Starts a builder with every field left to resolution.
    #[must_use]
    pub fn builder() -> AwsBuilder {
        AwsBuilder::default()
    }

    /// Resolves everything from the environment and the SDK defaults.
    pub async fn from_env() -> Self {
        Self::builder().load().await
    }

    /// Read-only view of the resolved configuration.
    #[must_use]
    pub fn credentials(&self) -> &AwsCredentials {
        &self.credentials
    }

    /// Object store client scoped to `bucket` and an optional key prefix.
    #[must_use]
    pub fn s3(&self, bucket: impl Into<String>, prefix: Option<&str>) -> S3 {
        S3::new(
            aws_sdk_s3::Client::new(&self.sdk_config),
            bucket.into(),
            prefix,
        )
    }

    /// Compute client sharing this facade's configuration.
    #[must_use]
    pub fn ec2(&self) -> Ec2 {
        Ec2::new(&self.sdk_config, self.credentials.clone())
    }
}

/// Builder for [`Aws`] taking the optional explicit overrides.
#[derive(Clone, Debug, Default)]
pub struct AwsBuilder {
    region: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    operation_timeout: Option<Duration>,
}

impl AwsBuilder {
    /// Sets the region, overriding the environment.
    #[must_use]
    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    /// Sets the access key id, overriding the environment.
    #[must_use]
    pub fn access_key(mut self, value: impl Into<String>) -> Self {
        self.access_key = Some(value.into());
        self
    }

    /// Sets the secret access key, overriding the environment.
    #[must_use]
    pub fn secret_key(mut self, value: impl Into<String>) -> Self {
        self.secret_key = Some(value.into());
        self
    }

    /// Sets an operation timeout passed through to the SDK transport.
    /// Left unset, the SDK defaults apply.
    #[must_use]
    pub fn operation_timeout(mut self, value: Duration) -> Self {
        self.operation_timeout = Some(value);
        self
    }

    /// Resolves the effective configuration and loads the SDK connection.
    ///
    /// Pure resolution plus local SDK setup; no credential is validated
    /// until the first remote call.
    pub async fn load(self) -> Aws {
        let credentials = AwsCredentials::resolve(self.region, self.access_key, self.secret_key);
        let sdk_config = credentials.load_sdk_config(self.operation_timeout).await;
        Aws {
            credentials,
            sdk_config,
        }
    }
}
