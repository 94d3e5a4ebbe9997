//! Simplified instance management over Amazon EC2.

pub mod instance;
pub mod user_data;
pub mod volume;

use aws_config::SdkConfig;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{Instance as Ec2Instance, Tag};
use regex::Regex;
use tracing::debug;

use crate::config::AwsCredentials;
use crate::error::{CloudError, classify_remote};

pub use instance::{Instance, InstanceSpec, InstanceSpecBuilder, PricingMode};
pub use user_data::{ContainerFleet, OsFamily, UserData};
pub use volume::{DEFAULT_VOLUME_GIB, Volume, VolumeType};

/// Compute client handing out instance handles.
#[derive(Clone, Debug)]
pub struct Ec2 {
    client: Client,
    credentials: AwsCredentials,
}

impl Ec2 {
    pub(crate) fn new(sdk_config: &SdkConfig, credentials: AwsCredentials) -> Self {
        Self {
            client: Client::new(sdk_config),
            credentials,
        }
    }

    /// Unbound handle for an instance yet to be created from `spec`.
    #[must_use]
    pub fn instance(&self, spec: InstanceSpec) -> Instance {
        Instance::unbound(self.client.clone(), self.credentials.clone(), spec)
    }

    /// Bound handle referencing an existing instance by id. No other fields
    /// are required; nothing is validated remotely until a lifecycle call.
    #[must_use]
    pub fn instance_from_id(&self, id: impl Into<String>) -> Instance {
        Instance::bound(self.client.clone(), self.credentials.clone(), id.into())
    }

    /// Bound handles for every visible instance whose name tag matches
    /// `pattern` in full.
    ///
    /// The pattern is anchored before compiling, so `web-\d+` matches
    /// `web-1` but not `prod-web-1`. Unnamed instances are excluded.
    /// Provider-side pagination is followed transparently; no limit is
    /// imposed here.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when the pattern is not a
    /// valid regular expression and [`CloudError::RemoteIo`] when the
    /// listing fails.
    pub async fn find_by_name(&self, pattern: &str) -> Result<Vec<Instance>, CloudError> {
        let regex = anchored(pattern)?;
        debug!(pattern = %pattern, "listing instances by name");
        let mut matches = Vec::new();
        let mut pages = self.client.describe_instances().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| map_sdk_error("find_by_name", pattern, err))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    if let (Some(id), Some(name)) = (instance.instance_id(), name_tag(instance))
                        && regex.is_match(name)
                    {
                        matches.push(self.instance_from_id(id));
                    }
                }
            }
        }
        Ok(matches)
    }
}

fn anchored(pattern: &str) -> Result<Regex, CloudError> {
    Regex::new(&format!("\\A(?:{pattern})\\z")).map_err(|err| {
        CloudError::configuration(format!("invalid instance name pattern '{pattern}': {err}"))
    })
}

fn name_tag(instance: &Ec2Instance) -> Option<&str> {
    instance
        .tags()
        .iter()
        .find(|tag| tag.key() == Some("Name"))
        .and_then(Tag::value)
}

pub(crate) fn map_sdk_error<E, R>(
    operation: &'static str,
    target: &str,
    err: SdkError<E, R>,
) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let code = err
        .as_service_error()
        .and_then(ProvideErrorMetadata::code)
        .map(str::to_owned);
    classify_remote(
        operation,
        target,
        code.as_deref(),
        DisplayErrorContext(err).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_instance(id: &str, name: Option<&str>) -> Ec2Instance {
        let mut builder = Ec2Instance::builder().instance_id(id);
        if let Some(name) = name {
            builder = builder.tags(Tag::builder().key("Name").value(name).build());
        }
        builder.tags(Tag::builder().key("team").value("data").build()).build()
    }

    #[test]
    fn name_tag_is_extracted_among_other_tags() {
        let instance = tagged_instance("i-1", Some("warmer-3"));
        assert_eq!(name_tag(&instance), Some("warmer-3"));
    }

    #[test]
    fn unnamed_instances_have_no_name_tag() {
        let instance = tagged_instance("i-2", None);
        assert_eq!(name_tag(&instance), None);
    }

    #[test]
    fn matching_is_anchored_to_the_full_name() {
        let regex = anchored("web-\\d+").expect("valid pattern");
        assert!(regex.is_match("web-1"));
        assert!(regex.is_match("web-42"));
        assert!(!regex.is_match("prod-web-1"));
        assert!(!regex.is_match("web-1-blue"));
    }

    #[test]
    fn plain_names_match_exactly() {
        let regex = anchored("warmer").expect("valid pattern");
        assert!(regex.is_match("warmer"));
        assert!(!regex.is_match("prewarmer"));
        assert!(!regex.is_match("warmers"));
    }

    #[test]
    fn invalid_patterns_are_a_configuration_error() {
        assert!(matches!(
            anchored("web-["),
            Err(CloudError::Configuration { .. })
        ));
    }
}
