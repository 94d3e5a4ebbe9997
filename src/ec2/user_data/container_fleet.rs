//! Template for single-container fleet instances.
//!
//! Renders a first-boot script that installs Docker and the AWS CLI, logs
//! into the container registry with the resolved credentials, pulls an
//! image, and runs it detached. The registry login embeds the resolved
//! credentials into the script; instance profiles are the better choice
//! where available.

use std::borrow::Cow;
use std::collections::BTreeMap;

use super::OsFamily;
use crate::config::AwsCredentials;
use crate::error::CloudError;

const YUM_INSTALL: &str = "yum update -y\n\
    yum install -y docker aws-cli\n\
    service docker start\n\
    usermod -a -G docker ec2-user";

const APT_INSTALL: &str = "apt-get update -y\n\
    apt-get install -y docker.io awscli\n\
    systemctl enable docker\n\
    systemctl start docker\n\
    usermod -a -G docker ubuntu || true";

/// User-data template that boots one container from a registry image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerFleet {
    image: String,
    os: OsFamily,
    env: BTreeMap<String, String>,
    cmd: String,
    tag: String,
    include_aws_env: bool,
}

impl ContainerFleet {
    /// Creates a template for the given registry image reference, for
    /// example `123456789012.dkr.ecr.us-east-1.amazonaws.com/worker`.
    ///
    /// Defaults: Amazon Linux, empty environment, the image's own
    /// entrypoint, tag `latest`, and AWS credentials seeded into the
    /// container environment.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            os: OsFamily::AmazonLinux,
            env: BTreeMap::new(),
            cmd: String::new(),
            tag: String::from("latest"),
            include_aws_env: true,
        }
    }

    /// Sets the target OS family.
    #[must_use]
    pub fn os(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    /// Adds one environment variable to the container.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the command line executed in the container, overriding the
    /// image's entrypoint. Empty (the default) keeps the image's own
    /// entrypoint and command.
    #[must_use]
    pub fn cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = cmd.into();
        self
    }

    /// Sets the image tag appended when the reference carries none.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Controls whether the resolved AWS credentials are seeded into the
    /// container environment. Caller-provided entries always win.
    #[must_use]
    pub fn include_aws_env(mut self, include: bool) -> Self {
        self.include_aws_env = include;
        self
    }

    pub(super) fn render(&self, credentials: &AwsCredentials) -> Result<String, CloudError> {
        let install = match self.os {
            OsFamily::AmazonLinux | OsFamily::RedHat => YUM_INSTALL,
            OsFamily::Ubuntu | OsFamily::Debian => APT_INSTALL,
            other => {
                return Err(CloudError::configuration(format!(
                    "container fleet user-data does not support the {other} OS family"
                )));
            }
        };

        let image = self.image_with_tag();
        let registry = registry_host(&image);
        let region = credentials.region().unwrap_or_default();
        let access_key = credentials.access_key().unwrap_or_default();
        let secret_key = credentials.secret_key().unwrap_or_default();

        let mut run_env = self.env.clone();
        if self.include_aws_env {
            if let Some(region) = credentials.region() {
                run_env
                    .entry(String::from("AWS_REGION"))
                    .or_insert_with(|| region.to_owned());
            }
            if let Some(access_key) = credentials.access_key() {
                run_env
                    .entry(String::from("AWS_ACCESS_KEY_ID"))
                    .or_insert_with(|| access_key.to_owned());
            }
            if let Some(secret_key) = credentials.secret_key() {
                run_env
                    .entry(String::from("AWS_SECRET_ACCESS_KEY"))
                    .or_insert_with(|| secret_key.to_owned());
            }
        }
        let env_flags = run_env
            .iter()
            .map(|(key, value)| format!("-e {}={}", quote(key), quote(value)))
            .collect::<Vec<_>>()
            .join(" ");

        let login = format!(
            "AWS_REGION={region} AWS_ACCESS_KEY_ID={access} AWS_SECRET_ACCESS_KEY={secret} \
             aws ecr get-login-password --region {region} \
             | docker login --username AWS --password-stdin {registry}",
            region = quote(region),
            access = quote(access_key),
            secret = quote(secret_key),
            registry = quote(registry),
        );

        let quoted_image = quote(&image);
        let docker_run = if self.cmd.is_empty() {
            format!("docker run -d --restart=always {env_flags} {quoted_image}")
        } else {
            format!(
                "docker run -d --restart=always --entrypoint '' {env_flags} {quoted_image} {}",
                self.cmd
            )
        };

        Ok(format!(
            "#!/bin/bash\n\
             set -euo pipefail\n\
             \n\
             {install}\n\
             \n\
             su - ec2-user -c \"{login}\"\n\
             su - ec2-user -c \"docker pull {quoted_image}\"\n\
             \n\
             su - ec2-user -c \"{docker_run}\"\n"
        ))
    }

    fn image_with_tag(&self) -> String {
        let last_segment = self.image.rsplit('/').next().unwrap_or(&self.image);
        if last_segment.contains(':') {
            self.image.clone()
        } else {
            format!("{}:{}", self.image, self.tag)
        }
    }
}

fn registry_host(image: &str) -> &str {
    image.split('/').next().unwrap_or(image)
}

fn quote(value: &str) -> Cow<'_, str> {
    shell_escape::escape(Cow::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> AwsCredentials {
        AwsCredentials::resolve(
            Some(String::from("us-east-1")),
            Some(String::from("AKIAEXAMPLE")),
            Some(String::from("secret-example")),
        )
    }

    fn fleet() -> ContainerFleet {
        ContainerFleet::new("123456789012.dkr.ecr.us-east-1.amazonaws.com/worker")
    }

    #[test]
    fn renders_yum_bootstrap_for_amazon_linux() {
        let script = fleet().render(&credentials()).expect("supported family");
        assert!(script.starts_with("#!/bin/bash\nset -euo pipefail\n"));
        assert!(script.contains("yum install -y docker aws-cli"));
        assert!(script.contains("docker login --username AWS"));
        assert!(script.contains("--password-stdin 123456789012.dkr.ecr.us-east-1.amazonaws.com"));
        assert!(script.contains("worker:latest"));
    }

    #[test]
    fn renders_apt_bootstrap_for_ubuntu() {
        let script = fleet()
            .os(OsFamily::Ubuntu)
            .render(&credentials())
            .expect("supported family");
        assert!(script.contains("apt-get install -y docker.io awscli"));
    }

    #[test]
    fn unsupported_families_are_rejected() {
        for family in [OsFamily::Windows, OsFamily::MacOs, OsFamily::SuseLinux] {
            assert!(matches!(
                fleet().os(family).render(&credentials()),
                Err(CloudError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn existing_tag_is_kept() {
        let script = fleet()
            .tag("v2")
            .render(&credentials())
            .expect("supported family");
        assert!(script.contains("worker:v2"));

        let pinned = ContainerFleet::new("registry.example.com/worker:pinned")
            .tag("v2")
            .render(&credentials())
            .expect("supported family");
        assert!(pinned.contains("worker:pinned"));
        assert!(!pinned.contains("worker:pinned:v2"));
    }

    #[test]
    fn aws_env_is_seeded_without_overriding_caller_entries() {
        let script = fleet()
            .env("AWS_REGION", "eu-west-3")
            .env("DEBUG", "true")
            .render(&credentials())
            .expect("supported family");
        assert!(script.contains("-e AWS_REGION=eu-west-3"));
        assert!(!script.contains("-e AWS_REGION=us-east-1"));
        assert!(script.contains("-e AWS_ACCESS_KEY_ID=AKIAEXAMPLE"));
        assert!(script.contains("-e DEBUG=true"));
    }

    #[test]
    fn aws_env_seeding_can_be_disabled() {
        let script = fleet()
            .include_aws_env(false)
            .render(&credentials())
            .expect("supported family");
        assert!(!script.contains("-e AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn values_needing_quotes_are_escaped() {
        let script = fleet()
            .env("MESSAGE", "hello world")
            .render(&credentials())
            .expect("supported family");
        assert!(script.contains("-e MESSAGE='hello world'"));
    }

    #[test]
    fn command_overrides_the_entrypoint() {
        let script = fleet()
            .cmd("python main.py --concurrency 5")
            .render(&credentials())
            .expect("supported family");
        assert!(script.contains("--entrypoint '' "));
        assert!(script.contains("python main.py --concurrency 5"));
    }

    #[test]
    fn default_run_keeps_the_image_entrypoint() {
        let script = fleet().render(&credentials()).expect("supported family");
        assert!(!script.contains("--entrypoint"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let first = fleet()
            .env("B", "2")
            .env("A", "1")
            .render(&credentials())
            .expect("supported family");
        let second = fleet()
            .env("A", "1")
            .env("B", "2")
            .render(&credentials())
            .expect("supported family");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_credentials_render_as_empty_quotes() {
        let script = fleet()
            .include_aws_env(false)
            .render(&AwsCredentials::default())
            .expect("supported family");
        assert!(script.contains("AWS_REGION='' AWS_ACCESS_KEY_ID='' AWS_SECRET_ACCESS_KEY=''"));
    }
}
