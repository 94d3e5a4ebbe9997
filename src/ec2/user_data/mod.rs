//! First-boot user-data for new instances.
//!
//! User-data is either raw text passed through untouched or a template
//! rendered to a bootstrap script at instance creation. Rendering is pure
//! and deterministic; no remote call is made.

mod container_fleet;

pub use container_fleet::ContainerFleet;

use crate::config::AwsCredentials;
use crate::error::CloudError;

/// Operating system family a boot script targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OsFamily {
    /// Amazon Linux.
    AmazonLinux,
    /// Debian.
    Debian,
    /// Ubuntu.
    Ubuntu,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// Red Hat Enterprise Linux.
    RedHat,
    /// SUSE Linux.
    SuseLinux,
}

impl OsFamily {
    /// Canonical name of the OS family.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AmazonLinux => "amazon_linux",
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::RedHat => "red_hat",
            Self::SuseLinux => "suse_linux",
        }
    }

    /// Parses a canonical name into the closed enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] for unrecognised names.
    pub fn parse(value: &str) -> Result<Self, CloudError> {
        match value {
            "amazon_linux" => Ok(Self::AmazonLinux),
            "debian" => Ok(Self::Debian),
            "ubuntu" => Ok(Self::Ubuntu),
            "macos" => Ok(Self::MacOs),
            "windows" => Ok(Self::Windows),
            "red_hat" => Ok(Self::RedHat),
            "suse_linux" => Ok(Self::SuseLinux),
            other => Err(CloudError::configuration(format!(
                "unknown OS family '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-data consumed by the instance's first boot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserData {
    /// Raw script text, passed to the provider untouched.
    Raw(String),
    /// Script rendered from a container fleet template.
    ContainerFleet(ContainerFleet),
}

impl UserData {
    /// Renders the user-data to the text blob handed to the provider.
    ///
    /// Raw text passes through untouched; templates render against the
    /// resolved credentials and end with exactly one trailing newline.
    /// Deterministic for identical inputs.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when a template does not
    /// support its target OS family.
    pub fn render(&self, credentials: &AwsCredentials) -> Result<String, CloudError> {
        match self {
            Self::Raw(text) => Ok(text.clone()),
            Self::ContainerFleet(template) => {
                let script = template.render(credentials)?;
                Ok(format!("{}\n", script.trim_end()))
            }
        }
    }
}

impl From<ContainerFleet> for UserData {
    fn from(template: ContainerFleet) -> Self {
        Self::ContainerFleet(template)
    }
}

impl From<String> for UserData {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<&str> for UserData {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_user_data_passes_through_untouched() {
        let data = UserData::from("#!/bin/bash\necho hi");
        assert_eq!(
            data.render(&AwsCredentials::default()),
            Ok(String::from("#!/bin/bash\necho hi"))
        );
    }

    #[test]
    fn os_family_names_round_trip() {
        for family in [
            OsFamily::AmazonLinux,
            OsFamily::Debian,
            OsFamily::Ubuntu,
            OsFamily::MacOs,
            OsFamily::Windows,
            OsFamily::RedHat,
            OsFamily::SuseLinux,
        ] {
            assert_eq!(OsFamily::parse(family.as_str()), Ok(family));
        }
        assert!(matches!(
            OsFamily::parse("solaris"),
            Err(CloudError::Configuration { .. })
        ));
    }
}
