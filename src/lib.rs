//! Thin convenience layer over the AWS SDK.
//!
//! The crate wraps `aws-sdk-s3` and `aws-sdk-ec2` behind a smaller, safer
//! surface: prefix-scoped object storage, a text accessor with line and CSV
//! streaming, and an instance lifecycle handle with tagged-variant volume and
//! user-data specifications. All network behaviour delegates to the SDK; this
//! layer only reshapes it.
//!
//! ```no_run
//! use camino::Utf8Path;
//! use stratus::{Aws, InstanceSpec};
//!
//! # async fn demo() -> Result<(), stratus::CloudError> {
//! let aws = Aws::from_env().await;
//!
//! let store = aws.s3("my-bucket", Some("reports/2026"));
//! store
//!     .upload(Utf8Path::new("out/summary.pdf"), "summary.pdf")
//!     .await?;
//!
//! let ec2 = aws.ec2();
//! let spec = InstanceSpec::builder()
//!     .machine_type("t4g.micro")
//!     .key_pair("my-keypair")
//!     .build()?;
//! let mut instance = ec2.instance(spec);
//! instance.create().await?;
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod config;
pub mod ec2;
pub mod error;
pub mod s3;

pub use aws::{Aws, AwsBuilder};
pub use config::AwsCredentials;
pub use ec2::{
    ContainerFleet, Ec2, Instance, InstanceSpec, InstanceSpecBuilder, OsFamily, PricingMode,
    UserData, Volume, VolumeType,
};
pub use error::CloudError;
pub use s3::{CsvRows, Lines, S3, Text};
