//! Prefix-scoped object storage over Amazon S3.
//!
//! Every operation takes a cloud-relative path and joins it with the
//! client's normalized prefix before any network call. Callers never see the
//! joined key unless they ask for it via [`S3::key_for`].

pub mod text;

use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use camino::Utf8Path;
use tracing::debug;

use crate::error::{CloudError, classify_remote};

pub use text::{CsvRows, Lines, Text};

/// Object store client scoped to one bucket and an optional key prefix.
#[derive(Clone, Debug)]
pub struct S3 {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3 {
    pub(crate) fn new(client: Client, bucket: String, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket,
            prefix: normalize_prefix(prefix),
        }
    }

    /// Bucket every operation targets.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Normalized prefix: empty, or free of leading slashes with exactly one
    /// trailing slash.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full key a cloud-relative path resolves to.
    #[must_use]
    pub fn key_for(&self, cloud: &str) -> String {
        format!("{}{}", self.prefix, cloud.trim_start_matches('/'))
    }

    /// Text operations scoped to this client.
    #[must_use]
    pub fn text(&self) -> Text<'_> {
        Text::new(self)
    }

    /// Uploads a local file as the object body at the resolved key.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::LocalIo`] when the local file cannot be read,
    /// [`CloudError::RemoteIo`] when the provider rejects the write (missing
    /// bucket, permissions), or [`CloudError::Authentication`] when the
    /// credentials are rejected.
    pub async fn upload(&self, local: &Utf8Path, cloud: &str) -> Result<(), CloudError> {
        let key = self.key_for(cloud);
        let body = ByteStream::from_path(local.as_std_path())
            .await
            .map_err(|err| CloudError::LocalIo {
                path: local.to_owned(),
                message: err.to_string(),
            })?;
        debug!(bucket = %self.bucket, key = %key, "uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|err| map_sdk_error("upload", &key, err))?;
        Ok(())
    }

    /// Downloads the object at the resolved key to a local file, creating
    /// parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteNotFound`] when the key does not exist and
    /// [`CloudError::LocalIo`] when the destination cannot be written.
    pub async fn download(&self, cloud: &str, local: &Utf8Path) -> Result<(), CloudError> {
        let key = self.key_for(cloud);
        debug!(bucket = %self.bucket, key = %key, "downloading object");
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| map_sdk_error("download", &key, err))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|err| CloudError::RemoteIo {
                operation: "download",
                target: key.clone(),
                message: err.to_string(),
            })?
            .into_bytes();
        if let Some(parent) = local.parent()
            && !parent.as_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| CloudError::LocalIo {
                    path: parent.to_owned(),
                    message: err.to_string(),
                })?;
        }
        tokio::fs::write(local.as_std_path(), &bytes)
            .await
            .map_err(|err| CloudError::LocalIo {
                path: local.to_owned(),
                message: err.to_string(),
            })
    }

    /// Deletes the object at the resolved key.
    ///
    /// Idempotent: deleting a key that does not exist succeeds, mirroring
    /// the provider's own delete semantics. Callers that need to distinguish
    /// the two cases must check for the object first.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteIo`] when the provider rejects the delete
    /// or [`CloudError::Authentication`] when the credentials are rejected.
    pub async fn remove(&self, cloud: &str) -> Result<(), CloudError> {
        let key = self.key_for(cloud);
        debug!(bucket = %self.bucket, key = %key, "removing object");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| map_sdk_error("remove", &key, err))?;
        Ok(())
    }

    /// Moves the object from one resolved key to another by copying it and
    /// then deleting the original. Named `move_object` because `move` is a
    /// Rust keyword.
    ///
    /// Not atomic: when the copy succeeds but the delete fails, the object
    /// exists at both keys and the call fails with
    /// [`CloudError::PartialMove`] carrying both resolved keys so the caller
    /// can remediate the duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteNotFound`] when the original key does not
    /// exist, [`CloudError::PartialMove`] when only the delete sub-step
    /// failed, and [`CloudError::RemoteIo`] for other provider rejections.
    pub async fn move_object(&self, original: &str, new: &str) -> Result<(), CloudError> {
        let source_key = self.key_for(original);
        let destination_key = self.key_for(new);
        debug!(
            bucket = %self.bucket,
            source = %source_key,
            destination = %destination_key,
            "moving object"
        );
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, source_key))
            .key(&destination_key)
            .send()
            .await
            .map_err(|err| map_sdk_error("move", &source_key, err))?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&source_key)
            .send()
            .await
            .map_err(|err| CloudError::PartialMove {
                source_key: source_key.clone(),
                destination_key: destination_key.clone(),
                message: DisplayErrorContext(err).to_string(),
            })?;
        Ok(())
    }
}

fn normalize_prefix(prefix: Option<&str>) -> String {
    let Some(prefix) = prefix else {
        return String::new();
    };
    let trimmed = prefix.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}/")
}

fn map_sdk_error<E, R>(operation: &'static str, target: &str, err: SdkError<E, R>) -> CloudError
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
