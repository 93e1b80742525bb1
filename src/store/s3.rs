// src/store/s3.rs

//! S3-compatible object store
//!
//! Wraps the async AWS SDK behind the blocking [`ObjectStore`] trait. A
//! private multi-threaded tokio runtime drives the requests, so any number
//! of executor threads can call in at once.

use super::{CompletedPart, ObjectStore};
use crate::config::StoreConfig;
use crate::error::{Error, Result, StoreOp};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart, ObjectCannedAcl};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Object store backed by an S3 bucket
pub struct S3Store {
    client: S3Client,
    runtime: Runtime,
    config: StoreConfig,
}

impl S3Store {
    /// Connect using explicit credentials and an optional custom endpoint
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key.clone().unwrap_or_default(),
            config.secret_key.clone().unwrap_or_default(),
            None,
            None,
            "pkgsync",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("pkgsync-s3")
            .build()
            .map_err(|e| Error::Config(format!("Failed to start async runtime: {}", e)))?;

        info!(
            "Using bucket s3://{}/{} ({})",
            config.bucket,
            config.root_prefix,
            config.endpoint.as_deref().unwrap_or("default endpoint")
        );

        Ok(Self {
            client,
            runtime,
            config: config.clone(),
        })
    }

    fn key(&self, name: &str) -> String {
        self.config.object_key(name)
    }

    fn acl(&self) -> Option<ObjectCannedAcl> {
        self.config.public_read.then_some(ObjectCannedAcl::PublicRead)
    }
}

impl ObjectStore for S3Store {
    fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let key = self.key(key);
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .set_acl(self.acl())
                    .body(ByteStream::from(body))
                    .send(),
            )
            .map_err(|e| Error::store(StoreOp::Put, &key, DisplayErrorContext(&e)))?;
        debug!("Put s3://{}/{}", self.config.bucket, key);
        Ok(())
    }

    fn get(&self, key: &str, dest: &Path) -> Result<()> {
        let key = self.key(key);
        self.runtime.block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(&self.config.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Error::store(StoreOp::Get, &key, DisplayErrorContext(&e)))?;

            let mut file = File::create(dest)?;
            let mut body = response.body;
            while let Some(chunk) = body
                .try_next()
                .await
                .map_err(|e| Error::store(StoreOp::Get, &key, e))?
            {
                file.write_all(&chunk)?;
            }
            file.sync_all()?;
            Ok::<_, Error>(())
        })?;
        debug!("Downloaded s3://{}/{} to {}", self.config.bucket, key, dest.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let key = self.key(key);
        self.runtime
            .block_on(
                self.client
                    .delete_object()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .send(),
            )
            .map_err(|e| Error::store(StoreOp::Delete, &key, DisplayErrorContext(&e)))?;
        debug!("Deleted s3://{}/{}", self.config.bucket, key);
        Ok(())
    }

    fn head_exists(&self, key: &str) -> Result<bool> {
        let key = self.key(key);
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.config.bucket)
                .key(&key)
                .send(),
        );

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(Error::store(StoreOp::Head, &key, DisplayErrorContext(&e))),
        }
    }

    fn create_multipart(&self, key: &str) -> Result<String> {
        let key = self.key(key);
        let response = self
            .runtime
            .block_on(
                self.client
                    .create_multipart_upload()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .set_acl(self.acl())
                    .send(),
            )
            .map_err(|e| Error::store(StoreOp::CreateMultipart, &key, DisplayErrorContext(&e)))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::store(StoreOp::CreateMultipart, &key, "no upload ID returned"))
    }

    fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String> {
        let key = self.key(key);
        let response = self
            .runtime
            .block_on(
                self.client
                    .upload_part()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .body(ByteStream::from(body))
                    .send(),
            )
            .map_err(|e| Error::store(StoreOp::UploadPart, &key, DisplayErrorContext(&e)))?;

        response
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| Error::store(StoreOp::UploadPart, &key, "no ETag returned for part"))
    }

    fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let key = self.key(key);
        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        S3CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(&part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.runtime
            .block_on(
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .upload_id(upload_id)
                    .multipart_upload(completed_upload)
                    .send(),
            )
            .map_err(|e| {
                Error::store(StoreOp::CompleteMultipart, &key, DisplayErrorContext(&e))
            })?;
        Ok(())
    }

    fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()> {
        let key = self.key(key);
        self.runtime
            .block_on(
                self.client
                    .abort_multipart_upload()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .upload_id(upload_id)
                    .send(),
            )
            .map_err(|e| Error::store(StoreOp::AbortMultipart, &key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        let config = StoreConfig::new("bucket");
        assert!(matches!(S3Store::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_keys_carry_root_prefix() {
        let mut config = StoreConfig::new("bucket").with_root_prefix("/arch/x86_64");
        config.access_key = Some("key".to_string());
        config.secret_key = Some("secret".to_string());
        config.endpoint = Some("http://127.0.0.1:9000".to_string());
        config.public_read = false;

        let store = S3Store::new(&config).unwrap();
        assert_eq!(store.key("core.db.tar.gz"), "arch/x86_64/core.db.tar.gz");
        assert!(store.acl().is_none());
    }
}
