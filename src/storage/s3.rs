//! S3-compatible object storage backend.
//!
//! Works against AWS S3 as well as MinIO/R2-style services via the
//! `endpoint_url` and `force_path_style` overrides. Credentials fall back to
//! the SDK's default provider chain when not given explicitly.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;

use super::{ScopedDownload, Storage, StorageError};

/// Connection parameters for an S3-compatible bucket.
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn connect(options: S3Options) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = options.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = options.endpoint_url.clone() {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key_id), Some(secret_access_key)) = (
            options.access_key_id.clone(),
            options.secret_access_key.clone(),
        ) {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                options.session_token.clone(),
                None,
                "xivbkmdl-config",
            ));
        }

        let shared_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(options.force_path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: options.bucket,
        }
    }

    fn store_err(key: &str, source: impl Into<anyhow::Error>) -> StorageError {
        StorageError::ObjectStore {
            key: key.to_string(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| Self::store_err(prefix, e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn download(&self, key: &str) -> Result<ScopedDownload, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                return Err(Self::store_err(key, err));
            }
        };

        let tmpdir = tempfile::tempdir().map_err(|e| StorageError::Io {
            key: key.to_string(),
            source: e,
        })?;
        let path = tmpdir.path().join("blob");

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::Io {
                key: key.to_string(),
                source: e,
            })?;
        let mut body = output.body.into_async_read();
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::Io {
                key: key.to_string(),
                source: e,
            })?;
        file.flush().await.map_err(|e| StorageError::Io {
            key: key.to_string(),
            source: e,
        })?;

        Ok(ScopedDownload::new(tmpdir, path))
    }

    async fn upload(&self, source: &Path, key: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| Self::store_err(key, e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::store_err(key, e))?;

        Ok(())
    }
}
