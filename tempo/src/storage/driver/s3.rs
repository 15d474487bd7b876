//! S3 content store, for any S3 compatible object storage.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use axum::body::Bytes;

use crate::config::S3Settings;
use crate::error::{AppError, Result};
use crate::storage::ContentStore;

pub struct S3ContentStore {
    client: Client,
    bucket: String,
}

impl S3ContentStore {
    /// Credentials come from the standard AWS provider chain.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        // Self hosted S3 implementations rarely support virtual hosted buckets.
        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.endpoint.is_some())
            .build();
        Self {
            client: Client::from_conf(conf),
            bucket: settings.bucket.clone(),
        }
    }
}

fn storage_error(operation: &str, name: &str, err: impl std::error::Error) -> AppError {
    AppError::StorageIo(format!("s3 {operation} {name}: {}", DisplayErrorContext(&err)))
}

#[async_trait::async_trait]
impl ContentStore for S3ContentStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| storage_error("put", name, err))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    return Err(AppError::NotFound(name.to_string()));
                }
                return Err(storage_error("get", name, err));
            }
        };
        let data = output
            .body
            .collect()
            .await
            .map_err(|err| storage_error("get", name, err))?;
        Ok(data.into_bytes())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| storage_error("list", &self.bucket, err))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    let modified = object.last_modified().map(|t| (t.secs(), t.subsec_nanos()));
                    objects.push((modified, key.to_string()));
                }
            }
        }
        objects.sort();
        Ok(objects.into_iter().map(|(_, key)| key).collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        // S3 deletes succeed for missing keys, so check first to report absence.
        let present = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;
        if let Err(err) = present {
            let missing = err
                .as_service_error()
                .map(|e| e.is_not_found())
                .unwrap_or(false);
            if missing {
                return Err(AppError::NotFound(name.to_string()));
            }
            return Err(storage_error("head", name, err));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|err| storage_error("delete", name, err))?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) => {
                Ok(false)
            }
            Err(err) => Err(storage_error("head", name, err)),
        }
    }
}
