//! Helper functions and structures for dealing with an S3-compatible
//! object store (minio). Writes to an object path become visible
//! atomically, so concurrent writers to the same path are safe here —
//! this is what the direct commit strategy relies on. Renames, on the
//! other hand, are only emulated with copy + delete.

use anyhow::{anyhow, Error};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use bytes::Bytes;
use url::Url;

use crate::storage::Storage;

#[derive(Debug)]
pub struct BucketKey {
    pub bucket: String,
    pub key: String,
}

/// Splits an `s3://bucket/key` path into its bucket and key. Trailing
/// slashes are dropped from the key.
pub fn path_to_bucket_key(path: &str) -> Result<BucketKey, Error> {
    let s3_url = Url::parse(path).map_err(|e| anyhow!("could not parse storage path: {}", e))?;

    if s3_url.scheme() != "s3" {
        return Err(anyhow!("protocol of path is not s3"));
    }

    let bucket = s3_url
        .domain()
        .ok_or(anyhow!("something went wrong trying to retrieve bucket"))?;

    let key = s3_url.path().trim_start_matches('/').trim_end_matches('/');

    Ok(BucketKey {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

/// Listing prefix that covers everything under `key`: the whole bucket
/// for an empty key, `key/` otherwise.
fn key_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{key}/")
    }
}

/// Key an object lands on when everything under `source_key` moves
/// under `destination_key`, keeping its relative path.
fn moved_object_key(source_key: &str, destination_key: &str, object: &str) -> String {
    let relative = object
        .trim_start_matches(source_key)
        .trim_start_matches('/');
    if destination_key.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", destination_key, relative)
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    /// id
    pub access_key_id: String,

    /// password
    pub secret_access_key: String,

    /// object store region
    pub region: String,

    /// minio url
    pub url: String,
}

/// Thin wrapper over the S3 client, speaking full `s3://` paths on the
/// [`Storage`] surface and (bucket, key) pairs internally.
#[derive(Debug, Clone)]
pub struct Client {
    pub client: s3::Client,
}

impl Client {
    pub fn from_conf(cfg: ClientConfig) -> Self {
        let cred = s3::config::Credentials::new(
            cfg.access_key_id,
            cfg.secret_access_key,
            None,
            None,
            "static credentials",
        );
        let region = s3::config::Region::new(cfg.region);
        let conf_builder = s3::config::Builder::new()
            .credentials_provider(cred)
            .region(region)
            .endpoint_url(cfg.url)
            .behavior_version_latest();
        let conf = conf_builder.build();

        Self {
            client: s3::Client::from_conf(conf),
        }
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, Error> {
        let data = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?
            .body
            .collect()
            .await?
            .into_bytes();
        Ok(data)
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    pub async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), Error> {
        let copy_source = format!("{}/{}", bucket, source_key);

        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source)
            .key(destination_key)
            .send()
            .await?;

        Ok(())
    }

    /// Lists every object key under the given prefix.
    pub async fn list_objects_in_dir(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, Error> {
        let mut response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = vec![];
        while let Some(result) = response.next().await {
            let output = result?;
            for object in output.contents() {
                if let Some(key) = &object.key {
                    objects.push(key.clone());
                }
            }
        }

        Ok(objects)
    }

    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, Error> {
        let object_request = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match object_request {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.code() == Some("NotFound") {
                    return Ok(false);
                }
                Err(anyhow!("head_object failed: {}", service_error))
            }
        }
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for Client {
    fn make_qualified(&self, path: &str) -> Result<String, Error> {
        let BucketKey { bucket, key } = path_to_bucket_key(path)?;
        if key.is_empty() {
            Ok(format!("s3://{bucket}"))
        } else {
            Ok(format!("s3://{bucket}/{key}"))
        }
    }

    async fn create(&self, path: &str) -> Result<(), Error> {
        self.put(path, Bytes::new()).await
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<(), Error> {
        let BucketKey { bucket, key } = path_to_bucket_key(path)?;
        self.put_object(&bucket, &key, data).await
    }

    async fn get(&self, path: &str) -> Result<Bytes, Error> {
        let BucketKey { bucket, key } = path_to_bucket_key(path)?;
        self.get_object(&bucket, &key).await
    }

    async fn mkdirs(&self, _path: &str) -> Result<(), Error> {
        // directories are implicit on object stores
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, Error> {
        let BucketKey { bucket, key } = path_to_bucket_key(path)?;
        if key.is_empty() {
            // the bucket root itself
            return Ok(true);
        }

        if self.object_exists(&bucket, &key).await? {
            return Ok(true);
        }

        // a "directory" exists as soon as any object lives under it
        let response = self
            .client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(key_prefix(&key))
            .max_keys(1)
            .send()
            .await?;
        Ok(!response.contents().is_empty())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, Error> {
        let BucketKey { bucket, key } = path_to_bucket_key(path)?;
        let prefix = key_prefix(&key);

        let mut response = self
            .client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(&prefix)
            .delimiter("/")
            .into_paginator()
            .send();

        let mut children = vec![];
        while let Some(result) = response.next().await {
            let output = result?;
            for object in output.contents() {
                if let Some(object_key) = &object.key {
                    children.push(format!("s3://{bucket}/{object_key}"));
                }
            }
            for prefix_entry in output.common_prefixes() {
                if let Some(dir_key) = prefix_entry.prefix() {
                    children.push(format!("s3://{bucket}/{}", dir_key.trim_end_matches('/')));
                }
            }
        }

        children.sort();
        Ok(children)
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<(), Error> {
        let source = path_to_bucket_key(src)?;
        let destination = path_to_bucket_key(dst)?;
        if source.bucket != destination.bucket {
            return Err(anyhow!("rename across buckets is not supported"));
        }
        let bucket = source.bucket;

        if self.object_exists(&bucket, &source.key).await? {
            self.copy_object(&bucket, &source.key, &destination.key).await?;
            self.delete_object(&bucket, &source.key).await?;
            return Ok(());
        }

        let source_objects = self
            .list_objects_in_dir(&bucket, &key_prefix(&source.key))
            .await?;

        for source_object in source_objects {
            let destination_key = moved_object_key(&source.key, &destination.key, &source_object);
            self.copy_object(&bucket, &source_object, &destination_key).await?;
            self.delete_object(&bucket, &source_object).await?;
        }

        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<(), Error> {
        let BucketKey { bucket, key } = path_to_bucket_key(path)?;
        if key.is_empty() {
            return Err(anyhow!("refusing to delete the bucket root"));
        }

        let children = self.list_objects_in_dir(&bucket, &key_prefix(&key)).await?;
        if !children.is_empty() && !recursive {
            return Err(anyhow!(
                "directory {} is not empty, refusing non-recursive delete",
                path
            ));
        }
        for child in children {
            self.delete_object(&bucket, &child).await?;
        }

        if self.object_exists(&bucket, &key).await? {
            self.delete_object(&bucket, &key).await?;
        }
        Ok(())
    }
}
