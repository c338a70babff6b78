//! Persistence and publication of the dashboard payloads.
//!
//! Payloads are written as pretty JSON files and can be uploaded to S3,
//! optionally gzip-compressed.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

/// Writes `value` as pretty-printed JSON, creating parent directories.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, &body).with_context(|| format!("cannot write {}", path.display()))?;
    debug!(path = %path.display(), bytes = body.len(), "JSON payload written");
    Ok(())
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Serializes a value to JSON and uploads it to an S3 bucket with
/// `application/json` content type. With `compress`, the body is gzipped,
/// `.gz` is appended to the key and `Content-Encoding: gzip` is set.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
    compress: bool,
) -> Result<()> {
    let body = serde_json::to_vec(value)?;

    let request = client
        .put_object()
        .bucket(bucket)
        .content_type("application/json");

    let request = if compress {
        request
            .key(format!("{key}.gz"))
            .content_encoding("gzip")
            .body(ByteStream::from(gzip(&body)?))
    } else {
        request.key(key).body(ByteStream::from(body))
    };

    request
        .send()
        .await
        .with_context(|| format!("upload of s3://{bucket}/{key} failed"))?;

    info!(bucket, key, compress, "Uploaded to S3");
    Ok(())
}
