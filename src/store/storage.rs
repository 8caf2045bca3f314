//! Snapshot persistence for the document store.
//!
//! A snapshot is the full document set serialized as JSON lines, written
//! either to a local file (atomically) or to an S3 object. The CLI accepts
//! both spellings: a plain path, or `s3://bucket/key`.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::runtime::Runtime;

use crate::document::Document;
use crate::Result;

#[derive(Debug, Clone)]
pub struct SnapshotStorage {
    target: Target,
}

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    S3(Arc<S3Target>),
}

impl SnapshotStorage {
    pub fn new(spec: &str) -> Result<SnapshotStorage> {
        let target = match spec.strip_prefix("s3://") {
            Some(location) => Target::S3(Arc::new(S3Target::connect(location, spec)?)),
            None => Target::File(spec.into()),
        };
        Ok(SnapshotStorage { target })
    }

    /// `None` when no snapshot has been written yet.
    pub fn read(&self) -> Result<Option<Vec<Document>>> {
        match &self.target {
            Target::File(path) => match fs::read(path) {
                Ok(bytes) => parse_snapshot(&bytes).map(Some),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
            Target::S3(s3) => s3.download(),
        }
    }

    pub fn write(&self, documents: &[Document]) -> Result<()> {
        let bytes = render_snapshot(documents)?;
        match &self.target {
            Target::File(path) => {
                let file = AtomicFile::new(path, OverwriteBehavior::AllowOverwrite);
                file.write(|f| f.write_all(&bytes))?;
                Ok(())
            }
            Target::S3(s3) => s3.upload(bytes),
        }
    }
}

impl FromStr for SnapshotStorage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SnapshotStorage::new(s)
    }
}

impl fmt::Display for SnapshotStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::File(path) => write!(f, "{}", path.display()),
            Target::S3(s3) => write!(f, "s3://{}/{}", s3.bucket, s3.key),
        }
    }
}

fn parse_snapshot(bytes: &[u8]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for line in bytes.split(|byte| *byte == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        documents.push(serde_json::from_slice(line)?);
    }
    Ok(documents)
}

fn render_snapshot(documents: &[Document]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for document in documents {
        serde_json::to_writer(&mut out, document)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// An S3 object plus the blocking runtime its calls run on. The region comes
/// from the usual AWS provider chain, with `us-east-1` as the last resort.
#[derive(Debug)]
struct S3Target {
    runtime: Runtime,
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3Target {
    fn connect(location: &str, spec: &str) -> Result<S3Target> {
        let (bucket, key) = match location.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => (bucket, key),
            _ => bail!("malformed snapshot target '{}', expected s3://bucket/key", spec),
        };

        let runtime = Runtime::new()?;
        let region = RegionProviderChain::default_provider().or_else(Region::new("us-east-1"));
        let config = runtime.block_on(aws_config::from_env().region(region).load());
        debug!(
            "snapshot client for bucket '{}' ready, region {:?}",
            bucket,
            config.region()
        );

        Ok(S3Target {
            client: S3Client::new(&config),
            runtime,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        })
    }

    fn download(&self) -> Result<Option<Vec<Document>>> {
        let fetched = self.runtime.block_on(
            self.client
                .get_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .send(),
        );

        match fetched {
            Ok(output) => {
                let bytes = self.runtime.block_on(output.body.collect())?.into_bytes();
                parse_snapshot(&bytes).map(Some)
            }
            Err(SdkError::ServiceError(inner))
                if matches!(inner.err(), GetObjectError::NoSuchKey(_)) =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn upload(&self, bytes: Vec<u8>) -> Result<()> {
        self.runtime.block_on(
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(ByteStream::from(bytes))
                .send(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urn::Urn;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot_doc() -> Document {
        let mut doc = Document::new("repo", "http://repo/12", json!({"id": 12}));
        doc.metadata.links.add_self_and_siblings(
            Urn::entity("repo", 12),
            Urn::entity("user", 45).collection("repos"),
        );
        doc
    }

    #[test]
    fn test_snapshot_round_trip() {
        let doc = snapshot_doc();
        let bytes = render_snapshot(&[doc.clone(), doc.clone()]).unwrap();
        assert_eq!(vec![doc.clone(), doc], parse_snapshot(&bytes).unwrap());
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let mut bytes = render_snapshot(&[snapshot_doc()]).unwrap();
        bytes.extend_from_slice(b"\n  \n");
        assert_eq!(1, parse_snapshot(&bytes).unwrap().len());
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let storage = SnapshotStorage::new("/nonexistent/ghc-snapshot.jsonl").unwrap();
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_rejects_bucket_only_target() {
        assert!(SnapshotStorage::new("s3://bucket-without-key").is_err());
    }
}
