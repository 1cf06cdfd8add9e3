use anyhow::Result;
use regex::Regex;
use serde_json::Value as Json;
use tracing::debug;

/// Plan-time checks on generated documents, run before anything is written.
pub struct Policy {
    pub allow_unlogged: bool,
    bucket_name: Regex,
    ip_like: Regex,
}

impl Policy {
    pub fn new(allow_unlogged: bool) -> Result<Self> {
        Ok(Self {
            allow_unlogged,
            bucket_name: Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$")?,
            ip_like: Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$")?,
        })
    }

    pub fn check_bucket_name(&self, name: &str) -> Result<()> {
        if !self.bucket_name.is_match(name) || name.contains("..") || self.ip_like.is_match(name) {
            anyhow::bail!(
                "Policy: '{name}' is not a valid S3 bucket name (3-63 chars of a-z, 0-9, '.', '-'; \
                 must start and end with a letter or digit; not an IP address)"
            );
        }
        Ok(())
    }

    pub fn check_tf_json(&self, tf: &Json) -> Result<()> {
        let Some(buckets) = tf.get("resource")
            .and_then(|r| r.get("aws_s3_bucket"))
            .and_then(Json::as_object) else { return Ok(()) };
        for (name, bucket) in buckets {
            let Some(bucket_name) = bucket.get("bucket").and_then(Json::as_str) else {
                anyhow::bail!("Policy: aws_s3_bucket.{name} has no bucket name");
            };
            self.check_bucket_name(bucket_name)?;
            let logged = bucket.get("logging")
                .and_then(|l| l.get("target_bucket"))
                .and_then(Json::as_str)
                .is_some_and(|t| !t.is_empty());
            if !logged && !self.allow_unlogged {
                anyhow::bail!("Policy: aws_s3_bucket.{name} requires access logging.");
            }
            debug!(resource = %name, bucket = bucket_name, "bucket passed policy");
        }
        Ok(())
    }
}
