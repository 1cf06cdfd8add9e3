//! `aws_s3_bucket` bodies.

use serde::{Serialize, Deserialize};
use serde_json::Value as Json;
use satf_core::{GenerateError, Result};

pub const DEFAULT_ACL: &str = "private";
pub const LOG_DELIVERY_ACL: &str = "log-delivery-write";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub days: u32,
    pub storage_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    pub prefix: String,
    pub enabled: bool,
    pub transition: Transition,
}

impl LifecycleRule {
    /// Move everything under `prefix` to GLACIER after `days`.
    pub fn glacier(prefix: &str, days: u32) -> Self {
        LifecycleRule {
            prefix: prefix.to_string(),
            enabled: true,
            transition: Transition { days, storage_class: "GLACIER".to_string() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioning { pub enabled: bool }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLogging {
    pub target_bucket: String,
    pub target_prefix: String,
}

/// Body of one `aws_s3_bucket` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub bucket: String,
    pub acl: String,
    pub force_destroy: bool,
    pub versioning: Versioning,
    pub logging: BucketLogging,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_rule: Option<LifecycleRule>,
}

impl BucketSpec {
    pub fn with_acl(mut self, acl: &str) -> Self {
        self.acl = acl.to_string();
        self
    }

    pub fn to_tf_json(&self) -> Json {
        // plain data with string keys, cannot fail
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}

/// Build a versioned, access-logged bucket. Access logs land in `logging`
/// under `<bucket>/`.
pub fn generate_s3_bucket(
    bucket: &str,
    logging: &str,
    force_destroy: bool,
    lifecycle_rule: Option<LifecycleRule>,
) -> Result<BucketSpec> {
    if bucket.trim().is_empty() {
        return Err(GenerateError::invalid("bucket name must not be empty"));
    }
    if logging.trim().is_empty() {
        return Err(GenerateError::invalid(format!("logging bucket for '{bucket}' must not be empty")));
    }
    Ok(BucketSpec {
        bucket: bucket.to_string(),
        acl: DEFAULT_ACL.to_string(),
        force_destroy,
        versioning: Versioning { enabled: true },
        logging: BucketLogging {
            target_bucket: logging.to_string(),
            target_prefix: format!("{bucket}/"),
        },
        lifecycle_rule,
    })
}
