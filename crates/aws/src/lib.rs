//! Terraform JSON generators for a StreamAlert deployment on AWS.
//!
//! Every generator is a pure function of [`Settings`]: the same settings
//! always give the same document, and nothing here touches the file system.

use serde::{Serialize, Deserialize};
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use tracing::debug;

use satf_core::{GenerateError, Result, Settings};

pub mod cluster;
pub mod main_tf;
pub mod s3;

pub use cluster::{generate_cluster, generate_stream_alert};
pub use main_tf::generate_main;
pub use s3::{generate_s3_bucket, BucketSpec, LifecycleRule, Transition};

pub const DEFAULT_REGION: &str = "us-east-1";
/// File stem of the root document; no cluster may use it.
pub const MAIN: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsProvider { pub region: String }
impl AwsProvider {
    pub fn to_tf_json(&self) -> Json {
        json!({ "provider": { "aws": { "region": self.region } } })
    }
}

/// The resource blocks the root document declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag="type")]
pub enum AwsResource {
    #[serde(rename="aws_s3_bucket")]
    S3Bucket { name: String, spec: BucketSpec },
    #[serde(rename="aws_kms_key")]
    KmsKey {
        name: String,
        description: String,
        #[serde(default)]
        enable_key_rotation: bool,
    },
    #[serde(rename="aws_kms_alias")]
    KmsAlias { name: String, alias: String, target_key_id: String },
}

impl AwsResource {
    pub fn type_name(&self) -> &'static str {
        match self {
            AwsResource::S3Bucket { .. } => "aws_s3_bucket",
            AwsResource::KmsKey { .. } => "aws_kms_key",
            AwsResource::KmsAlias { .. } => "aws_kms_alias",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AwsResource::S3Bucket { name, .. }
            | AwsResource::KmsKey { name, .. }
            | AwsResource::KmsAlias { name, .. } => name,
        }
    }

    /// `type.name` as used in `-target=` arguments and interpolations.
    pub fn address(&self) -> String { format!("{}.{}", self.type_name(), self.name()) }

    pub fn to_tf_json(&self) -> Json {
        let body = match self {
            AwsResource::S3Bucket { spec, .. } => spec.to_tf_json(),
            AwsResource::KmsKey { description, enable_key_rotation, .. } => json!({
                "enable_key_rotation": enable_key_rotation,
                "description": description,
            }),
            AwsResource::KmsAlias { alias, target_key_id, .. } => json!({
                "name": alias,
                "target_key_id": target_key_id,
            }),
        };
        json!({ "resource": { self.type_name(): { self.name(): body } } })
    }
}

/// Every document for one run, keyed by file stem (`main`, then one per
/// cluster). Cluster documents are left out while bootstrapping, since the
/// remote state they depend on does not exist yet.
pub fn generate_all(settings: &Settings, init: bool) -> Result<BTreeMap<String, Json>> {
    let mut docs = BTreeMap::new();
    docs.insert(MAIN.to_string(), generate_main(settings, init)?);
    if !init {
        for name in settings.cluster_names() {
            if name == MAIN {
                return Err(GenerateError::invalid(format!("cluster name '{MAIN}' is reserved")));
            }
            let doc = generate_cluster(&name, settings)?;
            docs.insert(name, doc);
        }
    }
    debug!(documents = docs.len(), init, "generated terraform documents");
    Ok(docs)
}
