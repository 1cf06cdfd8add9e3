//! The root `main.tf.json`: provider, backend, KMS key and the account-wide
//! buckets.

use serde_json::{json, Value as Json};
use tracing::debug;

use satf_core::{merge, Result, Settings};

use crate::s3::{generate_s3_bucket, LifecycleRule, LOG_DELIVERY_ACL};
use crate::{AwsProvider, AwsResource, DEFAULT_REGION};

pub const REQUIRED_VERSION: &str = "> 0.9.4";
pub const STATE_KEY: &str = "stream_alert_state/terraform.tfstate";
pub const LOCAL_STATE_PATH: &str = "terraform.tfstate";
pub const SECRETS_KEY: &str = "stream_alert_secrets";

pub fn logging_bucket_name(prefix: &str) -> String { format!("{prefix}.streamalert.s3-logging") }
pub fn secrets_bucket_name(prefix: &str) -> String { format!("{prefix}.streamalert.secrets") }

pub fn account_region(settings: &Settings) -> Result<&str> {
    settings.str_or(&["global", "account", "region"], DEFAULT_REGION)
}

/// Resources that must exist before state can move to S3: the KMS key and
/// alias that encrypt it and every bucket, the state bucket included.
pub fn bootstrap_resources(settings: &Settings) -> Result<Vec<AwsResource>> {
    let prefix = settings.str_at(&["global", "account", "prefix"])?;
    let kms_alias = settings.str_at(&["global", "account", "kms_key_alias"])?;
    let tfstate_bucket = settings.str_at(&["global", "terraform", "tfstate_bucket"])?;
    let source_bucket = settings.str_at(&["lambda", "rule_processor_config", "source_bucket"])?;

    let logging = logging_bucket_name(prefix);
    let bucket = |name: &str, spec| AwsResource::S3Bucket { name: name.to_string(), spec };

    Ok(vec![
        AwsResource::KmsKey {
            name: SECRETS_KEY.to_string(),
            description: "StreamAlert secret management".to_string(),
            enable_key_rotation: true,
        },
        AwsResource::KmsAlias {
            name: SECRETS_KEY.to_string(),
            alias: format!("alias/{kms_alias}"),
            target_key_id: format!("${{aws_kms_key.{SECRETS_KEY}.key_id}}"),
        },
        bucket("lambda_source", generate_s3_bucket(source_bucket, &logging, false, None)?),
        bucket(SECRETS_KEY, generate_s3_bucket(&secrets_bucket_name(prefix), &logging, false, None)?),
        bucket("terraform_remote_state", generate_s3_bucket(tfstate_bucket, &logging, false, None)?),
        bucket(
            "logging_bucket",
            generate_s3_bucket(&logging, &logging, false, Some(LifecycleRule::glacier("/", 30)))?
                .with_acl(LOG_DELIVERY_ACL),
        ),
    ])
}

fn backend(settings: &Settings, init: bool) -> Result<Json> {
    if init {
        return Ok(json!({ "local": { "path": LOCAL_STATE_PATH } }));
    }
    let kms_alias = settings.str_at(&["global", "account", "kms_key_alias"])?;
    Ok(json!({
        "s3": {
            "bucket": settings.str_at(&["global", "terraform", "tfstate_bucket"])?,
            "key": STATE_KEY,
            "region": account_region(settings)?,
            "encrypt": true,
            "acl": "private",
            "kms_key_id": format!("alias/{kms_alias}"),
        }
    }))
}

/// Build `main.tf.json`. With `init` the state stays local, because the
/// bucket that will hold it is one of the resources declared here.
pub fn generate_main(settings: &Settings, init: bool) -> Result<Json> {
    let provider = AwsProvider { region: account_region(settings)?.to_string() };
    let mut tf = merge(provider.to_tf_json(), json!({
        "terraform": {
            "required_version": REQUIRED_VERSION,
            "backend": backend(settings, init)?,
        }
    }));
    for r in bootstrap_resources(settings)? {
        tf = merge(tf, r.to_tf_json());
    }
    debug!(init, "generated main");
    Ok(tf)
}
