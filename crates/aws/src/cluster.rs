//! Per-cluster documents (`<cluster>.tf.json`). A cluster is one region's
//! worth of StreamAlert modules; each configured module under
//! `clusters.<name>.modules` turns into one `module` block here.

use serde_json::{json, Value as Json, Map as JsonMap};
use tracing::debug;

use satf_core::{merge, GenerateError, Result, Settings};

use crate::main_tf::logging_bucket_name;
use crate::MAIN;

const DEFAULT_MONITORING_TOPIC: &str = "stream_alert_monitoring";

struct Cluster<'a> {
    settings: &'a Settings,
    name: &'a str,
    prefix: &'a str,
    account_id: &'a str,
    region: &'a str,
}

impl<'a> Cluster<'a> {
    fn new(name: &'a str, settings: &'a Settings) -> Result<Self> {
        if name == MAIN {
            return Err(GenerateError::invalid(format!("cluster name '{MAIN}' is reserved")));
        }
        if !settings.contains(&["clusters", name]) {
            return Err(GenerateError::invalid(format!("unknown cluster '{name}'")));
        }
        Ok(Cluster {
            settings,
            name,
            prefix: settings.str_at(&["global", "account", "prefix"])?,
            account_id: settings.str_at(&["global", "account", "aws_account_id"])?,
            region: settings.str_at(&["clusters", name, "region"])?,
        })
    }

    /// Settings path below `clusters.<name>.modules`.
    fn path<'p>(&'p self, rest: &[&'p str]) -> Vec<&'p str> {
        let mut p = vec!["clusters", self.name, "modules"];
        p.extend_from_slice(rest);
        p
    }

    fn has(&self, module: &str) -> bool { self.settings.contains(&self.path(&[module])) }

    fn raw(&self, rest: &[&str]) -> Result<Json> {
        Ok(self.settings.require(&self.path(rest))?.clone())
    }

    fn resource_name(&self, suffix: &str) -> String {
        format!("{}_{}_{}", self.prefix, self.name, suffix)
    }

    fn module_ref(&self, module: &str, attr: &str) -> String {
        format!("${{module.{module}_{}.{attr}}}", self.name)
    }

    fn require_kinesis(&self, module: &str) -> Result<()> {
        if self.has("kinesis") { return Ok(()); }
        Err(GenerateError::invalid(format!(
            "cluster '{}': module '{module}' needs the kinesis module", self.name
        )))
    }

    /// Whether `module_<cluster>` ends up in the document.
    fn emits(&self, module: &str) -> Result<bool> {
        match module {
            "stream_alert" => Ok(true),
            "cloudwatch_monitoring" | "flow_logs" => Ok(self.has(module)
                && self.settings.bool_or(&self.path(&[module, "enabled"]), true)?),
            _ => Ok(self.has(module)),
        }
    }

    fn module(&self, module: &str, body: Json) -> Json {
        json!({ "module": { format!("{module}_{}", self.name): body } })
    }
}

fn string_list(v: &Json, path: &str) -> Result<Vec<String>> {
    let invalid = || GenerateError::InvalidConfigValue { path: path.to_string(), expected: "a list of strings" };
    v.as_array().ok_or_else(invalid)?
        .iter()
        .map(|s| s.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Map values of `outputs.<service>` as strings, sorted and deduplicated.
fn output_values(settings: &Settings, service: &str) -> Result<Option<Vec<String>>> {
    let Some(v) = settings.get(&["outputs", service]) else { return Ok(None) };
    let path = format!("outputs.{service}");
    let map = v.as_object().ok_or_else(|| GenerateError::InvalidConfigValue {
        path: path.clone(), expected: "a mapping",
    })?;
    let mut out = Vec::with_capacity(map.len());
    for value in map.values() {
        let s = value.as_str().ok_or_else(|| GenerateError::InvalidConfigValue {
            path: path.clone(), expected: "a mapping of strings",
        })?;
        out.push(s.to_string());
    }
    out.sort();
    out.dedup();
    Ok(Some(out))
}

/// `module.stream_alert_<cluster>`: the rule and alert processor functions.
pub fn generate_stream_alert(cluster: &str, settings: &Settings) -> Result<Json> {
    let c = Cluster::new(cluster, settings)?;
    let processor = |which: &str, key: &str| c.raw(&["stream_alert", which, key]);

    let mut body = json!({
        "source": "./modules/tf_stream_alert",
        "account_id": c.account_id,
        "region": c.region,
        "prefix": c.prefix,
        "cluster": c.name,
        "kms_key_arn": "${aws_kms_key.stream_alert_secrets.arn}",
        "rule_processor_memory": processor("rule_processor", "memory")?,
        "rule_processor_timeout": processor("rule_processor", "timeout")?,
        "rule_processor_version": processor("rule_processor", "current_version")?,
        "rule_processor_config": "${var.rule_processor_config}",
        "alert_processor_memory": processor("alert_processor", "memory")?,
        "alert_processor_timeout": processor("alert_processor", "timeout")?,
        "alert_processor_version": processor("alert_processor", "current_version")?,
        "alert_processor_config": "${var.alert_processor_config}",
    });

    if let Some(functions) = output_values(settings, "aws-lambda")? {
        // drop the ":qualifier" suffix
        let mut names: Vec<String> = functions.iter()
            .map(|f| f.split(':').next().unwrap_or(f).to_string())
            .collect();
        names.sort();
        names.dedup();
        body["output_lambda_functions"] = json!(names);
    }
    if let Some(buckets) = output_values(settings, "aws-s3")? {
        body["output_s3_buckets"] = json!(buckets);
    }

    let sns_path = c.path(&["stream_alert", "rule_processor", "inputs", "aws-sns"]);
    if let Some(topics) = settings.get(&sns_path) {
        body["input_sns_topics"] = json!(string_list(topics, &sns_path.join("."))?);
    }

    if settings.contains(&c.path(&["stream_alert", "alert_processor", "vpc_config"])) {
        let subnets = c.path(&["stream_alert", "alert_processor", "vpc_config", "subnet_ids"]);
        let groups = c.path(&["stream_alert", "alert_processor", "vpc_config", "security_group_ids"]);
        body["alert_processor_vpc_enabled"] = json!(true);
        body["alert_processor_vpc_subnet_ids"] =
            json!(string_list(settings.require(&subnets)?, &subnets.join("."))?);
        body["alert_processor_vpc_security_group_ids"] =
            json!(string_list(settings.require(&groups)?, &groups.join("."))?);
    }

    Ok(c.module("stream_alert", body))
}

fn cloudwatch_monitoring(c: &Cluster) -> Result<Option<Json>> {
    if !c.emits("cloudwatch_monitoring")? { return Ok(None); }
    let topic = c.settings.str_or(
        &["global", "infrastructure", "monitoring", "sns_topic_name"],
        DEFAULT_MONITORING_TOPIC,
    )?;
    let mut body = json!({
        "source": "./modules/tf_stream_alert_monitoring",
        "sns_topic_arn": format!("arn:aws:sns:{}:{}:{topic}", c.region, c.account_id),
        "lambda_functions": [
            c.resource_name("streamalert_rule_processor"),
            c.resource_name("streamalert_alert_processor"),
        ],
        "lambda_alarms_enabled": true,
        "kinesis_alarms_enabled": c.has("kinesis"),
    });
    if c.has("kinesis") {
        body["kinesis_stream"] = json!(c.resource_name("stream_alert_kinesis"));
    }
    Ok(Some(c.module("cloudwatch_monitoring", body)))
}

fn kinesis(c: &Cluster) -> Result<Option<Json>> {
    if !c.has("kinesis") { return Ok(None); }
    let body = json!({
        "source": "./modules/tf_stream_alert_kinesis",
        "account_id": c.account_id,
        "region": c.region,
        "cluster_name": c.name,
        "firehose_s3_bucket_suffix": c.settings.str_at(&c.path(&["kinesis", "firehose", "s3_bucket_suffix"]))?,
        "stream_name": c.resource_name("stream_alert_kinesis"),
        "firehose_name": c.resource_name("stream_alert_firehose"),
        "username": c.resource_name("stream_alert_user"),
        "shards": c.settings.u64_at(&c.path(&["kinesis", "streams", "shards"]))?,
        "retention": c.settings.u64_at(&c.path(&["kinesis", "streams", "retention"]))?,
        "s3_logging_bucket": logging_bucket_name(c.prefix),
    });
    Ok(Some(c.module("kinesis", body)))
}

fn kinesis_events(c: &Cluster) -> Result<Option<Json>> {
    if !c.has("kinesis_events") { return Ok(None); }
    c.require_kinesis("kinesis_events")?;
    let body = json!({
        "source": "./modules/tf_stream_alert_kinesis_events",
        "lambda_production_enabled": c.settings.bool_or(&c.path(&["kinesis_events", "enabled"]), true)?,
        "lambda_role_id": c.module_ref("stream_alert", "lambda_role_id"),
        "lambda_function_arn": c.module_ref("stream_alert", "lambda_arn"),
        "kinesis_stream_arn": c.module_ref("kinesis", "arn"),
        "role_policy_prefix": c.name,
    });
    Ok(Some(c.module("kinesis_events", body)))
}

fn cloudtrail(c: &Cluster) -> Result<Option<Json>> {
    if !c.has("cloudtrail") { return Ok(None); }
    c.require_kinesis("cloudtrail")?;
    let pattern = match c.settings.get(&c.path(&["cloudtrail", "event_pattern"])) {
        Some(p) => p.clone(),
        None => json!({ "account": [c.account_id] }),
    };
    let body = json!({
        "source": "./modules/tf_stream_alert_cloudtrail",
        "account_id": c.account_id,
        "cluster": c.name,
        "prefix": c.prefix,
        "kinesis_arn": c.module_ref("kinesis", "arn"),
        "enable_logging": c.settings.bool_or(&c.path(&["cloudtrail", "enabled"]), true)?,
        "existing_trail": c.settings.bool_or(&c.path(&["cloudtrail", "existing_trail"]), false)?,
        "is_global_trail": c.settings.bool_or(&c.path(&["cloudtrail", "is_global_trail"]), true)?,
        "s3_logging_bucket": logging_bucket_name(c.prefix),
        // terraform takes the pattern as an encoded string
        "event_pattern": pattern.to_string(),
    });
    Ok(Some(c.module("cloudtrail", body)))
}

fn flow_logs(c: &Cluster) -> Result<Option<Json>> {
    if !c.emits("flow_logs")? { return Ok(None); }
    c.require_kinesis("flow_logs")?;
    let default_group = c.resource_name("streamalert_flow_logs");
    let mut body = json!({
        "source": "./modules/tf_stream_alert_flow_logs",
        "destination_stream_arn": c.module_ref("kinesis", "arn"),
        "flow_log_group_name": c.settings.str_or(&c.path(&["flow_logs", "log_group_name"]), &default_group)?,
    });
    for input in ["vpcs", "subnets", "enis"] {
        let path = c.path(&["flow_logs", input]);
        if let Some(v) = c.settings.get(&path) {
            body[input] = json!(string_list(v, &path.join("."))?);
        }
    }
    Ok(Some(c.module("flow_logs", body)))
}

fn s3_events(c: &Cluster) -> Result<Option<Json>> {
    if !c.has("s3_events") { return Ok(None); }
    let bucket_id = c.settings.str_at(&c.path(&["s3_events", "s3_bucket_id"]))?;
    if bucket_id.is_empty() {
        return Err(GenerateError::invalid(format!("cluster '{}': s3_bucket_id is empty", c.name)));
    }
    let body = json!({
        "source": "./modules/tf_stream_alert_s3_events",
        "lambda_function_arn": c.module_ref("stream_alert", "lambda_arn"),
        "lambda_function_name": c.resource_name("streamalert_rule_processor"),
        "s3_bucket_id": bucket_id,
        "s3_bucket_arn": format!("arn:aws:s3:::{bucket_id}"),
        "lambda_role_id": c.module_ref("stream_alert", "lambda_role_id"),
        "lambda_role_arn": c.module_ref("stream_alert", "lambda_role_arn"),
    });
    Ok(Some(c.module("s3_events", body)))
}

/// `output.<module>_<cluster>_<var>` for each `clusters.<name>.outputs` entry.
fn outputs(c: &Cluster) -> Result<Option<Json>> {
    let Some(v) = c.settings.get(&["clusters", c.name, "outputs"]) else { return Ok(None) };
    let base = format!("clusters.{}.outputs", c.name);
    let modules = v.as_object().ok_or_else(|| GenerateError::InvalidConfigValue {
        path: base.clone(), expected: "a mapping",
    })?;
    let mut out = JsonMap::new();
    for (module, vars) in modules {
        if !c.emits(module)? {
            return Err(GenerateError::invalid(format!(
                "cluster '{}': outputs reference module '{module}', which is not generated", c.name
            )));
        }
        for var in string_list(vars, &format!("{base}.{module}"))? {
            out.insert(
                format!("{module}_{}_{var}", c.name),
                json!({ "value": c.module_ref(module, &var) }),
            );
        }
    }
    if out.is_empty() { return Ok(None); }
    Ok(Some(json!({ "output": out })))
}

/// Full `<cluster>.tf.json`: the stream_alert module plus whichever optional
/// modules and outputs the cluster configures.
pub fn generate_cluster(cluster: &str, settings: &Settings) -> Result<Json> {
    let c = Cluster::new(cluster, settings)?;
    let mut tf = generate_stream_alert(cluster, settings)?;
    let parts = [
        cloudwatch_monitoring(&c)?,
        kinesis(&c)?,
        kinesis_events(&c)?,
        cloudtrail(&c)?,
        flow_logs(&c)?,
        s3_events(&c)?,
        outputs(&c)?,
    ];
    for part in parts.into_iter().flatten() {
        tf = merge(tf, part);
    }
    debug!(cluster, "generated cluster");
    Ok(tf)
}
