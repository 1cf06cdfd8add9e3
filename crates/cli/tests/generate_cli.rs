use serde_json::{json, Value as Json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn satf(args: &[&str]) -> Output {
    Command::new(PathBuf::from(env!("CARGO_BIN_EXE_satf")))
        .args(args)
        .output()
        .expect("spawn satf")
}

fn write_conf(dir: &Path) {
    fs::write(dir.join("global.json"), json!({
        "account": {
            "aws_account_id": "123456789012",
            "prefix": "unit-testing",
            "kms_key_alias": "unit-testing",
            "region": "us-east-1"
        },
        "terraform": { "tfstate_bucket": "unit-testing.terraform.tfstate" }
    }).to_string()).unwrap();
    fs::write(dir.join("lambda.yaml"),
        "rule_processor_config:\n  source_bucket: unit.testing.source.bucket\n").unwrap();
    fs::create_dir_all(dir.join("clusters")).unwrap();
    fs::write(dir.join("clusters/prod.json"), json!({
        "region": "us-east-1",
        "modules": {
            "stream_alert": {
                "rule_processor": { "memory": 128, "timeout": 10, "current_version": "$LATEST" },
                "alert_processor": { "memory": 128, "timeout": 10, "current_version": "$LATEST" }
            }
        }
    }).to_string()).unwrap();
}

fn read(path: &Path) -> Json {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn generate_writes_main_and_clusters() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("conf");
    let out = dir.path().join("terraform");
    fs::create_dir(&conf).unwrap();
    write_conf(&conf);
    fs::create_dir(&out).unwrap();
    fs::write(out.join("retired.tf.json"), "{}").unwrap();

    let o = satf(&["--conf", conf.to_str().unwrap(), "--out", out.to_str().unwrap(), "generate"]);
    assert!(o.status.success(), "{}", String::from_utf8_lossy(&o.stderr));

    let main = read(&out.join("main.tf.json"));
    assert!(main["terraform"]["backend"]["s3"].is_object());
    assert!(read(&out.join("prod.tf.json"))["module"]["stream_alert_prod"].is_object());
    assert!(!out.join("retired.tf.json").exists());
}

#[test]
fn generate_init_uses_local_backend() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("terraform");
    write_conf(dir.path());

    let o = satf(&["--conf", dir.path().to_str().unwrap(), "--out", out.to_str().unwrap(), "generate", "--init"]);
    assert!(o.status.success(), "{}", String::from_utf8_lossy(&o.stderr));

    let main = read(&out.join("main.tf.json"));
    assert_eq!(main["terraform"]["backend"]["local"]["path"], "terraform.tfstate");
    assert!(!out.join("prod.tf.json").exists());
}

#[test]
fn missing_settings_fail() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("terraform");
    fs::write(dir.path().join("global.json"), r#"{"account": {"prefix": "unit-testing"}}"#).unwrap();
    fs::write(dir.path().join("lambda.json"), "{}").unwrap();

    let o = satf(&["--conf", dir.path().to_str().unwrap(), "--out", out.to_str().unwrap(), "generate"]);
    assert!(!o.status.success());
    assert!(String::from_utf8_lossy(&o.stderr).contains("missing config key"));
    assert!(!out.join("main.tf.json").exists());
}

#[test]
fn invalid_bucket_name_is_rejected_by_policy() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("terraform");
    write_conf(dir.path());
    fs::write(dir.path().join("lambda.yaml"),
        "rule_processor_config:\n  source_bucket: Not_A_Bucket\n").unwrap();

    let o = satf(&["--conf", dir.path().to_str().unwrap(), "--out", out.to_str().unwrap(), "generate"]);
    assert!(!o.status.success());
    assert!(String::from_utf8_lossy(&o.stderr).contains("Policy"));
}
