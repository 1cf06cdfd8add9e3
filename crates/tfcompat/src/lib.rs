use anyhow::{Context, Result};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

pub const TF_JSON_SUFFIX: &str = ".tf.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runner { Terraform, Tofu }

pub fn pick_runner(prefer: Option<Runner>) -> Result<Runner> {
    if let Some(p) = prefer { return Ok(p); }
    if which::which("terraform").is_ok() { Ok(Runner::Terraform) }
    else if which::which("tofu").is_ok() { Ok(Runner::Tofu) }
    else { anyhow::bail!("Neither 'terraform' nor 'tofu' found in PATH") }
}

pub fn write_tf_json(tf: &Json, out: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(out).with_context(|| format!("create {}", out.display()))?;
    let path = out.join(format!("{stem}{TF_JSON_SUFFIX}"));
    std::fs::write(&path, serde_json::to_string_pretty(tf)? + "\n")
        .with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "wrote terraform document");
    Ok(path)
}

/// Write one `<stem>.tf.json` per document.
pub fn write_documents(docs: &BTreeMap<String, Json>, out: &Path) -> Result<Vec<PathBuf>> {
    docs.iter().map(|(stem, tf)| write_tf_json(tf, out, stem)).collect()
}

/// Remove `*.tf.json` files in `out` whose stem is not in `keep`, so a
/// cluster dropped from the settings stops being applied.
pub fn prune_stale(out: &Path, keep: &BTreeMap<String, Json>) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !out.is_dir() { return Ok(removed); }
    for entry in std::fs::read_dir(out).with_context(|| format!("read {}", out.display()))? {
        let path = entry?.path();
        let Some(stem) = path.file_name().and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(TF_JSON_SUFFIX)) else { continue };
        if keep.contains_key(stem) { continue; }
        std::fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        warn!(path = %path.display(), "removed stale terraform document");
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}

fn bin(r: Runner) -> &'static str { match r { Runner::Terraform => "terraform", Runner::Tofu => "tofu" } }

fn command_args(out: &Path, sub: &[&str]) -> Vec<String> {
    let mut args = vec![format!("-chdir={}", out.display())];
    args.extend(sub.iter().map(|s| s.to_string()));
    args
}

fn run(r: Runner, out: &Path, sub: &[&str]) -> Result<()> {
    let args = command_args(out, sub);
    info!(runner = bin(r), args = ?args, "running");
    let st = Command::new(bin(r)).args(&args).status()
        .with_context(|| format!("spawn {} {}", bin(r), sub.join(" ")))?;
    if !st.success() { anyhow::bail!("{} {} failed", bin(r), sub.first().copied().unwrap_or_default()) }
    Ok(())
}

/// `init`; with `migrate` the state is copied to the newly configured
/// backend without prompting.
pub fn run_init(r: Runner, out: &Path, migrate: bool) -> Result<()> {
    if migrate { run(r, out, &["init", "-force-copy"]) } else { run(r, out, &["init"]) }
}
pub fn run_plan(r: Runner, out: &Path) -> Result<()> {
    run(r, out, &["plan"])
}
pub fn run_apply(r: Runner, out: &Path) -> Result<()> {
    run(r, out, &["apply", "-auto-approve"])
}
/// `apply` limited to the given `type.name` addresses.
pub fn run_apply_targets(r: Runner, out: &Path, targets: &[String]) -> Result<()> {
    let flags: Vec<String> = targets.iter().map(|t| format!("-target={t}")).collect();
    let mut sub = vec!["apply", "-auto-approve"];
    sub.extend(flags.iter().map(String::as_str));
    run(r, out, &sub)
}
pub fn run_destroy(r: Runner, out: &Path) -> Result<()> {
    run(r, out, &["destroy", "-auto-approve"])
}
