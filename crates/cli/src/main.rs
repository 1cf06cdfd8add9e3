use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;

use satf_core::Settings;
use satf_policy::Policy;
use satf_tfcompat as tfc;

#[derive(Parser, Debug)]
#[command(author, version, about="satf — StreamAlert Terraform generator (Terraform/OpenTofu)")]
struct Cli {
    /// Settings directory (global, lambda, outputs, clusters/)
    #[arg(short, long, default_value="conf", global = true)]
    conf: PathBuf,

    /// Output directory for *.tf.json
    #[arg(short, long, default_value="terraform", global = true)]
    out: PathBuf,

    /// Runner
    #[arg(long, value_enum, default_value_t=Runner::Auto, global = true)]
    runner: Runner,

    /// Allow buckets without access logging
    #[arg(long, default_value_t=false, global = true)]
    allow_unlogged: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum Runner { Auto, Terraform, Tofu }

#[derive(Subcommand, Debug)] enum Cmd {
    /// Write the documents without running terraform
    Generate {
        /// Keep state local (first-time bootstrap)
        #[arg(long)] init: bool,
    },
    /// Create the KMS key and buckets, then move state into S3
    Init,
    Plan,
    Apply,
    Destroy,
}

fn generate(settings: &Settings, init: bool, policy: &Policy, out: &Path) -> Result<BTreeMap<String, Json>> {
    let docs = satf_aws::generate_all(settings, init)?;
    for (stem, tf) in &docs {
        policy.check_tf_json(tf).with_context(|| format!("{stem}{}", tfc::TF_JSON_SUFFIX))?;
    }
    tfc::write_documents(&docs, out)?;
    // bootstrap only writes main; cluster files from earlier runs stay put
    if !init {
        tfc::prune_stale(out, &docs)?;
    }
    info!(out = %out.display(), documents = docs.len(), init, "generated");
    Ok(docs)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().json().with_span_events(FmtSpan::CLOSE).init();
    let cli = Cli::parse();
    let _span = tracing::info_span!("satf", cmd = ?cli.cmd).entered();

    let policy = Policy::new(cli.allow_unlogged)?;
    let settings = Settings::load_dir(&cli.conf)
        .with_context(|| format!("load settings from {}", cli.conf.display()))?;
    let out = cli.out.as_path();

    let r = match cli.runner {
        Runner::Terraform => Some(tfc::Runner::Terraform),
        Runner::Tofu      => Some(tfc::Runner::Tofu),
        Runner::Auto      => None
    };

    match cli.cmd {
      Cmd::Generate { init } => {
          generate(&settings, init, &policy, out)?;
      },
      Cmd::Init => {
          let runner = tfc::pick_runner(r)?;
          generate(&settings, true, &policy, out)?;
          tfc::run_init(runner, out, false)?;
          let targets: Vec<String> = satf_aws::main_tf::bootstrap_resources(&settings)?
              .iter()
              .map(|res| res.address())
              .collect();
          tfc::run_apply_targets(runner, out, &targets)?;
          generate(&settings, false, &policy, out)?;
          tfc::run_init(runner, out, true)?;
          info!("state moved to the remote backend");
      },
      Cmd::Plan => {
          let runner = tfc::pick_runner(r)?;
          generate(&settings, false, &policy, out)?;
          tfc::run_init(runner, out, false)?;
          tfc::run_plan(runner, out)?;
      },
      Cmd::Apply => {
          let runner = tfc::pick_runner(r)?;
          generate(&settings, false, &policy, out)?;
          tfc::run_init(runner, out, false)?;
          tfc::run_apply(runner, out)?;
      },
      Cmd::Destroy => {
          let runner = tfc::pick_runner(r)?;
          generate(&settings, false, &policy, out)?;
          tfc::run_init(runner, out, false)?;
          tfc::run_destroy(runner, out)?;
      },
    }
    Ok(())
}
