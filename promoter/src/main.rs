//! Branch promotion CLI.
//!
//! `promoter promote` reads the ledger from the repository's trunk, decides
//! whether to reuse or mint a branch, provisions it if needed, and prints the
//! branch/environment pair for the pipeline's promotion step. `promoter plan`
//! runs the same decision offline against a local ledger file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use promoter::error::PromotionError;
use promoter::exit_codes;
use promoter::io::config::{DEFAULT_CONFIG_PATH, PromoterConfig, load_config};
use promoter::logging;
use promoter::promote::{PromotionPlan, PromotionRequest, plan_offline, run_promotion};

#[derive(Parser)]
#[command(
    name = "promoter",
    version,
    about = "Promote release branches across deployment tiers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide and provision against a remote repository.
    Promote {
        /// Tier promoted from.
        lower_env: String,
        /// Tier promoted to.
        higher_env: String,
        /// Repository holding the ledger and release branches.
        repo_url: String,
        /// Version for a newly minted release branch (e.g. `1.1.0`).
        new_version: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Decide against a local ledger file without writing anything.
    Plan {
        /// Ledger file to read.
        #[arg(long)]
        ledger: PathBuf,
        lower_env: String,
        higher_env: String,
        new_version: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Config file (defaults apply when it does not exist).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Print the plan as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Promote {
            lower_env,
            higher_env,
            repo_url,
            new_version,
            common,
        } => {
            let cfg = load_cli_config(&common)?;
            let request = PromotionRequest {
                lower_env,
                higher_env,
                repo_url,
                new_version,
            };
            let plan = run_promotion(&request, &cfg)?;
            print_plan(&plan, common.json)
        }
        Command::Plan {
            ledger,
            lower_env,
            higher_env,
            new_version,
            common,
        } => {
            let cfg = load_cli_config(&common)?;
            let (_, plan) = plan_offline(
                &ledger,
                &lower_env,
                &higher_env,
                new_version.as_deref(),
                &cfg,
            )?;
            print_plan(&plan, common.json)
        }
    }
}

fn load_cli_config(common: &CommonArgs) -> Result<PromoterConfig> {
    load_config(&common.config).context("load promoter config")
}

fn print_plan(plan: &PromotionPlan, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(plan)?);
    } else {
        println!("{}", plan.summary_line());
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize plan")
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PromotionError>()
        .map(PromotionError::exit_code)
        .unwrap_or(exit_codes::FAILED)
}
