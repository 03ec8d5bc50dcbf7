// keglet/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use keglet_common::error::Result;
use keglet_common::{Config, FormulaRecord, Formulary};

pub mod audit;
pub mod caveats;
pub mod check;
pub mod info;
pub mod install;

use crate::cli::audit::Audit;
use crate::cli::caveats::Caveats;
use crate::cli::check::Test;
use crate::cli::info::Info;
use crate::cli::install::InstallArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "keglet", bin_name = "keglet")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Info(Info),
    Install(InstallArgs),
    Caveats(Caveats),
    Test(Test),
    Audit(Audit),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Info(command) => command.run(config),
            Self::Install(command) => command.run(config).await,
            Self::Caveats(command) => command.run(config),
            Self::Test(command) => command.run(config),
            Self::Audit(command) => command.run(config),
        }
    }
}

/// Options shared by every command that acts on one formula.
#[derive(Args, Debug, Clone)]
pub struct FormulaArgs {
    /// Formula name or path to a .toml/.json record
    #[arg(long, short = 'f', default_value = "phpswitch")]
    pub formula: String,

    /// Install prefix (defaults to <root>/Cellar/<name>/<version>)
    #[arg(long, short = 'p')]
    pub prefix: Option<PathBuf>,
}

impl FormulaArgs {
    pub fn load(&self, config: &Config) -> Result<FormulaRecord> {
        Formulary::new(config).load_formula(&self.formula)
    }

    pub fn prefix_for(&self, record: &FormulaRecord, config: &Config) -> PathBuf {
        self.prefix
            .clone()
            .unwrap_or_else(|| config.formula_prefix(record.name(), record.version()))
    }
}
