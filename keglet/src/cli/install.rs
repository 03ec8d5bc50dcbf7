// keglet/src/cli/install.rs
use std::fs;

use clap::Args;
use keglet_common::error::{KegletError, Result};
use keglet_common::Config;
use tracing::{debug, instrument};

use super::FormulaArgs;
use crate::ui;

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: FormulaArgs,

    /// Skip the post-install self-check
    #[arg(long)]
    pub skip_test: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config), fields(formula = %self.target.formula))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        let record = self.target.load(config)?;
        let prefix = self.target.prefix_for(&record, config);

        // The host owns the prefix; create it so the installer finds it.
        if !prefix.exists() {
            debug!("Creating install prefix {}", prefix.display());
            fs::create_dir_all(&prefix).map_err(|e| {
                KegletError::InstallError(format!(
                    "Failed to create prefix {}: {}",
                    prefix.display(),
                    e
                ))
            })?;
        }

        ui::heading(&format!("Installing {} {}", record.name(), record.version()));
        let spinner = ui::create_spinner(&format!("Fetching {}", record.url()));
        let result = keglet_core::install(&record, &prefix, config).await;
        spinner.finish_and_clear();
        let mut artifact = result?;
        println!("Installed {}", artifact.path.display());

        ui::heading("Caveats");
        print!("{}", keglet_core::caveats(&prefix));

        if self.skip_test {
            debug!("Skipping self-check for {}", artifact.path.display());
            return Ok(());
        }
        keglet_core::verify_artifact(&mut artifact)?;
        ui::heading(&format!("{} {} verified", record.name(), record.version()));
        Ok(())
    }
}
