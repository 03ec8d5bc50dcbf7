use clap::Args;
use colored::Colorize;
use keglet_common::error::Result;
use keglet_common::model::artifact::script_path;
use keglet_common::Config;
use tracing::instrument;

use super::FormulaArgs;

/// Checks that an installed script exists and is readable
#[derive(Args, Debug)]
pub struct Test {
    #[command(flatten)]
    pub target: FormulaArgs,
}

impl Test {
    #[instrument(skip(self, config), fields(formula = %self.target.formula))]
    pub fn run(&self, config: &Config) -> Result<()> {
        let record = self.target.load(config)?;
        let prefix = self.target.prefix_for(&record, config);
        keglet_core::verify_installation(&prefix)?;
        println!(
            "{} {} exists and is readable",
            "✓".green().bold(),
            script_path(&prefix).display()
        );
        Ok(())
    }
}
