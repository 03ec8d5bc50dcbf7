use clap::Args;
use keglet_common::error::Result;
use keglet_common::Config;

use super::FormulaArgs;

/// Prints shell activation instructions for an install prefix
#[derive(Args, Debug)]
pub struct Caveats {
    #[command(flatten)]
    pub target: FormulaArgs,
}

impl Caveats {
    pub fn run(&self, config: &Config) -> Result<()> {
        let record = self.target.load(config)?;
        let prefix = self.target.prefix_for(&record, config);
        print!("{}", keglet_core::caveats(&prefix));
        Ok(())
    }
}
