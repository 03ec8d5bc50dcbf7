use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use keglet_common::error::{KegletError, Result};
use keglet_common::formulary::load_record_file;
use keglet_common::model::RecordStatus;
use keglet_common::Config;
use tracing::warn;

/// Validates formula records and reports drafts
#[derive(Args, Debug)]
pub struct Audit {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Audit {
    pub fn run(&self, _config: &Config) -> Result<()> {
        let mut failed = 0usize;
        for file in &self.files {
            match load_record_file(file) {
                Ok(record) => match record.status() {
                    RecordStatus::Released => {
                        println!(
                            "{} {}: {} {} is releasable",
                            "✓".green().bold(),
                            file.display(),
                            record.name(),
                            record.version()
                        );
                    }
                    RecordStatus::Draft(reasons) => {
                        failed += 1;
                        println!(
                            "{} {}: {} is a draft",
                            "✗".yellow().bold(),
                            file.display(),
                            record.name()
                        );
                        for reason in reasons {
                            println!("    - {reason}");
                        }
                    }
                },
                Err(e) => {
                    failed += 1;
                    warn!("Audit of {} failed: {}", file.display(), e);
                    println!("{} {}: {}", "✗".red().bold(), file.display(), e);
                }
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(KegletError::ValidationError(format!(
                "{failed} of {} formula file(s) failed audit",
                self.files.len()
            )))
        }
    }
}
