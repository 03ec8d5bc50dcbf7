use clap::Args;
use colored::Colorize;
use keglet_common::error::Result;
use keglet_common::model::{InstallState, RecordStatus};
use keglet_common::{Config, Formulary};
use prettytable::{format, Cell, Row, Table};

use super::FormulaArgs;

/// Shows a formula record, whether it is installable, and its prefix
#[derive(Args, Debug)]
pub struct Info {
    #[command(flatten)]
    pub target: FormulaArgs,
}

impl Info {
    pub fn run(&self, config: &Config) -> Result<()> {
        let record = Formulary::new(config).inspect(&self.target.formula)?;
        let prefix = self.target.prefix_for(&record, config);
        let prefix_display = prefix.display().to_string();
        let state = state_label(keglet_core::installed_state(&prefix));

        println!(
            "{} {}",
            record.name().green().bold(),
            record.version().bold()
        );
        println!("{}", record.description());

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);
        for (label, value) in [
            ("Homepage", record.homepage()),
            ("License", record.license()),
            ("Source", record.url()),
            ("SHA256", record.sha256()),
            ("Prefix", prefix_display.as_str()),
            ("Installed", state),
        ] {
            table.add_row(Row::new(vec![
                Cell::new(label).style_spec("b"),
                Cell::new(value),
            ]));
        }
        table.printstd();

        match record.status() {
            RecordStatus::Released => println!("{}", "Released".green()),
            RecordStatus::Draft(reasons) => {
                println!("{}", "Draft (not installable):".yellow().bold());
                for reason in reasons {
                    println!("  - {reason}");
                }
            }
        }
        Ok(())
    }
}

fn state_label(state: InstallState) -> &'static str {
    match state {
        InstallState::NotInstalled => "no",
        InstallState::Installed => "yes",
        InstallState::Verified => "yes (verified)",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;
    use crate::cli::{CliArgs, Command};

    #[test]
    fn info_accepts_formula_and_prefix() {
        let args =
            CliArgs::parse_from(["keglet", "info", "-f", "phpswitch", "-p", "/opt/phpswitch"]);
        match args.command {
            Command::Info(info) => {
                assert_eq!(info.target.formula, "phpswitch");
                assert_eq!(info.target.prefix, Some(PathBuf::from("/opt/phpswitch")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn info_reports_install_state_of_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        let prefix = dir.path().join("opt/phpswitch");
        let info = Info {
            target: FormulaArgs {
                formula: "phpswitch".to_string(),
                prefix: Some(prefix.clone()),
            },
        };
        info.run(&config).unwrap();
        assert_eq!(state_label(keglet_core::installed_state(&prefix)), "no");

        std::fs::create_dir_all(&prefix).unwrap();
        std::fs::write(prefix.join("phpswitch.sh"), b"phpswitch() { :; }\n").unwrap();
        info.run(&config).unwrap();
        assert_eq!(state_label(keglet_core::installed_state(&prefix)), "yes");
    }
}
