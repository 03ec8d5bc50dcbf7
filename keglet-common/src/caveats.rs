// keglet-common/src/caveats.rs
//! Post-install guidance for activating the switcher in a shell.

use std::path::Path;

use crate::model::artifact::script_path;

/// Renders the caveats shown after installing into `prefix`.
///
/// Depends on nothing but `prefix`, so repeated calls give identical text.
pub fn caveats(prefix: &Path) -> String {
    let script = script_path(prefix);
    let script = script.display();
    format!(
        "To activate phpswitch, add this to your shell configuration:

For Zsh (~/.zshrc):
  source {script}

For Bash (~/.bashrc or ~/.bash_profile):
  source {script}

Then reload your shell:
  source ~/.zshrc  # or source ~/.bashrc

Quick start:
  phpswitch 8.3              # Switch to PHP 8.3
  echo \"8.2\" > .php-version  # Auto-switch per project
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_the_prefix_script_for_both_shells() {
        let text = caveats(Path::new("/opt/phpswitch"));
        assert_eq!(text.matches("source /opt/phpswitch/phpswitch.sh").count(), 2);
        assert!(text.contains("For Zsh (~/.zshrc):"));
        assert!(text.contains("For Bash (~/.bashrc or ~/.bash_profile):"));
        assert!(text.contains("phpswitch 8.3"));
        assert!(text.contains("echo \"8.2\" > .php-version"));
    }

    #[test]
    fn rendering_is_pure() {
        let prefix = Path::new("/usr/local/Cellar/phpswitch/1.0.0");
        assert_eq!(caveats(prefix), caveats(prefix));
    }
}
