// src/cli.rs
use clap::Parser;

/// Raw option surface. Values are kept as strings so that `args::validate`
/// owns every rule and can report all problems at once.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about = "Detects and removes Microsoft Office installations", long_about = None)]
#[command(args_override_self = true)]
pub struct RawArgs {
    /// Installer technology: Store, ClickToRun or WindowsInstaller
    #[arg(short = 'p', long = "office-product-type")]
    pub office_product_type: Option<String>,

    /// Office major version: 12, 14, 15 or 16
    #[arg(short = 'o', long = "office-version")]
    pub office_version: Option<String>,

    /// Work mode: Detect, Remove or Uninstall
    #[arg(short = 'm', long = "work-mode")]
    pub work_mode: Option<String>,

    /// Keep licensing and activation registry data
    #[arg(short = 'k', long = "keep-activation-info")]
    pub keep_activation_info: bool,

    /// Never restart the machine after removal
    #[arg(short = 'r', long = "no-restart")]
    pub no_restart: bool,

    /// Directory receiving the log file
    #[arg(short = 'l', long = "log-path")]
    pub log_path: Option<String>,

    /// Console verbosity: Quiet, Normal or Verbose
    #[arg(short = 's', long = "output-state")]
    pub output_state: Option<String>,

    /// Do not print the copyright banner
    #[arg(short = 'c', long = "no-copyright-logo")]
    pub no_copyright_logo: bool,

    /// Set on the elevated relaunch so it never tries to elevate again
    #[arg(long = "relaunched", hide = true)]
    pub relaunched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags_map_to_fields() {
        let raw = RawArgs::try_parse_from([
            "office-remover", "-p", "ClickToRun", "-o", "16", "-m", "Remove", "-k", "-r", "-c",
            "-l", "logs", "-s", "Verbose",
        ])
        .unwrap();
        assert_eq!(raw.office_product_type.as_deref(), Some("ClickToRun"));
        assert_eq!(raw.office_version.as_deref(), Some("16"));
        assert_eq!(raw.work_mode.as_deref(), Some("Remove"));
        assert!(raw.keep_activation_info);
        assert!(raw.no_restart);
        assert!(raw.no_copyright_logo);
        assert_eq!(raw.log_path.as_deref(), Some("logs"));
        assert_eq!(raw.output_state.as_deref(), Some("Verbose"));
        assert!(!raw.relaunched);
    }

    #[test]
    fn test_relaunch_may_repeat_flags() {
        let raw = RawArgs::try_parse_from([
            "office-remover", "-p", "MSI", "-o", "14", "-c", "--no-copyright-logo", "--relaunched",
        ])
        .unwrap();
        assert!(raw.no_copyright_logo);
        assert!(raw.relaunched);
    }

    #[test]
    fn test_relaunch_log_path_overrides_the_original() {
        let raw = RawArgs::try_parse_from([
            "office-remover", "-p", "MSI", "-o", "16", "-l", "logs", "--log-path", r"C:\Work\logs", "--relaunched",
        ])
        .unwrap();
        assert_eq!(raw.log_path.as_deref(), Some(r"C:\Work\logs"));
    }

    #[test]
    fn test_missing_required_values_still_parse() {
        // Required-ness is enforced by the validator, not by clap.
        let raw = RawArgs::try_parse_from(["office-remover"]).unwrap();
        assert!(raw.office_product_type.is_none());
        assert!(raw.office_version.is_none());
    }
}
