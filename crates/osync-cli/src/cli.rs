use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "osync")]
#[command(about = "Reconcile a local markdown tree with a remote Outline collection")]
#[command(version)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Collection id, overriding configuration and remembered state
    #[arg(long, value_name = "ID")]
    pub collection: Option<String>,

    /// Sync root, overriding the configured directory
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Report what would change without touching either side
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_with_no_arguments() {
        let cli = Cli::parse_from(["osync"]);
        assert!(cli.config.is_none());
        assert!(cli.collection.is_none());
        assert!(!cli.dry_run);
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "osync",
            "--config",
            "custom.yaml",
            "--collection",
            "col-9",
            "--root",
            "/tmp/notes",
            "--dry-run",
            "-v",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
        assert_eq!(cli.collection.as_deref(), Some("col-9"));
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/notes")));
        assert!(cli.dry_run);
        assert!(cli.verbose);
    }
}
