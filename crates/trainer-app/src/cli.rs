use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(
        short = 's',
        long = "stdout",
        action,
        help = "Controls if it logs to stdout/stderr instead of to a file"
    )]
    pub is_to_std_out: bool,

    #[arg(
        short = 'c',
        long = "config-dir",
        default_value = "configuration",
        help = "Folder containing base.toml (APP_ prefixed environment variables override it)"
    )]
    pub config_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["trainer-app"]);
        assert!(!cli.is_to_std_out);
        assert_eq!(cli.config_dir, PathBuf::from("configuration"));
    }

    #[test]
    fn overrides() {
        let cli = Cli::parse_from(["trainer-app", "-s", "--config-dir", "/etc/trainer"]);
        assert!(cli.is_to_std_out);
        assert_eq!(cli.config_dir, PathBuf::from("/etc/trainer"));
    }
}
