use clap::Parser;
use std::path::PathBuf;

/// Loads a module tree from JSON manifests and prints the entry module's exports.
#[derive(Debug, Parser)]
#[command(name = "modload")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bootstrap a module tree and print its exports")]
pub struct Cli {
    /// Config file; defaults to an optional `modload.{toml,json,yaml}` in the working directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Entry module identifier
    #[arg(value_name = "ENTRY")]
    pub entry: Option<String>,

    /// Directory module locators are resolved against
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Extension appended to module locators
    #[arg(short, long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Locator override, repeatable: `--path jquery=vendor/jquery-3`
    #[arg(short, long = "path", value_name = "ID=LOCATOR", value_parser = parse_mapping)]
    pub paths: Vec<(String, String)>,

    /// Log level: trace, debug, info, warn, error or off
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json: bool,
}

fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((id, locator)) if !id.trim().is_empty() && !locator.trim().is_empty() => {
            Ok((id.trim().to_owned(), locator.trim().to_owned()))
        },
        _ => Err(format!("expected ID=LOCATOR, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        assert_eq!(parse_mapping("jquery=vendor/jquery-3"), Ok(("jquery".into(), "vendor/jquery-3".into())));
        assert!(parse_mapping("jquery").is_err());
        assert!(parse_mapping("=x").is_err());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["modload", "app/main", "-r", "mods", "-p", "a=b", "-p", "c=d", "--json"]);
        assert_eq!(cli.entry.as_deref(), Some("app/main"));
        assert_eq!(cli.root, Some(PathBuf::from("mods")));
        assert_eq!(cli.paths.len(), 2);
        assert!(cli.json);
    }
}
