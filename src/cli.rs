//! Command-line interface definitions for Quora Leads.
//!
//! URLs come from positional arguments, a file, or both. Options that
//! depend on the host can also be set through environment variables.

use clap::Parser;
use std::path::PathBuf;

/// Scrape Quora profile and question pages into canonical lead records.
///
/// # Examples
///
/// ```sh
/// # Two pages, default output file
/// quora_leads https://www.quora.com/profile/Adam-D-Angelo https://www.quora.com/What-is-Rust
///
/// # URLs from a file, visible browser, custom output
/// quora_leads -f urls.txt --headed -j out/leads.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Page URLs to scrape
    pub urls: Vec<String>,

    /// File with one URL per line (blank lines and `#` comments are skipped)
    #[arg(short = 'f', long)]
    pub urls_file: Option<PathBuf>,

    /// Destination of the JSON output file
    #[arg(short, long, default_value = "quora_output.json")]
    pub json_output: PathBuf,

    /// Optional path to a config.yaml file
    #[arg(short, long, env = "QUORA_LEADS_CONFIG")]
    pub config: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Chromium executable, overriding the config file
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,
}

/// Parse the contents of a URL list file.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "quora_leads",
            "https://www.quora.com/profile/A",
            "https://www.quora.com/B",
            "--json-output",
            "./out.json",
        ]);

        assert_eq!(
            cli.urls,
            vec!["https://www.quora.com/profile/A", "https://www.quora.com/B"]
        );
        assert_eq!(cli.json_output, PathBuf::from("./out.json"));
        assert!(!cli.headed);
    }

    #[test]
    fn test_cli_short_flags_and_defaults() {
        let cli = Cli::parse_from(["quora_leads", "-f", "/tmp/urls.txt", "--headed"]);

        assert!(cli.urls.is_empty());
        assert_eq!(cli.urls_file, Some(PathBuf::from("/tmp/urls.txt")));
        assert_eq!(cli.json_output, PathBuf::from("quora_output.json"));
        assert!(cli.headed);
    }

    #[test]
    fn test_url_list_skips_comments_and_blanks() {
        let raw = "# leads\nhttps://www.quora.com/a\n\n   \n  https://www.quora.com/b  \n#https://www.quora.com/c\n";
        assert_eq!(
            parse_url_list(raw),
            vec!["https://www.quora.com/a", "https://www.quora.com/b"]
        );
    }
}
