use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "parqueue",
    version,
    about = "Convert spreadsheets to Parquet through a conversion service"
)]
pub struct Cli {
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Service address; overrides the config file and PARQUEUE_BASE_URL.
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue files for conversion and wait until all of them have finished.
    Convert {
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Save every converted file into this directory.
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// List past conversions.
    History {
        #[arg(long)]
        json: bool,
    },

    /// Delete a history entry.
    Delete { id: String },

    /// Save the converted file of a history entry.
    Download {
        id: String,

        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_convert_files() {
        let cli = Cli::try_parse_from(["parqueue", "convert", "a.xlsx", "b.xls"]).expect("parse");
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Command::Convert { files, output_dir } => {
                assert_eq!(files, vec![PathBuf::from("a.xlsx"), PathBuf::from("b.xls")]);
                assert!(output_dir.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_convert_requires_files() {
        assert!(Cli::try_parse_from(["parqueue", "convert"]).is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "parqueue",
            "history",
            "--json",
            "-v",
            "--base-url",
            "http://10.0.0.2:8000",
            "--log-format",
            "json",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.base_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::History { json: true }));
    }

    #[test]
    fn cli_parses_download_output() {
        let cli = Cli::try_parse_from([
            "parqueue",
            "-c",
            "/etc/parqueue.json",
            "download",
            "abc123",
            "-o",
            "/tmp/out.parquet",
        ])
        .expect("parse");
        assert_eq!(cli.config.unwrap(), PathBuf::from("/etc/parqueue.json"));
        match cli.command {
            Command::Download { id, output } => {
                assert_eq!(id, "abc123");
                assert_eq!(output.unwrap(), PathBuf::from("/tmp/out.parquet"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["parqueue"]).is_err());
    }
}
