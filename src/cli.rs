//! Command-line interface for cognita
//!
//! Provides argument parsing using clap derive macros.

use crate::session::preset::SessionPreset;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Live voice lectures for the Cognita study assistant
#[derive(Parser, Debug)]
#[command(name = "cognita", version, about = "Live voice lectures for Cognita")]
pub struct Cli {
    /// Subcommand to execute (default: lecture)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Options for a live session
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct LectureArgs {
    /// Subject of the session, interpolated into the instruction
    #[arg(long, short = 't', value_name = "TOPIC")]
    pub topic: Option<String>,

    /// Instruction preset: lecture, tutor or quest
    #[arg(long, short = 'p', value_name = "PRESET")]
    pub preset: Option<SessionPreset>,

    /// Custom system instruction (overrides the preset template)
    #[arg(long, value_name = "TEXT")]
    pub instruction: Option<String>,

    /// Ask for text answers instead of speech
    #[arg(long)]
    pub text_only: bool,

    /// Start with the microphone muted
    #[arg(long)]
    pub muted: bool,

    /// Audio input device
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a live voice session (type lines to send text; /mute, /unmute, /quit)
    Lecture(LectureArgs),

    /// List available audio input and output devices
    Devices,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Print the configuration file path
    Path,
}

/// A line typed during a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Text(String),
    Mute,
    Unmute,
    Quit,
    Empty,
    Unknown(String),
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleInput::Empty;
        }
        match line {
            "/mute" => ConsoleInput::Mute,
            "/unmute" => ConsoleInput::Unmute,
            "/quit" | "/exit" => ConsoleInput::Quit,
            cmd if cmd.starts_with('/') => ConsoleInput::Unknown(cmd.to_string()),
            text => ConsoleInput::Text(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["cognita"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["cognita", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_lecture_with_options() {
        let cli = Cli::try_parse_from([
            "cognita",
            "lecture",
            "--topic",
            "Cell biology",
            "--preset",
            "quest",
            "--text-only",
            "--muted",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Lecture(args)) => {
                assert_eq!(args.topic.as_deref(), Some("Cell biology"));
                assert_eq!(args.preset, Some(SessionPreset::Quest));
                assert!(args.text_only);
                assert!(args.muted);
                assert!(args.instruction.is_none());
            }
            other => panic!("Expected Lecture command, got {:?}", other),
        }
    }

    #[test]
    fn test_lecture_defaults() {
        let cli = Cli::try_parse_from(["cognita", "lecture"]).unwrap();
        match cli.command {
            Some(Commands::Lecture(args)) => assert_eq!(args, LectureArgs::default()),
            other => panic!("Expected Lecture command, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let result = Cli::try_parse_from(["cognita", "lecture", "--preset", "exam"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_devices() {
        let cli = Cli::try_parse_from(["cognita", "devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["cognita", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
        let cli = Cli::try_parse_from(["cognita", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Path
            })
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["cognita", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_global_options_after_command() {
        let cli =
            Cli::try_parse_from(["cognita", "devices", "--config", "/tmp/config.toml", "-q"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["cognita", "invalid"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["cognita", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_console_input() {
        assert_eq!(ConsoleInput::parse("  /mute "), ConsoleInput::Mute);
        assert_eq!(ConsoleInput::parse("/unmute"), ConsoleInput::Unmute);
        assert_eq!(ConsoleInput::parse("/quit"), ConsoleInput::Quit);
        assert_eq!(ConsoleInput::parse(""), ConsoleInput::Empty);
        assert_eq!(
            ConsoleInput::parse("/louder"),
            ConsoleInput::Unknown("/louder".into())
        );
        assert_eq!(
            ConsoleInput::parse("What is ATP?"),
            ConsoleInput::Text("What is ATP?".into())
        );
    }
}
