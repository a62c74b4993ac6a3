use anyhow::Result;
use clap::{CommandFactory, Parser};
use cognita::app::run_lecture;
use cognita::audio::capture::{list_input_devices, list_output_devices};
use cognita::cli::{Cli, Commands, ConfigAction, LectureArgs};
use cognita::config::Config;
use owo_colors::OwoColorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run_lecture(config, LectureArgs::default(), cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Lecture(args)) => {
            let config = load_config(cli.config.as_deref())?;
            run_lecture(config, args, cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "cognita", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over `-q`/`-v`.
fn init_logging(quiet: bool, verbosity: u8) {
    let default_level = match (quiet, verbosity) {
        (true, _) => "cognita=error",
        (false, 0) => "cognita=info",
        (false, 1) => "cognita=debug",
        (false, _) => "cognita=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path()?)?
    };

    Ok(config.with_env_overrides())
}

/// List available audio input and output devices.
fn list_audio_devices() -> Result<()> {
    let inputs = list_input_devices()?;
    let outputs = list_output_devices()?;

    if inputs.is_empty() && outputs.is_empty() {
        eprintln!("No audio devices found");
        std::process::exit(1);
    }

    println!("{}", "Input devices:".bold());
    for (idx, device) in inputs.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }
    println!("{}", "Output devices:".bold());
    for (idx, device) in outputs.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&std::path::Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.redacted().to_toml()?);
            if config.live.api_key.is_none() {
                eprintln!(
                    "{}",
                    "warning: no API key set (COGNITA_API_KEY or GEMINI_API_KEY)".yellow()
                );
            }
        }
        ConfigAction::Path => {
            let path = match custom_path {
                Some(path) => path.to_path_buf(),
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}
