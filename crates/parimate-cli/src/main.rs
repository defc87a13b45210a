mod commands;
mod config;
mod logging;
mod pipeline;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::verify::VerifyArgs;
use config::ParimateConfig;
use logging::{LogFormat, init_logging};

#[derive(Parser)]
#[command(name = "parimate", about = "Video authenticity checks for task proofs")]
pub struct Cli {
    /// Config file
    #[arg(long, global = true, env = "PARIMATE_CONFIG", default_value = ParimateConfig::DEFAULT_FILE)]
    pub config: PathBuf,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run metadata forensics on a video and print the report
    Metadata {
        /// Video file
        video: PathBuf,
        /// exiftool executable
        #[arg(long, default_value = "exiftool")]
        exiftool: PathBuf,
    },
    /// Sample frames from a video and print their sharpness
    Frames {
        /// Video file
        video: PathBuf,
    },
    /// Look for a phrase in a piece of text
    Phrase {
        /// Transcript to search
        #[arg(long)]
        text: String,
        /// Phrase to find
        #[arg(long)]
        phrase: String,
    },
    /// Transcribe a video's speech with Yandex SpeechKit
    Transcribe {
        /// Video file
        video: PathBuf,
    },
    /// Run every configured check on a video and print the verdict
    Verify(VerifyArgs),
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogFormat::from_flag(cli.log_json), &cli.log_level);

    match cli.command {
        Commands::Config { action } => commands::config::handle(action, &cli.config).await,
        Commands::Metadata { video, exiftool } => {
            let config = ParimateConfig::load(&cli.config)?;
            commands::metadata::handle(&video, exiftool, &config).await
        }
        Commands::Frames { video } => {
            let config = ParimateConfig::load(&cli.config)?;
            commands::frames::handle(&video, &config).await
        }
        Commands::Phrase { text, phrase } => {
            let config = ParimateConfig::load(&cli.config)?;
            commands::phrase::handle(&text, &phrase, &config)
        }
        Commands::Transcribe { video } => {
            let config = ParimateConfig::load(&cli.config)?;
            commands::transcribe::handle(&video, &config).await
        }
        Commands::Verify(args) => {
            let config = ParimateConfig::load(&cli.config)?;
            commands::verify::handle(args, &config).await
        }
    }
}
