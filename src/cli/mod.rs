//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::cache::{CacheFormat, SerializerWithFallback};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "oxcoder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Print codec metrics after the command")]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "inspect", about = "Detect the format of a dumped entry and decode it")]
    Inspect(InspectArgs),

    #[command(name = "encode", about = "Encode a JSON literal as a cache entry")]
    Encode(EncodeArgs),

    #[command(name = "formats", about = "List entry formats in detection order")]
    Formats(FormatsArgs),

    #[command(name = "message", about = "Dump or load a message with the configured message format")]
    Message(MessageArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[arg(long, conflicts_with = "file", help = "Dumped entry as hex bytes")]
    pub hex: Option<String>,

    #[arg(short, long, help = "Read the dumped entry from a file")]
    pub file: Option<PathBuf>,

    #[arg(long, help = "Only decode version and expiry")]
    pub metadata_only: bool,
}

#[derive(Parser, Debug)]
pub struct EncodeArgs {
    #[arg(help = "Value as a JSON literal")]
    pub value: String,

    #[arg(short, long, help = "Entry format (defaults to the configured format)")]
    pub format: Option<CacheFormat>,

    #[arg(long, help = "Entry version")]
    pub entry_version: Option<String>,

    #[arg(long, help = "Expiry in seconds from now")]
    pub expires_in: Option<u64>,

    #[arg(long, help = "Compress payloads of at least this many bytes")]
    pub compress_threshold: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct FormatsArgs {
    #[arg(short, long, help = "Show signatures")]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct MessageArgs {
    #[arg(help = "Value to dump, as a JSON literal")]
    pub value: Option<String>,

    #[arg(long, conflicts_with = "value", help = "Dumped message as hex bytes to load")]
    pub hex: Option<String>,
}

mod encode;
mod formats;
mod inspect;
mod message;

/// 加载配置文件，未指定时使用默认配置
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn build_coder(config: &Config) -> Result<SerializerWithFallback> {
    SerializerWithFallback::from_config(&config.cache, &config.message_pack)
        .context("Invalid cache configuration")
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::utils::setup_logging_with("warn");

    let config = load_config(cli.config.as_ref())?;

    match &cli.command {
        Commands::Inspect(args) => inspect::execute(args, &config)?,
        Commands::Encode(args) => encode::execute(args, &config)?,
        Commands::Formats(args) => formats::execute(args, &config)?,
        Commands::Message(args) => message::execute(args, &config)?,
    }

    if cli.metrics {
        print!("{}", crate::metrics::get_metrics_string());
    }
    Ok(())
}
