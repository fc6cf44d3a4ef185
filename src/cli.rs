//! Command-line interface definitions for the `errorgenie-demo` server.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{Config, Environment};

/// Demo server with the ErrorGenie middleware installed
#[derive(Parser, Debug)]
#[command(
    name = "errorgenie-demo",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ERRORGENIE_GIT_SHA"), ")"),
    about,
    long_about = None
)]
#[command(
    after_help = "EXAMPLES:\n    errorgenie-demo\n    errorgenie-demo --bind 0.0.0.0:8080 --no-ai\n    OPENAI_API_KEY=sk-... errorgenie-demo --model gpt-4o"
)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, short = 'b', default_value = "127.0.0.1:3000", value_name = "ADDR")]
    pub bind: SocketAddr,

    /// Config file (default: ~/.config/errorgenie/config.toml)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Runtime environment: development, test or production
    #[arg(long, short = 'e', value_name = "ENV")]
    pub env: Option<Environment>,

    /// Show a static notice instead of calling the completion API
    #[arg(long)]
    pub no_ai: bool,

    /// Model identifier sent to the completion API
    #[arg(long, short = 'm', value_name = "MODEL")]
    pub model: Option<String>,

    /// Root path for resolving relative file paths in backtraces
    #[arg(long, value_name = "PATH")]
    pub context_root: Option<PathBuf>,

    /// Number of lines to show around the error location
    #[arg(long, value_name = "N")]
    pub context_lines: Option<usize>,

    /// Print the default configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Path of the config file to load
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Config::config_path)
    }

    /// Apply command-line flags on top of file and environment settings
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(env) = self.env {
            config.environment = env;
        }
        if self.no_ai {
            config.assist.enabled = false;
        }
        if let Some(ref model) = self.model {
            config.assist.model = model.clone();
        }
        if let Some(ref root) = self.context_root {
            config.source.context_root = Some(root.clone());
        }
        if let Some(lines) = self.context_lines {
            config.source.context_lines = lines;
        }
    }
}
