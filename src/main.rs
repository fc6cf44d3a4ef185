use anyhow::{Context, Result};
use axum::extract::Path;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use errorgenie::config::generate_default_config;
use errorgenie::providers::get_api_key;
use errorgenie::{install, Assistant, Cli, Config, ExceptionRecord, ProviderType};

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>ErrorGenie demo</title></head>
<body>
<h1>ErrorGenie demo</h1>
<ul>
  <li><a href="/users/1">/users/1</a> - works</li>
  <li><a href="/users/7">/users/7</a> - returns a 500 error page</li>
  <li><a href="/panic">/panic</a> - handler panics</li>
</ul>
</body>
</html>
"#;

const USERS: [&str; 3] = ["ada", "grace", "linus"];

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn show_user(Path(id): Path<usize>) -> Result<String, ExceptionRecord> {
    let name = USERS
        .get(id)
        .ok_or_else(|| ExceptionRecord::capture("IndexError", format!("no user with id {}", id)))?;
    Ok(format!("Hello, {}!", name))
}

async fn panic_handler() -> String {
    let ratios: Vec<u32> = Vec::new();
    format!("first ratio: {}", ratios[0])
}

fn demo_routes() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/users/{id}", get(show_user))
        .route("/panic", get(panic_handler))
}

fn format_warning(message: &str, tip: Option<&str>) -> String {
    let mut output = format!("{} {}", "Warning:".yellow().bold(), message);
    if let Some(tip) = tip {
        output.push('\n');
        output.push_str(&format!("{} {}", "Tip:".blue().bold(), tip));
    }
    output
}

fn print_banner(cli: &Cli, config: &Config, assistant: &Assistant) {
    println!("{} {}", "▸".magenta(), "ErrorGenie demo".magenta().bold());
    println!(
        "  {} {}",
        "Listening:".blue().bold(),
        format!("http://{}", cli.bind).bright_white()
    );
    println!(
        "  {} {}",
        "Environment:".blue().bold(),
        config.environment.to_string().bright_white()
    );
    let assistance = if config.assist.enabled {
        format!("{} ({})", assistant.provider_name(), config.assist.model)
    } else {
        "static notice".to_string()
    };
    println!("  {} {}", "Assistance:".blue().bold(), assistance.bright_white());
    println!();

    if !config.is_development() {
        eprintln!(
            "{}",
            format_warning(
                "middleware is only active in development",
                Some("run with --env development"),
            )
        );
    } else if config.assist.enabled
        && config.assist.provider == ProviderType::OpenAI
        && get_api_key(ProviderType::OpenAI).is_none()
    {
        eprintln!(
            "{}",
            format_warning(
                "OPENAI_API_KEY is not set, error pages will show the fallback message",
                Some("export OPENAI_API_KEY or pass --no-ai"),
            )
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = Config::load_from_path(cli.config_path());
    config.apply_env_overrides();
    cli.apply_to(&mut config);

    let router = install(demo_routes(), &config)?;

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;

    let assistant = Assistant::from_config(&config.assist)?;
    print_banner(&cli, &config, &assistant);

    axum::serve(listener, router)
        .await
        .context("Server exited with an error")?;

    Ok(())
}
