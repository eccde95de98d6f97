use anyhow::{bail, Context, Result};
use quanta_app::bootstrap::build_chat_service;
use quanta_app::chat::ChatRequest;
use quanta_app::config::{Config, DEFAULT_CONFIG_PATH};
use quanta_app::server::{self, AppState};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: quanta [--config PATH] <command>

Commands:
  serve                                  Run the HTTP endpoint (default)
  tools                                  Print the tool catalog as JSON
  ask --user ID [--token TOKEN] PROMPT   Answer one prompt and exit
  config init                            Write a default config file";

struct Cli {
    config_path: PathBuf,
    command: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut command = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = args.next().map(PathBuf::from).context("--config needs a path")?;
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            _ => command.push(arg),
        }
    }
    Ok(Cli {
        config_path,
        command,
    })
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    config.apply_env();
    config
        .validate()
        .with_context(|| format!("Invalid configuration ({})", path.display()))?;
    Ok(config)
}

async fn ask(config: &Config, args: &[String]) -> Result<()> {
    let mut request = ChatRequest::default();
    let mut prompt = Vec::new();
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--user" => request.user_id = args.next().cloned(),
            "--token" => request.auth_token = args.next().cloned(),
            _ => prompt.push(arg.as_str()),
        }
    }
    request.prompt = Some(prompt.join(" "));

    let chat = build_chat_service(config)?;
    let answer = chat.answer(request).await?;
    println!("{}", answer);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args(std::env::args().skip(1))?;
    let command: Vec<&str> = cli.command.iter().map(String::as_str).collect();

    match command.as_slice() {
        [] | ["serve"] => {
            let config = load_config(&cli.config_path)?;
            let chat = build_chat_service(&config)?;
            server::serve(&config.bind, AppState::new(chat)).await
        }
        ["tools"] => {
            println!("{}", quanta_tools::safe_stringify(&quanta_tools::list_tools()));
            Ok(())
        }
        ["ask", ..] => {
            let config = load_config(&cli.config_path)?;
            ask(&config, &cli.command[1..]).await
        }
        ["config", "init"] => {
            if cli.config_path.exists() {
                bail!("{} already exists", cli.config_path.display());
            }
            Config::default().save(&cli.config_path)?;
            println!("Wrote {}", cli.config_path.display());
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", cli.command.join(" "))
        }
    }
}
