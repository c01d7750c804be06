use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

mod app;
mod client;
mod config;
mod handler;
mod table;
mod tui;
mod ui;

use app::App;
use client::{Answer, AnswerField, AskClient};
use config::Config;
use table::format_table;

#[derive(Parser)]
#[command(name = "datachat")]
#[command(about = "Terminal chat client for an AI data assistant", version)]
struct Cli {
    /// Backend endpoint URL (overrides config file and DATACHAT_URL)
    #[arg(short, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the reply (no TUI)
    Ask {
        /// Your question
        question: String,
        /// Also print the SQL the backend ran
        #[arg(short, long)]
        sql: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_default();
    let endpoint = cli.url.unwrap_or_else(|| config.endpoint());

    match cli.command {
        Some(Commands::Ask { question, sql }) => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .init();
            ask_once(&endpoint, &config, &question, sql).await
        }
        None => run_tui(&endpoint, &config).await,
    }
}

async fn run_tui(endpoint: &str, config: &Config) -> Result<()> {
    init_file_logging()?;
    tui::install_panic_hook();

    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(endpoint, config, events.sender())?;

    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    app.probe_server().await;

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// The TUI owns stderr, so log lines go to a file next to the config.
fn init_file_logging() -> Result<()> {
    let log_dir = Config::log_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("datachat.log"))?;

    tracing_subscriber::fmt()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn ask_once(endpoint: &str, config: &Config, question: &str, show_sql: bool) -> Result<()> {
    let client = AskClient::new(endpoint, Duration::from_secs(config.timeout_secs()))?;

    match client.ask(question).await {
        Ok(envelope) => {
            if let Some(error) = envelope.error {
                println!("{}: {}", "Error".red().bold(), error);
                return Ok(());
            }

            match envelope.answer {
                Some(AnswerField::Tagged(Answer::Text { message })) => {
                    println!("{}", message);
                }
                Some(AnswerField::Tagged(Answer::Table {
                    columns,
                    rows,
                    insight,
                })) => {
                    for (i, line) in format_table(&columns, &rows).into_iter().enumerate() {
                        if i == 0 {
                            println!("{}", line.green().bold());
                        } else {
                            println!("{}", line);
                        }
                    }
                    if let Some(insight) = insight {
                        println!("\n{}", insight.magenta().italic());
                    }
                }
                Some(AnswerField::Plain(text)) => {
                    println!("{}", text);
                }
                Some(AnswerField::Tagged(Answer::Unknown)) | Some(AnswerField::Other(_)) => {
                    println!("{}", app::UNKNOWN_FORMAT_MSG.yellow());
                }
                None => {
                    println!("{}", app::NO_RESULT_MSG.yellow());
                }
            }

            if let Some(source) = envelope.source {
                println!("{}", format!("[source: {}]", source).dimmed());
            }
            if show_sql {
                if let Some(sql) = envelope.sql_used {
                    println!("{}", format!("[sql: {}]", sql).dimmed());
                }
            }
        }
        Err(e) => {
            let message = if client::is_timeout(&e) {
                app::TIMEOUT_MSG
            } else {
                app::CONNECTION_ERROR_MSG
            };
            println!("{}: {}", message.red(), e);
            if !client.health().await {
                println!(
                    "Make sure the assistant is running at {}",
                    endpoint.bold()
                );
            }
        }
    }

    Ok(())
}
