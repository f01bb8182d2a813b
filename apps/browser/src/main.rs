use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{BatchPolicy, CommitPolicy, FetchController, FetchState};
use futures::StreamExt;
use storage::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{parse_input, UiAction};
use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Browse and search the product catalog from a terminal")]
struct Args {
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(long)]
    commit_policy: Option<CommitPolicy>,
    #[arg(long)]
    batch_policy: Option<BatchPolicy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.page_size {
        settings.set_page_size(v);
    }
    if let Some(v) = args.commit_policy {
        settings.commit_policy = v;
    }
    if let Some(v) = args.batch_policy {
        settings.batch_policy = v;
    }

    let storage = Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open catalog '{}'", settings.database_url))?;
    info!(database_url = %settings.database_url, "catalog opened");

    let controller = FetchController::with_options(Arc::new(storage), settings.controller_options());
    let mut states = controller.observe_state();
    let renderer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            render(&state);
        }
    });

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            UiAction::Command(command) => {
                if controller.dispatch(command).is_none() {
                    println!("(still loading, request ignored)");
                }
            }
            UiAction::Help => print_help(),
            UiAction::Quit => break,
            UiAction::Unknown(raw) => println!("unknown command '{raw}', type 'help'"),
        }
    }

    controller.dispose();
    renderer.await.context("renderer task failed")?;
    Ok(())
}

fn render(state: &FetchState) {
    match state {
        FetchState::Initial => println!("loading catalog..."),
        FetchState::Loaded(items) if items.is_empty() => println!("no products"),
        FetchState::Loaded(items) => {
            println!("{} products", items.len());
            for (index, product) in items.iter().enumerate() {
                println!(
                    "{:>4}. {:<32} {:>10}  {}",
                    index + 1,
                    product.name,
                    product.price,
                    product.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        FetchState::Error(message) => println!("error: {message} (press enter to retry)"),
    }
}

fn print_help() {
    println!("enter / more        load the next page");
    println!("search <text>       products whose name starts with <text>");
    println!("/<text>             same as search");
    println!("quit                leave");
}
