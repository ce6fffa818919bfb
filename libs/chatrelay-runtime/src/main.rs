// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! ChatRelay Runtime Binary
//!
//! Loads a relay config and runs it until Ctrl+C. No chat protocol client is
//! linked in: every configured bot is backed by a console bot that prints
//! what the relay sends and turns stdin lines into channel messages, which
//! makes this binary a dry-run harness for link and filter setups.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use parking_lot::Mutex;

use chatrelay::core::config::node_str;
use chatrelay::{
    BotRegistry, ChannelEvent, ChannelMessageKind, ChatBot, Diagnostics, EndpointIntake, Relay,
    RelayConfig,
};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "chatrelay-runtime")]
#[command(author, version, about = "ChatRelay runtime process", long_about = None)]
struct Args {
    /// Config file to load
    #[arg(short, long, default_value = RelayConfig::FILE_NAME, value_name = "PATH")]
    config: PathBuf,

    /// Relay name used in log output
    #[arg(long, default_value = "chatrelay")]
    name: String,

    /// Override the distributor's minimum cycle time
    #[arg(long = "min-cycle-ms", value_name = "MS")]
    min_cycle_ms: Option<u64>,

    /// Do not read channel lines from stdin
    #[arg(long)]
    no_stdin: bool,
}

// ---------------------------------------------------------------------------
// Console bot
// ---------------------------------------------------------------------------

/// Prints outbound messages; injects stdin lines as inbound ones.
struct ConsoleBot {
    name: String,
    channels: Mutex<HashMap<String, Vec<EndpointIntake>>>,
}

impl ConsoleBot {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one stdin line of the form `#channel nick: text` or
    /// `#channel nick /me text`. Returns false if the line is not for a
    /// channel this bot has joined.
    fn inject(&self, line: &str) -> bool {
        let Some((channel, rest)) = line.trim().split_once(' ') else {
            return false;
        };
        let (nick, text, kind) = if let Some((nick, text)) = rest.split_once(" /me ") {
            (nick, text, ChannelMessageKind::Action)
        } else if let Some((nick, text)) = rest.split_once(": ") {
            (nick, text, ChannelMessageKind::Message)
        } else {
            ("console", rest, ChannelMessageKind::Message)
        };

        let intakes = match self.channels.lock().get(channel) {
            Some(intakes) => intakes.clone(),
            None => return false,
        };
        let event = ChannelEvent {
            channel: channel.to_string(),
            mask: format!("{}!console@localhost", nick.trim()),
            nick: nick.trim().to_string(),
            prefixes: String::new(),
            text: text.to_string(),
            kind,
        };
        for intake in &intakes {
            event.submit(intake);
        }
        true
    }
}

impl ChatBot for ConsoleBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_channel(&self, channel: &str, intake: EndpointIntake) {
        tracing::info!("[{}] Joined {} for endpoint '{}'", self.name, channel, intake.source());
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(intake);
    }

    fn send_message(&self, channel: &str, text: &str) -> chatrelay::Result<()> {
        println!("[{} {}] {}", self.name, channel, text);
        Ok(())
    }

    fn shutdown(&self) {
        tracing::debug!("[{}] Leaving {} channel(s)", self.name, self.channels.lock().len());
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn setup_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging();

    let mut relay_config = RelayConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(ms) = args.min_cycle_ms {
        relay_config.distributor.min_cycle_ms = Some(ms);
    }

    let diagnostics = Diagnostics::new(&args.name);
    let bots = BotRegistry::new(diagnostics.scoped("bots"));
    let mut console_bots = Vec::new();
    for definition in &relay_config.bots {
        let Some(name) = node_str(definition, "name") else {
            continue;
        };
        let bot = Arc::new(ConsoleBot::new(name));
        if bots.insert(Arc::clone(&bot) as Arc<dyn ChatBot>) {
            console_bots.push(bot);
        }
    }

    let relay = Relay::start(relay_config, bots, diagnostics).context("starting relay")?;

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        tracing::info!("Ctrl+C received, shutting down");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| anyhow!("installing Ctrl+C handler: {}", e))?;

    if !args.no_stdin {
        spawn_stdin_reader(console_bots)?;
    }

    println!(
        "Relaying {} endpoint(s) over {} link(s). Press Ctrl+C to stop",
        relay.endpoint_manager().len(),
        relay.link_manager().link_count()
    );

    let _ = shutdown_rx.recv();
    relay.shutdown();
    Ok(())
}

fn spawn_stdin_reader(bots: Vec<Arc<ConsoleBot>>) -> Result<()> {
    std::thread::Builder::new()
        .name("chatrelay-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if !bots.iter().any(|bot| bot.inject(&line)) {
                    eprintln!("No joined channel for: {}", line);
                }
            }
        })?;
    Ok(())
}
