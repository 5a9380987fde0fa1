//! Captcha Gate CLI
//!
//! Runs a verification gate in the terminal, with stdin standing in for the
//! page and stdout carrying host bridge calls.

use anyhow::Context;
use captcha_gate::{
    config::Config,
    controller::{GateEvent, GateOptions, GateParts, KeyFocus, VerificationController},
    delivery::{DeliveryClient, DeliveryConfig},
    fingerprint::FingerprintAggregator,
    identity::SessionIdentity,
    interaction::{InteractionSource, PointerEvent},
    presentation::TerminalSurface,
    probe::{FixtureEnvironment, ProbeSet, SharedProvider, SystemEnvironment},
    transparency::create_shared_log,
    Bridge, JsonLineBridge, DATA_DISCLOSURE, VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "captcha-gate")]
#[command(version = VERSION)]
#[command(about = "Client-side human verification gate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a gate driven by commands on stdin
    Run {
        /// Backend base URL (overrides the configured endpoint)
        #[arg(long)]
        endpoint: Option<String>,

        /// Page URL the gate was loaded from, e.g. with a ?tgid= parameter
        #[arg(long)]
        url: Option<String>,

        /// Emit host bridge calls as JSON lines on stdout
        #[arg(long)]
        bridge: bool,

        /// Probe a recorded environment instead of this process
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Print the environment snapshot and rendering signature
    Fingerprint {
        /// Probe a recorded environment instead of this process
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Derive and print a session identity
    Identity,

    /// Display what a verification report contains
    Disclosure,

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

/// One line of stdin input.
#[derive(Debug, PartialEq)]
enum Command {
    Event(GateEvent),
    Quit,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            endpoint,
            url,
            bridge,
            fixture,
        } => cmd_run(endpoint, url, bridge, fixture.as_deref()),
        Commands::Fingerprint { fixture } => cmd_fingerprint(fixture.as_deref()),
        Commands::Identity => cmd_identity(),
        Commands::Disclosure => {
            cmd_disclosure();
            Ok(())
        }
        Commands::Config { init } => cmd_config(init),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("captcha_gate=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn provider(fixture: Option<&Path>) -> anyhow::Result<SharedProvider> {
    Ok(match fixture {
        Some(path) => Arc::new(
            FixtureEnvironment::load(path)
                .with_context(|| format!("loading fixture {}", path.display()))?,
        ),
        None => Arc::new(SystemEnvironment::new()),
    })
}

fn cmd_run(
    endpoint: Option<String>,
    url: Option<String>,
    bridge: bool,
    fixture: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }

    let mut options = GateOptions::from_config(&config);
    options.page_url = url;

    let bridge = if bridge {
        Bridge::present(JsonLineBridge::stdout())
    } else {
        Bridge::Absent
    };

    eprintln!("Captcha Gate v{VERSION}");
    eprintln!("  Endpoint: {}", config.endpoint);
    eprintln!(
        "  Host bridge: {}",
        if bridge.is_present() { "stdout" } else { "none" }
    );
    eprintln!("Commands: toggle, verify, move, click X Y, scroll, key CODE [FOCUS],");
    eprintln!("          status, quit");
    eprintln!();

    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    let controller = runtime.block_on(async {
        let log = create_shared_log();
        let gate = VerificationController::new(GateParts {
            probes: ProbeSet::new(provider(fixture)?),
            delivery: DeliveryClient::new(DeliveryConfig::from_config(&config))?,
            surface: Box::new(TerminalSurface::stderr()),
            bridge,
            source: InteractionSource::new(),
            log,
            options,
        })?;

        let (tx, rx) = mpsc::channel(256);
        std::thread::spawn(move || read_commands(tx));

        let gate = gate.run(rx).await;
        // Give a scheduled bridge close the chance to run.
        tokio::time::sleep(config.bridge_close_delay).await;
        anyhow::Ok(gate)
    })?;

    eprintln!();
    eprintln!("Final state: {}", controller.state());
    if let Some(outcome) = controller.outcome() {
        eprintln!("Session: {}", outcome.payload.session_id());
        eprintln!(
            "Delivery: {}",
            if outcome.receipt.is_accepted() {
                "accepted"
            } else {
                "absorbed"
            }
        );
    }
    eprintln!("{}", controller.log().summary());

    Ok(())
}

/// Forward stdin commands to the gate until `quit` or end of input.
fn read_commands(tx: mpsc::Sender<GateEvent>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_command(&line) {
            Ok(Command::Event(event)) => {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            Ok(Command::Quit) => break,
            Err(e) => eprintln!("{e}"),
        }
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err("Empty command".to_string());
    };

    let command = match name {
        "toggle" => Command::Event(GateEvent::ToggleConsent),
        "verify" => Command::Event(GateEvent::Verify),
        "move" => Command::Event(GateEvent::Pointer(PointerEvent::Move)),
        "scroll" => Command::Event(GateEvent::Pointer(PointerEvent::Scroll)),
        "status" => Command::Event(GateEvent::Status),
        "quit" | "exit" => Command::Quit,
        "click" => {
            let mut coordinate = || {
                words
                    .next()
                    .and_then(|w| w.parse::<i32>().ok())
                    .ok_or_else(|| "Usage: click X Y".to_string())
            };
            let x = coordinate()?;
            let y = coordinate()?;
            Command::Event(GateEvent::Pointer(PointerEvent::Click { x, y }))
        }
        "key" => {
            let code = words
                .next()
                .ok_or_else(|| "Usage: key CODE [consent|body|other]".to_string())?;
            let focus = match words.next().unwrap_or("body") {
                "consent" => KeyFocus::ConsentControl,
                "body" => KeyFocus::Body,
                "other" => KeyFocus::Other,
                focus => return Err(format!("Unknown focus: {focus}")),
            };
            Command::Event(GateEvent::Key {
                code: code.to_string(),
                focus,
            })
        }
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(command)
}

fn cmd_fingerprint(fixture: Option<&Path>) -> anyhow::Result<()> {
    let aggregator = FingerprintAggregator::new(ProbeSet::new(provider(fixture)?));
    let report = serde_json::json!({
        "snapshot": aggregator.snapshot(),
        "signature": aggregator.signature(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_identity() -> anyhow::Result<()> {
    let aggregator = FingerprintAggregator::new(ProbeSet::new(Arc::new(SystemEnvironment::new())));
    let identity = SessionIdentity::derive(&aggregator.snapshot(), Utc::now());
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

fn cmd_disclosure() {
    println!("{DATA_DISCLOSURE}");
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    if init {
        config.save().context("writing config")?;
        println!("Wrote {}", Config::config_path().display());
    }
    println!("Config path: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("toggle"),
            Ok(Command::Event(GateEvent::ToggleConsent))
        );
        assert_eq!(
            parse_command("  click 12 -4 "),
            Ok(Command::Event(GateEvent::Pointer(PointerEvent::Click {
                x: 12,
                y: -4
            })))
        );
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
        assert_eq!(
            parse_command("key Space consent"),
            Ok(Command::Event(GateEvent::Key {
                code: "Space".to_string(),
                focus: KeyFocus::ConsentControl,
            }))
        );
        assert_eq!(
            parse_command("key Enter"),
            Ok(Command::Event(GateEvent::Key {
                code: "Enter".to_string(),
                focus: KeyFocus::Body,
            }))
        );
    }

    #[test]
    fn test_config_init_flag() {
        let cli = Cli::try_parse_from(["captcha-gate", "config", "--init"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { init: true }));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("click 1").is_err());
        assert!(parse_command("jump").is_err());
        assert!(parse_command("key").is_err());
        assert!(parse_command("key Space window").is_err());
    }
}
