//! CubeLink application entry point.
//!
//! Wires the composition root together and starts the control loop.  The
//! graphical role selector and device list of the mobile app are rendered
//! here as subcommands:
//!
//! ```text
//! cubelink host            create a game and wait for a peer
//! cubelink join <peer>     join the game hosted by a paired peer
//! cubelink peers           list the configured paired peers
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- token catalog, network settings, peers
//!  └─ TcpTransport::new()      -- the desktop transport
//!  └─ ConnectionManager::new() -- link lifecycle + background threads
//!  └─ TokenRegistry::new()     -- active set + authorization rules
//!  └─ CubeSyncHandler          -- link events → registry
//!  └─ stdin pump               -- `activate`/`send`/`list` commands
//!  └─ control loop             -- drains the dispatcher once per tick
//! ```
//!
//! The control loop is the single consumer of the dispatcher; everything
//! that touches game state runs inside its drained callbacks.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cubelink_app::application::sync_tokens::{CubeSyncHandler, TokenRegistry};
use cubelink_app::infrastructure::network::connection_manager::ConnectionManager;
use cubelink_app::infrastructure::storage::config::load_config;
use cubelink_app::infrastructure::transport::tcp::TcpTransport;
use cubelink_core::{Dispatcher, TokenId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Initialise structured logging.  `RUST_LOG` overrides the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.game.log_level)),
        )
        .init();

    info!("{} starting", config.game.app_name);

    // ── Composition root ──────────────────────────────────────────────────────
    let transport = Arc::new(TcpTransport::new(&config.network, config.peers())?);
    let dispatcher = Arc::new(Dispatcher::new());
    let manager = ConnectionManager::new(transport, Arc::clone(&dispatcher));
    let registry = Arc::new(Mutex::new(TokenRegistry::new(config.catalog())));
    manager.subscribe(CubeSyncHandler::new(Arc::clone(&registry)));

    // ── Role selection ────────────────────────────────────────────────────────
    let command = std::env::args().nth(1).unwrap_or_else(|| "host".to_string());
    match command.as_str() {
        "host" => {
            manager.start_server()?;
        }
        "join" => {
            let name = std::env::args()
                .nth(2)
                .context("usage: cubelink join <peer-name>")?;
            let peers = manager.scan_peers()?;
            let peer = peers
                .iter()
                .find(|p| p.name == name)
                .with_context(|| format!("no paired peer named '{name}'; run `cubelink peers`"))?;
            manager.connect_to_device(peer)?;
        }
        "peers" => {
            let peers = manager.scan_peers()?;
            if peers.is_empty() {
                println!("no paired peers configured; add [[peers]] entries to the config file");
            }
            for peer in &peers {
                println!("{}\t{}", peer.name, peer.address);
            }
            return Ok(());
        }
        other => anyhow::bail!("unknown command '{other}'; expected host, join, or peers"),
    }

    // ── Console input pump ────────────────────────────────────────────────────
    // The stand-in for the touch input of the mobile app.  Commands are
    // parsed off-thread and executed on the control thread via the
    // dispatcher, like every other mutation of game state.
    {
        let dispatcher = Arc::clone(&dispatcher);
        let registry = Arc::clone(&registry);
        let manager = Arc::clone(&manager);
        std::thread::Builder::new()
            .name("cubelink-stdin".to_string())
            .spawn(move || {
                info!("commands: activate <token> | send <token> | list");
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    let mut words = line.split_whitespace();
                    let (verb, arg) = (words.next(), words.next());
                    match (verb, arg) {
                        (Some("activate"), Some(id)) => {
                            let token = TokenId::from(id);
                            let registry = Arc::clone(&registry);
                            dispatcher.enqueue(move || {
                                registry
                                    .lock()
                                    .expect("registry mutex poisoned")
                                    .activate_cube(&token);
                            });
                        }
                        (Some("send"), Some(id)) => {
                            let token = TokenId::from(id);
                            let registry = Arc::clone(&registry);
                            let manager = Arc::clone(&manager);
                            dispatcher.enqueue(move || {
                                let outcome = registry
                                    .lock()
                                    .expect("registry mutex poisoned")
                                    .try_send_cube(&token, manager.as_ref());
                                info!("send '{token}': {outcome:?}");
                            });
                        }
                        (Some("list"), _) => {
                            let registry = Arc::clone(&registry);
                            dispatcher.enqueue(move || {
                                let registry = registry.lock().expect("registry mutex poisoned");
                                let mut active: Vec<String> = registry
                                    .active_tokens()
                                    .map(|t| t.to_string())
                                    .collect();
                                active.sort();
                                info!("{} active token(s): {}", active.len(), active.join(", "));
                            });
                        }
                        (None, _) => {}
                        _ => warn!("unknown command; try: activate <token> | send <token> | list"),
                    }
                }
            })
            .expect("failed to spawn stdin thread");
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── Control loop ──────────────────────────────────────────────────────────
    info!("control loop running; press Ctrl-C to exit");
    loop {
        tokio::time::sleep(Duration::from_millis(50)).await;
        dispatcher.drain();
        if !running.load(Ordering::Relaxed) {
            break;
        }
    }

    manager.shutdown();
    info!("{} stopped", config.game.app_name);
    Ok(())
}
