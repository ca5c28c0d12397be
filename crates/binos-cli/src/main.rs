//! `binos-cli` – BinOS process bring-up
//!
//! This binary is the entry point for a bin installation.  It:
//!
//! 1. Initialises structured logging (with optional OTLP export).
//! 2. Checks for `~/.binos/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 3. Wires the in-process bus, the (simulated) hardware bench, the bin
//!    controller, the classifier node, and the status surface.
//! 4. Intercepts **Ctrl-C** to stop the control loop and exit cleanly.
//!
//! Real GPIO drivers plug in behind the `binos-hal` traits; the stock binary
//! runs on the simulated bench so the full stack can be exercised anywhere.

mod config;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use tracing::{error, warn};

use binos_bus::MessageBus;
use binos_classifier::{ClassifierNode, VerdictClient};
use binos_controller::{BackendReporter, BinController, ControllerConfig};
use binos_hal::sim::SimCamera;
use binos_hal::SimBench;
use binos_status::StatusServer;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); BINOS_LOG_FORMAT=json
    // emits newline-delimited JSON; OTEL_EXPORTER_OTLP_ENDPOINT activates
    // span export.  The guard must outlive the runtime.
    let _telemetry_guard = binos_controller::telemetry::init_tracing("binos");

    print_banner();

    // ── Configuration vault ───────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Shared shutdown flag + Ctrl-C handler ─────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping the bin …".yellow().bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // The runtime is created only after `init_tracing` (see the exporter
    // note in binos-controller::telemetry).
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cfg, shutdown));
}

// ─────────────────────────────────────────────────────────────────────────────
// Node wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: config::Config, shutdown: Arc<AtomicBool>) {
    let bus = MessageBus::default();
    let bench = SimBench::new();

    let (controller, handle) = BinController::new(
        ControllerConfig::default(),
        bench.hardware,
        bus.endpoint(),
    );
    let controller = controller.with_reporter(BackendReporter::new(cfg.backend_url.clone()));

    let classifier = ClassifierNode::new(
        bus.endpoint(),
        SimCamera::new("cam_chute"),
        VerdictClient::new(cfg.service_url.clone()),
    );

    let status = StatusServer::new(handle.clone()).with_port(cfg.status_port);

    let controller_task = tokio::spawn(controller.run(
        Duration::from_millis(cfg.tick_interval_ms),
        Arc::clone(&shutdown),
    ));
    let classifier_task = tokio::spawn(classifier.run(Arc::clone(&shutdown)));
    tokio::spawn(async move {
        if let Err(e) = status.run().await {
            error!(error = %e, "status server failed");
        }
    });

    println!(
        "  {} controller, classifier, and status surface running",
        "✓".green()
    );
    println!(
        "  Status API on {}\n",
        format!("http://localhost:{}", cfg.status_port).bold()
    );

    let _ = controller_task.await;
    let _ = classifier_task.await;
    println!("{}", "  ✓ Exiting BinOS.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        BinOS First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up this bin.\n");

    let mut cfg = config::Config::default();

    let url = prompt_line(
        &format!("  Fleet backend URL [{}]: ", cfg.backend_url),
        &cfg.backend_url,
    );
    cfg.backend_url = url.trim().to_string();

    let url = prompt_line(
        &format!("  Classification service URL [{}]: ", cfg.service_url),
        &cfg.service_url,
    );
    cfg.service_url = url.trim().to_string();

    let port_str = prompt_line(
        &format!("  Status API port [{}]: ", cfg.status_port),
        &cfg.status_port.to_string(),
    );
    if let Ok(p) = port_str.trim().parse::<u16>() {
        cfg.status_port = p;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___  _       ____  _____"#.bold().cyan());
    println!("{}", r#"   / _ )(_)___  / __ \/ ___/"#.bold().cyan());
    println!("{}", r#"  / _  / / __ \/ /_/ /\__ \ "#.bold().cyan());
    println!("{}", r#" /____/_/_/ /_/\____/____/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "BinOS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Two-Compartment Smart Waste Bin");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
