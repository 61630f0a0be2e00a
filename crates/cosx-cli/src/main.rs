//! 🚀 cosx — the front door. Loads config, sets up logging, runs the pipeline, prints the
//! receipt. The real work lives in the `cosx` library. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 🪣 Move lines in and out of cloud object storage.
#[derive(Debug, Parser)]
#[command(name = "cosx", version, about)]
struct Args {
    /// 🔧 TOML config file. Omitted → environment variables (COSX_*) only.
    config: Option<PathBuf>,

    /// 🔍 Parse the config, then exit without running anything
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Some(config_file) = args.config.as_deref() {
        let exists = config_file.try_exists().context(format!(
            "💀 Couldn't even check whether the configuration file exists. Was checking here: '{}'",
            config_file.display()
        ))?;
        if !exists {
            anyhow::bail!(
                "💀 Configuration file '{}' does not exist. Relative paths are relative to the cwd; \
                 an absolute path removes all doubt.",
                config_file.display()
            );
        }
    }

    let app_config = cosx::app_config::load_config(args.config.as_deref())
        .context("💀 In cosx, main, we couldn't load the config. Take a look at the file and the COSX_* env vars.")?;

    if args.check {
        // -- no Debug dump here: credentials and app configs would land on the terminal
        println!(
            "✅ configuration OK ({} named app configs, queue capacity {})",
            app_config.app_configs.len(),
            app_config.runtime.queue_capacity
        );
        return Ok(());
    }

    // 🛑 ctrl-c stops the source; the sink still flushes what it has
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 ctrl-c received, draining and closing. Press again to give up on the tail.");
            on_signal.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    });

    match cosx::run(app_config, cancel).await {
        Ok(summary) => {
            info!("✅ done in {:?}", summary.elapsed);
            print_summary(&summary);
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like the object storage endpoint isn't reachable. \
                    Double-check `endpoint` and `ssl_enabled`, and that the IAM token endpoint \
                    is reachable from here. For a local MinIO: `docker ps` and `docker compose up -d`."
                );
            }
            std::process::exit(1);
        }
    }
}

/// 🧾 The receipt.
fn print_summary(summary: &cosx::RunSummary) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "count"]);
    let rows = [
        ("records read", summary.records_read),
        ("records written", summary.records_written),
        ("objects written", summary.objects_written),
        ("failed uploads", summary.upload_failures),
        ("vanished objects", summary.missing_objects),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}
