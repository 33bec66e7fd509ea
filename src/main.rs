//! vehicle-connect - Smartcar demo client
//!
//! Connect a vehicle through OAuth2, then inspect and lock/unlock it.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vehicle_connect::api::http_client;
use vehicle_connect::config::Settings;
use vehicle_connect::models::{VehicleStatusSummary, VehicleSummary};
use vehicle_connect::session::FileSession;
use vehicle_connect::{ErrorKind, VehicleClient};

#[derive(Parser)]
#[command(name = "vehicle-connect")]
#[command(about = "Connect to vehicles through the Smartcar API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the URL that starts the connect flow
    Connect {
        /// Connect a real vehicle (requires live_mode_enabled in config)
        #[arg(long)]
        live: bool,
    },

    /// Exchange the authorization code returned to the callback URI
    Callback {
        /// `code` query parameter from the callback
        code: String,
    },

    /// List connected vehicles with their lock status
    Vehicles,

    /// Show info and lock status for one vehicle
    Vehicle {
        /// Vehicle ID (from `vehicles` output)
        id: String,
    },

    /// Lock a vehicle
    Lock {
        /// Vehicle ID (from `vehicles` output)
        id: String,
    },

    /// Unlock a vehicle
    Unlock {
        /// Vehicle ID (from `vehicles` output)
        id: String,
    },

    /// Show current session token status
    Status,

    /// Clear the session's tokens
    Logout,

    /// Print the config file location
    ConfigPath,
}

fn build_client(settings: &Settings) -> Result<VehicleClient> {
    let session = FileSession::new(Settings::session_dir()?);
    let http = http_client(settings.request_timeout()).context("Failed to build HTTP client")?;

    VehicleClient::new(
        http,
        settings.auth_config()?,
        &settings.endpoints.vehicles_url,
        Arc::new(session),
    )
    .context("Invalid vehicles_url in config")
}

/// Fetch one vehicle and render it for display. Failures are reported in the
/// output so the remaining vehicles still show.
async fn render_vehicle(client: &VehicleClient, id: &str) -> String {
    let mut out = String::new();

    let info = match client.get_vehicle_info(id).await {
        Ok(info) => info,
        Err(e) => {
            tracing::error!("Error retrieving vehicle {}: {}", id, e);
            let _ = writeln!(out, "\n{}: vehicle information unavailable.", id);
            return out;
        }
    };
    write_info(&mut out, &info);

    match client.get_lock_status(id).await {
        Ok(status) => {
            let summary = VehicleStatusSummary::from(&status);
            let locked = if status.is_locked { "yes" } else { "no" };
            let _ = writeln!(out, "  Locked:        {}", locked);
            let _ = writeln!(out, "  Sunroof:       {}", summary.sunroof);
            let _ = writeln!(out, "  Charging port: {}", summary.charging_port);
            let _ = writeln!(out, "  Front storage: {}", summary.front_storage);
            let _ = writeln!(out, "  Rear storage:  {}", summary.rear_storage);
        }
        Err(e) => {
            tracing::error!("Error retrieving lock status for {}: {}", id, e);
            let _ = writeln!(out, "  Status information may be incorrect or incomplete.");
        }
    }
    out
}

fn write_info(out: &mut String, info: &VehicleSummary) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{} {} {}", info.year, info.make, info.model);
    let _ = writeln!(out, "  ID:            {}", info.id);
}

async fn set_lock(client: &VehicleClient, id: &str, locked: bool) {
    let action = if locked { "lock" } else { "unlock" };
    tracing::info!("Sending {} command to vehicle {}...", action, id);

    if let Err(e) = client.set_lock(id, locked).await {
        tracing::error!("{} command failed: {}", action, e);
        eprintln!(
            "Problem attempting to {} vehicle. Status information may be incorrect or incomplete.",
            action
        );
    }

    print!("{}", render_vehicle(client, id).await);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = Settings::load()?;

    match cli.command {
        Commands::ConfigPath => {
            println!("{}", Settings::config_path()?.display());
        }
        Commands::Connect { live } => {
            let test_mode = settings.effective_test_mode(!live);
            if live && test_mode {
                tracing::warn!("Live mode is not enabled; using test mode");
            }
            let client = build_client(&settings)?;
            println!("{}", client.build_connect_url(test_mode, &settings.callback_uri));
        }
        Commands::Callback { code } => {
            let client = build_client(&settings)?;
            client
                .exchange_code(&code, &settings.callback_uri)
                .await
                .context("Error while connecting to Smartcar")?;
            println!("Connected. Run 'vehicle-connect vehicles' to list vehicles.");
        }
        Commands::Vehicles => {
            let client = build_client(&settings)?;
            let ids = match client.list_vehicles().await {
                Ok(ids) => ids,
                Err(e) if e.kind() == ErrorKind::MissingToken => {
                    anyhow::bail!("Not connected. Run 'vehicle-connect connect' first.");
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    anyhow::bail!("Problem retrieving list of vehicles ({}).", e.kind());
                }
            };

            if ids.is_empty() {
                println!("No vehicles connected.");
            }
            let views = join_all(ids.iter().map(|id| render_vehicle(&client, id))).await;
            for view in views {
                print!("{}", view);
            }
        }
        Commands::Vehicle { id } => {
            let client = build_client(&settings)?;
            print!("{}", render_vehicle(&client, &id).await);
        }
        Commands::Lock { id } => {
            let client = build_client(&settings)?;
            set_lock(&client, &id, true).await;
        }
        Commands::Unlock { id } => {
            let client = build_client(&settings)?;
            set_lock(&client, &id, false).await;
        }
        Commands::Status => {
            let client = build_client(&settings)?;
            let store = client.store();
            match store.current_user()? {
                Some(user) => match store.get(&user) {
                    Ok(record) if !record.refresh_due(Utc::now()) => {
                        println!("Access token: valid");
                        println!("  expires_at: {}", record.expires_at);
                    }
                    Ok(record) if !record.is_expired() => {
                        println!("Access token: expiring soon (will refresh on next call)");
                        println!("  expires_at: {}", record.expires_at);
                    }
                    Ok(_) => println!("Access token: expired (will refresh on next call)"),
                    Err(e) => println!("Access token: unavailable ({})", e.kind()),
                },
                None => {
                    println!("Not connected.");
                    println!("\nRun 'vehicle-connect connect' to authorize a vehicle.");
                }
            }
        }
        Commands::Logout => {
            let client = build_client(&settings)?;
            client.store().clear()?;
            println!("Logged out.");
        }
    }

    Ok(())
}
