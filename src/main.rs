use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pos_api::auth::{Argon2Hasher, CreateIdentityError, UserManager};
use pos_api::cli::{self, Commands, UserCommands};
use pos_api::config::{self, Config};
use pos_api::store::{postgres::PgStore, Store};
use pos_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(Commands::Migrate) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
        Some(Commands::User { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let users = UserManager::new(db.identities(), Arc::new(Argon2Hasher::default()));
            handle_user_command(command, &users).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Console logging, plus OTLP export when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_tracing() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "pos-api"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pos_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();
    Ok(())
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let state = Arc::new(AppState::new(
        cfg,
        Arc::new(db),
        Arc::new(Argon2Hasher::default()),
    )?);

    if let Some(seed) = &state.config.seed_user {
        let created = state
            .auth
            .users()
            .seed(&seed.username, &seed.email, &seed.password)
            .await
            .context("failed to seed the admin identity")?;
        if created {
            tracing::info!(username = %seed.username, "seeded admin identity");
        }
    }
    if !state.config.open_registration {
        tracing::info!("registration requires a bearer token");
    }

    let app = pos_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Point of Sale API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_user_command(cmd: UserCommands, users: &UserManager) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            username,
            email,
            password,
        } => match users.create(&username, &email, &password).await {
            Ok(identity) => {
                println!(
                    "Identity created:\n  Username: {}\n  ID:       {}",
                    identity.username, identity.id
                );
            }
            Err(CreateIdentityError::Rejected(errors)) => {
                for e in &errors {
                    eprintln!("  {}: {}", e.code, e.description);
                }
                anyhow::bail!("identity rejected ({} problem(s))", errors.len());
            }
            Err(e) => return Err(e.into()),
        },
        UserCommands::List => {
            let identities = users.list().await?;
            if identities.is_empty() {
                println!("No identities found.");
            } else {
                println!("{:<24} {:<32} {:<25}", "USERNAME", "EMAIL", "CREATED");
                for i in identities {
                    println!(
                        "{:<24} {:<32} {:<25}",
                        i.username,
                        i.email,
                        i.created_at.to_rfc3339()
                    );
                }
            }
        }
    }
    Ok(())
}
