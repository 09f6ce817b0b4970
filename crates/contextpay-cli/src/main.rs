//! ContextPay command line
//!
//! # Usage
//!
//! ```bash
//! # Replay a signal scenario against a whitelist
//! contextpay --whitelist whitelist.json simulate scenario.json --issue
//!
//! # Generate a signing key
//! contextpay keygen
//!
//! # Issue and verify a context token
//! contextpay issue --key <seed hex> --merchant m-1 --location store-1
//! contextpay --whitelist whitelist.json verify <token> --target-uuid <uuid> --location store-1
//!
//! # Environment overrides
//! CONTEXTPAY__TRIGGER__COOLDOWN=5s contextpay simulate scenario.json
//! ```

mod config;
mod scenario;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contextpay_crypto::{KeyId, KeyPair, PublicKey, SessionKey, SessionKeyVault};
use contextpay_registry::InMemoryMerchantRegistry;
use contextpay_token::{TokenIssuer, TokenRequest, TokenVerifier, VerificationContext};
use contextpay_types::SystemClock;

use crate::config::AppConfig;
use crate::scenario::{Scenario, ScenarioRunner};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ContextPay - presence-gated payment prompts and context-bound tokens
#[derive(Parser, Debug)]
#[command(name = "contextpay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "CONTEXTPAY_CONFIG")]
    config: Option<String>,

    /// Merchant whitelist JSON, overrides `registry.whitelist`
    #[arg(long, global = true, env = "CONTEXTPAY_WHITELIST")]
    whitelist: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CONTEXTPAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "CONTEXTPAY_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON signal scenario and print each step's prompts
    Simulate {
        scenario: PathBuf,

        /// Issue a token for every admitted prompt
        #[arg(long)]
        issue: bool,
    },

    /// Generate an Ed25519 signing key
    Keygen,

    /// Issue a context token
    Issue {
        /// Hex-encoded 32-byte signing seed
        #[arg(long, env = "CONTEXTPAY_SIGNING_KEY", hide_env_values = true)]
        key: String,

        #[arg(long)]
        merchant: String,

        #[arg(long)]
        location: String,

        /// Fence id, defaults to the location
        #[arg(long)]
        fence: Option<String>,

        #[arg(long)]
        nonce: Option<String>,

        /// Amount in minor units
        #[arg(long)]
        amount: Option<u64>,

        #[arg(long)]
        session: Option<String>,
    },

    /// Verify a context token against an asserted context
    Verify {
        token: String,

        #[arg(long)]
        target_uuid: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        merchant: Option<String>,

        #[arg(long)]
        nonce: Option<String>,

        #[arg(long)]
        fence: Option<String>,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut app_config = AppConfig::load(args.config.as_deref())?;

    if let Some(level) = args.log_level {
        app_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        app_config.logging.format = format;
    }
    if let Some(path) = args.whitelist {
        app_config.registry.whitelist = Some(path);
    }

    init_logging(&app_config.logging)?;

    if let Err(errors) = app_config.validate() {
        anyhow::bail!("Invalid configuration: {}", errors.join("; "));
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting contextpay");

    match args.command {
        Command::Simulate { scenario, issue } => simulate(&app_config, &scenario, issue).await,
        Command::Keygen => keygen(),
        Command::Issue {
            key,
            merchant,
            location,
            fence,
            nonce,
            amount,
            session,
        } => {
            let request = TokenRequest {
                session_id: session.unwrap_or_else(|| format!("sess_{}", uuid::Uuid::new_v4())),
                merchant_id: merchant,
                fence_id: fence.unwrap_or_else(|| location.clone()),
                location_id: location,
                nonce,
                amount,
            };
            issue(&app_config, &key, request)
        }
        Command::Verify {
            token,
            target_uuid,
            location,
            merchant,
            nonce,
            fence,
        } => {
            let context = VerificationContext {
                target_uuid,
                target_location_id: location,
                target_merchant_id: merchant,
                target_nonce: nonce,
                fence_id: fence.map(|f| f.to_lowercase()),
            };
            verify(&app_config, &token, &context)
        }
    }
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging on stderr so stdout stays machine-readable
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

fn load_registry(config: &AppConfig) -> anyhow::Result<InMemoryMerchantRegistry> {
    match &config.registry.whitelist {
        Some(path) => InMemoryMerchantRegistry::from_file(path)
            .with_context(|| format!("Failed to load whitelist {}", path.display())),
        None => {
            tracing::warn!("No whitelist configured; every beacon will be ignored");
            Ok(InMemoryMerchantRegistry::new())
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn simulate(config: &AppConfig, path: &Path, issue: bool) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&json).context("Invalid scenario")?;

    let registry = Arc::new(load_registry(config)?);
    let mut runner = ScenarioRunner::new(config, registry, scenario.start_ms);

    if issue {
        let vault = SessionKeyVault::with_key(KeyPair::generate());
        if let Some(meta) = vault.metadata() {
            tracing::info!(key_id = %meta.key_id, public_key = %meta.public_key.key, "Replay signing key");
        }
        let issuer = TokenIssuer::new(config.token.clone(), Arc::new(SystemClock));
        runner = runner.with_tokens(vault, issuer);
    }

    for record in runner.run(&scenario).await {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn keygen() -> anyhow::Result<()> {
    let keypair = KeyPair::generate();
    let public = PublicKey::from_keypair(&keypair);

    let output = serde_json::json!({
        "key_id": KeyId::fingerprint(&public),
        "public_key": public.key,
        "signing_key": hex::encode(keypair.signing_key_bytes()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn issue(config: &AppConfig, seed_hex: &str, request: TokenRequest) -> anyhow::Result<()> {
    let key = SessionKey::new(KeyPair::from_hex(seed_hex).context("Invalid signing key")?);
    let issuer = TokenIssuer::new(config.token.clone(), Arc::new(SystemClock));

    let token = issuer.issue(&key, request)?;
    println!("{}", token.encode()?);
    Ok(())
}

fn verify(config: &AppConfig, raw: &str, context: &VerificationContext) -> anyhow::Result<()> {
    if config.registry.whitelist.is_none() {
        anyhow::bail!("Verification needs merchant keys; pass --whitelist");
    }

    let registry = Arc::new(load_registry(config)?);
    let verifier = TokenVerifier::new(registry, Arc::new(SystemClock)).with_config(config.verifier.clone());

    match verifier.verify(raw, context) {
        Ok(verified) => {
            let output = serde_json::json!({
                "ok": true,
                "digest": verified.digest,
                "payload": verified.payload,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "ok": false, "code": e.code(), "reason": e.to_string() }));
            anyhow::bail!("Token rejected: {}", e.code())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
