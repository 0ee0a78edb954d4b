//! Main entry point for the rewrite gateway

use actix_web::main as actix_main;
use chrono::Local;
use common::{Config, Result, StoreBackend, NONCE_TTL_SECS};
use env_logger::fmt::Color;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use rewrite_gateway::rewrite::{RewriteEngine, Rewriter};
use rewrite_gateway::store::{
    HealthCheck, MemoryNonceCache, MemorySecretStore, NonceCache, RedisNonceCache,
    RedisSecretStore, RedisStore, SecretStore,
};
use rewrite_gateway::{AppState, GatewayServer, RequestVerifier};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const BANNER: &str = r#"
╔═══════════════════════════════════════════════════════════════════╗
║                                                                   ║
║   Rewrite Gateway v0.1.0                                          ║
║   Signed device requests · replay protection · text rewriting     ║
║                                                                   ║
╚═══════════════════════════════════════════════════════════════════╝
"#;

fn setup_logger() {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut target_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} [{}] {}",
                timestamp_style.set_color(Color::Rgb(100, 100, 100)).value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                target_style.set_color(Color::Blue).value(record.target()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Store handles built at startup. `redis` is kept to close the pool on exit.
struct Stores {
    secrets: Arc<dyn SecretStore>,
    nonces: Arc<dyn NonceCache>,
    health: Arc<dyn HealthCheck>,
    redis: Option<Arc<RedisStore>>,
}

async fn connect_stores(config: &Config) -> Result<Stores> {
    match config.store_backend {
        StoreBackend::Redis => {
            info!("Establishing Redis connection...");
            let store = Arc::new(RedisStore::connect(&config.redis_url).await.map_err(|e| {
                error!("Failed to connect to Redis: {}", e);
                e
            })?);
            info!("✓ Redis connection established successfully");

            Ok(Stores {
                secrets: Arc::new(RedisSecretStore::new(store.clone())),
                nonces: Arc::new(RedisNonceCache::new(store.clone())),
                health: store.clone(),
                redis: Some(store),
            })
        }
        StoreBackend::Memory => {
            warn!("Using in-memory stores; device secrets are lost on restart");
            let nonces = Arc::new(MemoryNonceCache::new());

            let sweeper = nonces.clone();
            tokio::spawn(async move {
                let sweep_interval = Duration::from_secs(NONCE_TTL_SECS);
                loop {
                    tokio::time::sleep(sweep_interval).await;
                    sweeper.cleanup();
                }
            });

            Ok(Stores {
                secrets: Arc::new(MemorySecretStore::new()),
                nonces: nonces.clone(),
                health: nonces,
                redis: None,
            })
        }
    }
}

#[actix_main]
async fn main() -> Result<()> {
    setup_logger();

    println!("{}", BANNER);

    info!("Starting rewrite gateway...");

    let config = Config::load()?;
    info!("Configuration loaded successfully");
    if !config.allow_bootstrap {
        info!("Device bootstrap disabled; only registered devices are accepted");
    }

    let stores = connect_stores(&config).await?;

    let verifier = RequestVerifier::from_config(stores.secrets.clone(), stores.nonces.clone(), &config);
    info!("✓ Request verifier initialized (store timeout {:?})", config.store_timeout);

    let engine = RewriteEngine::from_config(&config)?;
    if engine.has_model() {
        info!("✓ Rewrite engine using model {}", config.xai_model);
    } else {
        warn!("XAI_API_KEY not set, rewrites use the rule-based fallback only");
    }
    let rewriter: Arc<dyn Rewriter> = Arc::new(engine);

    let server = GatewayServer::new(
        AppState::new(verifier, rewriter, stores.health.clone()),
        config.bind_address.clone(),
    );

    let result = server.start().await;

    if let Some(redis) = &stores.redis {
        redis.close();
    }

    if let Err(e) = &result {
        error!("Gateway stopped with error: {}", e);
    }
    result
}
