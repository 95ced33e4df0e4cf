use bookshelf::auth::Sessions;
use bookshelf::config::{Cli, Config, default_config_dir, default_config_path};
use bookshelf::db::Database;
use bookshelf::handler::AppState;
use bookshelf::users::Accounts;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // --config puts the database next to the config file; otherwise both live
    // under ~/.bookshelf/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("bookshelf.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    });
    if let Some(password) = cfg.auth.admin_password.as_deref().filter(|p| !p.is_empty()) {
        let seeded = match bookshelf::auth::hash_password(password) {
            Ok(hash) => Accounts::new(&db).ensure_admin(&cfg.auth.admin_email, &hash).await,
            Err(e) => Err(e),
        };
        match seeded {
            Ok(true) => tracing::info!(email = %cfg.auth.admin_email, "seeded admin account"),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "failed to seed admin account");
                std::process::exit(1);
            }
        }
    } else {
        tracing::warn!("auth.admin_password is not set; admin routes stay unusable until the admin account exists");
    }

    let sessions = Sessions::from_config(&cfg.auth);
    if sessions.allow_plaintext_passwords() {
        tracing::warn!("plaintext password fallback is enabled");
    }

    let state = AppState::new(db, sessions);
    let app = bookshelf::router(state.clone());

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let cancellation_token = CancellationToken::new();
    let shutdown = cancellation_token.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("ctrl+c signal received, preparing to shutdown");
        shutdown.cancel();
    });

    tracing::info!("bookshelf.svc running on {}", &address);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(cancellation_token.cancelled_owned())
        .await;
    if let Err(err) = result {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }

    if let Err(e) = state.db.sync().await {
        tracing::warn!(error = %e, "final replica sync failed");
    }
    tracing::info!("bookshelf.svc going off, graceful shutdown complete");
}
