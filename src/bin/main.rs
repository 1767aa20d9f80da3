use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use search_gateway::auth::{DEFAULT_SESSION_HOURS, SessionManager};
use search_gateway::config::{
    DEFAULT_BACKEND_TIMEOUT_SECONDS, DEFAULT_CONNECT_TIMEOUT_SECONDS, parse_endpoint,
    parse_log_level, session_duration,
};
use search_gateway::{AuthzTable, GatewayConfig, Identity, create_app};

#[derive(Parser)]
#[command(name = "search-gateway")]
#[command(about = "Authenticating gateway in front of a search backend")]
struct Cli {
    /// Log level for the gateway (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the gateway
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        addr: String,
        #[arg(short, long, default_value = "9080")]
        port: u16,
        /// Backend base URL, e.g. https://search.internal/prod
        endpoint: String,
        /// Shared secret sent to the backend as x-api-key
        #[arg(long, env = "GATEWAY_API_KEY", hide_env_values = true)]
        api_key: String,
        /// Authorization table (roles, users, rules)
        #[arg(long, env = "GATEWAY_AUTHZ_FILE")]
        authz_file: PathBuf,
        /// Session signing secret; a random one is generated when absent
        #[arg(long, env = "GATEWAY_JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,
        /// Body of GET /hello/revision (default: start time)
        #[arg(long, env = "HELLO_REPLY")]
        hello_reply: Option<String>,
        #[arg(long, default_value_t = DEFAULT_BACKEND_TIMEOUT_SECONDS)]
        backend_timeout_secs: u64,
        #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECONDS)]
        connect_timeout_secs: u64,
        #[arg(long, default_value_t = DEFAULT_SESSION_HOURS)]
        session_hours: i64,
        /// Mark the session cookie Secure (serve behind TLS)
        #[arg(long, default_value_t = false)]
        secure_cookie: bool,
    },
    /// Validate an authorization table and print a summary
    CheckAuthz {
        path: PathBuf,
    },
    /// Mint a session token for an identity
    IssueToken {
        #[arg(long)]
        identity: String,
        /// Picture URL stored in the token
        #[arg(long)]
        image: Option<String>,
        #[arg(long, default_value_t = DEFAULT_SESSION_HOURS)]
        hours: i64,
        #[arg(long, env = "GATEWAY_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    parse_log_level(&cli.log_level)?;
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("search_gateway={}", cli.log_level).parse()?)
        .add_directive(format!("audit={}", cli.log_level).parse()?)
        .add_directive("tower_http=info".parse()?);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match cli.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    match cli.command {
        Commands::Serve {
            addr,
            port,
            endpoint,
            api_key,
            authz_file,
            jwt_secret,
            hello_reply,
            backend_timeout_secs,
            connect_timeout_secs,
            session_hours,
            secure_cookie,
        } => {
            let config = GatewayConfig {
                bind: format!("{}:{}", addr, port),
                endpoint: parse_endpoint(&endpoint)?,
                api_key,
                authz_file,
                jwt_secret,
                hello_reply: hello_reply.unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
                backend_timeout: Duration::from_secs(backend_timeout_secs),
                connect_timeout: Duration::from_secs(connect_timeout_secs),
                session_hours,
                secure_cookie,
            };
            config.validate()?;
            info!(config = ?config, "Starting search gateway");

            let app = create_app(&config)?;

            let listener = tokio::net::TcpListener::bind(&config.bind)
                .await
                .with_context(|| format!("Fail to bind {}", config.bind))?;
            info!("Gateway listening on http://{}", config.bind);

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
        Commands::CheckAuthz { path } => match AuthzTable::load_from_file(&path) {
            Ok(table) => {
                println!("Authorization table OK: {}", path.display());
                println!("  Roles: {}", table.roles().len());
                println!("  Users: {}", table.users().len());
                println!("  Rules: {}", table.rules().len());
            }
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        Commands::IssueToken {
            identity,
            image,
            hours,
            jwt_secret,
        } => {
            let duration = session_duration(hours)?;
            if jwt_secret.is_empty() {
                anyhow::bail!("jwt-secret must not be empty");
            }

            let sessions = SessionManager::new(Some(jwt_secret), duration, false);
            let token = sessions.issue(Identity::new(identity), image)?;
            println!("{}", token);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Fail to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
