//! GenAI MCP gateway - authenticated access to in-cluster MCP services

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use genai_api::{
    AccessDecision, AlwaysAllow, AppState, ForwardingProxy, KubeServiceResolver, MetadataFetcher,
    RequestGateway, ServerConfig, SubjectAccessReviewDecision,
};
use genai_common::cluster::{ClusterClientFactory, KubeClientFactory};
use genai_common::config::{
    AccessPolicy, DeploymentInfo, GatewayConfig, OsEnv, SecretFallbackPolicy,
};
use genai_common::credentials::CredentialDiscovery;

/// GenAI gateway - reach MCP services by namespace and name
#[derive(Parser, Debug)]
#[command(name = "genai-gateway", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "GENAI_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the MCP gateway (default mode)
    Serve(ServeArgs),

    /// Discover the token secret behind a model's serving workload
    ///
    /// Prints the secret name, display name and whether a token was found.
    /// The token itself is never printed.
    Credential {
        /// Namespace holding the serving workload
        #[arg(long, short = 'n', env = "NAMESPACE")]
        namespace: String,

        /// Model (serving workload) name; empty selects the default secret
        #[arg(long, default_value = "")]
        model: String,

        /// Fallback when no secret matches the workload
        #[arg(long, default_value = "predict", env = "GENAI_SECRET_FALLBACK")]
        secret_fallback: SecretFallbackPolicy,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long = "listen", default_value = "0.0.0.0:8080", env = "GENAI_LISTEN_ADDR")]
    listen_addr: SocketAddr,

    /// PEM certificate chain; serves HTTPS together with --tls-key
    #[arg(long, env = "GENAI_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "GENAI_TLS_KEY")]
    tls_key: Option<PathBuf>,

    /// Authorization policy: always-allow or subject-access-review
    #[arg(long, default_value = "always-allow", env = "GENAI_ACCESS_POLICY")]
    access_policy: AccessPolicy,

    /// Per-attempt metadata probe timeout in seconds
    #[arg(long, default_value_t = 10, env = "GENAI_METADATA_TIMEOUT_SECS")]
    metadata_timeout_secs: u64,

    /// Forwarding deadline in seconds
    #[arg(long, default_value_t = 30, env = "GENAI_FORWARD_TIMEOUT_SECS")]
    forward_timeout_secs: u64,
}

impl Default for ServeArgs {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            listen_addr: defaults.listen_addr,
            tls_cert: None,
            tls_key: None,
            access_policy: defaults.access_policy,
            metadata_timeout_secs: defaults.metadata_timeout.as_secs(),
            forward_timeout_secs: defaults.forward_timeout.as_secs(),
        }
    }
}

impl ServeArgs {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        Ok(GatewayConfig {
            listen_addr: self.listen_addr,
            tls: GatewayConfig::tls_from_paths(self.tls_cert, self.tls_key)?,
            access_policy: self.access_policy,
            metadata_timeout: Duration::from_secs(self.metadata_timeout_secs),
            forward_timeout: Duration::from_secs(self.forward_timeout_secs),
            deployment: DeploymentInfo::from_env(&OsEnv),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Some(Commands::Serve(args)) => run_gateway(args.into_config()?).await,
        None => run_gateway(ServeArgs::default().into_config()?).await,
        Some(Commands::Credential {
            namespace,
            model,
            secret_fallback,
        }) => run_credential(&namespace, &model, secret_fallback).await,
    }
}

fn init_tracing(json: bool) {
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wire collaborators from configuration and serve until shutdown
async fn run_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        distribution = ?config.deployment.distribution,
        namespace = %config.deployment.namespace,
        cluster_domain = ?config.deployment.cluster_domain,
        access_policy = %config.access_policy,
        "Starting GenAI gateway"
    );

    let clients: Arc<dyn ClusterClientFactory> = Arc::new(KubeClientFactory::infer().await?);

    let access: Arc<dyn AccessDecision> = match config.access_policy {
        AccessPolicy::AlwaysAllow => {
            warn!("access policy is always-allow: MCP requests are not authorized");
            Arc::new(AlwaysAllow)
        }
        AccessPolicy::SubjectAccessReview => Arc::new(SubjectAccessReviewDecision),
    };

    let gateway = RequestGateway::new(
        clients,
        access,
        Arc::new(KubeServiceResolver),
        MetadataFetcher::new(config.metadata_timeout)?,
        ForwardingProxy::new(config.forward_timeout)?,
    );

    let server_config = ServerConfig {
        addr: config.listen_addr,
        tls: config.tls,
    };
    let state = AppState {
        gateway: Arc::new(gateway),
    };

    genai_api::start_server(server_config, state).await?;
    Ok(())
}

/// Run credential discovery with the gateway's own ServiceAccount
async fn run_credential(
    namespace: &str,
    model: &str,
    fallback: SecretFallbackPolicy,
) -> anyhow::Result<()> {
    let factory = KubeClientFactory::infer().await?;
    let discovery = CredentialDiscovery::new(factory.service_client().await?, fallback);

    let credential = discovery.credential_for_model(namespace, model).await?;
    let output = serde_json::json!({
        "namespace": namespace,
        "model": model,
        "secretName": credential.secret_name,
        "displayName": credential.display_name,
        "hasToken": credential.has_token(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
