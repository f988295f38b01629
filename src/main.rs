use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use grid_membership::address::HostAddress;
use grid_membership::config::MembershipConfig;
use grid_membership::http;
use grid_membership::membership::listener::{ListenerSet, LoggingListener};
use grid_membership::membership::types::MemberRole;
use grid_membership::service::MembershipService;
use grid_membership::transport::{Transport, UdpTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--advertise <host:port>] [--locator <host:port>]... [--role locator|data-host|server] [--weight <n>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:5000", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:5001 --locator 127.0.0.1:5000",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut advertise: Option<HostAddress> = None;
    let mut locators: Vec<HostAddress> = vec![];
    let mut role = MemberRole::Server;
    let mut weight = 1u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--advertise" => {
                advertise = Some(parse_host_port(&args[i + 1])?);
                i += 2;
            }
            "--locator" => {
                locators.push(parse_host_port(&args[i + 1])?);
                i += 2;
            }
            "--role" => {
                role = parse_role(&args[i + 1])?;
                i += 2;
            }
            "--weight" => {
                weight = args[i + 1].parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");
    let advertised = advertise.unwrap_or_else(|| HostAddress::from_socket_addr(bind_addr));

    let mut config = MembershipConfig::new(bind_addr, advertised);
    config.locators = locators;
    config.role = role;
    config.weight = weight;

    tracing::info!("Starting member on {}", bind_addr);
    if config.is_founder() {
        tracing::info!("No locators beyond this node: founding a new cluster");
    } else {
        tracing::info!("Locators: {:?}", config.locators);
    }

    // 1. Datagram transport:
    let transport: Arc<dyn Transport> = Arc::new(UdpTransport::bind(bind_addr).await?);

    // 2. Membership service:
    let mut listeners = ListenerSet::new();
    listeners.register(Arc::new(LoggingListener));
    let service = MembershipService::new(config, transport, listeners).await?;
    tracing::info!("Local identity: {}", service.local());
    Arc::clone(&service).start().await;

    // 3. HTTP status surface:
    let app = http::router(service.clone());

    // 4. Stats reporter:
    let stats_service = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let snapshot = stats_service.snapshot();
            tracing::info!(
                "Cluster stats: {} ({})",
                snapshot.view,
                snapshot.lifecycle
            );
            for member in snapshot.view.members() {
                tracing::info!("  - {} weight={}", member, member.weight);
            }
        }
    });

    let http_port = bind_addr.port() + 1000;
    let http_addr = SocketAddr::new(bind_addr.ip(), http_port);

    tracing::info!("HTTP status surface on {}", http_addr);
    tracing::info!("Press Ctrl+C to leave the cluster");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;

    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, leaving the cluster");
            service.leave().await;
        }
        reason = service.wait_shutdown() => {
            tracing::info!("Cluster participation ended: {}", reason);
        }
    }

    Ok(())
}

fn parse_host_port(text: &str) -> anyhow::Result<HostAddress> {
    let (host, port) = text
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected host:port, got {text}"))?;
    Ok(HostAddress::new(host, port.parse::<u16>()?))
}

fn parse_role(text: &str) -> anyhow::Result<MemberRole> {
    match text {
        "locator" => Ok(MemberRole::Locator),
        "data-host" => Ok(MemberRole::DataHost),
        "server" => Ok(MemberRole::Server),
        other => Err(anyhow::anyhow!("unknown role: {other}")),
    }
}
