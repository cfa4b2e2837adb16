use clap::Parser;

use cordwire::bus::event::{ConnectionClosed, DispatchEvent, SessionReady, SessionResumed};
use cordwire::config::{parse_shard, Config};
use cordwire::Client;

/// Connect a bot to the gateway and log what it receives.
#[derive(Parser, Debug)]
#[command(name = "cordwire", version, about)]
struct Args {
    /// Override CORDWIRE_GATEWAY_URL
    #[arg(long)]
    gateway_url: Option<String>,

    /// Override CORDWIRE_API_URL
    #[arg(long)]
    api_url: Option<String>,

    /// Shard as id/count, e.g. 0/2
    #[arg(long, value_parser = shard_arg)]
    shard: Option<[u32; 2]>,

    /// Exit after the first close instead of reconnecting
    #[arg(long)]
    no_reconnect: bool,
}

fn shard_arg(raw: &str) -> Result<[u32; 2], String> {
    parse_shard(raw).ok_or_else(|| format!("expected id/count with id < count, got {raw}"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cordwire=debug".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(url) = args.gateway_url {
        config.gateway_url = url;
    }
    if let Some(url) = args.api_url {
        config.api_url = url;
    }
    if args.shard.is_some() {
        config.shard = args.shard;
    }
    if args.no_reconnect {
        config.auto_reconnect = false;
    }
    print_banner(&config);

    let mut client = Client::new(config);
    register_logging(&client);

    match client.rest().get_gateway_bot().await {
        Ok(resp) => match resp.data {
            Some(info) => tracing::info!(
                "gateway {} recommends {} shard(s), {} session start(s) left",
                info.url,
                info.shards,
                info.session_start_limit.remaining
            ),
            None => tracing::warn!("gateway/bot returned {}: {}", resp.status, resp.raw),
        },
        Err(e) => tracing::warn!("failed to query gateway/bot: {e}"),
    }

    if let Err(e) = client.start() {
        eprintln!("failed to start: {e}");
        std::process::exit(1);
    }

    let gateway = client.gateway().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, disconnecting");
            gateway.disconnect();
        }
    });

    if let Err(e) = client.join().await {
        tracing::error!("gateway stopped: {e}");
        std::process::exit(1);
    }
}

fn register_logging(client: &Client) {
    let events = client.events();
    events.register::<SessionReady, _>(0, |ready| {
        tracing::info!("ready as session {}", ready.session_id);
        Ok(())
    });
    events.register::<SessionResumed, _>(0, |resumed| {
        tracing::info!("resumed at sequence {:?}", resumed.sequence);
        Ok(())
    });
    events.register::<DispatchEvent, _>(0, |dispatch| {
        tracing::debug!("dispatch {} (seq {:?})", dispatch.name.as_str(), dispatch.sequence);
        Ok(())
    });
    events.register::<ConnectionClosed, _>(0, |closed| {
        tracing::info!("connection closed: {} {}", closed.code, closed.reason);
        Ok(())
    });
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let shard = match config.shard {
        Some([id, count]) => format!("{id}/{count}"),
        None => "none".to_string(),
    };

    eprintln!();
    eprintln!("  \x1b[1;36mcordwire\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mgateway\x1b[0m      {}", config.gateway_endpoint());
    eprintln!("  \x1b[2mapi\x1b[0m          {}", config.api_url);
    eprintln!("  \x1b[2mauth\x1b[0m         {:?}", config.credentials.kind());
    eprintln!("  \x1b[2mshard\x1b[0m        {shard}");

    if !config.auto_reconnect {
        eprintln!();
        eprintln!("  \x1b[33m! auto-reconnect disabled\x1b[0m");
    }

    eprintln!();
}
