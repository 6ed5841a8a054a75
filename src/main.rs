//! `rmcast` protocol tester.
//!
//! `send` publishes crawl records to the group and lingers to answer
//! retransmission requests; `listen` prints delivered objects.

mod cli;

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use cli::{Cli, Command, GroupArgs, ListenArgs, SendArgs};
use rmcast::{
    config::TransportConfig,
    error::TransportError,
    records::{CrawlRecord, SearchPayload},
    transport::Transport,
};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Some(addr) = cli.metrics_listen {
        install_metrics(addr)?;
    }
    let transport = Transport::<SearchPayload>::bind(transport_config(&cli.group))?;
    let result = match cli.command {
        Command::Send(args) => send(&transport, args).await,
        Command::Listen(args) => listen(&transport, args).await,
    };
    transport.shutdown().await;
    Ok(result?)
}

fn transport_config(args: &GroupArgs) -> TransportConfig {
    args.ignored.iter().fold(
        TransportConfig::new(args.group, args.port, args.origin.as_str())
            .with_interface(args.interface),
        |config, origin| config.with_ignored_origin(origin.as_str()),
    )
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    log::info!("metrics exporter listening: addr={addr}");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    log::warn!("metrics feature disabled, ignoring --metrics-listen={addr}");
    Ok(())
}

async fn send(transport: &Transport<SearchPayload>, args: SendArgs) -> Result<(), TransportError> {
    // Peers' retransmission requests arrive through the receive path.
    transport.start_receiving()?;
    for n in 0..args.repeat {
        let url = if args.repeat == 1 {
            args.url.clone()
        } else {
            format!("{}#{n}", args.url)
        };
        let record = CrawlRecord::new(url)
            .with_title(args.title.as_str())
            .with_text(args.text.as_str());
        transport.send(&SearchPayload::Crawl(record)).await?;
    }
    println!("sent {} record(s), lingering {}s", args.repeat, args.linger);

    let linger = tokio::time::sleep(Duration::from_secs(args.linger));
    tokio::select! {
        () = linger => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    transport.stop_sending();
    Ok(())
}

async fn listen(
    transport: &Transport<SearchPayload>,
    args: ListenArgs,
) -> Result<(), TransportError> {
    transport.start_receiving()?;
    let mut received = 0usize;
    loop {
        let payload = tokio::select! {
            payload = transport.receive(POLL_INTERVAL) => payload,
            _ = tokio::signal::ctrl_c() => break,
        };
        match payload {
            Some(payload) => {
                received += 1;
                print_payload(&payload);
                if args.count.is_some_and(|count| received >= count) {
                    break;
                }
            }
            None if !transport.is_receiving() => return Err(TransportError::ReceiverClosed),
            None => {}
        }
    }
    transport.stop_receiving();
    Ok(())
}

fn print_payload(payload: &SearchPayload) {
    match payload {
        SearchPayload::Crawl(record) => println!(
            "crawl-record url={} title={:?} tokens={}",
            record.url,
            record.title,
            record.tokens.len()
        ),
        SearchPayload::SyncRequest(request) => {
            println!("sync-request tables={}", request.last_ids.len());
        }
        SearchPayload::SyncData(data) => {
            let rows: usize = data.tables.values().map(Vec::len).sum();
            println!("sync-data tables={} rows={rows}", data.tables.len());
        }
    }
}
