//! Command line interface for the `rmcast` protocol tester.
//!
//! Kept free of crate imports so the build script can include it to render
//! the man page.

use std::net::{Ipv4Addr, SocketAddr};

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `rmcast` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rmcast",
    version,
    about = "Send and receive objects over reliable IP multicast"
)]
pub struct Cli {
    #[command(flatten)]
    pub group: GroupArgs,
    /// Serve Prometheus metrics on this address.
    #[arg(long, global = true, value_name = "ADDR")]
    pub metrics_listen: Option<SocketAddr>,
    #[command(subcommand)]
    pub command: Command,
}

/// Multicast addressing and role filtering shared by every command.
#[derive(Debug, Args)]
pub struct GroupArgs {
    /// Local interface used to join the group and to send.
    #[arg(long, global = true, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub interface: Ipv4Addr,
    /// Multicast group address.
    #[arg(long, global = true, default_value_t = Ipv4Addr::new(224, 67, 68, 70))]
    pub group: Ipv4Addr,
    /// Multicast group port.
    #[arg(long, global = true, default_value_t = 6002)]
    pub port: u16,
    /// Role tag stamped on outbound fragments.
    #[arg(long, global = true, default_value = "rmcast")]
    pub origin: String,
    /// Discard fragments from this role. May be repeated.
    #[arg(long = "ignore", global = true, value_name = "TAG")]
    pub ignored: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publish crawl records and answer retransmission requests.
    Send(SendArgs),
    /// Print every delivered object.
    Listen(ListenArgs),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// URL of the crawl record.
    #[arg(long)]
    pub url: String,
    /// Page title.
    #[arg(long, default_value = "")]
    pub title: String,
    /// Page text; also tokenized.
    #[arg(long, default_value = "")]
    pub text: String,
    /// Number of records to publish, numbered from zero.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,
    /// Seconds to keep answering retransmission requests after sending.
    #[arg(long, default_value_t = 10)]
    pub linger: u64,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Exit after this many objects.
    #[arg(long)]
    pub count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_send_command() {
        let cli = Cli::parse_from([
            "rmcast",
            "--origin",
            "downloader",
            "send",
            "--url",
            "https://example.org",
            "--repeat",
            "3",
        ]);
        assert_eq!(cli.group.origin, "downloader");
        let Command::Send(args) = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(args.url, "https://example.org");
        assert_eq!(args.repeat, 3);
        assert_eq!(args.linger, 10);
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "rmcast", "listen", "--count", "2", "--ignore", "downloader", "--ignore", "barrel-sync",
            "--port", "7000",
        ]);
        assert_eq!(cli.group.port, 7000);
        assert_eq!(cli.group.ignored, ["downloader", "barrel-sync"]);
        assert!(matches!(cli.command, Command::Listen(args) if args.count == Some(2)));
    }
}
