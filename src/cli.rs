//! # CLI
//!
//! `pce server [options]`, `pce client [options]`, `pce help`. Option set
//! and defaults match §6 of the design: `-a/--addr`, `-p/--port` (default
//! 4189), `-d/--debug`, `-v/--version`, `-h/--help` is handled by `clap`.

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_PORT: u16 = 4189;
pub const DEFAULT_CLIENT_ADDR: &str = "localhost";

#[derive(Parser, Debug)]
#[command(name = "pce", version, about = "PCEP (RFC 5440) server/client endpoint")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run as a PCE server: listen for and accept PCC connections.
    Server(ServerArgs),
    /// Run as a PCC client: connect to a PCE server.
    Client(ClientArgs),
    /// Print usage information.
    Help,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Local address to bind. Unset means "all interfaces".
    #[arg(short = 'a', long = "addr")]
    pub addr: Option<String>,

    /// TCP port to listen on.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log at debug level to stderr instead of syslog, and skip the pidfile guard.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Remote address to connect to.
    #[arg(short = 'a', long = "addr", default_value = DEFAULT_CLIENT_ADDR)]
    pub addr: String,

    /// TCP port to connect to.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log at debug level to stderr instead of syslog.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Run the scripted Open/Keepalive/Close sequence instead of the
    /// full state machine (reference "dummy mode").
    #[arg(long = "dummy")]
    pub dummy: bool,
}

pub fn usage() -> &'static str {
    "usage: pce server [-a|--addr ADDR] [-p|--port PORT] [-d|--debug] [-v|--version]\n       pce client [-a|--addr ADDR] [-p|--port PORT] [-d|--debug] [--dummy]\n       pce help\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults_to_all_interfaces_and_default_port() {
        let cli = Cli::parse_from(["pce", "server"]);
        match cli.command {
            Command::Server(args) => {
                assert_eq!(args.addr, None);
                assert_eq!(args.port, DEFAULT_PORT);
                assert!(!args.debug);
            }
            _ => panic!("expected Server"),
        }
    }

    #[test]
    fn client_defaults_to_localhost_and_default_port() {
        let cli = Cli::parse_from(["pce", "client"]);
        match cli.command {
            Command::Client(args) => {
                assert_eq!(args.addr, DEFAULT_CLIENT_ADDR);
                assert_eq!(args.port, DEFAULT_PORT);
            }
            _ => panic!("expected Client"),
        }
    }

    #[test]
    fn server_accepts_explicit_addr_and_port() {
        let cli = Cli::parse_from(["pce", "server", "-a", "10.0.0.1", "-p", "9000", "-d"]);
        match cli.command {
            Command::Server(args) => {
                assert_eq!(args.addr.as_deref(), Some("10.0.0.1"));
                assert_eq!(args.port, 9000);
                assert!(args.debug);
            }
            _ => panic!("expected Server"),
        }
    }
}
