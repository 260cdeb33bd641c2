use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use pce::cli::{Cli, ClientArgs, Command, ServerArgs};
use pce::error::Result;
use pce::pidfile;
use pce::session::SessionConfig;
use pce::{event_loop, net, signals};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match &cli.command {
        Command::Server(args) => run_server(args),
        Command::Client(args) => run_client(args),
        Command::Help => {
            print!("{}", pce::cli::usage());
            ExitCode::SUCCESS
        }
    }
}

fn run_server(args: &ServerArgs) -> ExitCode {
    pce::logging::init(args.debug);

    if let Err(err) = server_main(args) {
        error!("server failed to start: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn server_main(args: &ServerArgs) -> Result<()> {
    let pidfile_path = Path::new(pidfile::DEFAULT_PATH);
    let shutdown = signals::install()?;

    // Daemonization (fork/setsid/umask/chdir/close-stdio) is out of scope
    // for this crate and is not implemented in either mode, not even under
    // `!args.debug` where the reference forks and detaches. The pidfile
    // guard below still runs there, giving single-instance enforcement
    // without actually detaching from the controlling terminal.
    if !args.debug {
        let _pidfile = pidfile::create(pidfile_path)?;
    }

    let addr = args.addr.clone().unwrap_or_else(|| "0.0.0.0".to_string());
    let mut acceptor = net::Acceptor::bind(&addr, args.port, shutdown.clone())?;
    let result = acceptor.run(SessionConfig::default());

    if !args.debug {
        signals::shutdown_cleanup(pidfile_path);
    }
    result
}

fn run_client(args: &ClientArgs) -> ExitCode {
    pce::logging::init(args.debug);

    match client_main(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("client failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn client_main(args: &ClientArgs) -> Result<()> {
    let stream = net::connect(&args.addr, args.port)?;
    info!("connected to {}:{}", args.addr, args.port);

    if args.dummy {
        event_loop::run_dummy_client_session(stream)?;
        return Ok(());
    }

    let shutdown = signals::install()?;
    let local = stream
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "pce-client".to_string());
    let peer = format!("{}:{}", args.addr, args.port);
    let info = event_loop::run_session(stream, SessionConfig::default(), local, peer, shutdown)?;
    info!("session ended in state {:?}", info.state);
    Ok(())
}
