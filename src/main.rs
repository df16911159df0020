use clap::Parser;
use dnscook::config::{Cli, Config};
use dnscook::{logger, server, Dispatcher};
use log::info;
use std::process;

const BANNER: &str = r"
      _                            _
   __| |_ __  ___  ___ ___   ___ | | __
  / _` | '_ \/ __|/ __/ _ \ / _ \| |/ /
 | (_| | | | \__ \ (_| (_) | (_) |   <
  \__,_|_| |_|___/\___\___/ \___/|_|\_\
";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        println!("{}              version {}\n", BANNER, env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = logger::init(cli.logfile.as_deref()) {
        eprintln!("[!] failed to open the log file: {}", e);
        process::exit(1);
    }

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            // A refused configuration is a normal exit, not a failure.
            eprintln!("[!] {}", e);
            return;
        }
    };

    if config.listen.port() != 53 {
        info!("listening on an alternative port {}", config.listen.port());
    }
    if config.ipv6 {
        info!("using IPv6 mode");
    }
    info!(
        "dnscook is active on {} ({})",
        config.listen,
        if config.tcp { "tcp" } else { "udp" }
    );

    let dispatcher = Dispatcher::new(config.rules, config.upstreams, config.ipv6);

    if let Err(e) = server::run(config.listen, config.tcp, dispatcher).await {
        log::error!("failed to start the server: {}", e);
        log::logger().flush();
        process::exit(1);
    }

    info!("dnscook is shutting down");
    log::logger().flush();
}
