//! `isocks`: the client binary. Exposes a SOCKS5 front end to applications
//! and tunnels CONNECT requests through an encrypted link to an `osocks`
//! server.

extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate log;

use std::env;
use std::io::Write;
use std::process;

use clap::{App, Arg};
use env_logger::Builder as LogBuilder;
use log::LevelFilter;

use iosocks::config::{Config, ConfigType, LocalConfig, ServerConfig};
use iosocks::{run_client, DEFAULT_LOCAL_ADDR, DEFAULT_LOCAL_PORT, DEFAULT_SERVER_PORT, VERSION};

fn init_logger(verbosity: u64, without_time: bool) {
    let mut builder = LogBuilder::new();

    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    builder.filter(None, level);

    builder.format(move |buf, record| {
        if without_time {
            writeln!(buf, "[{}] {}", record.level(), record.args())
        } else {
            writeln!(
                buf,
                "[{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        }
    });

    if let Ok(env_conf) = env::var("RUST_LOG") {
        builder.parse_filters(&env_conf);
    }

    builder.init();
}

fn main() {
    let matches = App::new("isocks")
        .version(VERSION)
        .about("Encrypted tunneling proxy client with a SOCKS5 front end")
        .arg(Arg::with_name("VERBOSE").short("v").multiple(true).help("Increase log verbosity"))
        .arg(Arg::with_name("LOG_WITHOUT_TIME").long("log-without-time").help("Disable timestamps in log output"))
        .arg(Arg::with_name("CONFIG").short("c").long("config").takes_value(true).help("Configuration file"))
        .arg(Arg::with_name("SERVER_ADDR").short("s").long("server-addr").takes_value(true).help("Upstream osocks server address"))
        .arg(Arg::with_name("SERVER_PORT").short("p").long("server-port").takes_value(true).help("Upstream osocks server port"))
        .arg(Arg::with_name("BIND_ADDR").short("b").long("bind-addr").takes_value(true).help("Local SOCKS5 bind address"))
        .arg(Arg::with_name("LOCAL_PORT").short("l").long("local-port").takes_value(true).help("Local SOCKS5 listen port"))
        .arg(Arg::with_name("PASSWORD").short("k").long("key").takes_value(true).help("Pre-shared key"))
        .get_matches();

    init_logger(matches.occurrences_of("VERBOSE"), matches.is_present("LOG_WITHOUT_TIME"));

    let mut config = match matches.value_of("CONFIG") {
        Some(path) => match Config::load_from_file(path, ConfigType::Local) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!("{}", err);
                process::exit(1);
            }
        },
        None => Config::new(),
    };

    match (matches.value_of("SERVER_ADDR"), matches.value_of("PASSWORD")) {
        (Some(addr), Some(key)) => {
            let port = match matches.value_of("SERVER_PORT") {
                Some(p) => match p.parse() {
                    Ok(port) => port,
                    Err(_) => {
                        error!("invalid server port {:?}", p);
                        process::exit(1);
                    }
                },
                None => DEFAULT_SERVER_PORT,
            };
            config.server.push(ServerConfig::basic(addr.to_owned(), port, key.to_owned()));
        }
        (None, None) => {}
        _ => {
            error!("`-s` and `-k` must be provided together");
            process::exit(1);
        }
    }

    if config.server.is_empty() {
        eprintln!("You must provide a configuration file (-c) or -s/-k on the command line");
        println!("{}", matches.usage());
        process::exit(1);
    }

    let bind_address = matches.value_of("BIND_ADDR").map(str::to_owned).unwrap_or_else(|| DEFAULT_LOCAL_ADDR.to_owned());
    let local_port = match matches.value_of("LOCAL_PORT") {
        Some(p) => match p.parse() {
            Ok(port) => port,
            Err(_) => {
                error!("invalid local port {:?}", p);
                process::exit(1);
            }
        },
        None => DEFAULT_LOCAL_PORT,
    };
    config.local = Some(LocalConfig {
        address: bind_address,
        port: local_port,
    });

    info!("isocks {}", VERSION);
    debug!("config: {:?}", config);

    let mut runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            error!("failed to start async runtime: {}", err);
            process::exit(3);
        }
    };

    if let Err(err) = runtime.block_on(run_client(config)) {
        error!("isocks exited with error: {}", err);
        process::exit(2);
    }
}
