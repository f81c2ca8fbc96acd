//! `osocks`: the server binary. Terminates the encrypted tunnel and dials
//! the destination requested by an `isocks` client.

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

use iosocks::config::{Config, ConfigType, ServerConfig};
use iosocks::{run_server, DEFAULT_SERVER_BIND_ADDR, DEFAULT_SERVER_PORT, VERSION};

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
    let matches = App::new("osocks")
        .version(VERSION)
        .about("Encrypted tunneling proxy server")
        .arg(Arg::with_name("VERBOSE").short("v").multiple(true).help("Increase log verbosity"))
        .arg(Arg::with_name("LOG_WITHOUT_TIME").long("log-without-time").help("Disable timestamps in log output"))
        .arg(Arg::with_name("CONFIG").short("c").long("config").takes_value(true).help("Configuration file"))
        .arg(Arg::with_name("BIND_ADDR").short("b").long("bind-addr").takes_value(true).help("Listen address"))
        .arg(Arg::with_name("SERVER_PORT").short("p").long("server-port").takes_value(true).help("Listen port"))
        .arg(Arg::with_name("PASSWORD").short("k").long("key").takes_value(true).help("Pre-shared key"))
        .get_matches();

    init_logger(matches.occurrences_of("VERBOSE"), matches.is_present("LOG_WITHOUT_TIME"));

    let mut config = match matches.value_of("CONFIG") {
        Some(path) => match Config::load_from_file(path, ConfigType::Server) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!("{}", err);
                process::exit(1);
            }
        },
        None => Config::new(),
    };

    if let Some(key) = matches.value_of("PASSWORD") {
        let address = matches.value_of("BIND_ADDR").unwrap_or(DEFAULT_SERVER_BIND_ADDR).to_owned();
        let port = match matches.value_of("SERVER_PORT") {
            Some(p) => match p.parse() {
                Ok(port) => port,
                Err(_) => {
                    error!("invalid listen port {:?}", p);
                    process::exit(1);
                }
            },
            None => DEFAULT_SERVER_PORT,
        };
        config.server.push(ServerConfig::basic(address, port, key.to_owned()));
    }

    if config.server.is_empty() {
        eprintln!("You must provide a configuration file (-c) or -k on the command line");
        println!("{}", matches.usage());
        process::exit(1);
    }

    info!("osocks {}", VERSION);
    debug!("config: {:?}", config);

    let mut runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            error!("failed to start async runtime: {}", err);
            process::exit(3);
        }
    };

    if let Err(err) = runtime.block_on(run_server(config)) {
        error!("osocks exited with error: {}", err);
        process::exit(2);
    }
}
