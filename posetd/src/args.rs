//! CLI flags (§6.1): the three committee bootstrap file paths, an optional
//! run-config TOML file, logging controls, and a debug-dump path override.
//! Adapted from the teacher's `clap`-based `Command` builder.

use clap::{arg, Arg, Command};

const DEFAULT_SIGNING_KEYS: &str = "signing_keys";
const DEFAULT_IP_ADDRESSES: &str = "ip_addresses";
const DEFAULT_MY_IP: &str = "my_ip";

#[derive(Debug)]
pub struct Args {
    pub signing_keys: String,
    pub ip_addresses: String,
    pub my_ip: String,
    pub config: Option<String>,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub dump_path: Option<String>,
}

pub fn cli() -> Command {
    Command::new("posetd")
        .about(format!("{} v{}", env!("CARGO_PKG_DESCRIPTION"), env!("CARGO_PKG_VERSION")))
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("signing_keys")
                .long("signing-keys")
                .value_name("PATH")
                .default_value(DEFAULT_SIGNING_KEYS)
                .help("Path to the committee's hex-encoded signing keys, one per line."),
        )
        .arg(
            Arg::new("ip_addresses")
                .long("ip-addresses")
                .value_name("PATH")
                .default_value(DEFAULT_IP_ADDRESSES)
                .help("Path to the committee's member hosts, one per line, same order as signing-keys."),
        )
        .arg(Arg::new("my_ip").long("my-ip").value_name("PATH").default_value(DEFAULT_MY_IP).help("Path to this node's own host line."))
        .arg(arg!(-c --config <PATH> "Optional TOML file overriding the default run configuration.").required(false))
        .arg(
            Arg::new("log_level")
                .short('d')
                .long("loglevel")
                .value_name("log_level")
                .default_value("info")
                .num_args(0..=1)
                .require_equals(true)
                .help("Specify log level, e.g. info or poset_network=debug,info."),
        )
        .arg(arg!(--"log-dir" <PATH> "Directory to write rolling log files to; console-only if omitted.").required(false))
        .arg(arg!(--"dump-path" <PATH> "Override the default poset.dag debug-dump location.").required(false))
}

impl Args {
    pub fn parse() -> Args {
        let m = cli().get_matches();
        Args {
            signing_keys: m.get_one::<String>("signing_keys").cloned().unwrap(),
            ip_addresses: m.get_one::<String>("ip_addresses").cloned().unwrap(),
            my_ip: m.get_one::<String>("my_ip").cloned().unwrap(),
            config: m.get_one::<String>("config").cloned(),
            log_level: m.get_one::<String>("log_level").cloned().unwrap(),
            log_dir: m.get_one::<String>("log-dir").cloned(),
            dump_path: m.get_one::<String>("dump-path").cloned(),
        }
    }
}
