use anyhow::Result;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_drivers;
mod cmd_download;
mod cmd_decode;
mod cmd_replay;
mod cmd_metrics;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    // Пример: RUST_LOG=divelink=trace divelink download ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Drivers { json } =>
            cmd_drivers::exec(json),

        cli::Cmd::Download(args) =>
            cmd_download::exec(args),

        cli::Cmd::Decode { file, verify, json } =>
            cmd_decode::exec(file, verify, json),

        cli::Cmd::Replay { file, clock_offset, json } =>
            cmd_replay::exec(file, clock_offset, json),

        cli::Cmd::Metrics =>
            cmd_metrics::exec(),
    }
}
