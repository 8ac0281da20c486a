//! `repwire`: runs the in-tree replication-engine simulator against a
//! msgpack-encoded config file. No CLI flags beyond the config path itself
//! (spec §6 "No CLI, no env vars, no file formats in the core" — this
//! binary is the simulator/DBMS-host layer the core explicitly excludes).

use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args_os().skip(1);
    let path = match args.next() {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("usage: repwire <config.msgpack>");
            return ExitCode::FAILURE;
        }
    };

    match repwire::run_from_config_file(&path) {
        Ok(stats) => {
            println!("{}", stats.report());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("repwire: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
