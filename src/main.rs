use std::env;
use std::process::ExitCode;

use envmap_baker::bake;
use envmap_baker::config::{Command, Config, USAGE};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn try_main() -> envmap_baker::Result<()> {
    match Config::from_args(env::args().skip(1))? {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Bake(config) => {
            bake::run(&config)?;
            Ok(())
        }
    }
}
