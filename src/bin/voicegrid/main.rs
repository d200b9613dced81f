//! voicegrid - live-coding console
//!
//! Run with: cargo run -- [config.json ...]
//!
//! With no arguments, `config/global.json` and then `config/suite.json` are
//! loaded when they exist. `RUST_LOG=debug` shows clock and voice activity.

use std::{
    io::{self, IsTerminal},
    path::PathBuf,
    sync::Arc,
};

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use voicegrid::{
    config::Config, console::Console, engine::Engine, generators::GeneratorTable, io::CpalSink,
};

const DEFAULT_CONFIGS: [&str; 2] = ["config/global.json", "config/suite.json"];

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::init();

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let config = if args.is_empty() {
        Config::load_present(&DEFAULT_CONFIGS)
    } else {
        Config::load(&args)
    }
    .wrap_err("failed to load configuration")?;

    let sink = CpalSink::open_default().wrap_err("failed to open audio output")?;

    let generators = GeneratorTable::builtin();
    for name in config.generators.keys() {
        if !generators.contains(name) {
            log::warn!("generator `{name}` is configured but not built in");
        }
    }

    let engine = Arc::new(
        Engine::new(config.engine(), generators, Arc::new(sink))
            .wrap_err("failed to start engine")?,
    );

    println!("=== voicegrid ===");
    println!("BPM: {}", engine.bpm());
    println!(
        "Generators: {}",
        config.generators.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    println!();

    let stdout = io::stdout();
    let styled = stdout.is_terminal();
    let mut console = Console::new(Arc::clone(&engine), config).styled(styled);
    console
        .run(io::stdin().lock(), stdout.lock())
        .wrap_err("console I/O failed")?;

    let exits = engine.shutdown();
    log::info!("{} voice(s) stopped", exits.len());

    Ok(())
}
