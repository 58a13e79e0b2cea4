#[cfg(feature = "playback")]
mod audio;
mod config;
mod error;
mod player;
mod render;
mod script;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{LevelFilter, error};
use nes_apu_core::{ApuConfig, CoreKind};

use crate::error::CliError;
use crate::player::ScriptPlayer;
use crate::script::Script;

#[derive(Parser)]
#[command(name = "nes-apu", about = "Render and inspect NES APU register scripts")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a script to a mono 16-bit WAV file
    Render {
        script: PathBuf,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// List the available cores
    Cores,

    /// Run a script and print the engine snapshot as JSON
    Snapshot {
        script: PathBuf,

        /// Stop at this CPU cycle instead of the end of the script
        #[arg(long)]
        at: Option<u64>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Play a script on the default audio device
    #[cfg(feature = "playback")]
    Play {
        script: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(clap::Args)]
struct EngineArgs {
    /// Core implementation: scheduled or cycle
    #[arg(long, default_value = "scheduled")]
    core: CoreKind,

    /// Engine settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl EngineArgs {
    fn config(&self) -> ApuConfig {
        match &self.config {
            Some(path) => config::load_from_file(path),
            None => ApuConfig::default(),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_cores() {
    for kind in CoreKind::ALL {
        println!(
            "{:<10} {} (default mixer: {})",
            kind.name(),
            kind.description(),
            kind.default_mixer()
        );
    }
}

fn snapshot_json(
    script_path: &Path,
    at: Option<u64>,
    engine: &EngineArgs,
) -> Result<String, CliError> {
    let script = Script::load(script_path)?;
    let mut player = ScriptPlayer::new(&script, engine.core, &engine.config());
    player.advance_to(at.unwrap_or(script.cycles));
    Ok(player.engine().get_state().to_json_pretty()?)
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Render {
            script,
            output,
            engine,
        } => {
            let script = Script::load(&script)?;
            render::render_wav(&script, engine.core, &engine.config(), &output)?;
        }
        Command::Cores => print_cores(),
        Command::Snapshot { script, at, engine } => {
            println!("{}", snapshot_json(&script, at, &engine)?);
        }
        #[cfg(feature = "playback")]
        Command::Play { script, engine } => {
            let script = Script::load(&script)?;
            audio::play(&script, engine.core, &engine.config())?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_render_flags() {
        let args = Args::parse_from([
            "nes-apu", "-vv", "render", "song.toml", "-o", "out.wav", "--core", "cycle",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Render {
                script,
                output,
                engine,
            } => {
                assert_eq!(script, PathBuf::from("song.toml"));
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(engine.core, CoreKind::CycleStepped);
                assert!(engine.config.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn rejects_unknown_core() {
        assert!(
            Args::try_parse_from(["nes-apu", "render", "a.toml", "-o", "a.wav", "--core", "fast"])
                .is_err()
        );
    }

    #[test]
    fn snapshot_stops_at_requested_cycle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "cycles = 50000\n[[write]]\ncycle = 0\naddr = 0x4015\nvalue = 1\n[[write]]\ncycle = 0\naddr = 0x4003\nvalue = 8\n"
        )
        .unwrap();
        let engine = EngineArgs {
            core: CoreKind::Scheduled,
            config: None,
        };

        let text = snapshot_json(file.path(), Some(15_000), &engine).unwrap();
        let (snap, report) = nes_apu_core::ApuSnapshot::from_json(&text).unwrap();
        assert!(report.is_clean());
        assert_eq!(snap.cycles, 15_000);
        assert_eq!(snap.core, "scheduled");
        assert_eq!(snap.pulse1.length_counter, 253);
    }

    #[test]
    fn missing_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineArgs {
            core: CoreKind::Scheduled,
            config: None,
        };
        let err = snapshot_json(&dir.path().join("none.toml"), None, &engine).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
