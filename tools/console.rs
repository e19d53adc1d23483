/// Console: interactive shell that runs a story under the real-time scheduler.
///
/// Usage: console [--story <stave|reentry|expedition>] [--seed <n>]
///                [--config <path.ron>] [--cadence-ms <n>] [--dt <x>]
///
/// Reader commands are passed straight to the story. Shell commands:
///   :status   print the current snapshot line
///   :reset    restart the story with the same seed
///   :quit     exit
///
/// Log verbosity follows RUST_LOG (default: warn).
use narrative_constraints::core::config::{load_ron, ConfigError, StoryConfig};
use narrative_constraints::core::scheduler::{Scheduler, SchedulerConfig};
use narrative_constraints::core::session::{Session, Step};
use narrative_constraints::core::story::Story;
use narrative_constraints::stories::expedition::Expedition;
use narrative_constraints::stories::reentry::Reentry;
use narrative_constraints::stories::stave::Stave;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use tracing_subscriber::EnvFilter;

struct Options {
    story: String,
    seed: u64,
    config: Option<PathBuf>,
    scheduler: SchedulerConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let options = match parse_args(std::env::args().skip(1).collect()) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(message) => {
            eprintln!("{}", message);
            print_usage();
            std::process::exit(1);
        }
    };

    let result = match options.story.as_str() {
        "stave" => open(&options, Stave::new).and_then(|s| run(s, &options)),
        "reentry" => open(&options, Reentry::new).and_then(|s| run(s, &options)),
        "expedition" => open(&options, Expedition::new).and_then(|s| run(s, &options)),
        other => {
            eprintln!("Unknown story: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };
    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options {
        story: "stave".to_string(),
        seed: 42,
        config: None,
        scheduler: SchedulerConfig::default(),
    };
    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--help" | "-h", _) => return Ok(None),
            ("--story", Some(v)) => options.story = v.to_lowercase(),
            ("--seed", Some(v)) => {
                options.seed = v.parse().map_err(|_| format!("Invalid seed: {}", v))?;
            }
            ("--config", Some(v)) => options.config = Some(PathBuf::from(v)),
            ("--cadence-ms", Some(v)) => {
                options.scheduler.cadence_ms = v.parse().map_err(|_| format!("Invalid cadence: {}", v))?;
            }
            ("--dt", Some(v)) => {
                options.scheduler.dt = v.parse().map_err(|_| format!("Invalid dt: {}", v))?;
            }
            (other, _) => return Err(format!("Unknown argument: {}", other)),
        }
        i += 2;
    }
    Ok(Some(options))
}

/// Build a story from the optional RON file, or from its defaults.
fn open<S, C>(options: &Options, build: fn(C) -> Result<S, ConfigError>) -> Result<S, ConfigError>
where
    C: StoryConfig,
{
    let config = match &options.config {
        Some(path) => load_config(path)?,
        None => C::default(),
    };
    build(config)
}

fn load_config<C: StoryConfig>(path: &Path) -> Result<C, ConfigError> {
    let config = load_ron(path)?;
    println!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn run<S>(story: S, options: &Options) -> Result<(), ConfigError>
where
    S: Story + Send + 'static,
    S::State: Send + Sync,
    S::Notice: Send,
    S::Event: Send,
{
    println!("{} (seed {})", S::NAME, options.seed);
    println!("Type 'help' for story commands, ':quit' to exit.\n");

    let mut scheduler = Scheduler::start(Session::new(story, options.seed), &options.scheduler)?;
    println!("{}", scheduler.snapshot());

    let ticks = scheduler.updates().clone();
    let printer = thread::spawn(move || {
        for step in ticks.iter() {
            print_events(&step);
        }
    });

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{}> ", S::NAME);
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            ":quit" | ":q" => break,
            ":status" => println!("{}", scheduler.snapshot()),
            ":reset" => {
                let step = scheduler.reset();
                println!("Session reset.");
                println!("{}", step.snapshot);
            }
            input => {
                let step = scheduler.submit(input);
                for notice in &step.notices {
                    println!("{}", notice);
                }
                print_events(&step);
                println!("{}", step.snapshot);
                if scheduler.is_terminal() {
                    println!("[session ended]");
                }
            }
        }
    }

    // The stopped worker drops its sender, which ends the printer loop.
    scheduler.stop();
    if printer.join().is_err() {
        eprintln!("event printer panicked");
    }
    println!("Goodbye.");
    Ok(())
}

fn print_events<S: Story>(step: &Step<S>) {
    for event in &step.events {
        println!("  * {}", event);
    }
}

fn print_usage() {
    println!("Usage: console [--story <stave|reentry|expedition>] [--seed <n>]");
    println!("               [--config <path.ron>] [--cadence-ms <n>] [--dt <x>]");
    println!();
    println!("Shell commands: :status, :reset, :quit");
}
