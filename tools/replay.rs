/// Replay: run a story headlessly from a script and print what happened.
///
/// Usage: replay --script <path> [--story <stave|reentry|expedition>]
///               [--seed <n>] [--config <path.ron>] [--twice] [--quiet]
///
/// Script lines: `tick [dt] [xN]` and `> command`. With --twice the script
/// is replayed a second time from the same seed and the final snapshots
/// must match.
use narrative_constraints::core::config::{load_ron, ConfigError, StoryConfig};
use narrative_constraints::core::script::{parse_script, replay, ScriptStep};
use narrative_constraints::core::session::Session;
use narrative_constraints::core::story::Story;
use narrative_constraints::stories::expedition::Expedition;
use narrative_constraints::stories::reentry::Reentry;
use narrative_constraints::stories::stave::Stave;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Options {
    story: String,
    seed: u64,
    config: Option<PathBuf>,
    script: PathBuf,
    twice: bool,
    quiet: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let options = match parse_args(std::env::args().skip(1).collect()) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            print_usage();
            std::process::exit(1);
        }
    };

    let text = match std::fs::read_to_string(&options.script) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Failed to read {}: {}", options.script.display(), e);
            std::process::exit(1);
        }
    };
    let steps = match parse_script(&text) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("{}: {}", options.script.display(), e);
            std::process::exit(1);
        }
    };

    let outcome = match options.story.as_str() {
        "stave" => build(&options, Stave::new).map(|s| run(s, &steps, &options)),
        "reentry" => build(&options, Reentry::new).map(|s| run(s, &steps, &options)),
        "expedition" => build(&options, Expedition::new).map(|s| run(s, &steps, &options)),
        other => {
            eprintln!("Unknown story: {}", other);
            std::process::exit(1);
        }
    };
    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<Options, String> {
    let mut story = "stave".to_string();
    let mut seed = 42;
    let mut config = None;
    let mut script = None;
    let mut twice = false;
    let mut quiet = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--twice" => twice = true,
            "--quiet" | "-q" => quiet = true,
            flag @ ("--story" | "--seed" | "--config" | "--script") => {
                i += 1;
                let value = args.get(i).ok_or_else(|| format!("Missing value for {}", flag))?;
                match flag {
                    "--story" => story = value.to_lowercase(),
                    "--seed" => seed = value.parse().map_err(|_| format!("Invalid seed: {}", value))?,
                    "--config" => config = Some(PathBuf::from(value)),
                    _ => script = Some(PathBuf::from(value)),
                }
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }

    Ok(Options {
        story,
        seed,
        config,
        script: script.ok_or("Missing --script")?,
        twice,
        quiet,
    })
}

fn build<S, C: StoryConfig>(options: &Options, new: fn(C) -> Result<S, ConfigError>) -> Result<S, ConfigError> {
    match &options.config {
        Some(path) => new(load_ron(path)?),
        None => new(C::default()),
    }
}

/// Replay once (or twice) and print the outcome. Returns false when the two
/// runs disagree.
fn run<S: Story>(story: S, steps: &[ScriptStep], options: &Options) -> bool {
    let mut session = Session::new(story, options.seed);
    let first = play(&mut session, steps, options.quiet);
    println!("\nFinal snapshot ({} steps):\n{}", steps.len(), first);
    if !options.twice {
        return true;
    }

    session.reset();
    let second = play(&mut session, steps, true);
    if first == second {
        println!("Deterministic: second replay matched.");
        true
    } else {
        println!("MISMATCH: second replay ended at\n{}", second);
        false
    }
}

fn play<S: Story>(session: &mut Session<S>, steps: &[ScriptStep], quiet: bool) -> Arc<S::State> {
    let mut count = 0u64;
    replay(session, steps, |step| {
        count += 1;
        if quiet {
            return;
        }
        for notice in &step.notices {
            println!("[{:>4}] {}", count, notice);
        }
        for event in &step.events {
            println!("[{:>4}] * {}", count, event);
        }
    });
    session.snapshot()
}

fn print_usage() {
    println!("Usage: replay --script <path> [--story <stave|reentry|expedition>]");
    println!("              [--seed <n>] [--config <path.ron>] [--twice] [--quiet]");
}
