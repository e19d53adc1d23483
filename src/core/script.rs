//! Headless replay scripts.
//!
//! One step per line. `tick [dt] [xN]` advances time (dt defaults to 1,
//! repeated N times), `> text` submits reader input. Blank lines and lines
//! starting with `#` are skipped.

use thiserror::Error;

use crate::core::session::{Session, Step};
use crate::core::story::Story;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Tick { dt: f64, repeat: u32 },
    Input(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: {message}")]
    Invalid { line: usize, message: String },
}

fn invalid(line: usize, message: impl Into<String>) -> ScriptError {
    ScriptError::Invalid {
        line,
        message: message.into(),
    }
}

pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(input) = line.strip_prefix('>') {
            steps.push(ScriptStep::Input(input.trim().to_string()));
            continue;
        }

        let mut parts = line.split_whitespace();
        if parts.next() != Some("tick") {
            return Err(invalid(line_no, format!("expected 'tick' or '>', got '{}'", line)));
        }
        let mut dt = 1.0;
        let mut repeat = 1;
        for part in parts {
            if let Some(count) = part.strip_prefix('x') {
                repeat = count
                    .parse()
                    .map_err(|_| invalid(line_no, format!("bad repeat count '{}'", part)))?;
            } else {
                dt = part
                    .parse()
                    .map_err(|_| invalid(line_no, format!("bad time step '{}'", part)))?;
            }
        }
        steps.push(ScriptStep::Tick { dt, repeat });
    }
    Ok(steps)
}

/// Drive `session` through `steps`, handing every resulting step to
/// `observe`. Ticks stop early once the story is terminal.
pub fn replay<S: Story>(session: &mut Session<S>, steps: &[ScriptStep], mut observe: impl FnMut(&Step<S>)) {
    for step in steps {
        match step {
            ScriptStep::Tick { dt, repeat } => {
                for _ in 0..*repeat {
                    if session.is_terminal() {
                        break;
                    }
                    observe(&session.tick(*dt));
                }
            }
            ScriptStep::Input(text) => observe(&session.submit(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{Counter, CounterNotice};

    #[test]
    fn parses_ticks_and_input() {
        let steps = parse_script("# warmup\ntick\ntick 0.5 x3\n\n> bump 2\n").unwrap();
        assert_eq!(
            steps,
            vec![
                ScriptStep::Tick { dt: 1.0, repeat: 1 },
                ScriptStep::Tick { dt: 0.5, repeat: 3 },
                ScriptStep::Input("bump 2".to_string()),
            ]
        );
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_script("tick\nwait 3\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2: expected 'tick' or '>', got 'wait 3'");
        assert!(parse_script("tick xx").is_err());
    }

    #[test]
    fn replay_stops_ticking_at_terminal() {
        let mut session = Session::new(Counter::with_limit(3), 0);
        let steps = parse_script("> bump 1\ntick x10\n> bump 1").unwrap();
        let mut observed = 0;
        let mut notices = Vec::new();
        replay(&mut session, &steps, |step| {
            observed += 1;
            notices.extend(step.notices.iter().cloned());
        });
        assert_eq!(observed, 1 + 3 + 1);
        assert_eq!(session.snapshot().ticks, 3);
        assert!(matches!(notices[0], CounterNotice::Bumped(1)));
    }
}
