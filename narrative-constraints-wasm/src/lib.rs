//! WASM bindings for narrative-constraints. The browser owns the timer: it
//! calls `tick` from its own interval and `submit` on every typed line.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use narrative_constraints::core::config::parse_ron;
use narrative_constraints::core::session::{Session, Step};
use narrative_constraints::core::story::Story;
use narrative_constraints::stories::expedition::Expedition;
use narrative_constraints::stories::reentry::Reentry;
use narrative_constraints::stories::stave::Stave;

// ---------------------------------------------------------------------------
// Embedded story data, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const STAVE_CONFIG: &str = include_str!("../../config/stave.ron");
}

// ---------------------------------------------------------------------------
// JSON shape handed across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(Serialize)]
#[serde(bound = "")]
struct StepView<'a, S: Story> {
    snapshot: &'a S::State,
    /// Rendered reader-facing text, in order.
    notices: Vec<String>,
    events: Vec<String>,
    terminal: bool,
}

fn to_json<S: Story>(step: &Step<S>, terminal: bool) -> Result<String, JsError> {
    let view = StepView::<S> {
        snapshot: &step.snapshot,
        notices: step.notices.iter().map(ToString::to_string).collect(),
        events: step.events.iter().map(ToString::to_string).collect(),
        terminal,
    };
    serde_json::to_string(&view).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

/// Object-safe face of a session, so one handle can drive any story.
trait Drive {
    fn tick(&mut self, dt: f64) -> Result<String, JsError>;
    fn submit(&mut self, input: &str) -> Result<String, JsError>;
    fn reset(&mut self) -> Result<String, JsError>;
    fn snapshot(&self) -> Result<String, JsError>;
    fn status_line(&self) -> String;
    fn is_terminal(&self) -> bool;
}

impl<S: Story> Drive for Session<S> {
    fn tick(&mut self, dt: f64) -> Result<String, JsError> {
        let step = Session::tick(self, dt);
        to_json(&step, Session::is_terminal(self))
    }

    fn submit(&mut self, input: &str) -> Result<String, JsError> {
        let step = Session::submit(self, input);
        to_json(&step, Session::is_terminal(self))
    }

    fn reset(&mut self) -> Result<String, JsError> {
        let step = Session::reset(self);
        to_json(&step, Session::is_terminal(self))
    }

    fn snapshot(&self) -> Result<String, JsError> {
        serde_json::to_string(&*Session::snapshot(self))
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    fn status_line(&self) -> String {
        Session::snapshot(self).to_string()
    }

    fn is_terminal(&self) -> bool {
        Session::is_terminal(self)
    }
}

fn open(story: &str, seed: u64, config: Option<&str>) -> Result<Box<dyn Drive>, JsError> {
    let config_error = |e| JsError::new(&format!("Config error: {e}"));
    match story.to_lowercase().as_str() {
        "stave" => {
            let config = parse_ron(config.unwrap_or(data::STAVE_CONFIG)).map_err(config_error)?;
            let stave = Stave::new(config).map_err(config_error)?;
            Ok(Box::new(Session::new(stave, seed)))
        }
        "reentry" | "twenty_years_away" => {
            let reentry = match config {
                Some(ron) => Reentry::new(parse_ron(ron).map_err(config_error)?).map_err(config_error)?,
                None => Reentry::default(),
            };
            Ok(Box::new(Session::new(reentry, seed)))
        }
        "expedition" | "ekspeditsiya_44" => {
            let expedition = match config {
                Some(ron) => Expedition::new(parse_ron(ron).map_err(config_error)?).map_err(config_error)?,
                None => Expedition::default(),
            };
            Ok(Box::new(Session::new(expedition, seed)))
        }
        other => Err(JsError::new(&format!("Unknown story: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryHandle {
    name: String,
    inner: Box<dyn Drive>,
}

#[wasm_bindgen]
impl StoryHandle {
    /// Open a story by name with a fixed seed.
    #[wasm_bindgen(constructor)]
    pub fn new(story: &str, seed: u64) -> Result<StoryHandle, JsError> {
        Ok(Self {
            name: story.to_lowercase(),
            inner: open(story, seed, None)?,
        })
    }

    /// Open a story with a RON configuration override.
    pub fn with_config(story: &str, seed: u64, config_ron: &str) -> Result<StoryHandle, JsError> {
        Ok(Self {
            name: story.to_lowercase(),
            inner: open(story, seed, Some(config_ron))?,
        })
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }

    /// Advance simulated time. Returns the step as JSON.
    pub fn tick(&mut self, dt: f64) -> Result<String, JsError> {
        self.inner.tick(dt)
    }

    /// Parse and apply one line of reader input. Returns the step as JSON.
    pub fn submit(&mut self, input: &str) -> Result<String, JsError> {
        self.inner.submit(input)
    }

    pub fn reset(&mut self) -> Result<String, JsError> {
        self.inner.reset()
    }

    pub fn snapshot(&self) -> Result<String, JsError> {
        self.inner.snapshot()
    }

    pub fn status_line(&self) -> String {
        self.inner.status_line()
    }

    pub fn is_terminal(&self) -> bool {
        self.inner.is_terminal()
    }

    /// Return JSON array of available story identifiers.
    pub fn available_stories() -> String {
        serde_json::to_string(&[Stave::NAME, Reentry::NAME, Expedition::NAME])
            .unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_story_opens() {
        for name in [Stave::NAME, Reentry::NAME, Expedition::NAME] {
            let handle = StoryHandle::new(name, 7).ok().unwrap();
            assert!(!handle.is_terminal());
            assert!(!handle.status_line().is_empty());
        }
    }

    #[test]
    fn tick_returns_snapshot_json() {
        let mut handle = StoryHandle::new("stave", 7).ok().unwrap();
        let json = handle.tick(1.0).ok().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["terminal"], false);
        assert_eq!(value["snapshot"]["system"]["tick_count"], 1);
    }

    #[test]
    fn partial_config_overrides_defaults() {
        let handle = StoryHandle::with_config("expedition", 7, "(initial: (hope: 0.3))").ok().unwrap();
        let json = handle.snapshot().ok().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["constraints"]["hope"]["value"], 0.3);
    }

    #[test]
    fn unknown_input_becomes_a_notice() {
        let mut handle = StoryHandle::new("reentry", 7).ok().unwrap();
        let json = handle.submit("fly away").ok().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["notices"].as_array().map(Vec::len), Some(1));
    }
}
