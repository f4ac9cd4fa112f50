//! Per-VM trigger registry.
//!
//! Matching is split from firing: the VM collects matched ids first, then
//! consumes each through [`TriggerSet::consume_fire`], which applies the
//! lifecycle budget *before* the handler runs so a handler can re-register
//! its own id. Dispatch ordering (TextLine, then WAITFOR, then Text) lives in
//! the VM; this module only answers "which triggers match this unit".

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Text,
    TextLine,
    TextOut,
    Delay,
    Event,
    Auto,
    AutoText,
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub id: String,
    pub kind: TriggerKind,
    /// Handler label; empty means "response only".
    pub label: String,
    pub pattern: String,
    /// Sent through the VM's send handler before the label runs.
    pub response: String,
    /// -1 permanent, 1 one-shot, otherwise a countdown.
    pub lifecycle: i32,
    pub active: bool,
    pub duration: Duration,
    pub started_at: Option<Instant>,
    pub event_name: String,
}

impl Trigger {
    pub fn new(id: &str, kind: TriggerKind, label: &str, pattern: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            label: label.to_string(),
            pattern: pattern.to_string(),
            response: String::new(),
            lifecycle: -1,
            active: true,
            duration: Duration::ZERO,
            started_at: None,
            event_name: String::new(),
        }
    }

    pub fn one_shot(mut self) -> Self {
        self.lifecycle = 1;
        self
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    pub fn delay(id: &str, label: &str, duration: Duration, now: Instant) -> Self {
        let mut t = Self::new(id, TriggerKind::Delay, label, "");
        t.duration = duration;
        t.started_at = Some(now);
        t.lifecycle = 1;
        t
    }

    pub fn event(id: &str, label: &str, event_name: &str) -> Self {
        let mut t = Self::new(id, TriggerKind::Event, label, "");
        t.event_name = event_name.to_string();
        t.lifecycle = 1;
        t
    }
}

/// What the VM needs to run a fired trigger.
#[derive(Debug, Clone)]
pub struct FiredTrigger {
    pub id: String,
    pub label: String,
    pub response: String,
}

#[derive(Debug, Default)]
pub struct TriggerSet {
    triggers: BTreeMap<String, Trigger>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any trigger with the same id.
    pub fn add(&mut self, trigger: Trigger) {
        self.triggers.insert(trigger.id.clone(), trigger);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.triggers.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Trigger> {
        self.triggers.get(id)
    }

    /// TextLine triggers matching a complete line: pattern is a line prefix.
    pub fn match_text_line(&self, line: &str) -> Vec<String> {
        self.matching(|t| t.kind == TriggerKind::TextLine && line.starts_with(&t.pattern))
    }

    /// Text triggers: pattern occurs anywhere in the unit.
    pub fn match_text(&self, unit: &str) -> Vec<String> {
        self.matching(|t| {
            matches!(t.kind, TriggerKind::Text | TriggerKind::AutoText) && unit.contains(&t.pattern)
        })
    }

    pub fn match_text_out(&self, text: &str) -> Vec<String> {
        self.matching(|t| t.kind == TriggerKind::TextOut && text.contains(&t.pattern))
    }

    pub fn match_event(&self, event: &str) -> Vec<String> {
        self.matching(|t| {
            t.kind == TriggerKind::Event && t.event_name.eq_ignore_ascii_case(event)
        })
    }

    /// Delay triggers whose duration has elapsed at `now`.
    pub fn expired_delays(&self, now: Instant) -> Vec<String> {
        self.matching(|t| {
            t.kind == TriggerKind::Delay
                && t.started_at
                    .is_some_and(|started| now.duration_since(started) >= t.duration)
        })
    }

    fn matching(&self, pred: impl Fn(&Trigger) -> bool) -> Vec<String> {
        self.triggers
            .values()
            .filter(|t| t.active && pred(t))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Apply the lifecycle budget and hand back what the VM needs to execute
    /// the trigger. One-shots are removed before the handler runs; permanent
    /// triggers (-1) never expire; positive counts decrement.
    pub fn consume_fire(&mut self, id: &str) -> Option<FiredTrigger> {
        let trigger = self.triggers.get_mut(id)?;
        let fired = FiredTrigger {
            id: trigger.id.clone(),
            label: trigger.label.clone(),
            response: trigger.response.clone(),
        };
        let expired = match trigger.lifecycle {
            -1 => false,
            n if n > 1 => {
                trigger.lifecycle = n - 1;
                false
            }
            _ => true,
        };
        if expired {
            self.triggers.remove(id);
        }
        Some(fired)
    }
}
