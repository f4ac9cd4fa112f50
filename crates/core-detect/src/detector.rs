//! The session state machine.
//!
//! State lives in an `ArcSwap` snapshot: every mutation clones the current
//! state, edits the copy, and swaps it in whole, so readers on other threads
//! always observe a consistent phase/selection pair.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use core_vm::AnsiStripper;
use regex::Regex;
use tracing::{debug, info};

use crate::dbname::database_name;
use crate::matcher::PatternCursor;

const RECENT_CONTENT_CAP: usize = 500;
const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);
const UNKNOWN_GAME: &str = "Unknown Game";

const MENU_BANNER: &str = "Select a game :";
const LOG_PROMPT: &str = "Show today's log?";

const EXIT_PATTERNS: &[&str] = &[
    "Goodbye",
    "Connection terminated",
    "Disconnected",
    "session has been terminated",
    "CRITICAL INACTIVITY:",
    "...Now leaving Trade Wars",
];

const SERVER_BANNERS: &[&str] = &["TWGS v", "TradeWars Game Server"];

/// Phrases that mean the server is asking the user to pick something.
const PROMPT_PHRASES: &[&str] = &[
    "choice:",
    "selection:",
    "enter",
    "your choice",
    "please enter",
    "select a game",
];

/// Markers that classify a server-banner sighting as in-game content (a
/// player reading `V`ersion screens and similar), which must not end the
/// session.
const IN_GAME_MARKERS: &[&str] = &[
    "ver#",
    "running under",
    "stats for",
    "command [",
    "configuration",
    "sectors",
    "planets",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    MenuVisible,
    Selected,
    Active,
}

/// One immutable snapshot of the detector.
#[derive(Debug, Clone)]
pub struct DetectorState {
    pub phase: Phase,
    pub selected_game: Option<String>,
    pub game_options: BTreeMap<char, String>,
    pub expecting_user_input: bool,
}

impl Default for DetectorState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            selected_game: None,
            game_options: BTreeMap::new(),
            expecting_user_input: false,
        }
    }
}

/// Host-side reactions to session changes.
pub trait DetectorCallbacks: Send + Sync {
    /// Fired exactly once each time a session becomes active.
    fn on_database_loaded(&self, game: &str, db_name: &str) -> anyhow::Result<()>;
    /// Fired with `is_loaded = true` on activation and `false` on every exit
    /// path, before the state clears.
    fn on_database_state_changed(
        &self,
        game: &str,
        host: &str,
        port: u16,
        db_name: &str,
        is_loaded: bool,
    );
}

pub struct GameDetector {
    state: ArcSwap<DetectorState>,
    stripper: Mutex<AnsiStripper>,
    recent: Mutex<String>,
    line_buf: Mutex<String>,
    menu_cursor: Mutex<PatternCursor>,
    log_cursor: Mutex<PatternCursor>,
    exit_cursors: Mutex<Vec<PatternCursor>>,
    banner_cursors: Mutex<Vec<PatternCursor>>,
    option_re: Regex,
    last_activity: Mutex<Instant>,
    inactivity_timeout: Duration,
    callbacks: Arc<dyn DetectorCallbacks>,
    host: String,
    port: u16,
}

impl GameDetector {
    pub fn new(host: &str, port: u16, callbacks: Arc<dyn DetectorCallbacks>) -> Self {
        Self {
            state: ArcSwap::from_pointee(DetectorState::default()),
            stripper: Mutex::new(AnsiStripper::new()),
            recent: Mutex::new(String::new()),
            line_buf: Mutex::new(String::new()),
            menu_cursor: Mutex::new(PatternCursor::new(MENU_BANNER)),
            log_cursor: Mutex::new(PatternCursor::new(LOG_PROMPT)),
            exit_cursors: Mutex::new(EXIT_PATTERNS.iter().map(|p| PatternCursor::new(p)).collect()),
            banner_cursors: Mutex::new(
                SERVER_BANNERS.iter().map(|p| PatternCursor::new(p)).collect(),
            ),
            option_re: Regex::new(r"^\s*<([A-Za-z0-9])>\s+(.+?)\s*$").expect("option pattern"),
            last_activity: Mutex::new(Instant::now()),
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            callbacks,
            host: host.to_string(),
            port,
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Current snapshot; cheap to call from any thread.
    pub fn snapshot(&self) -> Arc<DetectorState> {
        self.state.load_full()
    }

    fn swap_state(&self, edit: impl FnOnce(&mut DetectorState)) {
        let mut next = (*self.state.load_full()).clone();
        edit(&mut next);
        self.state.store(Arc::new(next));
    }

    /// Feed one raw chunk from the server.
    pub fn process_chunk(&self, raw: &str) {
        let stripped = self.stripper.lock().unwrap().push(raw);
        if stripped.is_empty() {
            return;
        }
        *self.last_activity.lock().unwrap() = Instant::now();
        for ch in stripped.chars() {
            self.feed_char(ch);
        }
    }

    fn feed_char(&self, ch: char) {
        let phase = self.snapshot().phase;

        if self.menu_cursor.lock().unwrap().feed(ch) {
            self.on_menu_banner();
        }
        if self.log_cursor.lock().unwrap().feed(ch) && self.snapshot().phase == Phase::Selected {
            self.activate();
        }
        let exit_hit = self
            .exit_cursors
            .lock()
            .unwrap()
            .iter_mut()
            .any(|c| c.feed(ch));
        if exit_hit && matches!(phase, Phase::Active | Phase::Selected) {
            self.deactivate("exit pattern");
        }
        let banner_hit = self
            .banner_cursors
            .lock()
            .unwrap()
            .iter_mut()
            .any(|c| c.feed(ch));
        if banner_hit && phase == Phase::Active && !self.looks_like_in_game_content() {
            self.deactivate("server banner outside game content");
        }

        // Menu-option selection by an isolated letter.
        if self.snapshot().phase == Phase::MenuVisible {
            let key = ch.to_ascii_uppercase();
            if ch.is_ascii_alphanumeric() && self.snapshot().game_options.contains_key(&key) {
                let recent = self.recent.lock().unwrap().clone();
                if validate_isolated_letter(&recent) {
                    self.select_game(key);
                }
            }
        }

        self.push_recent(ch);

        if ch == '\n' {
            let line = std::mem::take(&mut *self.line_buf.lock().unwrap());
            self.on_complete_line(line.trim_end_matches('\r'));
        } else {
            self.line_buf.lock().unwrap().push(ch);
        }
    }

    fn push_recent(&self, ch: char) {
        let mut recent = self.recent.lock().unwrap();
        recent.push(ch);
        if recent.len() > RECENT_CONTENT_CAP {
            let cut = recent.len() - RECENT_CONTENT_CAP;
            let boundary = (cut..recent.len())
                .find(|i| recent.is_char_boundary(*i))
                .unwrap_or(0);
            recent.drain(..boundary);
        }
    }

    fn on_complete_line(&self, line: &str) {
        if let Some(caps) = self.option_re.captures(line) {
            let letter = caps[1].chars().next().unwrap().to_ascii_uppercase();
            let name = caps[2].to_string();
            debug!(target: "detect", letter = %letter, game = %name, "menu option");
            self.swap_state(|s| {
                if matches!(s.phase, Phase::Idle | Phase::MenuVisible) {
                    s.phase = Phase::MenuVisible;
                    s.game_options.insert(letter, name.clone());
                }
            });
        }
    }

    fn on_menu_banner(&self) {
        debug!(target: "detect", "game selection menu");
        self.swap_state(|s| {
            if s.phase == Phase::Idle || s.phase == Phase::MenuVisible {
                s.phase = Phase::MenuVisible;
                s.expecting_user_input = true;
            }
        });
    }

    fn select_game(&self, letter: char) {
        let name = match self.snapshot().game_options.get(&letter) {
            Some(name) => name.clone(),
            None => return,
        };
        info!(target: "detect", game = %name, "game selected");
        self.swap_state(|s| {
            s.phase = Phase::Selected;
            s.selected_game = Some(name.clone());
            s.expecting_user_input = false;
        });
    }

    fn activate(&self) {
        let snapshot = self.snapshot();
        let game = snapshot
            .selected_game
            .clone()
            .unwrap_or_else(|| UNKNOWN_GAME.to_string());
        let db = database_name(&self.host, self.port, &game);
        info!(target: "detect", game = %game, db = %db, "session active");
        self.swap_state(|s| s.phase = Phase::Active);
        self.callbacks
            .on_database_state_changed(&game, &self.host, self.port, &db, true);
        if let Err(e) = self.callbacks.on_database_loaded(&game, &db) {
            tracing::warn!(target: "detect", error = %e, "database load callback failed");
        }
    }

    fn deactivate(&self, reason: &str) {
        let snapshot = self.snapshot();
        let game = snapshot
            .selected_game
            .clone()
            .unwrap_or_else(|| UNKNOWN_GAME.to_string());
        let db = database_name(&self.host, self.port, &game);
        info!(target: "detect", game = %game, reason, "session ended");
        self.callbacks
            .on_database_state_changed(&game, &self.host, self.port, &db, false);
        self.swap_state(|s| *s = DetectorState::default());
    }

    fn looks_like_in_game_content(&self) -> bool {
        let recent = self.recent.lock().unwrap().to_lowercase();
        IN_GAME_MARKERS.iter().any(|m| recent.contains(m))
    }

    /// Inactivity watchdog; the host calls this on its periodic tick.
    pub fn check_timeout(&self, now: Instant) {
        let idle_for = now.duration_since(*self.last_activity.lock().unwrap());
        if idle_for > self.inactivity_timeout && self.snapshot().phase != Phase::Idle {
            self.deactivate("inactivity timeout");
        }
    }
}

/// Context check for a lone option letter: it must follow a prompt, not sit
/// inside an `<X>` option listing.
fn validate_isolated_letter(recent: &str) -> bool {
    let prev_non_space = recent.trim_end_matches(' ').chars().last();
    if prev_non_space == Some('<') {
        return false;
    }
    let lower = recent.to_lowercase();
    if !PROMPT_PHRASES.iter().any(|p| lower.contains(p)) {
        return false;
    }
    match recent.chars().last() {
        None => true,
        Some(':') | Some('\n') | Some('\r') => true,
        Some(' ') => {
            let tail: String = {
                let chars: Vec<char> = lower.chars().collect();
                let start = chars.len().saturating_sub(10);
                chars[start..].iter().collect()
            };
            PROMPT_PHRASES.iter().any(|p| tail.contains(p))
        }
        _ => false,
    }
}
