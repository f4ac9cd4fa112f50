//! Game-session detection over the raw server stream.
//!
//! A streaming state machine watches the ANSI-stripped output for the game
//! selection menu, the player's choice, and the session start/end markers,
//! and tells the host when to load or drop the per-game database.

mod dbname;
mod detector;
mod matcher;

pub use dbname::{database_name, sanitize};
pub use detector::{DetectorCallbacks, DetectorState, GameDetector, Phase};
pub use matcher::PatternCursor;
