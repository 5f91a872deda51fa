/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD) and
/// falls back to defaults when the file or a key is missing. The
/// simulation core never sees this type: the frame loop unpacks it into
/// plain `start` parameters.
///
/// The high score lives in its own small file next to the config; only
/// this collaborator touches the filesystem.

use serde::Deserialize;
use std::path::PathBuf;

use crate::sim::world::MAX_INITIAL_CRANES;

const HIGH_SCORE_FILE: &str = "cratefall_hiscore";

// ── Public config struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Cranes at game start, clamped to 1..=MAX_INITIAL_CRANES.
    pub cranes: u8,
    /// Hand-authored layout index; `None` rolls a random field.
    pub layout: Option<usize>,
    pub sound: bool,
}

// ── TOML schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    game: TomlGame,
    #[serde(default)]
    sound: TomlSound,
}

#[derive(Deserialize, Debug)]
struct TomlGame {
    #[serde(default = "default_cranes")]
    cranes: u8,
    /// Negative or missing = random layout.
    #[serde(default = "default_layout")]
    layout: i32,
}

#[derive(Deserialize, Debug)]
struct TomlSound {
    #[serde(default = "default_sound_enabled")]
    enabled: bool,
}

fn default_cranes() -> u8 {
    1
}
fn default_layout() -> i32 {
    -1
}
fn default_sound_enabled() -> bool {
    true
}

impl Default for TomlGame {
    fn default() -> Self {
        TomlGame {
            cranes: default_cranes(),
            layout: default_layout(),
        }
    }
}

impl Default for TomlSound {
    fn default() -> Self {
        TomlSound {
            enabled: default_sound_enabled(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`, searching the exe directory first,
    /// then the working directory. Parse errors warn and fall back.
    pub fn load() -> Self {
        let toml_cfg = load_toml(&candidate_dirs());

        GameConfig {
            cranes: toml_cfg.game.cranes.clamp(1, MAX_INITIAL_CRANES),
            layout: usize::try_from(toml_cfg.game.layout).ok(),
            sound: toml_cfg.sound.enabled,
        }
    }
}

/// Directories to search: exe dir, then CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }
    dirs
}

fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    eprintln!("Warning: config.toml parse error: {e}");
                    eprintln!("Using default settings.");
                    return TomlConfig::default();
                }
            },
            Err(e) => {
                eprintln!("Warning: could not read {}: {e}", path.display());
            }
        }
    }
    TomlConfig::default()
}

// ── High score ──

/// Best score seen on this machine; 0 when none is recorded.
pub fn load_high_score() -> u32 {
    for dir in candidate_dirs() {
        let path = dir.join(HIGH_SCORE_FILE);
        if let Ok(text) = std::fs::read_to_string(&path) {
            if let Ok(score) = text.trim().parse() {
                return score;
            }
        }
    }
    0
}

/// Persist a new high score next to the config. Failures are silent;
/// losing a high score is not worth interrupting the game over.
pub fn save_high_score(score: u32) {
    for dir in candidate_dirs() {
        if std::fs::write(dir.join(HIGH_SCORE_FILE), format!("{score}\n")).is_ok() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.game.cranes, 1);
        assert_eq!(cfg.game.layout, -1);
        assert!(cfg.sound.enabled);
    }

    #[test]
    fn partial_config_parses() {
        let cfg: TomlConfig = toml::from_str(
            "[game]\ncranes = 3\n\n[sound]\nenabled = false\n",
        )
        .unwrap();
        assert_eq!(cfg.game.cranes, 3);
        assert_eq!(cfg.game.layout, -1);
        assert!(!cfg.sound.enabled);
    }

    #[test]
    fn negative_layout_means_random() {
        let cfg: TomlConfig = toml::from_str("[game]\nlayout = -1\n").unwrap();
        assert!(usize::try_from(cfg.game.layout).is_err());
        let cfg: TomlConfig = toml::from_str("[game]\nlayout = 2\n").unwrap();
        assert_eq!(usize::try_from(cfg.game.layout).ok(), Some(2));
    }
}
