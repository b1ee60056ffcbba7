//! Viewer Configuration
//!
//! Configuration can be loaded from:
//! - Default values
//! - Config file (~/.config/unyo/config.toml)
//! - Command line overrides (see `main.rs`)

use crate::error::ConfigError;
use crate::graph::SnapshotFormat;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optimization switch of the engine
pub const OPTIMIZE_FLAG: &str = "-O";
/// Suppresses rule text in engine output
pub const HIDE_RULE_FLAG: &str = "--hide-rule";
/// Suppresses ruleset text in engine output
pub const HIDE_RULESET_FLAG: &str = "--hide-ruleset";
/// Makes the engine print one JSON snapshot per rewriting step
pub const STEP_DUMP_FLAG: &str = "--dump-json";
/// Install root searched when the engine is not on PATH
pub const LMNTAL_HOME_VAR: &str = "LMNTAL_HOME";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnyoConfig {
    /// External engine invocation
    pub engine: EngineConfig,

    /// Force layout parameters
    pub layout: LayoutConfig,

    /// Window and canvas settings
    pub window: WindowConfig,
}

/// How the external rewriting engine is launched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable, looked up on PATH, then under `$LMNTAL_HOME/installed/bin`
    pub binary: PathBuf,

    /// Flags placed before the program path
    pub flags: Vec<String>,

    /// Additional arguments after the flags
    pub extra_args: Vec<String>,

    /// Interval between keep-alive writes to the engine's stdin
    pub keepalive_ms: u64,

    /// Shape of the snapshot lines the engine prints
    pub format: SnapshotFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("slim"),
            flags: Self::default_flags(),
            extra_args: Vec::new(),
            keepalive_ms: 10,
            format: SnapshotFormat::Auto,
        }
    }
}

impl EngineConfig {
    /// Optimization on, rule display off, one JSON dump per step
    pub fn default_flags() -> Vec<String> {
        [OPTIMIZE_FLAG, HIDE_RULE_FLAG, HIDE_RULESET_FLAG, STEP_DUMP_FLAG]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Full argument list for one program
    pub fn args_for(&self, program: &Path) -> Vec<String> {
        self.flags
            .iter()
            .chain(self.extra_args.iter())
            .cloned()
            .chain(std::iter::once(program.display().to_string()))
            .collect()
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms.max(1))
    }

    /// Locate the engine executable
    pub fn resolve_binary(&self) -> io::Result<PathBuf> {
        let home = std::env::var_os(LMNTAL_HOME_VAR).map(PathBuf::from);
        self.resolve_binary_in(home.as_deref())
    }

    /// Locate the engine on PATH, falling back to `<lmntal_home>/installed/bin`
    pub fn resolve_binary_in(&self, lmntal_home: Option<&Path>) -> io::Result<PathBuf> {
        let not_found = match which::which(&self.binary) {
            Ok(path) => return Ok(path),
            Err(e) => e,
        };

        // Only bare names are looked up under the install root
        if let (Some(home), Some(name)) = (lmntal_home, self.bare_name()) {
            let candidate = home.join("installed").join("bin").join(name);
            if candidate.is_file() {
                log::debug!("Using engine from {}: {}", LMNTAL_HOME_VAR, candidate.display());
                return Ok(candidate);
            }
        }

        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{}: {}", self.binary.display(), not_found),
        ))
    }

    fn bare_name(&self) -> Option<&Path> {
        let mut components = self.binary.components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Some(&self.binary),
            _ => None,
        }
    }
}

/// Force layout parameters used by the mover
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Repulsion strength between every pair of nodes
    pub repulsion: f32,
    /// Rest length of an edge spring
    pub spring_length: f32,
    /// Spring stiffness
    pub spring_strength: f32,
    /// Pull toward the canvas center (0 disables)
    pub centering: f32,
    /// Velocity damping per tick
    pub damping: f32,
    /// Upper bound on per-tick movement
    pub max_speed: f32,
    /// Distances below this are clamped when computing repulsion
    pub min_distance: f32,
    /// Radius of the random offset given to newly created nodes
    pub spawn_jitter: f32,
    /// Mover period
    pub tick_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            repulsion: 2000.0,
            spring_length: 80.0,
            spring_strength: 0.05,
            centering: 0.01,
            damping: 0.6,
            max_speed: 20.0,
            min_distance: 10.0,
            spawn_jitter: 40.0,
            tick_ms: 10,
        }
    }
}

impl LayoutConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Window and canvas settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    /// Radius of a drawn node
    pub node_radius: f32,
    /// Extension offered by the file dialog
    pub file_extension: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        // Two thirds of a 1920x1200 screen
        Self {
            width: 1280.0,
            height: 800.0,
            node_radius: 14.0,
            file_extension: "lmn".to_string(),
        }
    }
}

impl UnyoConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("unyo/config.toml"))
            .unwrap_or_else(|| PathBuf::from("unyo.toml"))
    }

    /// Load configuration from a file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from `path` (or the default location), falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Failed to load {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path())
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
