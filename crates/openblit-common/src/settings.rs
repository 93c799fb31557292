//! INI configuration loading.
//!
//! The shim reads a plain-text INI file co-located with the host executable
//! and resolves it into an immutable [`Settings`] record at startup. Keys are
//! case-insensitive, values may be quoted, and a section named after the
//! executable basename overrides the base sections key-by-key.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How the presenter maps the game extent onto the window client area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Fill the entire client area, ignoring aspect ratio.
    Stretch,
    /// Largest whole multiple of the game extent, centered.
    Integer,
    /// Preserve the source aspect ratio with black bars.
    Aspect,
}

impl ScalingMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "stretch" | "0" => Some(ScalingMode::Stretch),
            "integer" | "1" => Some(ScalingMode::Integer),
            "aspect" | "2" => Some(ScalingMode::Aspect),
            _ => None,
        }
    }
}

/// Log verbosity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        };
        f.write_str(s)
    }
}

/// Resolved configuration, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // [display]
    pub windowed: bool,
    pub maintain_aspect: bool,
    pub vsync: bool,
    pub nonexclusive: bool,
    pub window_x: i32,
    pub window_y: i32,
    /// Window client width override; 0 means "use the game's request".
    pub width: u32,
    pub height: u32,

    // [scaling]
    pub scaling: ScalingMode,
    pub bilinear: bool,

    // [rendering]
    pub max_fps: i32,
    pub renderer: String,

    // [mouse]
    pub adjust_mouse: bool,
    pub lock_cursor: bool,

    // [compatibility]
    pub no_activate_app: bool,
    pub single_cpu: bool,
    pub fix_pitch: bool,
    pub max_game_ticks: i32,

    // [debug]
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            windowed: false,
            maintain_aspect: true,
            vsync: true,
            nonexclusive: false,
            window_x: -1,
            window_y: -1,
            width: 0,
            height: 0,
            scaling: ScalingMode::Stretch,
            bilinear: true,
            max_fps: 0,
            renderer: "auto".to_string(),
            adjust_mouse: true,
            lock_cursor: false,
            no_activate_app: false,
            single_cpu: false,
            fix_pitch: true,
            max_game_ticks: 0,
            debug: false,
            log_file: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Settings {
    /// Load from an INI file. A missing or unreadable file yields defaults.
    pub fn load(path: &Path, exe_basename: &str) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "loading configuration");
                Settings::parse(&text, exe_basename)
            }
            Err(_) => {
                info!(path = %path.display(), "config file not found, using defaults");
                Settings::default()
            }
        }
    }

    /// Parse INI text and resolve it against an executable basename.
    pub fn parse(text: &str, exe_basename: &str) -> Settings {
        let doc = IniDoc::parse(text);
        let mut settings = Settings::default();

        // Base sections first, then the per-executable override section.
        let exe = exe_basename.to_ascii_lowercase();
        settings.apply(&doc, SectionSet::Base);
        settings.apply(&doc, SectionSet::Exe(&exe));
        settings.validate();
        settings
    }

    fn apply(&mut self, doc: &IniDoc, scope: SectionSet<'_>) {
        let get = |section: &[&str], key: &[&str]| -> Option<String> {
            match scope {
                SectionSet::Base => section
                    .iter()
                    .flat_map(|s| key.iter().map(move |k| (*s, *k)))
                    .find_map(|(s, k)| doc.get(s, k)),
                SectionSet::Exe(exe) => key.iter().find_map(|k| doc.get(exe, k)),
            }
        };

        let bools: &mut [(&[&str], &[&str], &mut bool)] = &mut [
            (&["display", "ddraw"], &["windowed"], &mut self.windowed),
            (
                &["display", "ddraw"],
                &["maintas", "maintainaspectratio"],
                &mut self.maintain_aspect,
            ),
            (&["display", "ddraw"], &["vsync"], &mut self.vsync),
            (&["display", "ddraw"], &["nonexclusive"], &mut self.nonexclusive),
            (&["scaling"], &["filter", "bilinear"], &mut self.bilinear),
            (&["mouse"], &["adjmouse", "adjust"], &mut self.adjust_mouse),
            (&["mouse"], &["lockcursor", "lock"], &mut self.lock_cursor),
            (
                &["compatibility", "compat"],
                &["noactivateapp"],
                &mut self.no_activate_app,
            ),
            (&["compatibility", "compat"], &["singlecpu"], &mut self.single_cpu),
            (&["compatibility", "compat"], &["fixpitch"], &mut self.fix_pitch),
            (&["debug"], &["enabled", "debug"], &mut self.debug),
        ];
        for (sections, keys, slot) in bools.iter_mut() {
            if let Some(v) = get(*sections, *keys) {
                **slot = parse_bool(&v);
            }
        }

        let ints: &mut [(&[&str], &[&str], &mut i32)] = &mut [
            (&["display", "ddraw"], &["posx", "windowx"], &mut self.window_x),
            (&["display", "ddraw"], &["posy", "windowy"], &mut self.window_y),
            (
                &["rendering", "renderer"],
                &["maxfps", "fpslimit"],
                &mut self.max_fps,
            ),
            (
                &["compatibility", "compat"],
                &["maxgameticks"],
                &mut self.max_game_ticks,
            ),
        ];
        for (sections, keys, slot) in ints.iter_mut() {
            if let Some(v) = get(*sections, *keys) {
                **slot = v.parse().unwrap_or(**slot);
            }
        }

        if let Some(v) = get(&["display", "ddraw"], &["width"]) {
            self.width = v.parse().unwrap_or(self.width);
        }
        if let Some(v) = get(&["display", "ddraw"], &["height"]) {
            self.height = v.parse().unwrap_or(self.height);
        }
        if let Some(v) = get(&["scaling"], &["mode"]) {
            if let Some(mode) = ScalingMode::parse(&v.to_ascii_lowercase()) {
                self.scaling = mode;
            }
        }
        if let Some(v) = get(&["rendering", "renderer"], &["renderer"]) {
            self.renderer = v;
        }
        if let Some(v) = get(&["debug"], &["logfile", "log"]) {
            if !v.is_empty() {
                self.log_file = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = get(&["debug"], &["loglevel"]) {
            if let Ok(level) = v.parse() {
                self.log_level = level;
            }
        }
    }

    /// Clamp out-of-range values and rewrite unknown renderer names.
    fn validate(&mut self) {
        self.width = self.width.min(8192);
        self.height = self.height.min(8192);
        self.max_fps = self.max_fps.clamp(-1, 1000);
        self.max_game_ticks = self.max_game_ticks.clamp(0, 1000);

        let renderer = self.renderer.to_ascii_lowercase();
        match renderer.as_str() {
            "auto" | "gdi" | "opengl" | "d3d9" | "direct3d9" => self.renderer = renderer,
            other => {
                warn!(renderer = other, "unknown renderer, falling back to auto");
                self.renderer = "auto".to_string();
            }
        }
    }
}

#[derive(Clone, Copy)]
enum SectionSet<'a> {
    Base,
    Exe(&'a str),
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// Parsed INI document: lowercased section -> lowercased key -> raw value.
struct IniDoc {
    data: HashMap<String, HashMap<String, String>>,
}

impl IniDoc {
    fn parse(text: &str) -> Self {
        let mut data: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut section = String::new();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                if let Some(end) = rest.find(']') {
                    section = rest[..end].trim().to_ascii_lowercase();
                }
                continue;
            }
            if let Some(eq) = line.find('=') {
                let key = line[..eq].trim().to_ascii_lowercase();
                let value = strip_quotes(line[eq + 1..].trim());
                data.entry(section.clone())
                    .or_default()
                    .insert(key, value.to_string());
            }
        }

        Self { data }
    }

    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.data.get(section)?.get(key).cloned()
    }
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let s = Settings::default();
        assert!(!s.windowed);
        assert!(s.maintain_aspect);
        assert!(s.vsync);
        assert!(s.adjust_mouse);
        assert_eq!(s.renderer, "auto");
        assert_eq!(s.window_x, -1);
    }

    #[test]
    fn exe_section_overrides_base() {
        let ini = "[display]\nwindowed=false\n[game.exe]\nwindowed=true\n";
        let s = Settings::parse(ini, "game.exe");
        assert!(s.windowed);

        // A different executable keeps the base value.
        let s = Settings::parse(ini, "other.exe");
        assert!(!s.windowed);
    }

    #[test]
    fn bool_forms_and_quotes() {
        let ini = "[display]\nwindowed = \"yes\"\nvsync = 'off'\n[mouse]\nadjmouse = 0\n";
        let s = Settings::parse(ini, "game.exe");
        assert!(s.windowed);
        assert!(!s.vsync);
        assert!(!s.adjust_mouse);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let ini = "; comment\n# another\n\n[scaling]\nmode = aspect\nfilter = no\n";
        let s = Settings::parse(ini, "game.exe");
        assert_eq!(s.scaling, ScalingMode::Aspect);
        assert!(!s.bilinear);
    }

    #[test]
    fn scaling_mode_accepts_numbers() {
        let s = Settings::parse("[scaling]\nmode=1\n", "game.exe");
        assert_eq!(s.scaling, ScalingMode::Integer);
    }

    #[test]
    fn ddraw_section_is_display_alias() {
        let s = Settings::parse("[ddraw]\nwindowed=true\nwidth=800\n", "game.exe");
        assert!(s.windowed);
        assert_eq!(s.width, 800);
    }

    #[test]
    fn validation_clamps() {
        let ini = "[display]\nwidth=20000\nheight=9000\n[rendering]\nmaxfps=5000\n[compat]\nmaxgameticks=-5\n";
        let s = Settings::parse(ini, "game.exe");
        assert_eq!(s.width, 8192);
        assert_eq!(s.height, 8192);
        assert_eq!(s.max_fps, 1000);
        assert_eq!(s.max_game_ticks, 0);
    }

    #[test]
    fn negative_maxfps_clamps_to_auto() {
        let s = Settings::parse("[rendering]\nfpslimit=-7\n", "game.exe");
        assert_eq!(s.max_fps, -1);
    }

    #[test]
    fn unknown_renderer_rewritten() {
        let s = Settings::parse("[rendering]\nrenderer=vulkan\n", "game.exe");
        assert_eq!(s.renderer, "auto");

        let s = Settings::parse("[rendering]\nrenderer=OpenGL\n", "game.exe");
        assert_eq!(s.renderer, "opengl");
    }

    #[test]
    fn debug_section_log_settings() {
        let ini = "[debug]\nenabled=true\nlogfile=openblit.log\nloglevel=debug\n";
        let s = Settings::parse(ini, "game.exe");
        assert!(s.debug);
        assert_eq!(s.log_file.as_deref(), Some(Path::new("openblit.log")));
        assert_eq!(s.log_level, LogLevel::Debug);
    }

    #[test]
    fn exe_override_of_int_keys() {
        let ini = "[rendering]\nmaxfps=30\n[game.exe]\nmaxfps=60\n";
        let s = Settings::parse(ini, "GAME.EXE");
        assert_eq!(s.max_fps, 60);
    }
}
