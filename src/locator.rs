//! # Executable locator.
//!
//! Turns settings plus an [`Environment`] snapshot into the single [`Executable`]
//! the connection launches. Resolution order, first match wins:
//!
//! ```text
//! 1. settings.serverPath (trimmed, non-empty)          → ExecutableSource::Settings
//! 2. $L_LSP_SERVER_PATH  (trimmed, non-empty)          → ExecutableSource::EnvVar
//! 3. <root>/target/debug/l-lsp                          ┐
//!    <root>/target/release/l-lsp                        │ first existing file
//!    <root>/../target/debug/l-lsp                       │ → ExecutableSource::Candidate
//!    <root>/../target/release/l-lsp                     ┘
//! 4. "l-lsp" looked up on PATH at spawn time            → ExecutableSource::Fallback
//! ```
//!
//! Resolution never fails. A missing server surfaces later, as a launch fault
//! of the connection.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::LocatorConfig;
use crate::settings::Settings;

/// Build layouts probed relative to the environment root, in order.
const CANDIDATE_DIRS: [&str; 4] = [
    "target/debug",
    "target/release",
    "../target/debug",
    "../target/release",
];

/// Where the resolved command came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutableSource {
    Settings,
    EnvVar,
    Candidate,
    Fallback,
}

/// Process environment captured for resolution and launch.
///
/// `root` anchors the candidate search (normally the directory the host
/// installed the integration into).
#[derive(Clone, Debug)]
pub struct Environment {
    root: PathBuf,
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot of the current process environment anchored at `root`.
    pub fn capture(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            vars: std::env::vars().collect(),
        }
    }

    /// Empty environment anchored at `root`.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            vars: HashMap::new(),
        }
    }

    /// Adds or replaces a variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Candidate search root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Variable value, if set.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// A resolved server command plus its launch options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Executable {
    /// Absolute/relative path or bare command name.
    pub command: PathBuf,
    /// Which resolution step produced `command`.
    pub source: ExecutableSource,
    /// Environment overrides on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory for the process; `None` inherits the host's.
    pub cwd: Option<PathBuf>,
}

impl Executable {
    /// Command as an OS string for display and spawn.
    pub fn program(&self) -> OsString {
        self.command.clone().into_os_string()
    }

    /// Human-readable command.
    pub fn display(&self) -> String {
        self.command.display().to_string()
    }
}

/// Resolves the server executable. See the module docs for the order.
pub fn resolve(settings: &Settings, cfg: &LocatorConfig, env: &Environment) -> Executable {
    let (command, source) = select(settings, cfg, env);
    let command = match source {
        ExecutableSource::Fallback => command,
        _ => normalize(&command),
    };

    match source {
        ExecutableSource::Fallback => tracing::warn!(
            command = %command.display(),
            "no server executable configured or found; falling back to PATH lookup"
        ),
        _ => tracing::info!(command = %command.display(), ?source, "resolved server executable"),
    }

    let env_overrides = cfg
        .log_level
        .as_ref()
        .map(|level| vec![(cfg.log_env.clone(), level.clone())])
        .unwrap_or_default();

    Executable {
        command,
        source,
        env: env_overrides,
        cwd: None,
    }
}

fn select(settings: &Settings, cfg: &LocatorConfig, env: &Environment) -> (PathBuf, ExecutableSource) {
    if let Some(path) = settings.server_path_trimmed() {
        return (PathBuf::from(path), ExecutableSource::Settings);
    }

    if let Some(path) = env.var(&cfg.path_env).map(str::trim).filter(|p| !p.is_empty()) {
        return (PathBuf::from(path), ExecutableSource::EnvVar);
    }

    let file_name = format!("{}{}", cfg.binary_name, std::env::consts::EXE_SUFFIX);
    for dir in CANDIDATE_DIRS {
        let candidate = env.root().join(dir).join(&file_name);
        if candidate.is_file() {
            return (candidate, ExecutableSource::Candidate);
        }
    }

    (PathBuf::from(&cfg.binary_name), ExecutableSource::Fallback)
}

/// Lexically folds `.` and `..` and rebuilds the path with platform separators.
///
/// Leading `..` of a relative path are kept; `..` never climbs above a root.
/// A path that folds down to a bare file name keeps a leading `.`, so it
/// still names that file instead of a `PATH` lookup.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    if let [Component::Normal(_)] = out.as_slice() {
        if path.components().count() > 1 {
            out.insert(0, Component::CurDir);
        }
    }
    out.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const EXE: &str = std::env::consts::EXE_SUFFIX;

    fn touch(root: &Path, dir: &str) -> PathBuf {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join(format!("l-lsp{EXE}"));
        fs::write(&file, b"").unwrap();
        file
    }

    /// Layout: <tmp>/ext is the root, <tmp>/target is the parent workspace.
    fn workspace() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ext");
        fs::create_dir_all(&root).unwrap();
        (tmp, root)
    }

    #[test]
    fn test_precedence_grid() {
        let cfg = LocatorConfig::default();
        for explicit in [false, true] {
            for env_set in [false, true] {
                for candidate in [false, true] {
                    let (_tmp, root) = workspace();
                    let mut settings = Settings::default();
                    if explicit {
                        settings.server_path = "/opt/explicit/l-lsp".into();
                    }
                    let mut env = Environment::empty(&root);
                    if env_set {
                        env = env.with_var("L_LSP_SERVER_PATH", "/opt/env/l-lsp");
                    }
                    let built = candidate.then(|| touch(&root, "target/release"));

                    let exe = resolve(&settings, &cfg, &env);
                    let expected = if explicit {
                        ExecutableSource::Settings
                    } else if env_set {
                        ExecutableSource::EnvVar
                    } else if candidate {
                        ExecutableSource::Candidate
                    } else {
                        ExecutableSource::Fallback
                    };
                    assert_eq!(
                        exe.source, expected,
                        "explicit={explicit} env={env_set} candidate={candidate}"
                    );
                    match expected {
                        ExecutableSource::Settings => {
                            assert_eq!(exe.command, normalize(Path::new("/opt/explicit/l-lsp")))
                        }
                        ExecutableSource::EnvVar => {
                            assert_eq!(exe.command, normalize(Path::new("/opt/env/l-lsp")))
                        }
                        ExecutableSource::Candidate => {
                            assert_eq!(exe.command, normalize(&built.unwrap()))
                        }
                        ExecutableSource::Fallback => assert_eq!(exe.command, PathBuf::from("l-lsp")),
                    }
                }
            }
        }
    }

    #[test]
    fn test_candidate_order() {
        let (_tmp, root) = workspace();
        let cfg = LocatorConfig::default();
        let env = Environment::empty(&root);

        let parent_release = touch(&root, "../target/release");
        assert_eq!(resolve(&Settings::default(), &cfg, &env).command, normalize(&parent_release));

        let parent_debug = touch(&root, "../target/debug");
        assert_eq!(resolve(&Settings::default(), &cfg, &env).command, normalize(&parent_debug));

        let release = touch(&root, "target/release");
        assert_eq!(resolve(&Settings::default(), &cfg, &env).command, normalize(&release));

        let debug = touch(&root, "target/debug");
        assert_eq!(resolve(&Settings::default(), &cfg, &env).command, normalize(&debug));
    }

    #[test]
    fn test_directory_named_like_binary_is_not_a_candidate() {
        let (_tmp, root) = workspace();
        fs::create_dir_all(root.join("target/debug").join(format!("l-lsp{EXE}"))).unwrap();
        let exe = resolve(&Settings::default(), &LocatorConfig::default(), &Environment::empty(&root));
        assert_eq!(exe.source, ExecutableSource::Fallback);
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let (_tmp, root) = workspace();
        let settings = Settings {
            server_path: "  ".into(),
            ..Settings::default()
        };
        let env = Environment::empty(&root).with_var("L_LSP_SERVER_PATH", " ");
        let exe = resolve(&settings, &LocatorConfig::default(), &env);
        assert_eq!(exe.source, ExecutableSource::Fallback);
    }

    #[test]
    fn test_log_level_override() {
        let (_tmp, root) = workspace();
        let cfg = LocatorConfig {
            log_level: Some("debug".into()),
            ..LocatorConfig::default()
        };
        let exe = resolve(&Settings::default(), &cfg, &Environment::empty(&root));
        assert_eq!(exe.env, vec![("RUST_LOG".to_string(), "debug".to_string())]);

        let exe = resolve(&Settings::default(), &LocatorConfig::default(), &Environment::empty(&root));
        assert!(exe.env.is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("../x/../y")), PathBuf::from("../y"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("l-lsp")), PathBuf::from("l-lsp"));
    }

    #[test]
    fn test_relative_path_is_not_turned_into_a_bare_name() {
        assert_eq!(normalize(Path::new("./l-lsp")), Path::new(".").join("l-lsp"));
        assert_eq!(normalize(Path::new("bin/../l-lsp")), Path::new(".").join("l-lsp"));
        assert_eq!(normalize(Path::new("./bin/l-lsp")), Path::new("bin").join("l-lsp"));

        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            server_path: "./l-lsp".into(),
            ..Settings::default()
        };
        let exe = resolve(&settings, &LocatorConfig::default(), &Environment::empty(tmp.path()));
        assert_eq!(exe.source, ExecutableSource::Settings);
        assert_eq!(exe.command, Path::new(".").join("l-lsp"));
    }
}
