//! Workspace settings and the builder that resolves them.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::{DjxError, IoResultExt, Result},
    executor::{ExecutorConfig, DEFAULT_ENGINE},
    trace_store::DEFAULT_APPEND_TIMEOUT,
};

/// Default engine timeout for one run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolved settings for one djx workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the trace log, catalog, recipes and reports
    pub home: PathBuf,
    pub engine_program: String,
    pub engine_args: Vec<String>,
    pub timeout: Duration,
    pub append_timeout: Duration,
}

impl Settings {
    pub fn trace_log_path(&self) -> PathBuf {
        self.home.join("runs.jsonl")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.home.join("catalog.db")
    }

    pub fn recipe_dir(&self) -> PathBuf {
        self.home.join("recipes")
    }

    pub fn eval_recipe_dir(&self) -> PathBuf {
        self.home.join("eval_recipes")
    }

    pub fn eval_report_path(&self) -> PathBuf {
        self.home.join("eval_report.json")
    }

    pub fn eval_errors_path(&self) -> PathBuf {
        self.home.join("eval_errors.json")
    }

    pub fn eval_history_path(&self) -> PathBuf {
        self.home.join("eval_history.jsonl")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.home.join("plans")
    }

    /// Where `plan_id` is written as a YAML document.
    pub fn plan_file(&self, plan_id: &str) -> PathBuf {
        self.plans_dir().join(format!("{plan_id}.yaml"))
    }

    /// Executor configuration writing recipes to `recipe_dir`.
    pub fn executor_config(&self, recipe_dir: impl Into<PathBuf>) -> ExecutorConfig {
        ExecutorConfig::new(recipe_dir).with_engine(self.engine_program.clone(), self.engine_args.clone())
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    home: Option<PathBuf>,
    engine: Option<(String, Vec<String>)>,
    timeout: Option<Duration>,
    append_timeout: Option<Duration>,
}

impl SettingsBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the workspace home directory.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/djx` or `~/.local/share/djx`
    pub fn with_home<P: AsRef<Path>>(mut self, home: Option<P>) -> Self {
        if let Some(home) = home {
            self.home = Some(home.as_ref().to_path_buf());
        }
        self
    }

    /// Sets the engine command from a whitespace-separated command line,
    /// e.g. `"python -m data_juicer.tools.process_data"`.
    pub fn with_engine(mut self, command_line: Option<&str>) -> Self {
        if let Some(line) = command_line {
            let mut parts = line.split_whitespace().map(String::from);
            if let Some(program) = parts.next() {
                self.engine = Some((program, parts.collect()));
            }
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }

    pub fn with_append_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.append_timeout = timeout;
        }
        self
    }

    /// Resolves the settings and creates the home directory.
    ///
    /// # Errors
    ///
    /// Returns `DjxError::XdgDirectory` if no home was given and the XDG
    /// data directory cannot be determined
    /// Returns `DjxError::FileSystem` if the home directory cannot be created
    /// Returns `DjxError::Configuration` for a zero timeout
    pub fn build(self) -> Result<Settings> {
        let home = match self.home {
            Some(home) => home,
            None => Self::default_home()?,
        };
        std::fs::create_dir_all(&home).fs_context(&home)?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let append_timeout = self.append_timeout.unwrap_or(DEFAULT_APPEND_TIMEOUT);
        if timeout.is_zero() || append_timeout.is_zero() {
            return Err(DjxError::Configuration {
                message: "timeouts must be greater than zero".to_string(),
            });
        }

        let (engine_program, engine_args) = self
            .engine
            .unwrap_or_else(|| (DEFAULT_ENGINE.to_string(), Vec::new()));

        Ok(Settings {
            home,
            engine_program,
            engine_args,
            timeout,
            append_timeout,
        })
    }

    /// Returns the default home following XDG Base Directory specification.
    fn default_home() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("djx")
            .place_data_file("runs.jsonl")
            .map_err(|e| DjxError::XdgDirectory(e.to_string()))?
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| DjxError::XdgDirectory("data directory has no parent".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_explicit_home_and_derived_paths() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("djx-home");
        let settings = SettingsBuilder::new().with_home(Some(&home)).build().unwrap();

        assert!(home.is_dir());
        assert_eq!(settings.trace_log_path(), home.join("runs.jsonl"));
        assert_eq!(settings.catalog_path(), home.join("catalog.db"));
        assert_eq!(settings.plan_file("plan_a"), home.join("plans/plan_a.yaml"));
        assert_eq!(settings.engine_program, DEFAULT_ENGINE);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_engine_command_line_is_split() {
        let temp_dir = TempDir::new().unwrap();
        let settings = SettingsBuilder::new()
            .with_home(Some(temp_dir.path()))
            .with_engine(Some("python -m data_juicer.tools.process_data"))
            .build()
            .unwrap();
        assert_eq!(settings.engine_program, "python");
        assert_eq!(settings.engine_args, ["-m", "data_juicer.tools.process_data"]);

        let config = settings.executor_config(settings.recipe_dir());
        assert_eq!(config.engine_program, "python");
        assert_eq!(config.recipe_dir, temp_dir.path().join("recipes"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = SettingsBuilder::new()
            .with_home(Some(temp_dir.path()))
            .with_timeout(Some(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(matches!(err, DjxError::Configuration { .. }));
    }
}
