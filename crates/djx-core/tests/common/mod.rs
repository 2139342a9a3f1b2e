use std::path::PathBuf;

use djx_core::{Settings, SettingsBuilder};
use tempfile::TempDir;

/// A throwaway djx home with a small text dataset in it.
pub struct Workspace {
    // Held so the directory outlives the test
    pub temp_dir: TempDir,
    pub settings: Settings,
    pub dataset: PathBuf,
}

impl Workspace {
    pub fn dataset_path(&self) -> String {
        self.dataset.display().to_string()
    }

    pub fn export_path(&self) -> String {
        self.temp_dir.path().join("out.jsonl").display().to_string()
    }
}

/// Creates a workspace whose engine is `engine` (a command line), or the
/// default engine when `None`.
pub fn workspace(engine: Option<&str>) -> Workspace {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dataset = temp_dir.path().join("corpus.jsonl");
    std::fs::write(
        &dataset,
        "{\"text\": \"<p>Hello   world</p>\"}\n{\"text\": \"second row\"}\n",
    )
    .expect("Failed to write dataset");
    let settings = SettingsBuilder::new()
        .with_home(Some(temp_dir.path().join("home")))
        .with_engine(engine)
        .build()
        .expect("Failed to build settings");
    Workspace {
        temp_dir,
        settings,
        dataset,
    }
}
