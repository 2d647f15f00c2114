use std::path::{Path, PathBuf};

pub const LEO_DIR: &str = ".leo";
pub const CONFIG_FILE: &str = ".leo/config.yaml";
pub const QUEUE_DB_FILE: &str = ".leo/queues.redb";

pub fn leo_dir(root: &Path) -> PathBuf {
    root.join(LEO_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn queue_db_path(root: &Path) -> PathBuf {
    root.join(QUEUE_DB_FILE)
}
