use anyhow::{Context, Result};

use crate::config::Config;

/// Create the storage directories. Existing ones are left untouched.
pub fn run_init(config: &Config) -> Result<()> {
    let storage = &config.storage;
    for dir in [
        storage.raw_dir(),
        storage.series_dir(),
        storage.reports_dir(),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        log::debug!("ensured {}", dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::for_root(tmp.path());
        run_init(&cfg).unwrap();
        std::fs::write(tmp.path().join("raw/2021-03-01.csv"), "repo\n").unwrap();
        run_init(&cfg).unwrap();

        assert!(tmp.path().join("repos").is_dir());
        assert!(tmp.path().join("analytics").is_dir());
        assert!(tmp.path().join("raw/2021-03-01.csv").exists());
    }
}
