pub mod config;
pub mod link;
pub mod send;
pub mod snapshot;

use std::path::PathBuf;

use clap::Args;
use lander_core::{
    AttributionSnapshot, AttributionStore, FileStorage, MemoryStorage, PageContext, RuntimeConfig,
};

/// Page load inputs shared by commands that compute attribution
#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Landing page URL, including query and fragment
    pub url: String,

    /// Document referrer
    #[arg(long)]
    pub referrer: Option<String>,

    /// Storage file for persisted attribution (default: data dir)
    #[arg(long)]
    pub storage: Option<PathBuf>,

    /// Neither read nor write persisted attribution
    #[arg(long, conflicts_with = "storage")]
    pub no_persist: bool,
}

impl PageArgs {
    pub fn page(&self) -> PageContext {
        let page = PageContext::new(self.url.clone());
        match &self.referrer {
            Some(referrer) => page.with_referrer(referrer.clone()),
            None => page,
        }
    }

    /// Compute the snapshot, upserting the persisted record unless
    /// `--no-persist` was given.
    pub fn compute(&self, config: &RuntimeConfig) -> AttributionSnapshot {
        let page = self.page();
        if self.no_persist {
            return AttributionStore::with_key(MemoryStorage::new(), config.storage_key.clone())
                .compute(&page);
        }
        let storage = match &self.storage {
            Some(path) => FileStorage::new(path.clone()),
            None => FileStorage::default_location(),
        };
        AttributionStore::with_key(storage, config.storage_key.clone()).compute(&page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page_args(url: &str) -> PageArgs {
        PageArgs {
            url: url.to_string(),
            referrer: None,
            storage: None,
            no_persist: true,
        }
    }

    #[test]
    fn test_page_carries_referrer() {
        let mut args = page_args("https://lp.test/");
        args.referrer = Some("https://search.test/".into());
        assert_eq!(args.page().referrer.as_deref(), Some("https://search.test/"));
    }

    #[test]
    fn test_compute_without_persistence() {
        let snapshot =
            page_args("https://lp.test/?utm_campaign=bf").compute(&RuntimeConfig::default());
        assert_eq!(snapshot.campaign, "bf");
    }

    #[test]
    fn test_compute_persists_to_given_storage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.json");
        let config = RuntimeConfig::default();

        let mut args = page_args("https://lp.test/?utm_source=newsletter");
        args.no_persist = false;
        args.storage = Some(path.clone());
        args.compute(&config);
        assert!(path.exists());

        args.url = "https://lp.test/".into();
        assert_eq!(args.compute(&config).source, "newsletter");
    }
}
