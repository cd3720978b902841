use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use salesdeck_core::Database;

use crate::store::Stores;

/// Where records live. Flags win over environment variables.
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// SQLite database file [default: platform data directory]
    #[arg(long, env = "SALESDECK_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Base URL of a remote record store, e.g. http://127.0.0.1:3000
    #[arg(long, env = "SALESDECK_REMOTE", global = true, conflicts_with = "db")]
    pub remote: Option<String>,

    /// Keep everything in memory for this run
    #[arg(long, global = true, conflicts_with_all = ["db", "remote"])]
    pub memory: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Sqlite(PathBuf),
    Remote(String),
    Memory,
}

impl StoreArgs {
    pub fn backend(&self) -> anyhow::Result<Backend> {
        if self.memory {
            return Ok(Backend::Memory);
        }
        if let Some(url) = &self.remote {
            return Ok(Backend::Remote(url.clone()));
        }
        match &self.db {
            Some(path) => Ok(Backend::Sqlite(path.clone())),
            None => Ok(Backend::Sqlite(Database::default_path()?)),
        }
    }

    pub fn open(&self) -> anyhow::Result<Stores> {
        let backend = self.backend()?;
        tracing::debug!("Using {:?} record store", backend);
        match backend {
            Backend::Sqlite(path) => {
                let db = Database::open(&path)?;
                db.migrate()
                    .with_context(|| format!("migrating {}", path.display()))?;
                Ok(Stores::sqlite(db))
            }
            Backend::Remote(url) => Ok(Stores::remote(&url)?),
            Backend::Memory => Ok(Stores::memory()),
        }
    }
}
