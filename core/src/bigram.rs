//! Bigram store: `prev_token` → `SingleGram`.
//!
//! Two deployments share this type: the system store, loaded read-only and
//! shared across instances, and the user store, rewritten during training.
//! Entries live in memory by default; `attach` switches the store to a redb
//! database whose values are bincode-serialized `SingleGram`s. Reads go
//! through a small lru cache which `store` keeps coherent.

use crate::phrase::Token;
use crate::single_gram::SingleGram;
use lru::LruCache;
use redb::{Database, TableDefinition};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const BIGRAM_TABLE: TableDefinition<u32, Vec<u8>> = TableDefinition::new("bigram");

const CACHE_CAPACITY: usize = 256;

pub struct Bigram {
    map: HashMap<Token, SingleGram>,
    db: Option<Arc<Database>>,
    cache: RefCell<LruCache<Token, Option<SingleGram>>>,
}

impl std::fmt::Debug for Bigram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bigram")
            .field("entries", &self.map.len())
            .field("attached", &self.db.is_some())
            .finish()
    }
}

impl Default for Bigram {
    fn default() -> Self {
        Bigram::new()
    }
}

impl Bigram {
    /// An empty in-memory store.
    pub fn new() -> Self {
        Bigram {
            map: HashMap::new(),
            db: None,
            cache: RefCell::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    /// Open (creating if needed) a redb-backed store.
    pub fn attach<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if let Some(dir) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let db = Database::create(path.as_ref())?;
        Ok(Bigram {
            map: HashMap::new(),
            db: Some(Arc::new(db)),
            cache: RefCell::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        })
    }

    /// Load the distribution stored under `prev_token`.
    pub fn load(&self, prev_token: Token) -> Option<SingleGram> {
        if let Some(cached) = self.cache.borrow_mut().get(&prev_token) {
            return cached.clone();
        }

        let loaded = match &self.db {
            None => self.map.get(&prev_token).cloned(),
            Some(db) => self.load_db(db, prev_token),
        };

        self.cache
            .borrow_mut()
            .put(prev_token, loaded.clone());
        loaded
    }

    fn load_db(&self, db: &Database, prev_token: Token) -> Option<SingleGram> {
        let read = db.begin_read().ok()?;
        let table = match read.open_table(BIGRAM_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return None,
            Err(err) => {
                warn!(%err, "bigram table open failed");
                return None;
            }
        };
        let value = table.get(&prev_token).ok()??;
        match bincode::deserialize(&value.value()) {
            Ok(gram) => Some(gram),
            Err(err) => {
                warn!(prev_token, %err, "corrupt bigram entry skipped");
                None
            }
        }
    }

    /// Persist a distribution under `prev_token`.
    pub fn store(&mut self, prev_token: Token, gram: &SingleGram) -> anyhow::Result<()> {
        match &self.db {
            None => {
                self.map.insert(prev_token, gram.clone());
            }
            Some(db) => {
                let write = db.begin_write()?;
                {
                    let mut table = write.open_table(BIGRAM_TABLE)?;
                    table.insert(&prev_token, &bincode::serialize(gram)?)?;
                }
                write.commit()?;
            }
        }
        self.cache.borrow_mut().put(prev_token, Some(gram.clone()));
        Ok(())
    }

    /// Snapshot an in-memory store (write-to-temp then rename). An attached
    /// store persists on every `store` call and needs no snapshot.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, &self.map)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot produced by `save` into an in-memory store.
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let map: HashMap<Token, SingleGram> = bincode::deserialize_from(reader)?;
        Ok(Bigram {
            map,
            db: None,
            cache: RefCell::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        })
    }
}
