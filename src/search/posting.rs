//! Per-token lazy cursor over sharded posting lists.
//!
//! The shard directory names the shards that hold postings for a token;
//! the iterator walks them in ascending order, decoding one shard's list
//! at a time, and yields indexed ids ascending. A shard that fails to
//! decode is logged and skipped; storage errors propagate so the caller
//! can abort the mailbox query.

use tracing::warn;

use crate::error::{MaildexError, Result};
use crate::ids::IndexedId;
use crate::index::keys;
use crate::store::Store;

pub struct PostingIterator<'a> {
    store: &'a Store,
    base_key: String,
    shards: Vec<u64>,
    /// Index into `shards` of the currently decoded shard.
    shard_pos: usize,
    list: Vec<IndexedId>,
    list_pos: usize,
    exhausted: bool,
}

impl<'a> PostingIterator<'a> {
    /// Build the cursor for one `(mailbox, attribute, token)` and position
    /// it on the first posting.
    pub fn new(store: &'a Store, mailbox: &str, attribute: &str, token: &str) -> Result<Self> {
        let opts = store.options();
        let shard_key = keys::token_shard_key(opts, mailbox, attribute, token);
        let shards = store.get_shards(shard_key.as_bytes());

        let mut iter = Self {
            store,
            base_key: keys::posting_base_key(opts, mailbox, attribute, token),
            shards,
            shard_pos: 0,
            list: Vec::new(),
            list_pos: 0,
            exhausted: false,
        };
        iter.load_shard()?;
        Ok(iter)
    }

    /// Decode the shard at `shard_pos`, skipping empty and corrupt shards.
    /// Marks the cursor exhausted when the directory runs out.
    fn load_shard(&mut self) -> Result<()> {
        loop {
            let Some(&shard) = self.shards.get(self.shard_pos) else {
                self.exhausted = true;
                self.list.clear();
                self.list_pos = 0;
                return Ok(());
            };
            let key = keys::posting_shard_key(&self.base_key, shard);
            match self.store.get_posting_list(key.as_bytes()) {
                Ok(ids) if ids.is_empty() => {
                    self.shard_pos += 1;
                }
                Ok(ids) => {
                    self.list = ids;
                    self.list_pos = 0;
                    return Ok(());
                }
                Err(MaildexError::Corruption { key, reason }) => {
                    warn!(%key, %reason, "skipping corrupt posting shard");
                    self.shard_pos += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn valid(&self) -> bool {
        !self.exhausted
    }

    pub fn current(&self) -> Option<IndexedId> {
        if self.exhausted {
            return None;
        }
        self.list.get(self.list_pos).copied()
    }

    /// Step to the next posting. Exhaustion is terminal.
    pub fn next(&mut self) -> Result<()> {
        if self.exhausted {
            return Ok(());
        }
        self.list_pos += 1;
        if self.list_pos >= self.list.len() {
            self.shard_pos += 1;
            self.load_shard()?;
        }
        Ok(())
    }

    /// Advance to the first posting >= `target`, skipping whole shards
    /// whose maximum id is below it. Never moves backwards.
    pub fn seek(&mut self, target: IndexedId) -> Result<()> {
        while !self.exhausted {
            match self.list.last() {
                Some(&last) if last < target => {
                    self.shard_pos += 1;
                    self.load_shard()?;
                    continue;
                }
                Some(_) => {}
                None => {
                    self.shard_pos += 1;
                    self.load_shard()?;
                    continue;
                }
            }
            let tail = &self.list[self.list_pos..];
            let offset = match tail.binary_search(&target) {
                Ok(i) => i,
                Err(i) => i,
            };
            self.list_pos += offset;
            if self.list_pos < self.list.len() {
                return Ok(());
            }
            self.shard_pos += 1;
            self.load_shard()?;
        }
        Ok(())
    }
}
