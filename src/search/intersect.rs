//! Multi-token AND within a mailbox, union across mailboxes, with
//! cursor-based pagination.
//!
//! Per mailbox the intersector leap-frogs one posting iterator per
//! required token: everyone seeks to the maximum current id until all
//! iterators agree, which produces a candidate. Candidates load the
//! document body (a missing body is a dangling posting and is skipped) and
//! pass through the recheck hook before entering the result.
//!
//! The returned `next_document_id` is the first unconsidered id; clients
//! resubmit it verbatim as an inclusive seek lower bound.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::ids::IndexedId;
use crate::models::{Document, IntersectionQuery, MailboxQuery, SearchResult, SingleDocResult};
use crate::search::posting::PostingIterator;
use crate::store::Store;

pub struct Intersector<'a> {
    store: &'a Store,
}

struct MailboxOutcome {
    accepted: Vec<Document>,
    completed: bool,
    last_considered: Option<IndexedId>,
}

impl MailboxOutcome {
    fn aborted(accepted: Vec<Document>, last_considered: Option<IndexedId>) -> Self {
        Self {
            accepted,
            completed: false,
            last_considered,
        }
    }
}

impl<'a> Intersector<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Run every mailbox query and merge the outcomes into one
    /// time-ordered page.
    pub fn intersect(
        &self,
        iq: &IntersectionQuery,
        recheck: &mut dyn FnMut(&MailboxQuery, &Document) -> bool,
    ) -> SearchResult {
        let start = match iq.next_document_id {
            Some(cursor) if cursor > iq.range_start => cursor,
            _ => iq.range_start,
        };

        let mut outcomes = Vec::with_capacity(iq.queries.len());
        for mq in &iq.queries {
            outcomes.push(self.intersect_mailbox(mq, start, iq.range_end, iq.max_number, recheck));
        }

        let mut merged: BTreeMap<IndexedId, SingleDocResult> = BTreeMap::new();
        for outcome in &outcomes {
            for doc in &outcome.accepted {
                merged
                    .entry(doc.indexed_id)
                    .and_modify(|r| r.relevance += 1)
                    .or_insert_with(|| SingleDocResult {
                        doc: doc.clone(),
                        relevance: 1,
                    });
            }
        }

        let all_completed = outcomes.iter().all(|o| o.completed);

        // The page may not reach past the first unconsidered id of any
        // mailbox that stopped early, or its leftovers would be skipped.
        let mut bound = if all_completed {
            match outcomes.iter().filter_map(|o| o.last_considered).max() {
                Some(id) => id.successor(),
                None => start,
            }
        } else {
            outcomes
                .iter()
                .filter(|o| !o.completed)
                .map(|o| match o.last_considered {
                    Some(id) => id.successor(),
                    None => start,
                })
                .min()
                .unwrap_or(start)
        };

        let mut docs: Vec<SingleDocResult> = merged
            .into_iter()
            .filter(|(id, _)| *id < bound)
            .map(|(_, r)| r)
            .collect();

        let mut completed = all_completed;
        if docs.len() > iq.max_number {
            docs.truncate(iq.max_number);
            // Unwrap-free: truncate to a non-zero length guarantees a last.
            if let Some(last) = docs.last() {
                bound = last.doc.indexed_id.successor();
            }
            completed = false;
        }

        debug!(
            mailboxes = iq.queries.len(),
            docs = docs.len(),
            completed,
            next = %bound,
            "intersection finished"
        );

        SearchResult {
            docs,
            completed,
            next_document_id: bound,
        }
    }

    /// Leap-frog AND over one mailbox's required tokens.
    fn intersect_mailbox(
        &self,
        mq: &MailboxQuery,
        start: IndexedId,
        range_end: IndexedId,
        max_number: usize,
        recheck: &mut dyn FnMut(&MailboxQuery, &Document) -> bool,
    ) -> MailboxOutcome {
        let mut outcome = MailboxOutcome {
            accepted: Vec::new(),
            completed: false,
            last_considered: None,
        };

        // No required tokens selects nothing, not everything.
        if mq.is_empty() || max_number == 0 {
            outcome.completed = mq.is_empty();
            return outcome;
        }

        let mut iters: Vec<PostingIterator<'_>> = Vec::new();
        for attr in &mq.attributes {
            for token in &attr.tokens {
                match PostingIterator::new(self.store, &mq.mailbox, &attr.name, &token.name) {
                    Ok(iter) => iters.push(iter),
                    Err(e) => {
                        warn!(mailbox = %mq.mailbox, token = %token.name, "posting iterator failed: {}", e);
                        return MailboxOutcome::aborted(outcome.accepted, outcome.last_considered);
                    }
                }
            }
        }

        for iter in iters.iter_mut() {
            if let Err(e) = iter.seek(start) {
                warn!(mailbox = %mq.mailbox, "seek failed: {}", e);
                return MailboxOutcome::aborted(outcome.accepted, outcome.last_considered);
            }
        }

        'candidates: loop {
            if iters.iter().any(|i| !i.valid()) {
                outcome.completed = true;
                break;
            }
            let Some(m) = iters.iter().filter_map(|i| i.current()).max() else {
                outcome.completed = true;
                break;
            };
            if m >= range_end {
                outcome.completed = true;
                break;
            }

            // Leap-frog every lagging iterator up to the frontier.
            let mut aligned = true;
            for iter in iters.iter_mut() {
                let lagging = match iter.current() {
                    Some(c) => c < m,
                    None => {
                        outcome.completed = true;
                        break 'candidates;
                    }
                };
                if lagging {
                    if let Err(e) = iter.seek(m) {
                        warn!(mailbox = %mq.mailbox, "seek failed: {}", e);
                        return MailboxOutcome::aborted(outcome.accepted, outcome.last_considered);
                    }
                    match iter.current() {
                        Some(c) if c == m => {}
                        Some(_) => aligned = false,
                        None => {
                            outcome.completed = true;
                            break 'candidates;
                        }
                    }
                }
            }
            if !aligned {
                continue;
            }

            // All iterators agree: m is a candidate.
            outcome.last_considered = Some(m);
            match self.store.get_document(&m) {
                Ok(doc) => {
                    if recheck(mq, &doc) {
                        outcome.accepted.push(doc);
                    }
                }
                Err(e) if e.is_not_found() => {
                    debug!(mailbox = %mq.mailbox, indexed_id = %m, "dangling posting skipped");
                }
                Err(e) => {
                    warn!(mailbox = %mq.mailbox, indexed_id = %m, "document load failed: {}", e);
                    return MailboxOutcome::aborted(outcome.accepted, outcome.last_considered);
                }
            }

            if outcome.accepted.len() >= max_number {
                break;
            }

            let next = m.successor();
            for iter in iters.iter_mut() {
                if let Err(e) = iter.seek(next) {
                    warn!(mailbox = %mq.mailbox, "seek failed: {}", e);
                    return MailboxOutcome::aborted(outcome.accepted, outcome.last_considered);
                }
            }
        }

        outcome
    }
}
