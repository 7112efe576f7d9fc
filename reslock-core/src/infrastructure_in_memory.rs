use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::infrastructure::OrderedStore;
use crate::types::Timestamp;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct SortedSet {
    // Member -> Score
    scores: HashMap<String, Timestamp>,
    // (Score, Member), the iteration order of every range call
    ordered: BTreeSet<(Timestamp, String)>,
    expires_at: Option<Timestamp>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: Timestamp) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(old, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn range(&self, min: Timestamp, max: Timestamp) -> impl Iterator<Item = &(Timestamp, String)> {
        let start = (min, String::new());
        self.ordered
            .range(start..)
            .take_while(move |(score, _)| *score <= max)
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// An ordered store held entirely in process memory.
///
/// Deadlines are enforced lazily: a collection whose deadline has passed is
/// dropped the next time any call touches it.
pub struct InMemoryOrderedStore {
    // Collection name -> Sorted set
    sets: Mutex<HashMap<String, SortedSet>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryOrderedStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// The auto-removal deadline of a live collection, if one is set.
    pub fn deadline_of(&self, collection: &str) -> StoreResult<Option<Timestamp>> {
        let mut sets = self.lock()?;
        Ok(self.live(&mut sets, collection).and_then(|set| set.expires_at))
    }

    /// Number of members in a collection, counting entries whose score has
    /// passed but that no sweep has removed yet.
    pub fn len(&self, collection: &str) -> StoreResult<usize> {
        let mut sets = self.lock()?;
        Ok(self
            .live(&mut sets, collection)
            .map_or(0, |set| set.scores.len()))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, SortedSet>>> {
        self.sets.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Looks up a collection, dropping it first if its deadline has fired.
    fn live<'a>(
        &self,
        sets: &'a mut HashMap<String, SortedSet>,
        collection: &str,
    ) -> Option<&'a mut SortedSet> {
        let now = self.clock.now_ms();
        let expired = sets
            .get(collection)
            .and_then(|set| set.expires_at)
            .is_some_and(|deadline| deadline <= now);
        if expired {
            sets.remove(collection);
            return None;
        }
        sets.get_mut(collection)
    }
}

impl Default for InMemoryOrderedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedStore for InMemoryOrderedStore {
    fn upsert(&self, collection: &str, member: &str, score: Timestamp) -> StoreResult<()> {
        let mut sets = self.lock()?;
        match self.live(&mut sets, collection) {
            Some(set) => set.insert(member, score),
            None => {
                let mut set = SortedSet::default();
                set.insert(member, score);
                sets.insert(collection.to_string(), set);
            }
        }
        Ok(())
    }

    fn range_by_score(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<Vec<String>> {
        Ok(self
            .range_with_scores(collection, min, max)?
            .into_iter()
            .map(|(member, _)| member)
            .collect())
    }

    fn range_with_scores(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<Vec<(String, Timestamp)>> {
        if min > max {
            return Ok(Vec::new());
        }
        let mut sets = self.lock()?;
        Ok(self
            .live(&mut sets, collection)
            .map(|set| {
                set.range(min, max)
                    .map(|(score, member)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn remove(&self, collection: &str, member: &str) -> StoreResult<bool> {
        let mut sets = self.lock()?;
        let Some(set) = self.live(&mut sets, collection) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            sets.remove(collection);
        }
        Ok(removed)
    }

    fn remove_range_by_score(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<usize> {
        if min > max {
            return Ok(0);
        }
        let mut sets = self.lock()?;
        let Some(set) = self.live(&mut sets, collection) else {
            return Ok(0);
        };
        let doomed: Vec<String> = set.range(min, max).map(|(_, member)| member.clone()).collect();
        for member in &doomed {
            set.remove(member);
        }
        if set.is_empty() {
            sets.remove(collection);
        }
        Ok(doomed.len())
    }

    fn score_of(&self, collection: &str, member: &str) -> StoreResult<Option<Timestamp>> {
        let mut sets = self.lock()?;
        Ok(self
            .live(&mut sets, collection)
            .and_then(|set| set.scores.get(member).copied()))
    }

    fn set_expiration(&self, collection: &str, at: Timestamp) -> StoreResult<()> {
        let mut sets = self.lock()?;
        if let Some(set) = self.live(&mut sets, collection) {
            set.expires_at = Some(set.expires_at.map_or(at, |current| current.max(at)));
        }
        Ok(())
    }
}
