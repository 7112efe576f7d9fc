use crate::error::StoreResult;
use crate::types::Timestamp;

/// Defines the contract for ordered key-value store backends.
///
/// A store keeps named collections of unique members, each with a numeric
/// score, ordered ascending by (score, member). Every call is atomic on its
/// own; nothing spans two calls.
///
/// A collection may carry an auto-removal deadline. Once the store's clock
/// reaches it, the collection and its deadline are gone and every call
/// observes an empty collection. A collection whose last member is removed
/// stops existing, deadline included.
pub trait OrderedStore: Send + Sync {
    /// Insert a member or move an existing one to a new score
    fn upsert(&self, collection: &str, member: &str, score: Timestamp) -> StoreResult<()>;

    /// Members with `min <= score <= max`, lowest score first
    fn range_by_score(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<Vec<String>>;

    /// Like [`range_by_score`](Self::range_by_score) but pairs each member
    /// with its score
    fn range_with_scores(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<Vec<(String, Timestamp)>> {
        let mut entries = Vec::new();
        for member in self.range_by_score(collection, min, max)? {
            if let Some(score) = self.score_of(collection, &member)? {
                entries.push((member, score));
            }
        }
        Ok(entries)
    }

    /// Remove one member. Returns whether it was present.
    fn remove(&self, collection: &str, member: &str) -> StoreResult<bool>;

    /// Remove every member with `min <= score <= max`. Returns how many went.
    fn remove_range_by_score(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<usize>;

    fn score_of(&self, collection: &str, member: &str) -> StoreResult<Option<Timestamp>>;

    /// Schedule the whole collection for removal at `at`.
    ///
    /// Deadlines only move later: an earlier `at` than the current deadline
    /// is ignored, since other members may still be live until then. Does
    /// nothing for a collection that does not exist.
    fn set_expiration(&self, collection: &str, at: Timestamp) -> StoreResult<()>;
}
