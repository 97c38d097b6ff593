//! Concrete games built on the replication engine
//!
//! Both games follow the same two-step shape: players write something, the
//! host shuffles the distinct non-empty texts into anonymous slots, then
//! players pick a slot that is not their own.

pub mod caption;
pub mod ghostwriter;

pub use caption::Caption;
pub use ghostwriter::Ghostwriter;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{PlayerId, RoundLedger};
use std::collections::{BTreeMap, BTreeSet};

/// Distinct trimmed non-empty texts submitted in `phase`, with their authors
pub(crate) fn pool<P, A>(
    ledger: &RoundLedger<P, A>,
    phase: &P,
    text: impl Fn(&A) -> Option<String>,
) -> BTreeMap<String, Vec<PlayerId>>
where
    P: Clone + PartialEq,
    A: Clone,
{
    let mut pool: BTreeMap<String, Vec<PlayerId>> = BTreeMap::new();
    if let Some(actions) = ledger.actions(phase) {
        for (player, submission) in actions {
            let Some(raw) = text(&submission.action) else {
                continue;
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            pool.entry(trimmed.to_string())
                .or_default()
                .push(player.clone());
        }
    }
    pool
}

/// Pool texts in random slot order
pub(crate) fn shuffled(pool: &BTreeMap<String, Vec<PlayerId>>, rng: &mut StdRng) -> Vec<String> {
    let mut slots: Vec<String> = pool.keys().cloned().collect();
    slots.shuffle(rng);
    slots
}

/// Slot indices whose text `player` wrote
pub(crate) fn own_slots(
    slots: &[String],
    pool: &BTreeMap<String, Vec<PlayerId>>,
    player: &str,
) -> BTreeSet<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, text)| {
            pool.get(*text)
                .map(|authors| authors.iter().any(|a| a == player))
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Picks an entry of `table` not yet in `used`, falling back to any entry
/// once the table is exhausted
pub(crate) fn pick_content<'a>(
    table: &[&'a str],
    prefix: &str,
    used: &BTreeSet<String>,
    rng: &mut StdRng,
) -> (String, &'a str) {
    let fresh: Vec<usize> = (0..table.len())
        .filter(|i| !used.contains(&content_key(prefix, *i)))
        .collect();
    let idx = fresh
        .choose(rng)
        .copied()
        .unwrap_or_else(|| rng.gen_range(0..table.len().max(1)));
    (content_key(prefix, idx), table.get(idx).copied().unwrap_or(""))
}

fn content_key(prefix: &str, idx: usize) -> String {
    format!("{}:{}", prefix, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_pool_dedups_and_skips_empty() {
        let mut ledger: RoundLedger<u8, String> = RoundLedger::new();
        ledger.record(&0, "a", " cat ".into(), false);
        ledger.record(&0, "b", "cat".into(), false);
        ledger.record(&0, "c", "".into(), true);
        ledger.record(&0, "d", "dog".into(), false);

        let pool = pool(&ledger, &0, |s: &String| Some(s.clone()));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("cat"), Some(&vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_own_slots() {
        let mut pool = BTreeMap::new();
        pool.insert("cat".to_string(), vec!["a".to_string()]);
        pool.insert("dog".to_string(), vec!["b".to_string()]);
        let slots = vec!["dog".to_string(), "cat".to_string()];
        assert_eq!(own_slots(&slots, &pool, "a"), BTreeSet::from([1]));
        assert!(own_slots(&slots, &pool, "z").is_empty());
    }

    #[test]
    fn test_pick_content_avoids_used() {
        let table = ["one", "two", "three"];
        let mut rng = StdRng::seed_from_u64(3);
        let mut used = BTreeSet::new();
        for _ in 0..3 {
            let (key, _) = pick_content(&table, "t", &used, &mut rng);
            assert!(used.insert(key));
        }
        // exhausted table still yields content
        let (_, text) = pick_content(&table, "t", &used, &mut rng);
        assert!(table.contains(&text));
    }
}
