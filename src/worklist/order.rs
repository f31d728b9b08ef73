//! Ordering and cleanup of work lists

use crate::storage::normalize_name;
use crate::worklist::WorkRow;
use rand::Rng;
use std::collections::HashSet;

/// Sorts rows by descending popularity, keeping file order among ties
pub fn sort_by_popularity(rows: &mut [WorkRow]) {
    rows.sort_by(|a, b| b.popularity.cmp(&a.popularity));
}

/// What `dedupe` removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeReport {
    pub initial: usize,
    /// Repeats of a name seen earlier in the same list
    pub internal_duplicates: usize,
    /// Names the store already tracks
    pub store_duplicates: usize,
    pub kept: usize,
}

impl DedupeReport {
    pub fn removed(&self) -> usize {
        self.internal_duplicates + self.store_duplicates
    }
}

/// Drops repeated names and names `in_store` reports as known
///
/// Names compare after normalization; the first occurrence wins.
pub fn dedupe<F, E>(rows: Vec<WorkRow>, mut in_store: F) -> Result<(Vec<WorkRow>, DedupeReport), E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut report = DedupeReport {
        initial: rows.len(),
        ..DedupeReport::default()
    };

    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        let name = normalize_name(&row.name);
        if !seen.insert(name.clone()) {
            report.internal_duplicates += 1;
            continue;
        }
        if in_store(&name)? {
            report.store_duplicates += 1;
            if report.store_duplicates % 100 == 0 {
                tracing::info!("Store duplicates so far: {}", report.store_duplicates);
            }
            continue;
        }
        kept.push(row);
    }

    report.kept = kept.len();
    Ok((kept, report))
}

/// Indices not consumed yet, with O(1) removal by index and at random
struct RemainingPool {
    items: Vec<usize>,
    slot: Vec<Option<usize>>,
}

impl RemainingPool {
    fn new(len: usize) -> Self {
        Self {
            items: (0..len).collect(),
            slot: (0..len).map(Some).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn contains(&self, index: usize) -> bool {
        self.slot[index].is_some()
    }

    fn remove(&mut self, index: usize) {
        if let Some(pos) = self.slot[index].take() {
            self.items.swap_remove(pos);
            if let Some(&moved) = self.items.get(pos) {
                self.slot[moved] = Some(pos);
            }
        }
    }

    fn take_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let index = self.items[rng.gen_range(0..self.items.len())];
        self.remove(index);
        index
    }
}

/// Alternates priority picks with uniformly random picks
///
/// Takes the next unconsumed item of `ordered`, then a random unconsumed
/// item, and repeats until everything is consumed. The output is always a
/// permutation of the input and starts with `ordered[0]`. Lists of two or
/// fewer items come back unchanged.
pub fn interleave<T: Clone, R: Rng + ?Sized>(ordered: &[T], rng: &mut R) -> Vec<T> {
    if ordered.len() <= 2 {
        return ordered.to_vec();
    }

    let mut pool = RemainingPool::new(ordered.len());
    let mut result = Vec::with_capacity(ordered.len());
    let mut cursor = 0;

    while !pool.is_empty() {
        while cursor < ordered.len() && !pool.contains(cursor) {
            cursor += 1;
        }
        if cursor < ordered.len() {
            pool.remove(cursor);
            result.push(ordered[cursor].clone());
            cursor += 1;
        }

        if pool.is_empty() {
            break;
        }

        let pick = pool.take_random(rng);
        result.push(ordered[pick].clone());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sort_by_popularity_is_stable() {
        let mut rows = vec![
            WorkRow::new("a", 1),
            WorkRow::new("b", 50),
            WorkRow::new("c", 1),
            WorkRow::new("d", 50),
        ];
        sort_by_popularity(&mut rows);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_dedupe_internal_and_store() {
        let rows = vec![
            WorkRow::new("Foo", 5000),
            WorkRow::new("bar", 1),
            WorkRow::new("foo", 5000),
            WorkRow::new("known", 10),
        ];

        let (kept, report) =
            dedupe(rows, |name| Ok::<_, std::convert::Infallible>(name == "known")).unwrap();

        let names: Vec<_> = kept.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Foo", "bar"]);
        assert_eq!(
            report,
            DedupeReport {
                initial: 4,
                internal_duplicates: 1,
                store_duplicates: 1,
                kept: 2
            }
        );
        assert_eq!(report.removed(), 2);
    }

    #[test]
    fn test_dedupe_propagates_lookup_errors() {
        let rows = vec![WorkRow::new("a", 1)];
        let result = dedupe(rows, |_| Err("store down"));
        assert_eq!(result.unwrap_err(), "store down");
    }

    #[test]
    fn test_short_lists_unchanged() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(interleave::<u32, _>(&[], &mut rng), Vec::<u32>::new());
        assert_eq!(interleave(&[1], &mut rng), vec![1]);
        assert_eq!(interleave(&[1, 2], &mut rng), vec![1, 2]);
    }

    #[test]
    fn test_interleave_is_alternating_permutation() {
        let ordered: Vec<u32> = (0..10).collect();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = interleave(&ordered, &mut rng);

            let mut sorted = result.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, ordered, "seed {} is not a permutation", seed);
            assert_eq!(result[0], 0);

            // Even positions are always the earliest unconsumed priority item
            let mut consumed = HashSet::new();
            for (i, item) in result.iter().enumerate() {
                if i % 2 == 0 {
                    let expected = ordered.iter().find(|x| !consumed.contains(*x)).unwrap();
                    assert_eq!(item, expected, "seed {} position {}", seed, i);
                }
                consumed.insert(*item);
            }
        }
    }

    #[test]
    fn test_interleave_random_picks_vary() {
        let ordered: Vec<u32> = (0..10).collect();
        let outputs: HashSet<Vec<u32>> = (0..20)
            .map(|seed| interleave(&ordered, &mut StdRng::seed_from_u64(seed)))
            .collect();
        assert!(outputs.len() > 1);
    }
}
