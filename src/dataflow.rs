//! Keyed-collection capabilities the propagation rounds are written against.  A distributed
//! backend only has to provide the handful of operations in [`Dataflow`]; [`InMemory`] is the
//! reference implementation, running every operation on the rayon thread pool.
use std::hash::Hash;

use hashbrown::HashMap;
use rayon::prelude::*;

use crate::error::Result;

pub trait Key: Hash + Eq + Clone + Send + Sync + 'static {}
impl <T: Hash + Eq + Clone + Send + Sync + 'static> Key for T {}

pub trait Value: Clone + Send + Sync + 'static {}
impl <T: Clone + Send + Sync + 'static> Value for T {}

/// Associative combine step used by [`Dataflow::combine_by_key`].  Each partition folds its
/// values into an accumulator with `update`, partial accumulators are joined with `merge`, and
/// `finish` maps the result; returning `None` drops the key from the output.
pub trait Combiner<V>: Sync {
    type Acc: Send;
    type Output: Value;

    fn init(&self) -> Self::Acc;

    fn update(&self, acc: &mut Self::Acc, value: &V) -> Result<()>;

    fn merge(&self, acc: &mut Self::Acc, other: Self::Acc) -> Result<()>;

    fn finish(&self, acc: Self::Acc) -> Option<Self::Output>;
}

pub trait Dataflow: Sync {
    /// Immutable multiset of `(key, value)` records.
    type Table<K: Key, V: Value>: Send + Sync;

    fn table<K: Key, V: Value>(&self, records: Vec<(K, V)>) -> Self::Table<K, V>;

    /// Each record may emit any number of records into the provided buffer.
    fn flat_map<K, V, K2, V2, F>(&self, table: &Self::Table<K, V>, f: F) -> Result<Self::Table<K2, V2>>
    where
        K: Key, V: Value, K2: Key, V2: Value,
        F: Fn(&K, &V, &mut Vec<(K2, V2)>) -> Result<()> + Send + Sync;

    fn map<K, V, K2, V2, F>(&self, table: &Self::Table<K, V>, f: F) -> Result<Self::Table<K2, V2>>
    where
        K: Key, V: Value, K2: Key, V2: Value,
        F: Fn(&K, &V) -> Result<(K2, V2)> + Send + Sync
    {
        self.flat_map(table, move |k, v, out| {
            out.push(f(k, v)?);
            Ok(())
        })
    }

    fn filter<K, V, F>(&self, table: &Self::Table<K, V>, f: F) -> Self::Table<K, V>
    where
        K: Key, V: Value,
        F: Fn(&K, &V) -> bool + Send + Sync;

    /// Every left record is kept; it is paired with each matching right value, or with `None`
    /// when the right side has no record for its key.
    fn left_join<K: Key, V: Value, W: Value>(
        &self,
        left: &Self::Table<K, V>,
        right: &Self::Table<K, W>
    ) -> Self::Table<K, (V, Option<W>)>;

    fn combine_by_key<K: Key, V: Value, C: Combiner<V>>(
        &self,
        table: &Self::Table<K, V>,
        combiner: &C
    ) -> Result<Self::Table<K, C::Output>>;

    fn union<K: Key, V: Value>(&self, a: &Self::Table<K, V>, b: &Self::Table<K, V>) -> Self::Table<K, V>;

    fn len<K: Key, V: Value>(&self, table: &Self::Table<K, V>) -> usize;

    /// Pulls the whole table into memory.  Only meant for small tables.
    fn collect<K: Key, V: Value>(&self, table: &Self::Table<K, V>) -> Vec<(K, V)>;

    /// As `collect`, but keyed.  Duplicate keys keep the last record.
    fn materialize<K: Key, V: Value>(&self, table: &Self::Table<K, V>) -> HashMap<K, V> {
        self.collect(table).into_iter().collect()
    }
}

pub const DEFAULT_PARTITIONS: usize = 8;

/// Records are split into a fixed number of contiguous partitions and partial aggregates are
/// merged in partition order, so identical inputs always produce bit-identical outputs.  The
/// partition count does change floating point rounding in `combine_by_key`.
#[derive(Clone, Copy, Debug)]
pub struct InMemory {
    partitions: usize
}

impl InMemory {
    pub fn new(partitions: usize) -> Self {
        InMemory { partitions: partitions.max(1) }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    fn chunk_size(&self, records: usize) -> usize {
        ((records + self.partitions - 1) / self.partitions).max(1)
    }
}

impl Default for InMemory {
    fn default() -> Self {
        InMemory::new(DEFAULT_PARTITIONS)
    }
}

#[derive(Clone, Debug)]
pub struct MemTable<K, V> {
    records: Vec<(K, V)>
}

impl <K, V> MemTable<K, V> {
    pub fn records(&self) -> &[(K, V)] {
        &self.records
    }

    pub fn into_records(self) -> Vec<(K, V)> {
        self.records
    }
}

impl Dataflow for InMemory {
    type Table<K: Key, V: Value> = MemTable<K, V>;

    fn table<K: Key, V: Value>(&self, records: Vec<(K, V)>) -> MemTable<K, V> {
        MemTable { records }
    }

    fn flat_map<K, V, K2, V2, F>(&self, table: &MemTable<K, V>, f: F) -> Result<MemTable<K2, V2>>
    where
        K: Key, V: Value, K2: Key, V2: Value,
        F: Fn(&K, &V, &mut Vec<(K2, V2)>) -> Result<()> + Send + Sync
    {
        let cs = self.chunk_size(table.records.len());
        let partitions = table.records.par_chunks(cs).map(|chunk| {
            let mut out = Vec::with_capacity(chunk.len());
            for (k, v) in chunk.iter() {
                f(k, v, &mut out)?;
            }
            Ok(out)
        }).collect::<Result<Vec<_>>>()?;

        Ok(MemTable { records: partitions.into_iter().flatten().collect() })
    }

    fn filter<K, V, F>(&self, table: &MemTable<K, V>, f: F) -> MemTable<K, V>
    where
        K: Key, V: Value,
        F: Fn(&K, &V) -> bool + Send + Sync
    {
        let records = table.records.par_iter()
            .filter(|(k, v)| f(k, v))
            .cloned()
            .collect();
        MemTable { records }
    }

    fn left_join<K: Key, V: Value, W: Value>(
        &self,
        left: &MemTable<K, V>,
        right: &MemTable<K, W>
    ) -> MemTable<K, (V, Option<W>)> {
        let mut index: HashMap<&K, Vec<&W>> = HashMap::new();
        for (k, w) in right.records.iter() {
            index.entry(k).or_insert_with(Vec::new).push(w);
        }

        let records = left.records.par_iter().flat_map_iter(|(k, v)| {
            let joined: Vec<_> = match index.get(k) {
                Some(ws) => ws.iter()
                    .map(|w| (k.clone(), (v.clone(), Some((*w).clone()))))
                    .collect(),
                None => vec![(k.clone(), (v.clone(), None))]
            };
            joined
        }).collect();

        MemTable { records }
    }

    fn combine_by_key<K: Key, V: Value, C: Combiner<V>>(
        &self,
        table: &MemTable<K, V>,
        combiner: &C
    ) -> Result<MemTable<K, C::Output>> {
        // Fold each partition, remembering first-seen key order
        let cs = self.chunk_size(table.records.len());
        let partials = table.records.par_chunks(cs).map(|chunk| {
            let mut index: HashMap<K, usize> = HashMap::new();
            let mut accs: Vec<(K, C::Acc)> = Vec::new();
            for (k, v) in chunk.iter() {
                let idx = match index.get(k).copied() {
                    Some(idx) => idx,
                    None => {
                        index.insert(k.clone(), accs.len());
                        accs.push((k.clone(), combiner.init()));
                        accs.len() - 1
                    }
                };
                combiner.update(&mut accs[idx].1, v)?;
            }
            Ok(accs)
        }).collect::<Result<Vec<_>>>()?;

        // Merge partials in partition order
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut merged: Vec<(K, C::Acc)> = Vec::new();
        for partial in partials.into_iter() {
            for (k, acc) in partial.into_iter() {
                match index.get(&k).copied() {
                    Some(idx) => combiner.merge(&mut merged[idx].1, acc)?,
                    None => {
                        index.insert(k.clone(), merged.len());
                        merged.push((k, acc));
                    }
                }
            }
        }

        let records = merged.into_par_iter()
            .filter_map(|(k, acc)| combiner.finish(acc).map(|out| (k, out)))
            .collect();

        Ok(MemTable { records })
    }

    fn union<K: Key, V: Value>(&self, a: &MemTable<K, V>, b: &MemTable<K, V>) -> MemTable<K, V> {
        let mut records = Vec::with_capacity(a.records.len() + b.records.len());
        records.extend(a.records.iter().cloned());
        records.extend(b.records.iter().cloned());
        MemTable { records }
    }

    fn len<K: Key, V: Value>(&self, table: &MemTable<K, V>) -> usize {
        table.records.len()
    }

    fn collect<K: Key, V: Value>(&self, table: &MemTable<K, V>) -> Vec<(K, V)> {
        table.records.clone()
    }
}

#[cfg(test)]
mod dataflow_tests {
    use super::*;
    use crate::error::Error;

    struct Sum;

    impl Combiner<u64> for Sum {
        type Acc = u64;
        type Output = u64;

        fn init(&self) -> u64 { 0 }

        fn update(&self, acc: &mut u64, value: &u64) -> Result<()> {
            *acc += *value;
            Ok(())
        }

        fn merge(&self, acc: &mut u64, other: u64) -> Result<()> {
            *acc += other;
            Ok(())
        }

        fn finish(&self, acc: u64) -> Option<u64> {
            if acc > 0 { Some(acc) } else { None }
        }
    }

    fn build_records() -> Vec<(i64, u64)> {
        vec![(1, 3), (2, 0), (1, 4), (3, 1), (1, 1), (3, 2), (4, 0)]
    }

    #[test]
    fn test_flat_map() {
        let df = InMemory::new(3);
        let table = df.table(build_records());
        let doubled = df.flat_map(&table, |k, v, out| {
            out.push((*k, *v));
            out.push((-*k, *v * 2));
            Ok(())
        }).unwrap();
        assert_eq!(df.len(&doubled), 14);
        let records = df.collect(&doubled);
        assert_eq!(&records[..4], &[(1, 3), (-1, 6), (2, 0), (-2, 0)]);
    }

    #[test]
    fn test_map_propagates_errors() {
        let df = InMemory::default();
        let table = df.table(build_records());
        let res = df.map(&table, |k, v| {
            if *k == 3 {
                Err(Error::InvalidNode(*k))
            } else {
                Ok((*k, *v))
            }
        });
        assert!(matches!(res, Err(Error::InvalidNode(3))));
    }

    #[test]
    fn test_filter_keeps_order() {
        let df = InMemory::new(2);
        let table = df.table(build_records());
        let ones = df.filter(&table, |k, _v| *k == 1);
        assert_eq!(df.collect(&ones), vec![(1, 3), (1, 4), (1, 1)]);
    }

    #[test]
    fn test_left_join() {
        let df = InMemory::default();
        let left = df.table(vec![(1, "a"), (2, "b"), (3, "c")]);
        let right = df.table(vec![(1, 10), (3, 30), (3, 31), (5, 50)]);
        let joined = df.collect(&df.left_join(&left, &right));
        assert_eq!(joined, vec![
            (1, ("a", Some(10))),
            (2, ("b", None)),
            (3, ("c", Some(30))),
            (3, ("c", Some(31))),
        ]);
    }

    #[test]
    fn test_combine_by_key() {
        for partitions in 1..8 {
            let df = InMemory::new(partitions);
            let table = df.table(build_records());
            let sums = df.combine_by_key(&table, &Sum).unwrap();

            // Key 2 and 4 sum to zero and are dropped by `finish`
            assert_eq!(df.collect(&sums), vec![(1, 8), (3, 3)]);
        }
    }

    #[test]
    fn test_combine_empty() {
        let df = InMemory::default();
        let table = df.table(Vec::<(i64, u64)>::new());
        let sums = df.combine_by_key(&table, &Sum).unwrap();
        assert_eq!(df.len(&sums), 0);
    }

    #[test]
    fn test_union_and_materialize() {
        let df = InMemory::default();
        let a = df.table(vec![(1, 1u64), (2, 2)]);
        let b = df.table(vec![(3, 3u64), (2, 4)]);
        let u = df.union(&a, &b);
        assert_eq!(df.len(&u), 4);

        let m = df.materialize(&u);
        assert_eq!(m.len(), 3);
        assert_eq!(m[&2], 4);
    }

    #[test]
    fn test_partitions_floor() {
        assert_eq!(InMemory::new(0).partitions(), 1);
        assert_eq!(InMemory::default().partitions(), DEFAULT_PARTITIONS);
    }
}
