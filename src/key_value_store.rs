//! The typed keyspace.
//!
//! Every key maps to a [`Value`]: a tagged union over the supported entry
//! kinds plus an optional absolute expiry in epoch milliseconds. Expiry is
//! lazy; any access that observes a past deadline deletes the entry and
//! behaves as if it were absent. A command that expects one kind on a key
//! holding another gets [`WrongType`] back and must not mutate.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use jiff::Timestamp;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Timestamp::now().as_millisecond()
}

/// Marker returned by typed accessors when the key holds a different kind.
#[derive(Debug, PartialEq, Eq)]
pub struct WrongType;

/// A stream entry id, ordered lexicographically on `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    /// Field→value pairs in insertion order.
    pub fields: Vec<(String, String)>,
}

/// An append-only stream: entries held in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    entries: Vec<StreamEntry>,
}

impl Stream {
    pub fn new() -> Self {
        Stream::default()
    }

    pub fn last_id(&self) -> Option<StreamId> {
        self.entries.last().map(|entry| entry.id)
    }

    /// Appends an entry whose id the caller has already validated as greater
    /// than [`Stream::last_id`].
    pub fn append(&mut self, entry: StreamEntry) {
        self.entries.push(entry);
    }

    /// Entries with `start <= id <= end`.
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<&StreamEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.id >= start && entry.id <= end)
            .collect()
    }

    /// Entries with `id > after`.
    pub fn entries_after(&self, after: StreamId) -> Vec<&StreamEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.id > after)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sorted-set score with a total order (ties broken by member elsewhere).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Member→score mapping ordered by `(score asc, member asc)`.
///
/// The sorted index is kept alongside the score map: every `(score, member)`
/// pair sits at its rank position, so rank and range reads are a binary
/// search away and never have to re-sort or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: Vec<(Score, String)>,
}

impl SortedSet {
    pub fn new() -> Self {
        SortedSet::default()
    }

    /// Inserts or updates a member. Returns `true` when the member is new.
    pub fn insert(&mut self, member: String, score: f64) -> bool {
        match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                if let Ok(position) = self.index_of(previous, &member) {
                    self.ordered.remove(position);
                }
                let position = self.insertion_point(score, &member);
                self.ordered.insert(position, (Score(score), member));
                false
            }
            None => {
                let position = self.insertion_point(score, &member);
                self.ordered.insert(position, (Score(score), member));
                true
            }
        }
    }

    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                if let Ok(position) = self.index_of(score, member) {
                    self.ordered.remove(position);
                }
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Zero-based position of `member` in `(score asc, member asc)` order,
    /// found by binary search in O(log n).
    pub fn rank(&self, member: &str) -> Option<usize> {
        let score = self.scores.get(member)?;
        self.index_of(*score, member).ok()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Members in order, as `(member, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ordered
            .iter()
            .map(|(Score(score), member)| (member.as_str(), *score))
    }

    /// Inclusive index range with negative-from-tail semantics and clamping.
    pub fn range(&self, start: i64, stop: i64) -> Vec<(String, f64)> {
        let Some((start, stop)) = clamp_range(start, stop, self.len()) else {
            return Vec::new();
        };

        self.ordered[start..=stop]
            .iter()
            .map(|(Score(score), member)| (member.clone(), *score))
            .collect()
    }

    /// Binary search for an exact `(score, member)` pair; `Ok` carries its
    /// rank, `Err` the insertion point.
    fn index_of(&self, score: f64, member: &str) -> Result<usize, usize> {
        self.ordered.binary_search_by(|(s, m)| {
            s.cmp(&Score(score)).then_with(|| m.as_str().cmp(member))
        })
    }

    fn insertion_point(&self, score: f64, member: &str) -> usize {
        match self.index_of(score, member) {
            Ok(position) | Err(position) => position,
        }
    }
}

/// Resolves inclusive, possibly negative, indices against a length.
///
/// Indices are clamped rather than rejected; `None` marks an empty
/// selection.
pub fn clamp_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }

    let len = len as i64;
    let resolve = |index: i64| if index < 0 { len + index } else { index };

    let start = resolve(start).max(0);
    let stop = resolve(stop).min(len - 1);

    if start > stop {
        return None;
    }

    Some((start as usize, stop as usize))
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    Array(VecDeque<String>),
    Stream(Stream),
    SortedSet(SortedSet),
}

impl DataType {
    /// The name reported by the TYPE command.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String(_) => "string",
            DataType::Array(_) => "list",
            DataType::Stream(_) => "stream",
            DataType::SortedSet(_) => "zset",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: DataType,
    /// Absolute expiry in epoch milliseconds.
    pub expires_at: Option<i64>,
}

impl Value {
    pub fn new(data: DataType) -> Self {
        Value {
            data,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: HashMap<String, Value>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        KeyValueStore::default()
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Live entry lookup; expired entries are deleted on sight.
    pub fn get(&mut self, key: &str) -> Option<&Value> {
        self.expire_if_due(key);
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.expire_if_due(key);
        self.entries.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys whose entries are currently live.
    pub fn live_keys(&self) -> Vec<String> {
        let now = now_ms();

        self.entries
            .iter()
            .filter(|(_, value)| !value.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// TYPE-style lookup: the kind name, or "none" for absent keys.
    pub fn type_name_of(&mut self, key: &str) -> &'static str {
        match self.get(key) {
            Some(value) => value.data.type_name(),
            None => "none",
        }
    }

    pub fn get_string(&mut self, key: &str) -> Result<Option<&String>, WrongType> {
        match self.get(key) {
            Some(Value {
                data: DataType::String(s),
                ..
            }) => Ok(Some(s)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }

    pub fn get_list_mut(&mut self, key: &str) -> Result<Option<&mut VecDeque<String>>, WrongType> {
        match self.get_mut(key) {
            Some(Value {
                data: DataType::Array(list),
                ..
            }) => Ok(Some(list)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }

    pub fn get_or_create_list(&mut self, key: &str) -> Result<&mut VecDeque<String>, WrongType> {
        self.check_kind(key, |data| matches!(data, DataType::Array(_)))?;

        let value = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::new(DataType::Array(VecDeque::new())));

        match &mut value.data {
            DataType::Array(list) => Ok(list),
            _ => Err(WrongType),
        }
    }

    pub fn get_stream(&mut self, key: &str) -> Result<Option<&Stream>, WrongType> {
        match self.get(key) {
            Some(Value {
                data: DataType::Stream(stream),
                ..
            }) => Ok(Some(stream)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }

    pub fn get_or_create_stream(&mut self, key: &str) -> Result<&mut Stream, WrongType> {
        self.check_kind(key, |data| matches!(data, DataType::Stream(_)))?;

        let value = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::new(DataType::Stream(Stream::new())));

        match &mut value.data {
            DataType::Stream(stream) => Ok(stream),
            _ => Err(WrongType),
        }
    }

    pub fn get_sorted_set(&mut self, key: &str) -> Result<Option<&SortedSet>, WrongType> {
        match self.get(key) {
            Some(Value {
                data: DataType::SortedSet(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }

    pub fn get_sorted_set_mut(&mut self, key: &str) -> Result<Option<&mut SortedSet>, WrongType> {
        match self.get_mut(key) {
            Some(Value {
                data: DataType::SortedSet(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(WrongType),
            None => Ok(None),
        }
    }

    pub fn get_or_create_sorted_set(&mut self, key: &str) -> Result<&mut SortedSet, WrongType> {
        self.check_kind(key, |data| matches!(data, DataType::SortedSet(_)))?;

        let value = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::new(DataType::SortedSet(SortedSet::new())));

        match &mut value.data {
            DataType::SortedSet(set) => Ok(set),
            _ => Err(WrongType),
        }
    }

    /// The type check and any subsequent mutation run under the same store
    /// lock, so a passing check cannot race with a type change.
    fn check_kind(&mut self, key: &str, matches_kind: impl Fn(&DataType) -> bool) -> Result<(), WrongType> {
        match self.get(key) {
            Some(value) if !matches_kind(&value.data) => Err(WrongType),
            _ => Ok(()),
        }
    }

    fn expire_if_due(&mut self, key: &str) {
        let now = now_ms();

        if let Some(value) = self.entries.get(key) {
            if value.is_expired(now) {
                self.entries.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_expiry_on_read() {
        let mut store = KeyValueStore::new();

        store.insert(
            "gone".to_string(),
            Value {
                data: DataType::String("v".to_string()),
                expires_at: Some(now_ms() - 1),
            },
        );
        store.insert(
            "kept".to_string(),
            Value {
                data: DataType::String("v".to_string()),
                expires_at: Some(now_ms() + 60_000),
            },
        );

        assert_eq!(store.get("gone"), None);
        assert_eq!(store.len(), 1, "expired entry should have been deleted");
        assert!(store.get("kept").is_some());
    }

    #[test]
    fn test_type_name_of() {
        let mut store = KeyValueStore::new();
        store.insert(
            "s".to_string(),
            Value::new(DataType::String("x".to_string())),
        );
        store.insert(
            "l".to_string(),
            Value::new(DataType::Array(VecDeque::new())),
        );
        store.insert("st".to_string(), Value::new(DataType::Stream(Stream::new())));
        store.insert(
            "z".to_string(),
            Value::new(DataType::SortedSet(SortedSet::new())),
        );

        let test_cases = vec![
            ("s", "string"),
            ("l", "list"),
            ("st", "stream"),
            ("z", "zset"),
            ("missing", "none"),
        ];

        for (key, expected) in test_cases {
            assert_eq!(store.type_name_of(key), expected, "type of {}", key);
        }
    }

    #[test]
    fn test_typed_access_rejects_other_kinds() {
        let mut store = KeyValueStore::new();
        store.insert(
            "s".to_string(),
            Value::new(DataType::String("x".to_string())),
        );

        assert_eq!(store.get_list_mut("s"), Err(WrongType));
        assert_eq!(store.get_or_create_list("s"), Err(WrongType));
        assert_eq!(store.get_stream("s"), Err(WrongType));
        assert_eq!(store.get_or_create_stream("s"), Err(WrongType));
        assert_eq!(store.get_sorted_set("s"), Err(WrongType));
        assert_eq!(store.get_or_create_sorted_set("s"), Err(WrongType));
        assert_eq!(
            store.get_string("s"),
            Ok(Some(&"x".to_string())),
            "matching kind still accessible"
        );
    }

    #[test]
    fn test_get_or_create_list_creates_once() {
        let mut store = KeyValueStore::new();

        store
            .get_or_create_list("l")
            .unwrap()
            .push_back("a".to_string());
        store
            .get_or_create_list("l")
            .unwrap()
            .push_back("b".to_string());

        let list = store.get_list_mut("l").unwrap().unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_stream_ordering_and_ranges() {
        let mut stream = Stream::new();
        for (ms, seq) in [(1u64, 0u64), (1, 1), (2, 0), (3, 5)] {
            stream.append(StreamEntry {
                id: StreamId::new(ms, seq),
                fields: vec![("f".to_string(), "v".to_string())],
            });
        }

        assert_eq!(stream.last_id(), Some(StreamId::new(3, 5)));

        let full = stream.range(StreamId::ZERO, StreamId::MAX);
        assert_eq!(full.len(), 4);

        let middle = stream.range(StreamId::new(1, 1), StreamId::new(2, 0));
        assert_eq!(
            middle.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![StreamId::new(1, 1), StreamId::new(2, 0)]
        );

        let after = stream.entries_after(StreamId::new(1, 1));
        assert_eq!(
            after.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![StreamId::new(2, 0), StreamId::new(3, 5)]
        );
    }

    #[test]
    fn test_stream_id_ordering() {
        let test_cases = vec![
            (StreamId::new(1, 0), StreamId::new(1, 1), true),
            (StreamId::new(1, 9), StreamId::new(2, 0), true),
            (StreamId::new(2, 0), StreamId::new(1, 9), false),
            (StreamId::new(1, 1), StreamId::new(1, 1), false),
        ];

        for (left, right, expected_less) in test_cases {
            assert_eq!(
                left < right,
                expected_less,
                "comparing {} and {}",
                left,
                right
            );
        }
    }

    #[test]
    fn test_sorted_set_order_and_rank() {
        let mut set = SortedSet::new();

        assert!(set.insert("b".to_string(), 2.0));
        assert!(set.insert("a".to_string(), 1.0));
        assert!(set.insert("c".to_string(), 2.0));
        // Update keeps cardinality constant.
        assert!(!set.insert("a".to_string(), 3.0));

        assert_eq!(set.len(), 3);

        let ordered: Vec<_> = set.iter().map(|(m, s)| (m.to_string(), s)).collect();
        assert_eq!(
            ordered,
            vec![
                ("b".to_string(), 2.0),
                ("c".to_string(), 2.0),
                ("a".to_string(), 3.0),
            ],
            "score ascending, ties by member"
        );

        assert_eq!(set.rank("b"), Some(0));
        assert_eq!(set.rank("c"), Some(1));
        assert_eq!(set.rank("a"), Some(2));
        assert_eq!(set.rank("missing"), None);

        assert!(set.remove("c"));
        assert!(!set.remove("c"));
        assert_eq!(set.rank("a"), Some(1));
    }

    #[test]
    fn test_sorted_set_range_clamping() {
        let mut set = SortedSet::new();
        for (member, score) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            set.insert(member.to_string(), score);
        }

        let members = |pairs: Vec<(String, f64)>| {
            pairs.into_iter().map(|(m, _)| m).collect::<Vec<_>>()
        };

        assert_eq!(members(set.range(0, -1)), vec!["a", "b", "c", "d"]);
        assert_eq!(members(set.range(1, 2)), vec!["b", "c"]);
        assert_eq!(members(set.range(-2, -1)), vec!["c", "d"]);
        assert_eq!(members(set.range(0, 100)), vec!["a", "b", "c", "d"]);
        assert_eq!(members(set.range(5, 10)), Vec::<String>::new());
        assert_eq!(members(set.range(2, 1)), Vec::<String>::new());
    }
}
