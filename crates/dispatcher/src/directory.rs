//! Topic directory - key -> (binding, queue) map with get-or-create access

use std::collections::hash_map::{self, HashMap};
use std::collections::VecDeque;
use std::hash::Hash;

use contracts::ConsumerRef;

/// Binding and inbound queue of one topic key
pub struct TopicEntry<K, V> {
    /// Bound consumer, if any
    pub consumer: Option<ConsumerRef<K, V>>,
    /// Values waiting for the worker, oldest first
    pub queue: VecDeque<V>,
}

impl<K, V> Default for TopicEntry<K, V> {
    fn default() -> Self {
        Self {
            consumer: None,
            queue: VecDeque::new(),
        }
    }
}

impl<K, V> TopicEntry<K, V> {
    /// Bind `consumer` unless already bound; first writer wins.
    pub fn bind(&mut self, consumer: ConsumerRef<K, V>) -> bool {
        if self.consumer.is_some() {
            return false;
        }
        self.consumer = Some(consumer);
        true
    }

    pub fn is_bound(&self) -> bool {
        self.consumer.is_some()
    }

    /// Append `value` if the queue holds fewer than `capacity` values.
    ///
    /// Hands the value back when the queue is full.
    pub fn try_push(&mut self, value: V, capacity: usize) -> Result<(), V> {
        if self.queue.len() >= capacity {
            return Err(value);
        }
        self.queue.push_back(value);
        Ok(())
    }
}

/// Mapping from topic key to its entry.
///
/// Entries appear on first access through [`get_or_insert`](Self::get_or_insert)
/// and disappear only through [`remove`](Self::remove). Iteration order is
/// unspecified.
#[derive(Debug)]
pub struct TopicDirectory<K, E> {
    entries: HashMap<K, E>,
}

impl<K, E> Default for TopicDirectory<K, E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, E> TopicDirectory<K, E>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key`, inserting a default one if absent
    #[inline]
    pub fn get_or_insert(&mut self, key: K) -> &mut E
    where
        E: Default,
    {
        self.entries.entry(key).or_default()
    }

    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut E> {
        self.entries.get_mut(key)
    }

    /// Remove and return the entry for `key`
    pub fn remove(&mut self, key: &K) -> Option<E> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, E> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> hash_map::IterMut<'_, K, E> {
        self.entries.iter_mut()
    }
}
