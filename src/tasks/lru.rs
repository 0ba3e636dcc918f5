use std::collections::VecDeque;

use tracing::trace;

use super::TaskKey;
use crate::system::os::TaskId;

/// Least recently used cache keyed by task id.
///
/// Entries remember the [`TaskKey`] they were stored under, so a lookup with a newer key for the
/// same task drops the stale entry.
#[derive(Debug)]
pub struct TaskKeyLruCache<V> {
    max_size: usize,
    /// Most recently used at the back.
    entries: VecDeque<(TaskKey, V)>,
}

impl<V> TaskKeyLruCache<V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: VecDeque::with_capacity(max_size),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value if it was stored under an equivalent key, otherwise removes it.
    pub fn get_and_invalidate_if_modified(&mut self, key: &TaskKey) -> Option<&V> {
        let idx = self.position(key.id)?;

        let (stored, _) = &self.entries[idx];
        if stored.last_active_time != key.last_active_time
            || stored.windowing_mode != key.windowing_mode
        {
            trace!("task {} modified, invalidating cache entry", key.id);
            self.entries.remove(idx);
            return None;
        }

        let entry = self.entries.remove(idx)?;
        self.entries.push_back(entry);
        self.entries.back().map(|(_, value)| value)
    }

    pub fn put(&mut self, key: TaskKey, value: V) {
        if let Some(idx) = self.position(key.id) {
            self.entries.remove(idx);
        }
        self.entries.push_back((key, value));

        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    /// Replaces the value of a cached task, keeping its key and recency.
    pub fn update_if_already_in_cache(&mut self, task_id: TaskId, value: V) {
        if let Some(idx) = self.position(task_id) {
            self.entries[idx].1 = value;
        }
    }

    pub fn remove(&mut self, task_id: TaskId) {
        if let Some(idx) = self.position(task_id) {
            self.entries.remove(idx);
        }
    }

    pub fn remove_all(&mut self, mut predicate: impl FnMut(&TaskKey) -> bool) {
        self.entries.retain(|(key, _)| !predicate(key));
    }

    pub fn evict_all(&mut self) {
        self.entries.clear();
    }

    fn position(&self, task_id: TaskId) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key.id == task_id)
    }
}

#[cfg(test)]
mod tests {
    use quickstep_config::ComponentName;

    use super::*;
    use crate::system::os::WindowingMode;

    fn key(id: TaskId, last_active_time: u64) -> TaskKey {
        TaskKey {
            id,
            user_id: 0,
            component: Some(ComponentName::unflatten("com.example/.Main").unwrap()),
            source_component: None,
            last_active_time,
            windowing_mode: WindowingMode::Fullscreen,
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = TaskKeyLruCache::new(2);
        cache.put(key(1, 0), "one");
        cache.put(key(2, 0), "two");

        // Touch 1 so that 2 becomes the oldest.
        assert_eq!(cache.get_and_invalidate_if_modified(&key(1, 0)), Some(&"one"));
        cache.put(key(3, 0), "three");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_and_invalidate_if_modified(&key(2, 0)), None);
        assert_eq!(cache.get_and_invalidate_if_modified(&key(1, 0)), Some(&"one"));
        assert_eq!(cache.get_and_invalidate_if_modified(&key(3, 0)), Some(&"three"));
    }

    #[test]
    fn modified_key_invalidates() {
        let mut cache = TaskKeyLruCache::new(4);
        cache.put(key(1, 10), "old");

        assert_eq!(cache.get_and_invalidate_if_modified(&key(1, 20)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn update_only_touches_cached_tasks() {
        let mut cache = TaskKeyLruCache::new(4);
        cache.put(key(1, 0), 1);
        cache.update_if_already_in_cache(1, 10);
        cache.update_if_already_in_cache(2, 20);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_and_invalidate_if_modified(&key(1, 0)), Some(&10));
    }

    #[test]
    fn remove_all_by_predicate() {
        let mut cache = TaskKeyLruCache::new(4);
        cache.put(key(1, 0), ());
        let mut other = key(2, 0);
        other.component = Some(ComponentName::unflatten("org.other/.Main").unwrap());
        cache.put(other, ());

        cache.remove_all(|key| key.package() == Some("com.example"));
        assert_eq!(cache.len(), 1);

        cache.evict_all();
        assert!(cache.is_empty());
    }
}
