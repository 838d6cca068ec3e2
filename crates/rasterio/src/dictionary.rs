use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Interns raster file paths into small integer ids scoped to a key space,
/// mirroring the original `RasterFileDictionary`: `add` is idempotent and
/// thread-safe, `get` resolves an id back to its path, and ids used only for
/// sampled (as opposed to read) rasters are tracked separately.
pub struct FileDictionary {
    key_space: u64,
    inner: Mutex<Inner>,
}

struct Inner {
    ids_by_path: HashMap<String, u64>,
    paths_by_id: Vec<String>,
    sample_ids: HashSet<u64>,
}

impl FileDictionary {
    pub fn new(key_space: u64) -> Self {
        Self {
            key_space: key_space << 32,
            inner: Mutex::new(Inner {
                ids_by_path: HashMap::new(),
                paths_by_id: Vec::new(),
                sample_ids: HashSet::new(),
            }),
        }
    }

    /// Returns the id for `path`, creating one if it hasn't been seen before.
    pub fn add(&self, path: &str, sample: bool) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let id = if let Some(&id) = inner.ids_by_path.get(path) {
            id
        } else {
            let index = inner.paths_by_id.len() as u64;
            let id = self.key_space | index;
            inner.paths_by_id.push(path.to_string());
            inner.ids_by_path.insert(path.to_string(), id);
            id
        };

        if sample {
            inner.sample_ids.insert(id);
        }

        id
    }

    pub fn get(&self, file_id: u64) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let index = (file_id & 0xFFFF_FFFF) as usize;
        inner.paths_by_id.get(index).cloned()
    }

    pub fn set_sample(&self, sample_file_id: u64) {
        self.inner.lock().unwrap().sample_ids.insert(sample_file_id);
    }

    pub fn sample_ids(&self) -> HashSet<u64> {
        self.inner.lock().unwrap().sample_ids.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.ids_by_path.clear();
        inner.paths_by_id.clear();
        inner.sample_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_round_trips_through_get() {
        let dict = FileDictionary::new(3);
        let id1 = dict.add("/data/a.tif", false);
        let id2 = dict.add("/data/a.tif", false);
        assert_eq!(id1, id2);
        assert_eq!(dict.get(id1).as_deref(), Some("/data/a.tif"));
    }

    #[test]
    fn keys_are_scoped_by_key_space() {
        let a = FileDictionary::new(1);
        let b = FileDictionary::new(2);
        let id_a = a.add("/data/a.tif", false);
        let id_b = b.add("/data/a.tif", false);
        assert_ne!(id_a, id_b);
        assert_eq!(id_a >> 32, 1);
        assert_eq!(id_b >> 32, 2);
    }

    #[test]
    fn sample_ids_are_tracked_separately_from_ordinary_adds() {
        let dict = FileDictionary::new(0);
        let id = dict.add("/data/a.tif", true);
        assert!(dict.sample_ids().contains(&id));
    }
}
