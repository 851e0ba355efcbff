use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::matcher::FeatureVector;
use crate::store::model::Asin;

/// Bounded memo for product-side feature extraction.
///
/// Insertion-ordered eviction: when full, the oldest entry goes. Product
/// text is immutable for the lifetime of an ASIN in a run, so there is no
/// invalidation.
pub(crate) struct ExtractionMemo {
    cap: usize,
    inner: Mutex<MemoInner>,
}

struct MemoInner {
    map: HashMap<Asin, FeatureVector>,
    ring: VecDeque<Asin>,
}

impl ExtractionMemo {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            inner: Mutex::new(MemoInner {
                map: HashMap::new(),
                ring: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, asin: &Asin) -> Option<FeatureVector> {
        self.inner.lock().map.get(asin).cloned()
    }

    pub fn insert(&self, asin: Asin, vector: FeatureVector) {
        let mut inner = self.inner.lock();

        if !inner.map.contains_key(&asin) {
            if inner.map.len() >= self.cap {
                if let Some(victim) = inner.ring.pop_front() {
                    inner.map.remove(&victim);
                }
            }
            inner.ring.push_back(asin.clone());
        }

        inner.map.insert(asin, vector);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }
}
