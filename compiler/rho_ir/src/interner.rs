//! String interner backing [`Name`].
//!
//! A single `RwLock` guards the map and the string table. Interned strings
//! are leaked so lookups can hand out `&'static str` without holding the
//! lock; an interner lives for the whole interpreter session, so the leak is
//! bounded by the set of distinct identifiers in the program.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::Name;

struct Inner {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

/// Interner mapping identifier text to compact [`Name`] ids.
///
/// Interior mutability: `intern` takes `&self`, so the compiler collaborator
/// and the runtime can share one interner by reference.
pub struct StringInterner {
    inner: RwLock<Inner>,
}

impl StringInterner {
    /// Create a new interner with the empty string pre-interned as `Name::EMPTY`.
    pub fn new() -> Self {
        let mut map = FxHashMap::default();
        map.insert("", 0u32);
        StringInterner {
            inner: RwLock::new(Inner {
                map,
                strings: vec![""],
            }),
        }
    }

    /// Intern a string, returning its stable [`Name`].
    pub fn intern(&self, s: &str) -> Name {
        {
            let guard = self.inner.read();
            if let Some(&idx) = guard.map.get(s) {
                return Name::from_raw(idx);
            }
        }
        let mut guard = self.inner.write();
        // Re-check under the write lock; another caller may have won the race.
        if let Some(&idx) = guard.map.get(s) {
            return Name::from_raw(idx);
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let idx = u32::try_from(guard.strings.len()).unwrap_or(u32::MAX);
        guard.strings.push(leaked);
        guard.map.insert(leaked, idx);
        Name::from_raw(idx)
    }

    /// Resolve a [`Name`] back to its text.
    ///
    /// Returns the empty string for an index that was never interned.
    pub fn lookup(&self, name: Name) -> &'static str {
        let guard = self.inner.read();
        guard.strings.get(name.index()).copied().unwrap_or("")
    }

    /// Number of interned strings (including the pre-interned empty string).
    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    /// True if only the empty string is interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
