#![forbid(unsafe_code)]

use std::sync::Arc;

use ahash::AHashMap;

/// Handle to an interned string. Id 0 is the null sentinel; it never maps to
/// an interned string and compares equal only to itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    pub const NULL: StringId = StringId(0);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Deduplicating string storage.
///
/// Columns store [`StringId`]s; the pool owns the bytes. Interning the same
/// text twice yields the same id, which is what makes id equality a valid
/// substitute for byte equality on the query path.
#[derive(Debug, Default)]
pub struct StringPool {
    // Slot 0 is reserved for the null sentinel and holds an empty string so
    // `get` stays total.
    strings: Vec<Arc<str>>,
    index: AHashMap<Arc<str>, StringId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self { strings: vec![Arc::from("")], index: AHashMap::new() }
    }

    /// Number of distinct interned strings (the null sentinel not included).
    pub fn len(&self) -> u32 {
        self.strings.len() as u32 - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let owned: Arc<str> = Arc::from(s);
        let id = StringId(self.strings.len() as u32);
        self.strings.push(owned.clone());
        self.index.insert(owned, id);
        id
    }

    /// The id of `s` if it has been interned. Unlike [`StringPool::intern`]
    /// this never grows the pool, so it is safe on the read-only query path.
    pub fn get_id(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied()
    }

    /// The text behind `id`. The null sentinel yields the empty string;
    /// callers that care about null must check [`StringId::is_null`] first.
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }
}
