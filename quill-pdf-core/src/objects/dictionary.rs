use crate::objects::schema::TypeTag;
use crate::objects::{Handle, Name, ObjectId};
use std::collections::{BTreeMap, HashMap};

/// Derived caches kept by composite containers.
///
/// `strings` and `xrefs` let the encryption subsystem and the
/// back-reference lookup work from container roots instead of walking the
/// whole graph. When a direct container is inserted into another one, the
/// parent absorbs the child's caches and the child's are cleared, so caches
/// only ever live at the outermost direct container.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Caches {
    /// String objects contained anywhere below this container.
    pub strings: Vec<Handle>,
    /// Names used below this container, keys included.
    pub names: Vec<Name>,
    /// Reference target -> containers that embed such a reference.
    pub xrefs: HashMap<ObjectId, Vec<Handle>>,
}

impl Caches {
    pub fn clear(&mut self) {
        self.strings.clear();
        self.names.clear();
        self.xrefs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.names.is_empty() && self.xrefs.is_empty()
    }

    /// Union `other` into `self`, concatenating per-reference back-pointer
    /// lists.
    pub fn absorb(&mut self, other: Caches) {
        self.strings.extend(other.strings);
        self.names.extend(other.names);
        for (id, mut containers) in other.xrefs {
            self.xrefs.entry(id).or_default().append(&mut containers);
        }
    }
}

/// A PDF dictionary: names mapped to objects, plus the derived caches.
///
/// Mutation goes through the arena (`Arena::dict_set` and friends) so cache
/// and parent-link maintenance cannot be skipped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: BTreeMap<Name, Handle>,
    pub(crate) caches: Caches,
    pub(crate) type_tag: Option<TypeTag>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Handle> {
        self.entries.get(&Name::new(key)).copied()
    }

    pub fn get_name(&self, key: &Name) -> Option<Handle> {
        self.entries.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&Name::new(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, Handle)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    /// The promoted type, when type guessing recognized this dictionary.
    pub fn type_tag(&self) -> Option<TypeTag> {
        self.type_tag
    }

    pub fn strings_cache(&self) -> &[Handle] {
        &self.caches.strings
    }

    pub fn names_cache(&self) -> &[Name] {
        &self.caches.names
    }

    pub fn xref_cache(&self) -> &HashMap<ObjectId, Vec<Handle>> {
        &self.caches.xrefs
    }

    pub(crate) fn set_entry(&mut self, key: Name, value: Handle) {
        self.entries.insert(key, value);
    }

    pub(crate) fn remove_entry(&mut self, key: &Name) -> Option<Handle> {
        self.entries.remove(key)
    }

    pub(crate) fn take_caches(&mut self) -> Caches {
        std::mem::take(&mut self.caches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dictionary() {
        let dict = Dictionary::new();
        assert!(dict.is_empty());
        assert_eq!(dict.len(), 0);
        assert_eq!(dict.get("Type"), None);
        assert!(dict.type_tag().is_none());
    }

    #[test]
    fn test_entry_access() {
        let mut dict = Dictionary::new();
        dict.set_entry(Name::new("Length"), Handle::from_index(3));

        assert_eq!(dict.len(), 1);
        assert!(dict.contains_key("Length"));
        assert_eq!(dict.get("Length"), Some(Handle::from_index(3)));
        assert_eq!(dict.get_name(&Name::new("Length")), Some(Handle::from_index(3)));
        assert_eq!(dict.get("Filter"), None);
    }

    #[test]
    fn test_caches_absorb_unions_backpointers() {
        let container_a = Handle::from_index(10);
        let container_b = Handle::from_index(20);
        let target = ObjectId::new(5, 0);

        let mut a = Caches::default();
        a.strings.push(Handle::from_index(1));
        a.names.push(Name::new("Kids"));
        a.xrefs.insert(target, vec![container_a]);

        let mut b = Caches::default();
        b.strings.push(Handle::from_index(2));
        b.xrefs.insert(target, vec![container_b]);

        a.absorb(b);

        assert_eq!(a.strings, vec![Handle::from_index(1), Handle::from_index(2)]);
        assert_eq!(a.names, vec![Name::new("Kids")]);
        assert_eq!(a.xrefs[&target], vec![container_a, container_b]);
    }

    #[test]
    fn test_take_caches_clears() {
        let mut dict = Dictionary::new();
        dict.caches.strings.push(Handle::from_index(1));
        dict.caches.names.push(Name::new("A"));

        let taken = dict.take_caches();
        assert!(!taken.is_empty());
        assert!(dict.caches.is_empty());
    }
}
