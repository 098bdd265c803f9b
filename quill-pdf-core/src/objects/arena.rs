use crate::error::{PdfError, Result};
use crate::objects::dictionary::Caches;
use crate::objects::{Array, Dictionary, Name, Object, ObjectId};
use std::collections::HashMap;

/// Non-owning handle to an object slot in an [`Arena`].
///
/// Handles are plain indices: cheap to copy, never deallocated within an
/// arena's lifetime, and meaningless outside the arena that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub fn from_index(index: usize) -> Self {
        Handle(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Bookkeeping attached to every allocated object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectMeta {
    /// Object number, 0 for direct objects.
    pub number: u32,
    /// Generation number, 0 for direct objects.
    pub generation: u16,
    /// Whether the object is indirect (referable from elsewhere).
    pub indirect: bool,
    /// Byte offset of the object in the source buffer, when parsed.
    pub file_offset: Option<usize>,
    /// Byte offset inside the containing object stream, when applicable.
    pub objstm_offset: Option<usize>,
    /// Enclosing object, as a non-owning handle.
    pub parent: Option<Handle>,
}

impl ObjectMeta {
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.number, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Object,
    meta: ObjectMeta,
}

/// Slab of PDF objects addressed by [`Handle`].
///
/// Composite objects store handles to their children; `parent` back-links
/// are handles too, so the graph has no owning cycles and deep copies are a
/// matter of cloning a subgraph and remapping handles.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    slots: Vec<Slot>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn alloc(&mut self, value: Object) -> Handle {
        let handle = Handle::from_index(self.slots.len());
        self.slots.push(Slot {
            value,
            meta: ObjectMeta::default(),
        });
        handle
    }

    /// Look up a handle that may come from an untrusted caller.
    pub fn try_get(&self, handle: Handle) -> Result<&Object> {
        self.slots
            .get(handle.index())
            .map(|slot| &slot.value)
            .ok_or(PdfError::StaleHandle(handle))
    }

    pub fn get(&self, handle: Handle) -> &Object {
        &self.slots[handle.index()].value
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Object {
        &mut self.slots[handle.index()].value
    }

    pub fn meta(&self, handle: Handle) -> &ObjectMeta {
        &self.slots[handle.index()].meta
    }

    pub fn meta_mut(&mut self, handle: Handle) -> &mut ObjectMeta {
        &mut self.slots[handle.index()].meta
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> {
        (0..self.slots.len()).map(Handle::from_index)
    }

    /// Mark an object direct or indirect. Clearing the flag also clears the
    /// object number and generation.
    pub fn set_indirect(&mut self, handle: Handle, indirect: bool) {
        let meta = self.meta_mut(handle);
        if !indirect {
            meta.number = 0;
            meta.generation = 0;
        }
        meta.indirect = indirect;
    }

    pub fn set_object_id(&mut self, handle: Handle, number: u32, generation: u16) {
        let meta = self.meta_mut(handle);
        meta.number = number;
        meta.generation = generation;
    }

    /// A reference to this object. Only indirect objects may be referenced.
    pub fn reference(&self, handle: Handle) -> Result<ObjectId> {
        let meta = self.meta(handle);
        if !meta.indirect {
            return Err(PdfError::DirectObject(
                "cannot reference a direct object".to_string(),
            ));
        }
        Ok(meta.id())
    }

    /// First indirect object on the parent chain, starting at `handle`
    /// itself. `None` when the chain ends at a detached direct object.
    pub fn indirect_parent(&self, handle: Handle) -> Option<Handle> {
        let mut current = handle;
        loop {
            let meta = self.meta(current);
            if meta.indirect {
                return Some(current);
            }
            current = meta.parent?;
        }
    }

    fn dict_of(&self, handle: Handle) -> Result<&Dictionary> {
        match self.get(handle) {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&stream.dict),
            other => Err(PdfError::InvalidObject(format!(
                "expected a dictionary or stream, found {}",
                other.kind()
            ))),
        }
    }

    fn dict_of_mut(&mut self, handle: Handle) -> Result<&mut Dictionary> {
        match self.get_mut(handle) {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&mut stream.dict),
            other => Err(PdfError::InvalidObject(format!(
                "expected a dictionary or stream, found {}",
                other.kind()
            ))),
        }
    }

    fn container_caches_mut(&mut self, handle: Handle) -> Result<&mut Caches> {
        match self.get_mut(handle) {
            Object::Dictionary(dict) => Ok(&mut dict.caches),
            Object::Stream(stream) => Ok(&mut stream.dict.caches),
            Object::Array(array) => Ok(&mut array.caches),
            other => Err(PdfError::InvalidObject(format!(
                "expected a container, found {}",
                other.kind()
            ))),
        }
    }

    /// Cache and parent-link maintenance shared by every container insert.
    fn absorb_child(&mut self, container: Handle, value: Handle) -> Result<()> {
        enum Contribution {
            None,
            String,
            Name(Name),
            Reference(ObjectId),
        }

        let (absorbed, contribution) = {
            let slot = &mut self.slots[value.index()];
            let absorbed = match &mut slot.value {
                Object::Dictionary(dict) => Some(dict.take_caches()),
                Object::Array(array) => Some(array.take_caches()),
                _ => None,
            };
            let contribution = match &slot.value {
                Object::String(_) => Contribution::String,
                Object::Name(name) => Contribution::Name(name.clone()),
                Object::Reference(id) => Contribution::Reference(*id),
                _ => Contribution::None,
            };
            if !slot.meta.indirect && slot.meta.parent.is_none() {
                slot.meta.parent = Some(container);
            }
            (absorbed, contribution)
        };

        let caches = self.container_caches_mut(container)?;
        match contribution {
            Contribution::None => {}
            Contribution::String => caches.strings.push(value),
            Contribution::Name(name) => caches.names.push(name),
            Contribution::Reference(id) => caches.xrefs.entry(id).or_default().push(container),
        }
        if let Some(child_caches) = absorbed {
            caches.absorb(child_caches);
        }
        Ok(())
    }

    /// Set `key` in a dictionary (or a stream's dictionary). A null value
    /// deletes the key instead of storing it. Returns the replaced entry.
    pub fn dict_set(
        &mut self,
        container: Handle,
        key: impl Into<Name>,
        value: Handle,
    ) -> Result<Option<Handle>> {
        let key = key.into();
        if self.get(value).is_null() {
            return self.dict_remove(container, &key);
        }

        self.dict_of(container)?;
        self.absorb_child(container, value)?;

        let caches = self.container_caches_mut(container)?;
        caches.names.push(key.clone());

        let dict = self.dict_of_mut(container)?;
        let previous = dict.get_name(&key);
        dict.set_entry(key, value);
        Ok(previous)
    }

    /// Allocate `value` and set it under `key`. Returns the new handle, or
    /// `None` when the value was null and the key was deleted.
    pub fn dict_set_value(
        &mut self,
        container: Handle,
        key: impl Into<Name>,
        value: impl Into<Object>,
    ) -> Result<Option<Handle>> {
        let value = value.into();
        if value.is_null() {
            self.dict_remove(container, &key.into())?;
            return Ok(None);
        }
        let handle = self.alloc(value);
        self.dict_set(container, key, handle)?;
        Ok(Some(handle))
    }

    pub fn dict_get(&self, container: Handle, key: &str) -> Option<Handle> {
        self.dict_of(container).ok()?.get(key)
    }

    pub fn dict_remove(&mut self, container: Handle, key: &Name) -> Result<Option<Handle>> {
        Ok(self.dict_of_mut(container)?.remove_entry(key))
    }

    /// Merge `src` into `dst`: entries from `src` win, caches are unioned.
    /// Back-pointers that named `src` are remapped to `dst`.
    pub fn dict_merge(&mut self, dst: Handle, src: Handle) -> Result<()> {
        let entries: Vec<(Name, Handle)> = self
            .dict_of(src)?
            .iter()
            .map(|(k, v)| (k.clone(), v))
            .collect();

        let mut caches = self.dict_of_mut(src)?.take_caches();
        for containers in caches.xrefs.values_mut() {
            for container in containers.iter_mut() {
                if *container == src {
                    *container = dst;
                }
            }
        }

        for (_, value) in &entries {
            let meta = self.meta_mut(*value);
            if meta.parent == Some(src) {
                meta.parent = Some(dst);
            }
        }

        let dict = self.dict_of_mut(dst)?;
        for (key, value) in entries {
            dict.set_entry(key, value);
        }
        dict.caches.absorb(caches);
        Ok(())
    }

    pub fn array_push(&mut self, array: Handle, value: Handle) -> Result<()> {
        match self.get(array) {
            Object::Array(_) => {}
            other => {
                return Err(PdfError::InvalidObject(format!(
                    "expected an array, found {}",
                    other.kind()
                )))
            }
        }
        self.absorb_child(array, value)?;
        match self.get_mut(array) {
            Object::Array(a) => a.push_item(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    pub fn array_push_value(&mut self, array: Handle, value: impl Into<Object>) -> Result<Handle> {
        let handle = self.alloc(value.into());
        self.array_push(array, handle)?;
        Ok(handle)
    }

    /// Replace an array element in place. The caches keep the old entry;
    /// like the original they are append-only and tolerate stale members.
    pub fn array_set(&mut self, array: Handle, index: usize, value: Handle) -> Result<()> {
        let len = match self.get(array) {
            Object::Array(a) => a.len(),
            other => {
                return Err(PdfError::InvalidObject(format!(
                    "expected an array, found {}",
                    other.kind()
                )))
            }
        };
        if index >= len {
            return Err(PdfError::InvalidObject(format!(
                "array index {index} out of bounds ({len})"
            )));
        }
        self.absorb_child(array, value)?;
        match self.get_mut(array) {
            Object::Array(a) => a.set_item(index, value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Deep structural clone of the subgraph rooted at `handle`.
    ///
    /// The copy keeps object numbers and the indirect flag but is detached:
    /// the root's parent link is severed and nothing is entered into any
    /// document table. Caches and internal parent links are remapped to the
    /// cloned handles.
    pub fn deep_copy(&mut self, handle: Handle) -> Handle {
        let mut map = HashMap::new();
        let copy = self.copy_rec(handle, &mut map);
        self.meta_mut(copy).parent = None;
        copy
    }

    fn copy_rec(&mut self, handle: Handle, map: &mut HashMap<Handle, Handle>) -> Handle {
        if let Some(&copied) = map.get(&handle) {
            return copied;
        }

        let meta = self.slots[handle.index()].meta.clone();
        let copy = self.alloc(Object::Null);
        map.insert(handle, copy);

        let value = self.slots[handle.index()].value.clone();
        let new_value = match value {
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict, copy, map)),
            Object::Array(array) => {
                let mut cloned = Array::new();
                for item in array.iter().collect::<Vec<_>>() {
                    let child = self.copy_rec(item, map);
                    self.reparent_copy(child, copy);
                    cloned.push_item(child);
                }
                cloned.caches = Self::remap_caches(array.caches.clone(), map);
                Object::Array(cloned)
            }
            Object::Stream(mut stream) => {
                let dict = std::mem::take(&mut stream.dict);
                stream.dict = self.copy_dict(dict, copy, map);
                // A copied object stream reloads its packed objects lazily.
                stream.packed = None;
                Object::Stream(stream)
            }
            other => other,
        };

        let mapped_parent = meta.parent.and_then(|p| map.get(&p).copied());
        let slot = &mut self.slots[copy.index()];
        slot.value = new_value;
        slot.meta = meta;
        slot.meta.parent = mapped_parent;
        copy
    }

    fn copy_dict(
        &mut self,
        dict: Dictionary,
        parent: Handle,
        map: &mut HashMap<Handle, Handle>,
    ) -> Dictionary {
        let mut cloned = Dictionary::new();
        cloned.type_tag = dict.type_tag;
        for (key, value) in dict.iter().map(|(k, v)| (k.clone(), v)).collect::<Vec<_>>() {
            let child = self.copy_rec(value, map);
            self.reparent_copy(child, parent);
            cloned.set_entry(key, child);
        }
        cloned.caches = Self::remap_caches(dict.caches.clone(), map);
        cloned
    }

    fn reparent_copy(&mut self, child: Handle, parent: Handle) {
        let meta = self.meta_mut(child);
        if !meta.indirect {
            meta.parent = Some(parent);
        }
    }

    fn remap_caches(mut caches: Caches, map: &HashMap<Handle, Handle>) -> Caches {
        for string in caches.strings.iter_mut() {
            if let Some(&mapped) = map.get(string) {
                *string = mapped;
            }
        }
        for containers in caches.xrefs.values_mut() {
            for container in containers.iter_mut() {
                if let Some(&mapped) = map.get(container) {
                    *container = mapped;
                }
            }
        }
        caches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PdfString;

    fn arena_with_dict() -> (Arena, Handle) {
        let mut arena = Arena::new();
        let dict = arena.alloc(Object::Dictionary(Dictionary::new()));
        (arena, dict)
    }

    #[test]
    fn test_alloc_and_access() {
        let mut arena = Arena::new();
        let h = arena.alloc(Object::Integer(42));
        assert_eq!(arena.get(h).as_integer(), Some(42));
        assert!(!arena.meta(h).indirect);
        assert_eq!(arena.meta(h).number, 0);
    }

    #[test]
    fn test_set_indirect_false_clears_identity() {
        let mut arena = Arena::new();
        let h = arena.alloc(Object::Integer(1));
        arena.set_indirect(h, true);
        arena.set_object_id(h, 12, 3);
        assert_eq!(arena.reference(h).unwrap(), ObjectId::new(12, 3));

        arena.set_indirect(h, false);
        assert_eq!(arena.meta(h).number, 0);
        assert_eq!(arena.meta(h).generation, 0);
        assert!(arena.reference(h).is_err());
    }

    #[test]
    fn test_reference_on_direct_object_fails() {
        let mut arena = Arena::new();
        let h = arena.alloc(Object::Boolean(true));
        assert!(matches!(
            arena.reference(h),
            Err(PdfError::DirectObject(_))
        ));
    }

    #[test]
    fn test_dict_set_wires_parent_and_caches() {
        let (mut arena, dict) = arena_with_dict();
        let s = arena
            .dict_set_value(dict, "Title", PdfString::literal(b"hello".to_vec()))
            .unwrap()
            .unwrap();
        let n = arena.dict_set_value(dict, "Kind", Name::new("Example")).unwrap().unwrap();
        arena
            .dict_set_value(dict, "Next", ObjectId::new(7, 0))
            .unwrap();

        assert_eq!(arena.meta(s).parent, Some(dict));
        assert_eq!(arena.meta(n).parent, Some(dict));

        let d = match arena.get(dict) {
            Object::Dictionary(d) => d,
            _ => unreachable!(),
        };
        assert_eq!(d.strings_cache(), &[s]);
        assert!(d.names_cache().contains(&Name::new("Example")));
        assert!(d.names_cache().contains(&Name::new("Title")));
        assert_eq!(d.xref_cache()[&ObjectId::new(7, 0)], vec![dict]);
    }

    #[test]
    fn test_nested_container_caches_are_absorbed() {
        let (mut arena, outer) = arena_with_dict();
        let inner = arena.alloc(Object::Dictionary(Dictionary::new()));
        let s = arena
            .dict_set_value(inner, "Producer", PdfString::literal(b"q".to_vec()))
            .unwrap()
            .unwrap();

        arena.dict_set(outer, "Info", inner).unwrap();

        let outer_dict = match arena.get(outer) {
            Object::Dictionary(d) => d,
            _ => unreachable!(),
        };
        assert_eq!(outer_dict.strings_cache(), &[s]);

        let inner_dict = match arena.get(inner) {
            Object::Dictionary(d) => d,
            _ => unreachable!(),
        };
        assert!(inner_dict.caches.is_empty());
        assert_eq!(arena.meta(inner).parent, Some(outer));
    }

    #[test]
    fn test_null_assignment_deletes_key() {
        let (mut arena, dict) = arena_with_dict();
        arena.dict_set_value(dict, "Length", 5i64).unwrap();
        assert!(arena.dict_get(dict, "Length").is_some());

        let null = arena.alloc(Object::Null);
        arena.dict_set(dict, "Length", null).unwrap();
        assert!(arena.dict_get(dict, "Length").is_none());
    }

    #[test]
    fn test_merge_unions_caches() {
        let (mut arena, a) = arena_with_dict();
        let b = arena.alloc(Object::Dictionary(Dictionary::new()));
        let s1 = arena
            .dict_set_value(a, "A", PdfString::literal(b"1".to_vec()))
            .unwrap()
            .unwrap();
        let s2 = arena
            .dict_set_value(b, "B", PdfString::literal(b"2".to_vec()))
            .unwrap()
            .unwrap();
        arena.dict_set_value(a, "RefA", ObjectId::new(1, 0)).unwrap();
        arena.dict_set_value(b, "RefB", ObjectId::new(2, 0)).unwrap();

        arena.dict_merge(a, b).unwrap();

        let merged = match arena.get(a) {
            Object::Dictionary(d) => d,
            _ => unreachable!(),
        };
        assert!(merged.contains_key("A") && merged.contains_key("B"));
        assert_eq!(merged.strings_cache(), &[s1, s2]);
        // Both back-pointer lists now name the merged container.
        assert_eq!(merged.xref_cache()[&ObjectId::new(1, 0)], vec![a]);
        assert_eq!(merged.xref_cache()[&ObjectId::new(2, 0)], vec![a]);
    }

    #[test]
    fn test_indirect_parent_walks_chain() {
        let (mut arena, root) = arena_with_dict();
        arena.set_indirect(root, true);
        arena.set_object_id(root, 4, 0);

        let inner = arena.alloc(Object::Dictionary(Dictionary::new()));
        let leaf = arena
            .dict_set_value(inner, "S", PdfString::literal(b"x".to_vec()))
            .unwrap()
            .unwrap();
        arena.dict_set(root, "Inner", inner).unwrap();

        assert_eq!(arena.indirect_parent(leaf), Some(root));
        assert_eq!(arena.indirect_parent(root), Some(root));

        let stray = arena.alloc(Object::Integer(0));
        assert_eq!(arena.indirect_parent(stray), None);
    }

    #[test]
    fn test_deep_copy_severs_root_links() {
        let (mut arena, root) = arena_with_dict();
        arena.set_indirect(root, true);
        arena.set_object_id(root, 9, 0);
        let s = arena
            .dict_set_value(root, "S", PdfString::literal(b"data".to_vec()))
            .unwrap()
            .unwrap();

        let copy = arena.deep_copy(root);
        assert_ne!(copy, root);
        assert_eq!(arena.meta(copy).parent, None);
        assert_eq!(arena.meta(copy).number, 9);
        assert!(arena.meta(copy).indirect);

        // Mutating the copy leaves the original untouched.
        let copied_s = arena.dict_get(copy, "S").unwrap();
        assert_ne!(copied_s, s);
        match arena.get_mut(copied_s) {
            Object::String(st) => st.data = b"changed".to_vec(),
            _ => unreachable!(),
        }
        match arena.get(s) {
            Object::String(st) => assert_eq!(st.as_bytes(), b"data"),
            _ => unreachable!(),
        }

        // Copied caches point at copied children.
        let copied_dict = match arena.get(copy) {
            Object::Dictionary(d) => d,
            _ => unreachable!(),
        };
        assert_eq!(copied_dict.strings_cache(), &[copied_s]);
    }

    #[test]
    fn test_try_get_rejects_stale_handle() {
        let arena = Arena::new();
        let bogus = Handle::from_index(99);
        assert!(matches!(
            arena.try_get(bogus),
            Err(PdfError::StaleHandle(_))
        ));
    }
}
