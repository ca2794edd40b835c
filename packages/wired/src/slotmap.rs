//! Arena storage with slot reuse.
//!
//! Keys carry the generation of the slot they were issued for, so a key to a
//! released value never resolves to whatever later reuses the slot.

use std::mem;

const NONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Key {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    /// The value, or the next free slot.
    value: Result<T, u32>,
}

#[derive(Debug)]
pub(crate) struct SlotMap<T> {
    head: u32,
    len: usize,
    entries: Vec<Slot<T>>,
}

impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotMap<T> {
    pub(crate) fn new() -> Self {
        Self {
            head: NONE,
            len: 0,
            entries: vec![],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> Key {
        self.len += 1;
        if self.head == NONE {
            let index = self.entries.len() as u32;
            self.entries.push(Slot {
                generation: 0,
                value: Ok(value),
            });
            return Key {
                index,
                generation: 0,
            };
        }

        let index = self.head;
        let slot = &mut self.entries[index as usize];
        let previous = mem::replace(&mut slot.value, Ok(value));
        debug_assert!(previous.is_err(), "corrupted slot map");
        self.head = previous.err().unwrap_or(NONE);
        Key {
            index,
            generation: slot.generation,
        }
    }

    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        self.entries
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref().ok())
    }

    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.entries
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut().ok())
    }

    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn release(&mut self, key: Key) -> Option<T> {
        let slot = self.entries.get_mut(key.index as usize)?;
        if slot.generation != key.generation || slot.value.is_err() {
            return None;
        }
        let value = mem::replace(&mut slot.value, Err(self.head)).ok();
        slot.generation = slot.generation.wrapping_add(1);
        self.head = key.index;
        self.len -= 1;
        value
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Key, &T)> {
        self.entries.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().ok().map(|value| {
                (
                    Key {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slots_are_reused() {
        let mut map = SlotMap::new();
        let a = map.insert("a");
        let b = map.insert("b");
        assert_eq!(map.release(a), Some("a"));
        assert_eq!(map.len(), 1);

        let c = map.insert("c");
        assert_eq!(c.index, a.index);
        assert_ne!(c, a);
        assert_eq!(map.get(a), None);
        assert_eq!(map.get(c), Some(&"c"));
        assert_eq!(map.get(b), Some(&"b"));
    }

    #[test]
    fn double_release_is_ignored() {
        let mut map = SlotMap::new();
        let a = map.insert(1);
        assert_eq!(map.release(a), Some(1));
        assert_eq!(map.release(a), None);
        assert_eq!(map.len(), 0);
        let b = map.insert(2);
        let c = map.insert(3);
        assert_ne!(b.index, c.index);
    }

    #[test]
    fn iter_skips_vacant() {
        let mut map = SlotMap::new();
        let keys: Vec<_> = (0..4).map(|i| map.insert(i)).collect();
        map.release(keys[1]);
        let values: Vec<_> = map.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 2, 3]);
    }
}
