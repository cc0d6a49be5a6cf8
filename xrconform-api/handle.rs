/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Generation-counted handles into backend-owned collections.
//!
//! A handle packs the index in its collection with the collection's generation
//! number (`index | generation << 32`). Clearing the collection bumps the
//! generation, so a handle kept across a backend shutdown is detected as stale
//! instead of silently aliasing whatever is stored at its index now.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

const GENERATION_SHIFT: u32 = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum HandleError {
    #[error("internal error: trying to use a null graphics handle")]
    Null,

    #[error(
        "internal error: trying to use a graphics handle (generation {generation}) left over from before a shutdown (now generation {current})"
    )]
    Stale { generation: u32, current: u32 },

    #[error("internal error: graphics handle index {index} is out of range")]
    OutOfRange { index: u32 },
}

/// A typed handle. `Kind` is an uninhabited marker naming what it refers to.
pub struct Handle<Kind> {
    raw: u64,
    kind: PhantomData<Kind>,
}

impl<Kind> Handle<Kind> {
    pub const NULL: Handle<Kind> = Handle {
        raw: 0,
        kind: PhantomData,
    };

    pub fn from_raw(raw: u64) -> Self {
        Handle {
            raw,
            kind: PhantomData,
        }
    }

    pub fn raw(self) -> u64 {
        self.raw
    }

    pub fn is_null(self) -> bool {
        self.raw == 0
    }

    fn index(self) -> u32 {
        self.raw as u32
    }

    fn generation(self) -> u32 {
        (self.raw >> GENERATION_SHIFT) as u32
    }
}

impl<Kind> Clone for Handle<Kind> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Kind> Copy for Handle<Kind> {}

impl<Kind> PartialEq for Handle<Kind> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<Kind> Eq for Handle<Kind> {}

impl<Kind> Hash for Handle<Kind> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}

impl<Kind> Default for Handle<Kind> {
    fn default() -> Self {
        Handle::NULL
    }
}

impl<Kind> fmt::Debug for Handle<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle({}@{})", self.index(), self.generation())
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Mesh {}

#[derive(Clone, Copy, Debug)]
pub enum GltfModel {}

#[derive(Clone, Copy, Debug)]
pub enum GltfModelInstance {}

pub type MeshHandle = Handle<Mesh>;
pub type GltfModelHandle = Handle<GltfModel>;
pub type GltfModelInstanceHandle = Handle<GltfModelInstance>;

/// A growable collection addressed by generation-counted handles.
pub struct HandleVec<T, Kind> {
    data: Vec<T>,
    generation: u32,
    kind: PhantomData<Kind>,
}

impl<T, Kind> Default for HandleVec<T, Kind> {
    fn default() -> Self {
        HandleVec::new()
    }
}

impl<T, Kind> HandleVec<T, Kind> {
    pub fn new() -> Self {
        // Generation zero is never issued, so no live handle is ever null.
        HandleVec {
            data: Vec::new(),
            generation: 1,
            kind: PhantomData,
        }
    }

    pub fn push(&mut self, value: T) -> Handle<Kind> {
        let index = self.data.len() as u64;
        self.data.push(value);
        Handle::from_raw(index | (u64::from(self.generation) << GENERATION_SHIFT))
    }

    pub fn get(&self, handle: Handle<Kind>) -> Result<&T, HandleError> {
        let index = self.check(handle)?;
        Ok(&self.data[index])
    }

    pub fn get_mut(&mut self, handle: Handle<Kind>) -> Result<&mut T, HandleError> {
        let index = self.check(handle)?;
        Ok(&mut self.data[index])
    }

    /// Drops every element and invalidates every handle issued so far.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1).max(1);
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn check(&self, handle: Handle<Kind>) -> Result<usize, HandleError> {
        if handle.is_null() {
            return Err(HandleError::Null);
        }
        if handle.generation() != self.generation {
            return Err(HandleError::Stale {
                generation: handle.generation(),
                current: self.generation,
            });
        }
        let index = handle.index();
        if index as usize >= self.data.len() {
            return Err(HandleError::OutOfRange { index });
        }
        Ok(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_resolve_to_their_own_element() {
        let mut meshes: HandleVec<&str, Mesh> = HandleVec::new();
        let cube = meshes.push("cube");
        let quad = meshes.push("quad");
        assert_ne!(cube, quad);
        assert_eq!(meshes.get(cube), Ok(&"cube"));
        assert_eq!(meshes.get(quad), Ok(&"quad"));
        *meshes.get_mut(quad).unwrap() = "plane";
        assert_eq!(meshes.get(quad), Ok(&"plane"));
    }

    #[test]
    fn null_handle_is_rejected() {
        let meshes: HandleVec<u8, Mesh> = HandleVec::new();
        assert_eq!(meshes.get(MeshHandle::NULL), Err(HandleError::Null));
        assert_eq!(meshes.get(MeshHandle::default()), Err(HandleError::Null));
    }

    #[test]
    fn clearing_makes_old_handles_stale_even_when_the_slot_is_reused() {
        let mut meshes: HandleVec<u32, Mesh> = HandleVec::new();
        let old = meshes.push(1);
        meshes.clear();
        let new = meshes.push(2);

        assert_eq!(old.raw() as u32, new.raw() as u32);
        assert_eq!(
            meshes.get(old),
            Err(HandleError::Stale {
                generation: 1,
                current: 2
            })
        );
        assert_eq!(meshes.get(new), Ok(&2));
    }

    #[test]
    fn forged_index_is_out_of_range() {
        let mut models: HandleVec<(), GltfModel> = HandleVec::new();
        let handle = models.push(());
        let forged = GltfModelHandle::from_raw(handle.raw() + 5);
        assert_eq!(models.get(forged), Err(HandleError::OutOfRange { index: 5 }));
    }
}
