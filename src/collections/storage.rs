//! Arena storage.
//!
//! Machine functions, blocks and instructions are linked to each other in both
//! directions, so they are kept in arenas and refer to each other through
//! copyable handles instead of references. A handle is only meaningful
//! together with the arena that produced it.
//!
//! - [ArenaPtr]: a handle that can be dereferenced in its arena.
//! - [ArenaDeref]: dereferencing a handle.
//! - [ArenaAlloc]: allocating a value and getting its handle back.
//! - [ArenaFree]: releasing the slot of a handle.
//!
//! A container owning several [BaseArena]s implements the traits once per
//! stored type with [impl_arena](crate::impl_arena), and the handle type then
//! decides which arena is used:
//!
//! ```rust
//! use rvalloc::impl_arena;
//! use rvalloc::collections::storage::*;
//!
//! struct Block { insts: Vec<Inst> }
//! struct InstData { opcode: &'static str }
//!
//! #[derive(Clone, Copy, PartialEq, Eq)]
//! struct Inst(BaseArenaPtr<InstData>);
//!
//! #[derive(Default)]
//! struct Ctx { insts: BaseArena<InstData> }
//!
//! impl_arena!(Ctx, InstData, Inst, insts);
//!
//! let mut ctx = Ctx::default();
//! let add = ctx.alloc(InstData { opcode: "add" });
//! let block = Block { insts: vec![add] };
//!
//! assert_eq!(block.insts[0].deref(&ctx).opcode, "add");
//! add.deref_mut(&mut ctx).opcode = "sub";
//! assert_eq!(add.deref(&ctx).opcode, "sub");
//!
//! ctx.free(add);
//! assert!(add.try_deref(&ctx).is_none());
//! ```

use std::{
    collections::VecDeque,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// Dereferencing handles of type `Ptr` into values of type `T`.
pub trait ArenaDeref<T, Ptr>
where
    Ptr: ArenaPtr<T = T, A = Self>,
{
    /// Get the value behind `ptr`, or `None` if the slot is vacant or out of
    /// bounds.
    fn try_deref(&self, ptr: Ptr) -> Option<&T>;

    /// Mutable version of [ArenaDeref::try_deref].
    fn try_deref_mut(&mut self, ptr: Ptr) -> Option<&mut T>;
}

/// Allocating values in an arena.
///
/// # See Also
///
/// - [ArenaFree]
pub trait ArenaAlloc<T, Ptr>: ArenaDeref<T, Ptr>
where
    Ptr: ArenaPtr<T = T, A = Self>,
{
    /// Reserve a slot, hand its handle to `f` and store the returned value.
    ///
    /// This is how self-referential values (e.g., a function that records its
    /// own handle) are built.
    fn alloc_with<F>(&mut self, f: F) -> Ptr
    where
        F: FnOnce(Ptr) -> T;

    /// Store `val` and return its handle.
    fn alloc(&mut self, val: T) -> Ptr { self.alloc_with(|_| val) }
}

/// Releasing slots of an arena.
pub trait ArenaFree<T, Ptr>: ArenaAlloc<T, Ptr>
where
    Ptr: ArenaPtr<T = T, A = Self>,
{
    /// Release the slot of `ptr`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already vacant or `ptr` is out of bounds.
    fn free(&mut self, ptr: Ptr);
}

/// A copyable handle into an arena of type [ArenaPtr::A].
pub trait ArenaPtr: Copy + Sized + Eq {
    /// The type of the value behind the handle.
    type T;

    /// The arena type the handle belongs to.
    type A: ArenaDeref<Self::T, Self>;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T>;

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T>;

    /// Dereference the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not point to a live value. A dangling handle
    /// means an earlier pass left the machine code inconsistent, which cannot
    /// be recovered from.
    fn deref(self, arena: &Self::A) -> &Self::T {
        self.try_deref(arena).expect("the arena pointer is invalid")
    }

    /// Dereference the handle mutably.
    ///
    /// # Panics
    ///
    /// Same as [ArenaPtr::deref].
    fn deref_mut(self, arena: &mut Self::A) -> &mut Self::T {
        self.try_deref_mut(arena)
            .expect("the arena pointer is invalid")
    }
}

/// A handle into a [BaseArena].
///
/// The handle is a plain index, the type parameter only keeps handles of
/// different arenas apart.
pub struct BaseArenaPtr<T> {
    id: usize,
    _marker: PhantomData<T>,
}

impl<T> fmt::Debug for BaseArenaPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseArenaPtr({})", self.id)
    }
}

impl<T> PartialEq for BaseArenaPtr<T> {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl<T> Eq for BaseArenaPtr<T> {}

impl<T> PartialOrd for BaseArenaPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl<T> Ord for BaseArenaPtr<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.id.cmp(&other.id) }
}

impl<T> Hash for BaseArenaPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

#[allow(clippy::non_canonical_clone_impl)]
impl<T> Clone for BaseArenaPtr<T> {
    fn clone(&self) -> Self {
        // derived `Clone` would require `T: Clone`
        BaseArenaPtr {
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> Copy for BaseArenaPtr<T> {}

impl<T> BaseArenaPtr<T> {
    fn new(id: usize) -> Self {
        BaseArenaPtr {
            id,
            _marker: PhantomData,
        }
    }

    /// The slot index of the handle.
    pub fn id(self) -> usize { self.id }
}

impl<T> ArenaPtr for BaseArenaPtr<T> {
    type A = BaseArena<T>;
    type T = T;

    fn try_deref(self, arena: &BaseArena<T>) -> Option<&T> { arena.try_deref(self) }

    fn try_deref_mut(self, arena: &mut BaseArena<T>) -> Option<&mut T> { arena.try_deref_mut(self) }
}

enum Slot<T> {
    Vacant,
    Occupied(T),
}

/// A vector of slots with a free list.
///
/// Freed slots are reused in the order they were freed, so a handle to a
/// freed value may later point to an unrelated value. Callers must not keep
/// handles to values they have freed.
pub struct BaseArena<T> {
    slots: Vec<Slot<T>>,
    free: VecDeque<usize>,
}

impl<T> Default for BaseArena<T> {
    fn default() -> Self {
        BaseArena {
            slots: Vec::new(),
            free: VecDeque::new(),
        }
    }
}

impl<T> ArenaAlloc<T, BaseArenaPtr<T>> for BaseArena<T> {
    fn alloc_with<F>(&mut self, f: F) -> BaseArenaPtr<T>
    where
        F: FnOnce(BaseArenaPtr<T>) -> T,
    {
        let id = match self.free.pop_front() {
            Some(id) => id,
            None => {
                self.slots.push(Slot::Vacant);
                self.slots.len() - 1
            }
        };
        let ptr = BaseArenaPtr::new(id);
        self.slots[id] = Slot::Occupied(f(ptr));
        ptr
    }
}

impl<T> ArenaFree<T, BaseArenaPtr<T>> for BaseArena<T> {
    fn free(&mut self, ptr: BaseArenaPtr<T>) {
        match self.slots.get(ptr.id) {
            Some(Slot::Occupied(_)) => {}
            Some(Slot::Vacant) | None => panic!("the arena pointer is invalid, double free may occur"),
        }
        self.slots[ptr.id] = Slot::Vacant;
        self.free.push_back(ptr.id);
    }
}

impl<T> ArenaDeref<T, BaseArenaPtr<T>> for BaseArena<T> {
    fn try_deref(&self, ptr: BaseArenaPtr<T>) -> Option<&T> {
        match self.slots.get(ptr.id)? {
            Slot::Vacant => None,
            Slot::Occupied(val) => Some(val),
        }
    }

    fn try_deref_mut(&mut self, ptr: BaseArenaPtr<T>) -> Option<&mut T> {
        match self.slots.get_mut(ptr.id)? {
            Slot::Vacant => None,
            Slot::Occupied(val) => Some(val),
        }
    }
}

impl<T> BaseArena<T> {
    /// Number of live values.
    pub fn len(&self) -> usize { self.slots.len() - self.free.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Iterate over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (BaseArenaPtr<T>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| match slot {
                Slot::Vacant => None,
                Slot::Occupied(val) => Some((BaseArenaPtr::new(id), val)),
            })
    }
}

/// Implement the arena traits of `$value` behind the handle `$ptr` for the
/// container `$arena`, storing the values in its [BaseArena] field `$field`.
///
/// `$ptr` must be a tuple struct wrapping a [BaseArenaPtr].
#[macro_export]
macro_rules! impl_arena {
    ($arena:ty, $value:ty, $ptr:path, $field:ident) => {
        impl $crate::collections::storage::ArenaPtr for $ptr {
            type A = $arena;
            type T = $value;

            fn try_deref(self, arena: &Self::A) -> Option<&Self::T> {
                $crate::collections::storage::ArenaDeref::try_deref(arena, self)
            }

            fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
                $crate::collections::storage::ArenaDeref::try_deref_mut(arena, self)
            }
        }

        impl $crate::collections::storage::ArenaAlloc<$value, $ptr> for $arena {
            fn alloc_with<F>(&mut self, f: F) -> $ptr
            where
                F: FnOnce($ptr) -> $value,
            {
                $ptr($crate::collections::storage::ArenaAlloc::alloc_with(
                    &mut self.$field,
                    |ptr| f($ptr(ptr)),
                ))
            }
        }

        impl $crate::collections::storage::ArenaDeref<$value, $ptr> for $arena {
            fn try_deref(&self, ptr: $ptr) -> Option<&$value> {
                $crate::collections::storage::ArenaDeref::try_deref(&self.$field, ptr.0)
            }

            fn try_deref_mut(&mut self, ptr: $ptr) -> Option<&mut $value> {
                $crate::collections::storage::ArenaDeref::try_deref_mut(&mut self.$field, ptr.0)
            }
        }

        impl $crate::collections::storage::ArenaFree<$value, $ptr> for $arena {
            fn free(&mut self, ptr: $ptr) {
                $crate::collections::storage::ArenaFree::free(&mut self.$field, ptr.0)
            }
        }
    };
}
