//! # Intrusive Linked Lists over Arena Handles
//!
//! Blocks of a function and instructions of a block form doubly-linked lists
//! whose links are stored in the nodes themselves, as arena handles. Inserting
//! or unlinking a node is O(1) and does not disturb the handles of its
//! neighbours, so a pass can insert code around the instruction it is looking
//! at without invalidating its position.

use super::storage::ArenaPtr;

/// A container holding one linked list of `NodePtr`.
///
/// The container shares its arena with the nodes.
pub trait LinkedListContainerPtr<NodePtr>: ArenaPtr
where
    NodePtr: LinkedListNodePtr<A = Self::A, ContainerPtr = Self>,
{
    /// The first node, `None` iff the list is empty.
    fn head(self, arena: &Self::A) -> Option<NodePtr>;

    /// The last node, `None` iff the list is empty.
    fn tail(self, arena: &Self::A) -> Option<NodePtr>;

    /// Low-level setter, use [push_front](Self::push_front) or
    /// [push_back](Self::push_back) instead.
    fn set_head(self, arena: &mut Self::A, head: Option<NodePtr>);

    /// Low-level setter, see [set_head](Self::set_head).
    fn set_tail(self, arena: &mut Self::A, tail: Option<NodePtr>);

    /// Push `node` to the front of the list.
    ///
    /// # Panics
    ///
    /// Panics if `node` is already linked into a container.
    fn push_front(self, arena: &mut Self::A, node: NodePtr) {
        assert!(
            node.container(arena).is_none(),
            "the node is already in another container"
        );

        match self.head(arena) {
            Some(head) => head.insert_before(arena, node),
            None => {
                self.set_head(arena, Some(node));
                self.set_tail(arena, Some(node));
                node.set_container(arena, Some(self));
            }
        }
    }

    /// Push `node` to the back of the list.
    ///
    /// # Panics
    ///
    /// Panics if `node` is already linked into a container.
    fn push_back(self, arena: &mut Self::A, node: NodePtr) {
        assert!(
            node.container(arena).is_none(),
            "the node is already in another container"
        );

        match self.tail(arena) {
            Some(tail) => tail.insert_after(arena, node),
            None => {
                self.set_head(arena, Some(node));
                self.set_tail(arena, Some(node));
                node.set_container(arena, Some(self));
            }
        }
    }

    /// Iterate over the nodes, front to back (or back to front with
    /// [Iterator::rev]).
    ///
    /// The iterator borrows the arena, so the list cannot change while it is
    /// alive.
    fn iter(self, arena: &Self::A) -> LinkedListIterator<NodePtr> {
        LinkedListIterator {
            arena,
            front: self.head(arena),
            back: self.tail(arena),
        }
    }
}

/// Double-ended iterator over a linked list.
pub struct LinkedListIterator<'a, T: LinkedListNodePtr> {
    arena: &'a T::A,
    front: Option<T>,
    back: Option<T>,
}

impl<'a, T: LinkedListNodePtr> Iterator for LinkedListIterator<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let curr = self.front?;
        if self.back == Some(curr) {
            self.front = None;
            self.back = None;
        } else {
            self.front = curr.next(self.arena);
        }
        Some(curr)
    }
}

impl<'a, T: LinkedListNodePtr> DoubleEndedIterator for LinkedListIterator<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let curr = self.back?;
        if self.front == Some(curr) {
            self.front = None;
            self.back = None;
        } else {
            self.back = curr.prev(self.arena);
        }
        Some(curr)
    }
}

/// A node of a linked list.
///
/// A node belongs to at most one container at a time. The setters are
/// low-level, lists should be edited through `insert_*` and
/// [unlink](LinkedListNodePtr::unlink).
pub trait LinkedListNodePtr: ArenaPtr {
    /// The container type, e.g., the block of an instruction.
    type ContainerPtr: LinkedListContainerPtr<Self, A = Self::A>;

    fn next(self, arena: &Self::A) -> Option<Self>;

    fn prev(self, arena: &Self::A) -> Option<Self>;

    fn set_next(self, arena: &mut Self::A, next: Option<Self>);

    fn set_prev(self, arena: &mut Self::A, prev: Option<Self>);

    fn container(self, arena: &Self::A) -> Option<Self::ContainerPtr>;

    fn set_container(self, arena: &mut Self::A, container: Option<Self::ContainerPtr>);

    /// Link `node` right after `self`, updating the tail of the container if
    /// `self` was the tail.
    ///
    /// # Panics
    ///
    /// - Panics if `self` is not in a container.
    /// - Panics if `node` is already in a container.
    fn insert_after(self, arena: &mut Self::A, node: Self) {
        let container = self
            .container(arena)
            .expect("cannot insert after a node without container");
        assert!(
            node.container(arena).is_none(),
            "cannot insert a node that already belongs to a container"
        );

        if let Some(next) = self.next(arena) {
            next.set_prev(arena, Some(node));
            node.set_next(arena, Some(next));
        } else {
            container.set_tail(arena, Some(node));
        }

        node.set_prev(arena, Some(self));
        self.set_next(arena, Some(node));
        node.set_container(arena, Some(container));
    }

    /// Link `node` right before `self`, updating the head of the container if
    /// `self` was the head.
    ///
    /// # Panics
    ///
    /// - Panics if `self` is not in a container.
    /// - Panics if `node` is already in a container.
    fn insert_before(self, arena: &mut Self::A, node: Self) {
        let container = self
            .container(arena)
            .expect("cannot insert before a node without container");
        assert!(
            node.container(arena).is_none(),
            "cannot insert a node that already belongs to a container"
        );

        if let Some(prev) = self.prev(arena) {
            prev.set_next(arena, Some(node));
            node.set_prev(arena, Some(prev));
        } else {
            container.set_head(arena, Some(node));
        }

        node.set_next(arena, Some(self));
        self.set_prev(arena, Some(node));
        node.set_container(arena, Some(container));
    }

    /// Take the node out of its list. The node stays allocated.
    ///
    /// Unlinking a node that is not in a list does nothing.
    fn unlink(self, arena: &mut Self::A) {
        let prev = self.prev(arena);
        let next = self.next(arena);

        if let Some(prev) = prev {
            prev.set_next(arena, next);
        }
        if let Some(next) = next {
            next.set_prev(arena, prev);
        }

        if let Some(container) = self.container(arena) {
            if container.head(arena) == Some(self) {
                container.set_head(arena, next);
            }
            if container.tail(arena) == Some(self) {
                container.set_tail(arena, prev);
            }
        }

        self.set_prev(arena, None);
        self.set_next(arena, None);
        self.set_container(arena, None);
    }
}
