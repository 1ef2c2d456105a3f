//! Max-oriented Fibonacci heap backed by a slot arena.
//!
//! Nodes live in a [`SlotMap`]; every sibling, parent and child link is a
//! slot key into that arena instead of a pointer. Callers hold [`NodeKey`]s,
//! which also name the heap that issued them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "introspection")]
use introspection::{Timer, TimerHook};
use introspection::{mark_timer, start_timer};
use log::{debug, trace};
use slotmap::{new_key_type, Key, SlotMap};

pub mod counter;
pub mod error;

pub use error::HeapError;

pub type Priority = u64;

/// Priority a node is raised to before it is removed.
pub const MAX_PRIORITY: Priority = Priority::MAX;

// a root of degree d holds at least F(d + 2) nodes, so 40 slots cover F(42) ~ 2.7e8 nodes; grown on demand
const DEGREE_TABLE_SIZE: usize = 40;

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(0);

fn next_heap_id() -> u64 {
    NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed)
}

new_key_type! {
    struct Slot;
}

/// Handle to a node owned by a [`MaxFibHeap`], valid only on the heap that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    heap: u64,
    slot: Slot,
}

/// Which operand of [`MaxFibHeap::merge`] had its nodes moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// New handles for the nodes moved by [`MaxFibHeap::merge`].
#[derive(Debug, Clone)]
pub struct Relocations {
    side: Side,
    moved: HashMap<NodeKey, NodeKey>,
}

impl Relocations {
    /// The operand whose handles were replaced; the other side's handles stay valid.
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.moved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
    }

    pub fn get(&self, key: NodeKey) -> Option<NodeKey> {
        self.moved.get(&key).copied()
    }

    /// Handle on the merged heap for a key of either operand.
    pub fn resolve(&self, key: NodeKey) -> NodeKey {
        self.get(key).unwrap_or(key)
    }
}

#[derive(Debug, Clone)]
pub struct Node<T> {
    priority: Priority,
    data: T,
    left: Slot,
    right: Slot,
    parent: Option<Slot>,
    child: Option<Slot>,
    degree: usize,
    marked: bool,
}

impl<T> Node<T> {
    pub fn new(priority: Priority, data: T) -> Self {
        Self {
            priority,
            data,
            left: Slot::null(),
            right: Slot::null(),
            parent: None,
            child: None,
            degree: 0,
            marked: false,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn into_parts(self) -> (Priority, T) {
        (self.priority, self.data)
    }

    fn into_singleton(mut self, slot: Slot) -> Self {
        self.left = slot;
        self.right = slot;
        self.parent = None;
        self.child = None;
        self.degree = 0;
        self.marked = false;
        self
    }

    fn detached(mut self) -> Self {
        self.left = Slot::null();
        self.right = Slot::null();
        self.parent = None;
        self.child = None;
        self.degree = 0;
        self.marked = false;
        self
    }
}

#[derive(Debug)]
pub struct MaxFibHeap<T> {
    id: u64,
    nodes: SlotMap<Slot, Node<T>>,
    max: Option<Slot>,
    #[cfg(feature = "introspection")]
    timer: Timer,
}

impl<T> Default for MaxFibHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A clone is a separate heap: handles of the original are not valid on it.
impl<T: Clone> Clone for MaxFibHeap<T> {
    fn clone(&self) -> Self {
        Self {
            id: next_heap_id(),
            nodes: self.nodes.clone(),
            max: self.max,
            #[cfg(feature = "introspection")]
            timer: self.timer.clone(),
        }
    }
}

impl<T> MaxFibHeap<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: next_heap_id(),
            nodes: SlotMap::with_capacity_and_key(capacity),
            max: None,
            #[cfg(feature = "introspection")]
            timer: Timer::new("maxfeap"),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max.is_none()
    }

    /// Highest priority and its payload, without removing it.
    pub fn peek(&self) -> Option<(&Priority, &T)> {
        self.max.map(|slot| {
            let node = &self.nodes[slot];
            (&node.priority, &node.data)
        })
    }

    pub fn max_key(&self) -> Option<NodeKey> {
        self.max.map(|slot| self.key(slot))
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node<T>> {
        self.slot(key).ok().map(|slot| &self.nodes[slot])
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.slot(key).is_ok()
    }

    pub fn priority(&self, key: NodeKey) -> Result<Priority, HeapError> {
        self.slot(key).map(|slot| self.nodes[slot].priority)
    }

    #[cfg(feature = "introspection")]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    fn key(&self, slot: Slot) -> NodeKey {
        NodeKey { heap: self.id, slot }
    }

    /// Resolves `key` to a live slot of this heap.
    fn slot(&self, key: NodeKey) -> Result<Slot, HeapError> {
        if key.heap == self.id && self.nodes.contains_key(key.slot) {
            Ok(key.slot)
        } else {
            Err(HeapError::NodeNotFound)
        }
    }

    /// Splices the rings containing `a` and `b` into one ring and returns the
    /// higher priority of the two, `b` on ties. An empty side returns the other.
    fn merge_sibling_lists(&mut self, a: Option<Slot>, b: Option<Slot>) -> Option<Slot> {
        let (a, b) = match (a, b) {
            (None, other) | (other, None) => return other,
            (Some(a), Some(b)) => (a, b),
        };
        start_timer!(self.timer, TimerHook::RingSplice);
        let a_right = self.nodes[a].right;
        let b_right = self.nodes[b].right;
        self.nodes[a].right = b_right;
        self.nodes[b_right].left = a;
        self.nodes[b].right = a_right;
        self.nodes[a_right].left = b;
        mark_timer!(self.timer, TimerHook::RingSplice);

        if self.nodes[a].priority > self.nodes[b].priority {
            Some(a)
        } else {
            Some(b)
        }
    }

    /// Takes ownership of `node` and adds it to the root list.
    pub fn insert(&mut self, node: Node<T>) -> NodeKey {
        let slot = self
            .nodes
            .insert_with_key(|slot| node.into_singleton(slot));
        self.max = self.merge_sibling_lists(Some(slot), self.max);
        trace!("inserted {:?} with priority {}", slot, self.nodes[slot].priority);
        self.key(slot)
    }

    /// Removes the highest-priority node and hands it back to the caller.
    ///
    /// # Errors
    /// [`HeapError::Empty`] if the heap holds no nodes.
    pub fn extract_max(&mut self) -> Result<Node<T>, HeapError> {
        let max = self.max.ok_or(HeapError::Empty)?;
        let node = self.nodes.remove(max).ok_or(HeapError::NodeNotFound)?;

        let remaining = if node.right == max {
            None
        } else {
            self.nodes[node.right].left = node.left;
            self.nodes[node.left].right = node.right;
            Some(node.right)
        };
        let promoted = node.child.map(|child| self.promote_children(child));

        self.max = self.merge_sibling_lists(promoted, remaining);
        self.consolidate();
        Ok(node.detached())
    }

    /// Clears parent links and marks across the ring starting at `first`.
    fn promote_children(&mut self, first: Slot) -> Slot {
        start_timer!(self.timer, TimerHook::ChildPromotion);
        let mut current = first;
        loop {
            let child = &mut self.nodes[current];
            child.parent = None;
            child.marked = false;
            current = child.right;
            if current == first {
                break;
            }
        }
        mark_timer!(self.timer, TimerHook::ChildPromotion);
        first
    }

    /// Links roots of equal degree until every degree occurs at most once,
    /// then points `max` at the best surviving root.
    fn consolidate(&mut self) {
        let Some(start) = self.max else {
            return;
        };
        start_timer!(self.timer, TimerHook::Consolidate);

        let mut roots = Vec::new();
        let mut current = start;
        loop {
            roots.push(current);
            current = self.nodes[current].right;
            if current == start {
                break;
            }
        }

        let mut degree_table: Vec<Option<Slot>> = vec![None; DEGREE_TABLE_SIZE];
        for root in roots.iter().copied() {
            let mut winner = root;
            loop {
                let degree = self.nodes[winner].degree;
                if degree >= degree_table.len() {
                    degree_table.resize(degree + 1, None);
                }
                let Some(previous) = degree_table[degree].take() else {
                    degree_table[degree] = Some(winner);
                    break;
                };
                let (parent, child) = if self.nodes[previous].priority < self.nodes[winner].priority {
                    (winner, previous)
                } else {
                    (previous, winner)
                };
                self.link(child, parent);
                winner = parent;
            }
        }

        let nodes = &self.nodes;
        self.max = degree_table.iter().flatten().copied().reduce(|best, slot| {
            if nodes[slot].priority > nodes[best].priority {
                slot
            } else {
                best
            }
        });
        mark_timer!(self.timer, TimerHook::Consolidate);
        debug!(
            "consolidated {} roots into {} trees",
            roots.len(),
            degree_table.iter().flatten().count()
        );
    }

    /// Moves root `child` under root `parent`.
    fn link(&mut self, child: Slot, parent: Slot) {
        start_timer!(self.timer, TimerHook::PairwiseLink);
        let (left, right) = (self.nodes[child].left, self.nodes[child].right);
        self.nodes[right].left = left;
        self.nodes[left].right = right;

        let node = &mut self.nodes[child];
        node.left = child;
        node.right = child;
        node.parent = Some(parent);
        node.marked = false;

        let first = self.nodes[parent].child;
        self.nodes[parent].child = self.merge_sibling_lists(Some(child), first);
        self.nodes[parent].degree += 1;
        mark_timer!(self.timer, TimerHook::PairwiseLink);
    }

    /// Raises the priority of `key` to `priority`.
    ///
    /// # Errors
    /// [`HeapError::NodeNotFound`] for a key this heap does not own,
    /// [`HeapError::InvalidPriority`] unless `priority` is strictly greater.
    pub fn increase_key(&mut self, key: NodeKey, priority: Priority) -> Result<(), HeapError> {
        let slot = self.slot(key)?;
        let node = &mut self.nodes[slot];
        if priority <= node.priority {
            return Err(HeapError::InvalidPriority {
                current: node.priority,
                requested: priority,
            });
        }
        node.priority = priority;

        if let Some(parent) = node.parent {
            if priority > self.nodes[parent].priority {
                self.cut(slot, parent);
                self.cascading_cut(parent);
            }
        }

        if self
            .max
            .map_or(true, |max| priority > self.nodes[max].priority)
        {
            self.max = Some(slot);
        }
        Ok(())
    }

    fn cut(&mut self, slot: Slot, parent: Slot) {
        start_timer!(self.timer, TimerHook::Cut);
        let (left, right) = (self.nodes[slot].left, self.nodes[slot].right);
        if right == slot {
            let parent = &mut self.nodes[parent];
            parent.child = None;
            parent.degree = 0;
        } else {
            self.nodes[right].left = left;
            self.nodes[left].right = right;
            let parent = &mut self.nodes[parent];
            if parent.child == Some(slot) {
                parent.child = Some(right);
            }
            parent.degree -= 1;
        }

        let node = &mut self.nodes[slot];
        node.left = slot;
        node.right = slot;
        node.parent = None;
        node.marked = false;
        self.max = self.merge_sibling_lists(Some(slot), self.max);
        mark_timer!(self.timer, TimerHook::Cut);
        trace!("cut {:?} from {:?}", slot, parent);
    }

    /// Walks up from `slot`, cutting marked ancestors until an unmarked one
    /// gets marked or a root is reached.
    fn cascading_cut(&mut self, mut slot: Slot) {
        start_timer!(self.timer, TimerHook::CascadingCut);
        while let Some(parent) = self.nodes[slot].parent {
            if !self.nodes[slot].marked {
                self.nodes[slot].marked = true;
                break;
            }
            self.cut(slot, parent);
            slot = parent;
        }
        mark_timer!(self.timer, TimerHook::CascadingCut);
    }

    /// Removes the node behind `key`, returning it with its priority unchanged.
    ///
    /// # Errors
    /// [`HeapError::NodeNotFound`] for a foreign key, [`HeapError::InvalidPriority`]
    /// when the node already sits at [`MAX_PRIORITY`].
    pub fn remove(&mut self, key: NodeKey) -> Result<Node<T>, HeapError> {
        let original = self.priority(key)?;
        self.increase_key(key, MAX_PRIORITY)?;
        let slot = key.slot;
        // a parent already at MAX_PRIORITY keeps the node below it
        if let Some(parent) = self.nodes[slot].parent {
            self.cut(slot, parent);
            self.cascading_cut(parent);
        }
        self.max = Some(slot);

        let mut node = self.extract_max()?;
        node.priority = original;
        Ok(node)
    }

    /// Joins `other` into this heap and splices the root lists.
    ///
    /// The smaller heap's nodes move into the larger arena and get new
    /// handles, listed in the returned [`Relocations`]. Handles of the larger
    /// heap stay valid. Equal maxima resolve to `other`'s.
    pub fn merge(&mut self, mut other: Self) -> Relocations {
        let side = if self.len() < other.len() {
            std::mem::swap(self, &mut other);
            Side::First
        } else {
            Side::Second
        };
        let kept_max = self.max;
        let (moved_max, moved) = self.absorb(other);
        let (first, second) = match side {
            Side::First => (moved_max, kept_max),
            Side::Second => (kept_max, moved_max),
        };
        self.max = self.merge_sibling_lists(first, second);
        debug!(
            "merged {} nodes from the {:?} operand, heap now holds {}",
            moved.len(),
            side,
            self.len()
        );
        Relocations { side, moved }
    }

    /// Moves every node of `other` into this arena without touching the root
    /// list, returning the new slot of `other`'s max and the handle map.
    fn absorb(&mut self, mut other: Self) -> (Option<Slot>, HashMap<NodeKey, NodeKey>) {
        let mut slots = HashMap::with_capacity(other.nodes.len());
        for (old, node) in other.nodes.drain() {
            slots.insert(old, self.nodes.insert(node));
        }
        for &new in slots.values() {
            let node = &mut self.nodes[new];
            node.left = slots[&node.left];
            node.right = slots[&node.right];
            node.parent = node.parent.map(|slot| slots[&slot]);
            node.child = node.child.map(|slot| slots[&slot]);
        }
        #[cfg(feature = "introspection")]
        self.timer.absorb(&other.timer);

        let moved = slots
            .iter()
            .map(|(&old, &new)| (NodeKey { heap: other.id, slot: old }, self.key(new)))
            .collect();
        (other.max.map(|slot| slots[&slot]), moved)
    }
}

/// Joins two heaps; either may be empty. Ties on the maximum favor `b`.
pub fn union<T>(mut a: MaxFibHeap<T>, b: MaxFibHeap<T>) -> (MaxFibHeap<T>, Relocations) {
    let relocations = a.merge(b);
    (a, relocations)
}
