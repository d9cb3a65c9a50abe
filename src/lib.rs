//! A red-black tree whose nodes come from a pluggable allocator.

// Conventions used in comments:
// - The parent of a node `x` is denoted `p(x)`, its grandparent `g(x)`, its sibling `s(x)`.
// - An absent link ("nil") is `None`. Nil counts as a black leaf and has no storage, so it
//   can never be recolored or relinked.
// - The black-height `bh(x)` of a node is the number of black nodes on any path from `x`
//   down to a nil leaf, not counting `x` itself.
//
// The fundamental invariants of a red-black tree are:
// 1. Keys are in binary-search-tree order.
// 2. The root and all nil leaves are black.
// 3. A red node never has a red parent.
// 4. All paths from a node down to a nil leaf contain the same number of black nodes.
//
// Corollaries:
// 5. The subtree rooted at `x` holds at least `2^bh(x) - 1` nodes.
//
//    Proof: by induction on the height of `x`. A child of `x` has black-height at least
//    `bh(x) - 1`, so `x`'s subtree holds at least `2 * (2^(bh(x) - 1) - 1) + 1` nodes.
//
// 6. A tree of `n` nodes has height at most `2*log2(n+1)`.
//
//    Proof: by (3) at least half the nodes on any root-to-leaf path are black, so
//    `bh(root) >= h/2` and `n >= 2^(h/2) - 1` by (5).

use core::{
    alloc::Layout,
    borrow::Borrow,
    cmp::Ordering,
    marker::PhantomData,
    mem,
    ops::Not,
    ptr::{self, NonNull},
};

mod allocator;
mod config;
mod debug;

#[cfg(any(test, feature = "model"))]
pub mod model;


pub use allocator::{AllocError, Global, NodeAllocator};
pub use config::{Config, DuplicateKeys};

/// An ordered map implemented as a red-black tree.
///
/// Every node is a single fixed-size block obtained from the allocator `A`; the tree
/// releases each block exactly once, when its key is removed, on [`clear`](Self::clear),
/// or when the tree is dropped. Insert, lookup and removal take _O(log(n))_ time.
///
/// # Examples
///
/// ```
/// use rbtree_alloc::{Insert, RbTree, Remove};
///
/// let mut tree = RbTree::new();
/// assert_eq!(tree.insert(1, "one"), Ok(Insert::Inserted));
/// assert_eq!(tree.insert(1, "uno"), Ok(Insert::Updated));
/// assert_eq!(tree.get(&1), Some(&"uno"));
///
/// assert_eq!(tree.remove(&1), Remove::Removed("uno"));
/// assert_eq!(tree.remove(&1), Remove::NotFound);
/// assert!(tree.is_empty());
/// ```
pub struct RbTree<K, V, A: NodeAllocator = Global> {
    root: Link<K, V>,
    len: usize,
    alloc: A,
    config: Config,
    _owns: PhantomData<Node<K, V>>,
}

// SAFETY: The tree exclusively owns its nodes; nothing else holds their addresses.
unsafe impl<K: Send, V: Send, A: NodeAllocator + Send> Send for RbTree<K, V, A> {}

/// The outcome of a successful [`RbTree::insert`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Insert {
    /// The key was new and a node was allocated for it.
    Inserted,
    /// The key was present and its value was replaced.
    Updated,
    /// The key was present and its value was left alone ([`DuplicateKeys::KeepExisting`]).
    Kept,
}

/// The outcome of [`RbTree::remove`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Remove<V> {
    /// The key was present; its node was released and this is the value it held.
    Removed(V),
    /// The key was absent and the tree was not modified.
    NotFound,
}

impl<V> Remove<V> {
    /// Converts into the removed value, if any.
    pub fn into_value(self) -> Option<V> {
        match self {
            Remove::Removed(value) => Some(value),
            Remove::NotFound => None,
        }
    }
}

struct Node<K, V> {
    links: Links<K, V>,
    key: K,
    value: V,
}

struct Links<K, V> {
    parent: Link<K, V>,
    children: [Link<K, V>; 2],
    color: Color,
}

type Link<K, V> = Option<NonNull<Node<K, V>>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

// Result of a binary descent.
enum Search<K, V> {
    Found(NonNull<Node<K, V>>),
    // The last node visited and the side a new node would hang from, or `None` if the
    // tree is empty.
    Vacant(Option<(NonNull<Node<K, V>>, Dir)>),
}

impl<K, V> RbTree<K, V> {
    /// Returns a new empty tree backed by the global allocator.
    pub const fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// Returns a new empty tree backed by the global allocator, using `config`.
    pub const fn with_config(config: Config) -> Self {
        RbTree {
            root: None,
            len: 0,
            alloc: Global,
            config,
            _owns: PhantomData,
        }
    }
}

impl<K, V> Default for RbTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: NodeAllocator> RbTree<K, V, A> {
    /// Initializes `alloc` and returns a new empty tree backed by it.
    pub fn try_new_in(alloc: A) -> Result<Self, AllocError> {
        Self::try_with_config_in(Config::new(), alloc)
    }

    /// Initializes `alloc` and returns a new empty tree backed by it, using `config`.
    pub fn try_with_config_in(config: Config, alloc: A) -> Result<Self, AllocError> {
        if let Err(error) = alloc.init() {
            log::debug!("red-black tree not created: {error}");
            return Err(error);
        }

        log::debug!(
            "created red-black tree ({:?} on duplicate keys, {}-byte nodes)",
            config.duplicates,
            Self::node_layout().size()
        );

        Ok(RbTree {
            root: None,
            len: 0,
            alloc,
            config,
            _owns: PhantomData,
        })
    }

    /// Returns `true` if the tree contains no elements.
    pub fn is_empty(&self) -> bool {
        let empty = self.len() == 0;
        debug_assert_eq!(empty, self.root.is_none());
        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the allocator backing this tree.
    pub const fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the configuration this tree was created with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the value associated with `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            // SAFETY: The node is live and the returned borrow is tied to `&self`.
            Search::Found(node) => Some(unsafe { &(*node.as_ptr()).value }),
            Search::Vacant(_) => None,
        }
    }

    /// Returns a mutable reference to the value associated with `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            // SAFETY: The node is live and the returned borrow is tied to `&mut self`.
            Search::Found(node) => Some(unsafe { &mut (*node.as_ptr()).value }),
            Search::Vacant(_) => None,
        }
    }

    /// Returns `true` if the tree contains `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        matches!(self.search(key), Search::Found(_))
    }

    // Descends from the root towards `key`.
    fn search<Q>(&self, key: &Q) -> Search<K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;
        let mut last = None;

        while let Some(cur) = opt_cur {
            let dir = match key.cmp(unsafe { (*cur.as_ptr()).key.borrow() }) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Search::Found(cur),
                Ordering::Greater => Dir::Right,
            };

            last = Some((cur, dir));
            opt_cur = unsafe { links(cur).child(dir) };
        }

        Search::Vacant(last)
    }

    /// Inserts a key-value pair into the tree.
    ///
    /// If `key` is already present, the tree's [`DuplicateKeys`] policy decides whether the
    /// stored value is replaced; the stored key is never replaced and nothing is allocated.
    ///
    /// If the allocator cannot supply a node, the error is returned and the tree is left
    /// exactly as it was.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, key: K, value: V) -> Result<Insert, AllocError>
    where
        K: Ord,
    {
        let slot = match self.search(&key) {
            Search::Found(node) => {
                return Ok(match self.config.duplicates {
                    DuplicateKeys::Overwrite => {
                        unsafe { (*node.as_ptr()).value = value };
                        Insert::Updated
                    }
                    DuplicateKeys::KeepExisting => Insert::Kept,
                });
            }
            Search::Vacant(slot) => slot,
        };

        // Nothing is linked until the node exists.
        let node = self.allocate_node(key, value, slot.map(|(parent, _)| parent))?;

        match slot {
            Some((parent, dir)) => unsafe {
                links_mut(parent).set_child(dir, Some(node));
            },
            None => self.root = Some(node),
        }

        self.len += 1;

        unsafe { self.rebalance_inserted(node) };

        Ok(Insert::Inserted)
    }

    // Restores the invariants after `node` was linked in as a red leaf.
    //
    // Only invariant (3) can be violated, and only between `node` and its parent.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<Node<K, V>>) {
        let mut x = node;

        unsafe {
            // A black parent means the red-red edge is gone.
            while let Some(mut parent) = links(x).parent().filter(|&p| links(p).is_red()) {
                // A red node is never the root, so `g(x)` exists.
                let grandparent = links(parent)
                    .parent()
                    .expect("red node must not be the tree root");

                let side = links(grandparent).which_child(parent);
                let uncle = links(grandparent).child(!side);

                // Case 1: the uncle is red. Push the redness up to the grandparent, which may
                // now form a red-red edge with its own parent.
                if let Some(uncle) = uncle.filter(|&u| links(u).is_red()) {
                    links_mut(parent).set_color(Color::Black);
                    links_mut(uncle).set_color(Color::Black);
                    links_mut(grandparent).set_color(Color::Red);

                    x = grandparent;
                    continue;
                }

                // Case 2: the uncle is black and `x` is an inner child. Rotate it to the outside.
                if links(parent).child(!side) == Some(x) {
                    self.rotate(parent, side);
                    mem::swap(&mut x, &mut parent);
                }

                // Case 3: the uncle is black and `x` is an outer child.
                links_mut(parent).set_color(Color::Black);
                links_mut(grandparent).set_color(Color::Red);
                self.rotate(grandparent, !side);
                break;
            }

            // Case 1 may have recolored the root.
            if let Some(root) = self.root {
                links_mut(root).set_color(Color::Black);
            }
        }
    }

    /// Removes `key` from the tree, returning the value it was associated with.
    ///
    /// The node holding `key` (or its in-order predecessor, which takes over its place) is
    /// released back to the allocator. Removing an absent key does nothing.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Remove<V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Search::Found(node) => {
                let (_key, value) = unsafe { self.remove_at(node) };
                Remove::Removed(value)
            }
            Search::Vacant(_) => Remove::NotFound,
        }
    }

    // Removes the entry held by `node` and returns it.
    //
    // There are two possible cases:
    //
    // 1. `node` has two children.
    //
    //    `node`'s predecessor[^1] has no right child. The two nodes trade entries, and the
    //    predecessor is spliced out instead, carrying `node`'s entry with it.
    //
    // 2. `node` has at most one child.
    //
    //    `node` is spliced out and its child (possibly nil) takes its place.
    //
    // Splicing out a red node changes no black-height. Splicing out a black node leaves one
    // black missing on every path through the child that replaced it; that child is then
    // "double black" until `rebalance_removed` repairs it.
    //
    // [^1]: The predecessor of a node `a` is the greatest node in `a`'s left subtree.
    unsafe fn remove_at(&mut self, node: NonNull<Node<K, V>>) -> (K, V) {
        unsafe {
            let mut spliced = node;

            if let (Some(left), Some(_)) = (links(node).left(), links(node).right()) {
                let predecessor = max_in_subtree(left);

                let (n, p) = (node.as_ptr(), predecessor.as_ptr());
                ptr::swap(ptr::addr_of_mut!((*n).key), ptr::addr_of_mut!((*p).key));
                ptr::swap(ptr::addr_of_mut!((*n).value), ptr::addr_of_mut!((*p).value));

                spliced = predecessor;
            }

            let child = links(spliced).left().or_else(|| links(spliced).right());
            let parent = links(spliced).parent();

            self.replace_child_or_set_root(parent, spliced, child);
            if let Some(child) = child {
                links_mut(child).set_parent(parent);
            }

            if links(spliced).color() == Color::Black {
                self.rebalance_removed(child, parent);
            }

            self.len -= 1;

            let Node { key, value, .. } = spliced.as_ptr().read();
            self.alloc.release(spliced.cast(), Self::node_layout());

            (key, value)
        }
    }

    // Restores the invariants after a black node was spliced out from under `parent`.
    //
    // `x` is the double-black node that took its place, which may be nil. Its parent is
    // passed separately because nil cannot record one.
    unsafe fn rebalance_removed(&mut self, mut x: Link<K, V>, mut parent: Link<K, V>) {
        unsafe {
            while x != self.root && !is_red(x) {
                let Some(p) = parent else {
                    break;
                };

                // `x` may be nil, but its sibling never is: before the splice, the sibling's
                // side had a black-height of at least one.
                let dir = if links(p).left() == x {
                    Dir::Left
                } else {
                    Dir::Right
                };
                let mut sibling = links(p)
                    .child(!dir)
                    .expect("double-black node must have a sibling");

                // Case 1: the sibling is red. Rotate it above `p` so that `x` gets a black
                // sibling, then continue with cases 2-4.
                if links(sibling).is_red() {
                    links_mut(sibling).set_color(Color::Black);
                    links_mut(p).set_color(Color::Red);
                    self.rotate(p, dir);

                    sibling = links(p)
                        .child(!dir)
                        .expect("double-black node must have a sibling");
                }

                let near = links(sibling).child(dir);
                let far = links(sibling).child(!dir);

                // Case 2: the sibling and both its children are black. Take one black off both
                // sides and push the deficiency up to `p`.
                if !is_red(near) && !is_red(far) {
                    links_mut(sibling).set_color(Color::Red);
                    x = Some(p);
                    parent = links(p).parent();
                    continue;
                }

                // Case 3: the sibling is black, its near child red and its far child black.
                // Rotate the near child up so the sibling's far child is red.
                if !is_red(far) {
                    let near = near.expect("red child must be a node");

                    links_mut(near).set_color(Color::Black);
                    links_mut(sibling).set_color(Color::Red);
                    self.rotate(sibling, !dir);

                    sibling = links(p)
                        .child(!dir)
                        .expect("double-black node must have a sibling");
                }

                // Case 4: the sibling is black and its far child red. Rotating the sibling
                // above `p` adds a black to `x`'s side and keeps the far side's count.
                let p_color = links(p).color();
                links_mut(sibling).set_color(p_color);
                links_mut(p).set_color(Color::Black);
                if let Some(far) = links(sibling).child(!dir) {
                    links_mut(far).set_color(Color::Black);
                }
                self.rotate(p, dir);

                x = self.root;
                break;
            }

            if let Some(x) = x {
                links_mut(x).set_color(Color::Black);
            }
        }
    }

    /// Clears the tree, releasing every node.
    ///
    /// The tree is walked without recursion or an auxiliary stack, so clearing uses constant
    /// space regardless of the tree's shape.
    ///
    /// The tree is emptied before any entry is dropped. If dropping a key or value panics,
    /// the tree is left empty and the nodes not yet released are leaked.
    pub fn clear(&mut self) {
        let Some(root) = self.root.take() else {
            return;
        };
        let cleared = mem::replace(&mut self.len, 0);
        let layout = Self::node_layout();
        let alloc = &self.alloc;

        log::trace!("clearing {cleared} nodes from red-black tree");

        // The nodes are no longer reachable from `self`; each is read for its links before
        // it is dropped and released.
        unsafe {
            walk(
                Some(root),
                |_| {},
                |node| {
                    ptr::drop_in_place(node.as_ptr());
                    alloc.release(node.cast(), layout);
                },
            );
        }
    }

    // Calls `f` on every entry in ascending key order.
    pub(crate) fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        unsafe {
            walk(
                self.root,
                |node| {
                    let node = &*node.as_ptr();
                    f(&node.key, &node.value);
                },
                |_| {},
            );
        }
    }

    // Support methods ========================================================

    #[inline]
    fn node_layout() -> Layout {
        Layout::new::<Node<K, V>>()
    }

    fn allocate_node(
        &self,
        key: K,
        value: V,
        parent: Link<K, V>,
    ) -> Result<NonNull<Node<K, V>>, AllocError> {
        let layout = Self::node_layout();

        let Some(block) = self.alloc.allocate(layout) else {
            log::warn!(
                "red-black tree node allocation failed ({} bytes, align {}); {} nodes live",
                layout.size(),
                layout.align(),
                self.len
            );
            return Err(AllocError::Node(layout));
        };

        let node = block.cast::<Node<K, V>>();

        // SAFETY: The allocator returned a block valid for writes of `layout`.
        unsafe {
            node.as_ptr().write(Node {
                links: Links {
                    parent,
                    children: [None; 2],
                    color: Color::Red,
                },
                key,
                value,
            });
        }

        Ok(node)
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`, or
    // makes `new_child` the root if `parent` is nil.
    //
    // `new_child`'s parent pointer is not updated.
    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<K, V>,
        old_child: NonNull<Node<K, V>>,
        new_child: Link<K, V>,
    ) {
        match parent {
            Some(parent) => unsafe {
                let dir = links(parent).which_child(old_child);
                links_mut(parent).set_child(dir, new_child);
            },
            None => self.root = new_child,
        }
    }

    // Rotates `x` down towards `dir`, lifting its child on the opposite side into its place.
    //
    //        |                          |
    //        x            rotate        y
    //       / \         (x, Left)      / \
    //      a   y          ===>        x   c
    //         / \                    / \
    //        b   c                  a   b
    //
    // `rotate(x, Right)` is the mirror image. Key order is preserved. `x` and `y` must both
    // be nodes; the inner child `b` may be nil, in which case no parent link is written.
    unsafe fn rotate(&mut self, x: NonNull<Node<K, V>>, dir: Dir) {
        unsafe {
            let y = links(x).child(!dir);
            debug_assert!(y.is_some(), "rotation pivot must be a node");
            let Some(y) = y else {
                return;
            };

            let inner = links(y).child(dir);
            links_mut(x).set_child(!dir, inner);
            if let Some(inner) = inner {
                links_mut(inner).set_parent(Some(x));
            }

            let parent = links(x).parent();
            links_mut(y).set_parent(parent);
            self.replace_child_or_set_root(parent, x, Some(y));

            links_mut(y).set_child(dir, Some(x));
            links_mut(x).set_parent(Some(y));
        }
    }

    /// Returns the height of the tree: the number of edges on its longest root-to-leaf path.
    ///
    /// An empty tree and a single node both have height 0.
    #[doc(hidden)]
    pub fn height(&self) -> usize {
        let mut height = 0;

        // Only leaves can end a longest path; measure each one by climbing to the root.
        unsafe {
            walk(
                self.root,
                |node| {
                    if links(node).left().is_some() || links(node).right().is_some() {
                        return;
                    }

                    let mut depth = 0;
                    let mut cur = node;
                    while let Some(parent) = links(cur).parent() {
                        depth += 1;
                        cur = parent;
                    }
                    height = height.max(depth);
                },
                |_| {},
            );
        }

        height
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self)
    where
        K: Ord,
    {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree must have length 0");
            return;
        };

        unsafe {
            assert!(links(root).parent().is_none(), "root must not have a parent");
            assert_eq!(links(root).color(), Color::Black, "root must be black");

            let mut count = 0;
            self.assert_invariants_at(root, None, None, &mut count);
            assert_eq!(count, self.len, "length must match the number of nodes");
        }
    }

    // Checks the subtree at `node`, whose keys must lie strictly between `lower` and `upper`.
    // Returns the number of black nodes on every path from `node` down to nil, including
    // `node` itself.
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<Node<K, V>>,
        lower: Option<&K>,
        upper: Option<&K>,
        count: &mut usize,
    ) -> usize
    where
        K: Ord,
    {
        *count += 1;

        unsafe {
            let key = &(*node.as_ptr()).key;
            if let Some(lower) = lower {
                assert!(lower < key, "keys must be in ascending order");
            }
            if let Some(upper) = upper {
                assert!(key < upper, "keys must be in ascending order");
            }

            let red = links(node).is_red();
            let mut black_heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                let Some(child) = links(node).child(dir) else {
                    continue;
                };

                assert_eq!(
                    links(child).parent(),
                    Some(node),
                    "child's parent pointer must point to its parent"
                );
                assert!(
                    !(red && links(child).is_red()),
                    "red node must not have a red child"
                );

                let (lower, upper) = match dir {
                    Dir::Left => (lower, Some(key)),
                    Dir::Right => (Some(key), upper),
                };
                black_heights[dir as usize] =
                    self.assert_invariants_at(child, lower, upper, count);
            }

            assert_eq!(
                black_heights[0], black_heights[1],
                "both subtrees must have the same black-height"
            );

            black_heights[0] + usize::from(!red)
        }
    }
}

impl<K, V, A: NodeAllocator> Drop for RbTree<K, V, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Links<K, V> {
    #[inline]
    fn parent(&self) -> Link<K, V> {
        self.parent
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<K, V> {
        self.children[dir as usize]
    }

    #[inline]
    fn left(&self) -> Link<K, V> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<K, V> {
        self.child(Dir::Right)
    }

    #[inline]
    fn color(&self) -> Color {
        self.color
    }

    #[inline]
    fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    // Returns the side of `self` on which `child` hangs.
    #[inline]
    fn which_child(&self, child: NonNull<Node<K, V>>) -> Dir {
        if self.left() == Some(child) {
            Dir::Left
        } else {
            debug_assert_eq!(self.right(), Some(child), "`child` must be a child node");
            Dir::Right
        }
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<K, V>) -> Link<K, V> {
        mem::replace(&mut self.parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<K, V>) -> Link<K, V> {
        mem::replace(&mut self.children[dir as usize], child)
    }

    #[inline]
    fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

// Returns the links of a live node.
//
// # Safety
//
// `node` must point to a live node, and no mutable borrow of its links may be live.
#[inline]
unsafe fn links<'a, K, V>(node: NonNull<Node<K, V>>) -> &'a Links<K, V> {
    unsafe { &(*node.as_ptr()).links }
}

// Returns the links of a live node for modification.
//
// # Safety
//
// `node` must point to a live node, and no other borrow of its links may be live.
#[inline]
unsafe fn links_mut<'a, K, V>(node: NonNull<Node<K, V>>) -> &'a mut Links<K, V> {
    unsafe { &mut (*node.as_ptr()).links }
}

// Nil is black.
#[inline]
unsafe fn is_red<K, V>(link: Link<K, V>) -> bool {
    link.is_some_and(|node| unsafe { links(node).is_red() })
}

// Returns the maximum node in the subtree rooted at `root`.
#[inline]
unsafe fn max_in_subtree<K, V>(root: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
    let mut cur = root;

    while let Some(right) = unsafe { links(cur).right() } {
        cur = right;
    }

    cur
}

// Walks the subtree rooted at `root` using only its parent links and three cursors.
//
// `on_visit` is called on each node in ascending key order. `on_leave` is called on each node
// once both of its subtrees are finished, which makes it safe for `on_leave` to free the
// node: the walk reads nothing from it afterwards, and only compares its address against
// links of nodes that are still live.
unsafe fn walk<K, V>(
    root: Link<K, V>,
    mut on_visit: impl FnMut(NonNull<Node<K, V>>),
    mut on_leave: impl FnMut(NonNull<Node<K, V>>),
) {
    let mut prev = None;
    let mut next = None;
    let mut opt_cur = root;

    while let Some(cur) = opt_cur {
        let (parent, left, right) = unsafe {
            let links = links(cur);
            (links.parent(), links.left(), links.right())
        };

        // Arrived from above: descend left first.
        if prev == parent {
            prev = Some(cur);
            next = left;
        }

        // Left subtree empty or finished: visit, then descend right.
        if next.is_none() || prev == left {
            on_visit(cur);
            prev = Some(cur);
            next = right;
        }

        // Right subtree empty or finished: climb back up.
        if next.is_none() || prev == right {
            prev = Some(cur);
            next = parent;
            on_leave(cur);
        }

        opt_cur = next;
    }
}
