//! The contract between a tree and the memory its nodes live in.

use core::{alloc::Layout, fmt, ptr::NonNull};
use std::rc::Rc;

/// A source of fixed-size blocks for tree nodes.
///
/// A tree requests exactly one block per node, always with the node's own layout, and
/// releases each block it obtained exactly once. It never requests partial or
/// variable-size blocks, so an allocator may serve a single block size.
///
/// Allocators take `&self` so that one allocator can back several trees at once; the
/// implementations for `&A` and `Rc<A>` make that sharing explicit. Pooling allocators
/// are expected to use interior mutability.
///
/// # Safety
///
/// A block returned by [`allocate`](NodeAllocator::allocate) must be valid for reads and
/// writes of `layout.size()` bytes, aligned to `layout.align()`, and must not overlap any
/// other block that has not yet been released.
pub unsafe trait NodeAllocator {
    /// Prepares the allocator for use.
    ///
    /// Called once when a tree is constructed, before any node is requested.
    fn init(&self) -> Result<(), AllocError> {
        Ok(())
    }

    /// Returns a block fitting `layout`, or `None` if no memory is available.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with the same
    /// `layout`, and must not have been released already.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global Rust allocator.
///
/// Needs no initialization and fails only when the process is out of memory.
#[derive(Copy, Clone, Debug, Default)]
pub struct Global;

unsafe impl NodeAllocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert_ne!(layout.size(), 0, "nodes are never zero-sized");

        // SAFETY: `layout` has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

unsafe impl<A: NodeAllocator + ?Sized> NodeAllocator for &A {
    #[inline]
    fn init(&self) -> Result<(), AllocError> {
        (**self).init()
    }

    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).release(ptr, layout) }
    }
}

unsafe impl<A: NodeAllocator + ?Sized> NodeAllocator for Rc<A> {
    #[inline]
    fn init(&self) -> Result<(), AllocError> {
        (**self).init()
    }

    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).release(ptr, layout) }
    }
}

/// The error returned when an allocator cannot supply memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator could not be prepared for use.
    Init,

    /// No block of the given layout was available for a new node.
    Node(Layout),
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::Init => f.write_str("node allocator failed to initialize"),
            AllocError::Node(layout) => write!(
                f,
                "failed to allocate a {}-byte node (align {})",
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl std::error::Error for AllocError {}
