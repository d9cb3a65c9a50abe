//! Model-based testing support: a fallible allocator and a harness that checks an
//! [`RbTree`] against [`BTreeMap`] over arbitrary operation sequences.

use core::{alloc::Layout, cell::Cell, ptr::NonNull};
use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::{AllocError, Global, Insert, NodeAllocator, RbTree, Remove};

/// An allocator that counts its live blocks and fails on demand.
///
/// Blocks come from [`Global`]. Releasing a block that is not live panics, so a tree that
/// frees a node twice or frees a foreign block is caught immediately.
#[derive(Debug, Default)]
pub struct FlakyAllocator {
    live: Cell<usize>,
    allocations: Cell<usize>,
    fail_next: Cell<bool>,
    fail_after: Cell<Option<usize>>,
    fail_init: bool,
}

impl FlakyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an allocator whose `init` fails.
    pub fn failing_init() -> Self {
        FlakyAllocator {
            fail_init: true,
            ..Self::default()
        }
    }

    /// Makes the next allocation fail.
    pub fn fail_next(&self) {
        self.fail_next.set(true);
    }

    /// Makes every allocation fail once `n` more have succeeded.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.set(Some(n));
    }

    /// Cancels any pending failures.
    pub fn disarm(&self) {
        self.fail_next.set(false);
        self.fail_after.set(None);
    }

    /// Returns the number of blocks allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Returns the number of successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }
}

unsafe impl NodeAllocator for FlakyAllocator {
    fn init(&self) -> Result<(), AllocError> {
        if self.fail_init {
            Err(AllocError::Init)
        } else {
            Ok(())
        }
    }

    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if self.fail_next.replace(false) {
            return None;
        }

        match self.fail_after.get() {
            Some(0) => return None,
            Some(n) => self.fail_after.set(Some(n - 1)),
            None => (),
        }

        let block = Global.allocate(layout)?;
        self.live.set(self.live.get() + 1);
        self.allocations.set(self.allocations.get() + 1);
        Some(block)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let live = self.live.get();
        assert!(live > 0, "released more blocks than were allocated");
        self.live.set(live - 1);

        unsafe { Global.release(ptr, layout) }
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue, u32),
    Get(ItemValue),
    GetMut(ItemValue, u32),
    Remove(ItemValue),
    // The next insert of a new key fails to allocate.
    FailNextAlloc,
    Clear,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item, value) => FinalOp::Insert(get_value(sorted, item), value),
            Op::Get(item) => FinalOp::Get(get_value(sorted, item)),
            Op::GetMut(item, value) => FinalOp::GetMut(get_value(sorted, item), value),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::FailNextAlloc => FinalOp::FailNextAlloc,
            Op::Clear => FinalOp::Clear,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32, u32),
    Get(u32),
    GetMut(u32, u32),
    Remove(u32),
    FailNextAlloc,
    Clear,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        8 => (value_strategy(), proptest::num::u32::ANY).prop_map(|(k, v)| Op::Insert(k, v)),
        4 => value_strategy().prop_map(Op::Get),
        2 => (value_strategy(), proptest::num::u32::ANY).prop_map(|(k, v)| Op::GetMut(k, v)),
        6 => value_strategy().prop_map(Op::Remove),
        1 => Just(Op::FailNextAlloc),
        1 => Just(Op::Clear),
    ]
}

/// Applies `ops` to both a tree and a `BTreeMap`, asserting after every operation that
/// they agree and that the tree's invariants hold.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let alloc = FlakyAllocator::new();
    let mut sorted_keys = Vec::with_capacity(ops.len());
    let mut btree = BTreeMap::new();
    let mut tree: RbTree<u32, u32, _> =
        RbTree::try_new_in(&alloc).expect("allocator init failed");

    fn insert_sorted(v: &mut Vec<u32>, key: u32) {
        if let Err(idx) = v.binary_search(&key) {
            v.insert(idx, key);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, key: u32) {
        if let Ok(idx) = v.binary_search(&key) {
            v.remove(idx);
        }
    }

    let mut armed = false;

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_keys);

        match final_op {
            FinalOp::Insert(key, value) => {
                let expected = if btree.contains_key(&key) {
                    btree.insert(key, value);
                    Some(Insert::Updated)
                } else if armed {
                    None
                } else {
                    insert_sorted(&mut sorted_keys, key);
                    btree.insert(key, value);
                    Some(Insert::Inserted)
                };

                let from_tree = tree.insert(key, value);
                if from_tree.is_err() || expected == Some(Insert::Inserted) {
                    armed = false;
                    alloc.disarm();
                }

                assert_eq!(expected, from_tree.ok(), "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Get(key) => {
                assert_eq!(btree.get(&key), tree.get(&key), "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::GetMut(key, value) => {
                let from_btree = btree.get_mut(&key).map(|v| {
                    *v = value;
                    *v
                });
                let from_tree = tree.get_mut(&key).map(|v| {
                    *v = value;
                    *v
                });

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(key) => {
                remove_sorted(&mut sorted_keys, key);

                let from_btree = match btree.remove(&key) {
                    Some(value) => Remove::Removed(value),
                    None => Remove::NotFound,
                };
                let from_tree = tree.remove(&key);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::FailNextAlloc => {
                armed = true;
                alloc.fail_next();
            }

            FinalOp::Clear => {
                sorted_keys.clear();
                btree.clear();
                tree.clear();
            }
        }

        tree.assert_invariants();
        assert_eq!(btree.len(), tree.len());
        assert_eq!(alloc.live(), tree.len(), "every live node holds one block");

        let mut entries = btree.iter();
        tree.for_each(|key, value| {
            assert_eq!(entries.next(), Some((key, value)), "FinalOp #{op_id}: {final_op:?}");
        });
        assert_eq!(entries.next(), None, "FinalOp #{op_id}: {final_op:?}");
    }

    drop(tree);
    assert_eq!(alloc.live(), 0, "dropping the tree must release every node");
}
