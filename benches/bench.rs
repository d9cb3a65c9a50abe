use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rbtree_alloc::RbTree;

/// Helper to bench a function on a tree.
/// It creates a group for the given name and closure and runs it against trees of various
/// sizes, built by inserting keys in ascending order (the worst case for an unbalanced tree).
/// The closure gets the tree and the largest key in it.
fn bench_helper(c: &mut Criterion, name: &str, mut f: impl FnMut(&mut RbTree<i32, i32>, i32)) {
    let mut group = c.benchmark_group(name);

    for num_levels in [3, 7, 11, 15] {
        let num_nodes = 2usize.pow(num_levels) - 1;
        let largest_key = num_nodes as i32 - 1;

        let mut tree = RbTree::new();
        for x in 0..num_nodes as i32 {
            tree.insert(x, x).expect("allocation failed");
        }

        group.bench_function(BenchmarkId::new("rbtree", largest_key), |b| {
            b.iter(|| f(&mut tree, black_box(largest_key)))
        });
    }

    group.finish();
}

pub fn criterion_benchmark(c: &mut Criterion) {
    bench_helper(c, "get", |tree, i| {
        let _value = black_box(tree.get(&i));
    });
    bench_helper(c, "get-miss", |tree, i| {
        let _value = black_box(tree.get(&(i + 1)));
    });

    // The tree is shared across iterations, so every insert is paired with a removal.
    bench_helper(c, "insert-remove", |tree, i| {
        let _ = tree.insert(i + 1, i + 1);
        let _ = black_box(tree.remove(&(i + 1)));
    });
    bench_helper(c, "remove-insert", |tree, i| {
        let value = tree.remove(&i).into_value();
        let _ = tree.insert(i, black_box(value.unwrap_or(i)));
    });
    bench_helper(c, "remove-miss", |tree, i| {
        let _ = black_box(tree.remove(&(i + 1)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
