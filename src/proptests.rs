use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Checks every red-black and count invariant through the read-only view.
/// Returns the black height of the tree.
fn validate_tree<K: Ord + std::fmt::Debug, V>(t: &OrderStatTree<K, V>) -> usize {
    let Some(root) = t.root_node() else {
        assert_eq!(t.len(), 0, "empty tree must report len 0");
        assert_eq!(t.nodes.count(NIL), 0, "sentinel count must stay 0");
        return 0;
    };

    assert_eq!(root.color(), Color::Black, "root must be black");
    assert!(root.parent().is_none(), "root must have no parent");
    assert_eq!(t.nodes.color(NIL), Color::Black, "sentinel must be black");
    assert_eq!(t.nodes.count(NIL), 0, "sentinel count must stay 0");

    fn walk<'a, K: Ord + std::fmt::Debug, V>(
        node: NodeRef<'a, K, V>,
        lower: Option<&'a K>,
        upper: Option<&'a K>,
    ) -> usize {
        let key = node.key();
        if let Some(lower) = lower {
            assert!(lower < key, "{lower:?} must sort before {key:?}");
        }
        if let Some(upper) = upper {
            assert!(key < upper, "{key:?} must sort before {upper:?}");
        }
        assert!(node.value_count() > 0, "live node {key:?} has no values");
        assert_eq!(node.values().count(), node.value_count());
        // Zero-sized values share one address, so only the presence of a top is checkable.
        assert!(
            node.values()
                .next()
                .is_some_and(|top| std::mem::size_of::<V>() == 0 || std::ptr::eq(top, node.value())),
            "value() of {key:?} must be the top of values()"
        );

        let mut children_count = 0;
        let mut heights = [0usize; 2];
        for (slot, child) in [node.left(), node.right()].into_iter().enumerate() {
            let Some(child) = child else {
                continue;
            };
            let parent = child.parent().expect("child must link back to its parent");
            assert!(parent.ptr_eq(&node), "parent link of {:?} is stale", child.key());
            if node.is_red() {
                assert!(!child.is_red(), "red node {key:?} has a red child");
            }
            children_count += child.subtree_count();
            heights[slot] = if slot == 0 {
                walk(child, lower, Some(key))
            } else {
                walk(child, Some(key), upper)
            };
        }

        assert_eq!(
            node.subtree_count(),
            node.value_count() + children_count,
            "subtree count of {key:?} must match its children"
        );
        assert_eq!(heights[0], heights[1], "black height differs below {key:?}");
        heights[0] + usize::from(!node.is_red())
    }

    let black_height = walk(root, None, None);
    assert_eq!(root.subtree_count(), t.len());
    black_height
}

fn assert_matches_model(t: &OrderStatTree<u8, u32>, m: &BTreeMap<u8, Vec<u32>>) {
    let total: usize = m.values().map(Vec::len).sum();
    assert_eq!(t.len(), total);
    assert_eq!(t.key_count(), m.len());

    // select walks the stable sort of the multiset, stacks read top first.
    let expected: Vec<(u8, u32)> = m
        .iter()
        .flat_map(|(k, vs)| vs.iter().rev().map(move |v| (*k, *v)))
        .collect();
    for (i, (k, v)) in expected.iter().enumerate() {
        assert_eq!(t.select(i + 1), Ok((k, v)));
    }
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Put(#[proptest(strategy = "0u8..64")] u8, u32),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "0u8..64")] u8),
    #[proptest(weight = 1)]
    Get(#[proptest(strategy = "0u8..64")] u8),
    #[proptest(weight = 1)]
    Predecessor(#[proptest(strategy = "0u8..64")] u8),
}

fn model_pop(m: &mut BTreeMap<u8, Vec<u32>>, key: u8) -> Option<u32> {
    let vs = m.get_mut(&key)?;
    let v = vs.pop();
    if vs.is_empty() {
        m.remove(&key);
    }
    v
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=500)) {
        let mut t: OrderStatTree<u8, u32> = OrderStatTree::new();
        let mut m: BTreeMap<u8, Vec<u32>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    t.put(key, value);
                    m.entry(key).or_default().push(value);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(t.remove(&key), model_pop(&mut m, key));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key).and_then(|vs| vs.last()));
                    prop_assert_eq!(t.contains_key(&key), m.contains_key(&key));
                }
                Op::Predecessor(key) => {
                    let got = t.predecessor(&key);
                    if m.is_empty() {
                        prop_assert_eq!(got, Err(TreeError::Empty));
                    } else if !m.contains_key(&key) {
                        prop_assert_eq!(got, Ok(None));
                    } else {
                        let expected = m
                            .range(..key)
                            .next_back()
                            .map(|(k, vs)| (k, vs.last().expect("model stacks are non-empty")));
                        prop_assert_eq!(got, Ok(expected));
                    }
                }
            }

            validate_tree(&t);
        }

        assert_matches_model(&t, &m);
        if let (Some((min_k, min_vs)), Some((max_k, max_vs))) = (m.first_key_value(), m.last_key_value()) {
            prop_assert_eq!(t.min(), Ok((min_k, min_vs.last().unwrap())));
            prop_assert_eq!(t.max(), Ok((max_k, max_vs.last().unwrap())));
        }
    }

    #[test]
    fn prop_insert_then_drain(keys in prop::collection::vec(any::<u8>(), 1..=300), seed in any::<u64>()) {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut t: OrderStatTree<u8, usize> = OrderStatTree::new();
        for (i, k) in keys.iter().enumerate() {
            t.put(*k, i);
            validate_tree(&t);
        }
        prop_assert_eq!(t.len(), keys.len());

        let mut order = keys.clone();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        for (removed, k) in order.iter().enumerate() {
            prop_assert!(t.remove(k).is_some());
            prop_assert_eq!(t.len(), keys.len() - removed - 1);
            validate_tree(&t);
        }
        prop_assert!(t.is_empty());
        prop_assert_eq!(t.key_count(), 0);
    }
}

#[test]
fn black_height_bounds_tree_height() {
    let mut t: OrderStatTree<u32, ()> = OrderStatTree::new();
    for i in 0..4096u32 {
        t.put(i.wrapping_mul(2_654_435_761) % 10_007, ());
    }
    let black_height = validate_tree(&t);
    assert!(t.height() <= 2 * black_height + 1);
    // 2 * log2(n + 1)
    let bound = 2.0 * ((t.key_count() + 1) as f64).log2();
    assert!((t.height() as f64) <= bound, "height {} exceeds {bound}", t.height());
}

#[test]
fn random_fill_and_drain_keeps_invariants() {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = StdRng::seed_from_u64(7);
    let mut t: OrderStatTree<u32, u32> = OrderStatTree::new();
    let mut keys: Vec<u32> = (0..2000).map(|_| rng.gen_range(0..1500)).collect();

    for (i, k) in keys.iter().enumerate() {
        t.put(*k, i as u32);
    }
    validate_tree(&t);

    keys.shuffle(&mut rng);
    for k in &keys {
        assert!(t.remove(k).is_some());
        validate_tree(&t);
    }
    assert!(t.is_empty());
}

#[test]
fn predecessor_matches_sorted_neighbours() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(11);
    let mut t: OrderStatTree<u32, u32> = OrderStatTree::new();
    let mut sorted: Vec<u32> = (0..3000).map(|_| rng.gen_range(0..3000)).collect();
    for k in &sorted {
        t.put(*k, *k);
    }
    sorted.sort_unstable();
    sorted.dedup();

    assert_eq!(t.predecessor(&sorted[0]), Ok(None));
    for pair in sorted.windows(2) {
        assert_eq!(t.predecessor(&pair[1]), Ok(Some((&pair[0], &pair[0]))));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = [1u8, 2, 3, 4, 5, 6, 7];

    for_each_permutation(&keys, |perm| {
        let mut t: OrderStatTree<u8, u8> = OrderStatTree::new();
        for k in perm {
            t.put(k, k);
            validate_tree(&t);
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(t.select(i + 1), Ok((k, k)));
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    // Duplicates of 2 and 5 exercise the stack-pop path mid-sequence.
    let keys = [1u8, 2, 3, 4, 5, 6, 2, 5];

    let mut base: OrderStatTree<u8, usize> = OrderStatTree::new();
    for (i, k) in keys.iter().enumerate() {
        base.put(*k, i);
    }
    validate_tree(&base);

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        for (removed, k) in perm.iter().enumerate() {
            assert!(t.remove(k).is_some());
            assert_eq!(t.len(), keys.len() - removed - 1);
            validate_tree(&t);
        }
        assert!(t.is_empty());
        assert!(t.root_node().is_none());
    });
}
