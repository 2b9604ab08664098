use super::*;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use std::collections::HashMap;
use std::sync::Arc;

type Taints = SetAbstractState<u8>;

fn taints(values: &[u8]) -> Taints {
    values.iter().copied().collect()
}

fn always_admit() -> AdmissionPredicate<&'static str, Taints> {
    Arc::new(|_: &HashMap<&'static str, Taints>, _: &&'static str, _: &Taints| true)
}

fn all_strategies() -> Vec<MapAbstractState<&'static str, Taints>> {
    vec![
        MapAbstractStateFactory::Hash.create(),
        MapAbstractStateFactory::Differential(None).create(),
        MapAbstractStateFactory::Limited(always_admit()).create(),
    ]
}

enum Op {
    Insert(&'static str, &'static [u8]),
    Remove(&'static str),
}

fn apply(map: &mut MapAbstractState<&'static str, Taints>, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Insert(k, v) => {
                map.insert(k, taints(v));
            }
            Op::Remove(k) => {
                map.remove(k);
            }
        }
    }
}

#[test]
fn strategies_are_equivalent() {
    let ops = [
        Op::Insert("a", &[1]),
        Op::Insert("b", &[2]),
        Op::Remove("a"),
        Op::Insert("c", &[3]),
        Op::Insert("b", &[4]),
        Op::Remove("missing"),
        Op::Insert("a", &[5]),
    ];
    let other_ops = [Op::Insert("b", &[2]), Op::Insert("d", &[6])];

    let mut maps = all_strategies();
    let mut others = all_strategies();
    for (map, other) in maps.iter_mut().zip(others.iter_mut()) {
        apply(map, &ops);
        apply(other, &other_ops);
    }

    let mut expected: Vec<(&str, Vec<u8>)> = vec![("a", vec![5]), ("b", vec![4]), ("c", vec![3])];
    expected.sort();
    for map in &maps {
        let mut contents: Vec<(&str, Vec<u8>)> = map
            .iter()
            .map(|(k, v)| {
                let mut v: Vec<u8> = v.iter().copied().collect();
                v.sort();
                (*k, v)
            })
            .collect();
        contents.sort();
        assert_eq!(contents, expected);
    }

    for a in &maps {
        for b in &maps {
            assert_eq!(a, b);
        }
        for other in &others {
            assert_eq!(a.partial_cmp(other), None);
            let mut joined = a.clone();
            joined.join(other);
            assert_eq!(joined.get(&"b"), Some(&taints(&[2, 4])));
            assert_eq!(joined.get(&"d"), Some(&taints(&[6])));
            assert_eq!(joined.len(), 4);
            let mut reference = maps[0].clone();
            reference.join(&others[0]);
            assert_eq!(joined, reference);
            assert!(a.is_less_or_equal(&joined));
        }
    }
}

#[test]
fn differential_depth_and_collapse() {
    let mut map: MapAbstractState<&str, Taints> = MapAbstractStateFactory::Differential(None).create();
    let MapAbstractState::Differential(ref mut diff) = map else {
        panic!("factory produced the wrong strategy");
    };
    diff.insert("a", taints(&[1]));
    diff.insert("b", taints(&[2]));
    assert_eq!(diff.depth(), 2);
    diff.remove(&"a");
    assert_eq!(diff.depth(), 3);

    let snapshot = diff.clone();
    diff.collapse();
    assert_eq!(diff.depth(), 0);
    assert_eq!(diff.get(&"b"), Some(&taints(&[2])));
    assert_eq!(diff.get(&"a"), None);
    assert_eq!(diff.len(), 1);

    // the clone still sees its own delta
    assert_eq!(snapshot.depth(), 3);
    assert_eq!(snapshot.get(&"b"), Some(&taints(&[2])));
}

#[test]
fn differential_collapse_criterion() {
    let factory = MapAbstractStateFactory::<&str, Taints>::differential_with_max_depth(2);
    let MapAbstractState::Differential(mut diff) = factory.create() else {
        panic!("factory produced the wrong strategy");
    };
    diff.insert("a", taints(&[1]));
    diff.insert("b", taints(&[1]));
    assert_eq!(diff.depth(), 2);
    diff.insert("c", taints(&[1]));
    assert_eq!(diff.depth(), 0);
    assert_eq!(diff.len(), 3);
    diff.remove(&"a");
    assert_eq!(diff.depth(), 1);
    assert_eq!(diff.len(), 2);
}

#[test]
fn limited_map_drops_rejected_entries() {
    let reject_b: AdmissionPredicate<&'static str, Taints> =
        Arc::new(|_: &HashMap<&'static str, Taints>, k: &&'static str, _: &Taints| *k != "b");
    let mut map = MapAbstractStateFactory::Limited(reject_b).create();
    map.insert("a", taints(&[1]));
    map.insert("b", taints(&[2]));
    assert!(map.contains_key(&"a"));
    assert!(!map.contains_key(&"b"));

    map.extend([("b", taints(&[3])), ("c", taints(&[4]))]);
    assert!(!map.contains_key(&"b"));
    assert!(map.contains_key(&"c"));

    let mut other = MapAbstractState::new();
    other.insert("b", taints(&[5]));
    other.insert("a", taints(&[6]));
    map.join(&other);
    assert!(!map.contains_key(&"b"));
    assert_eq!(map.get(&"a"), Some(&taints(&[1, 6])));
}

#[test]
fn limited_map_max_size() {
    let mut map = MapAbstractState::Limited(LimitedHashMapAbstractState::with_max_size(2));
    map.insert("a", taints(&[1]));
    map.insert("b", taints(&[1]));
    map.insert("c", taints(&[1]));
    assert_eq!(map.len(), 2);
    map.insert("a", taints(&[2]));
    assert_eq!(map.get(&"a"), Some(&taints(&[2])));
}

#[test]
fn map_lattice_laws() {
    let mut samples = vec![MapAbstractState::new()];
    let mut one = MapAbstractState::new();
    one.insert("x", taints(&[1]));
    samples.push(one.clone());
    let mut two = one.clone();
    two.insert("y", taints(&[2]));
    samples.push(two);
    let mut other = MapAbstractStateFactory::Differential(None).create();
    other.insert("x", taints(&[3]));
    samples.push(other);

    for a in &samples {
        assert!(a.is_less_or_equal(a));
        assert!(MapAbstractState::bottom().is_less_or_equal(a));
        for b in &samples {
            let mut ab = a.clone();
            ab.join(b);
            let mut ba = b.clone();
            ba.join(a);
            assert_eq!(ab, ba);
            if a.is_less_or_equal(b) {
                assert_eq!(&ab, b);
            }
        }
    }
}

#[test]
fn missing_keys_are_bottom() {
    for mut with_bottom in all_strategies() {
        with_bottom.insert("x", Taints::bottom());
        let empty = MapAbstractState::new();
        assert!(with_bottom.is_less_or_equal(&empty));
        assert!(empty.is_less_or_equal(&with_bottom));
        assert_eq!(with_bottom, empty);
        assert!(with_bottom.is_bottom());

        let mut one = MapAbstractState::new();
        one.insert("y", taints(&[1]));
        assert!(with_bottom.is_less_or_equal(&one));
        assert!(!one.is_less_or_equal(&with_bottom));

        with_bottom.insert("x", taints(&[2]));
        assert!(!with_bottom.is_less_or_equal(&empty));
        assert_eq!(with_bottom.partial_cmp(&one), None);
    }
}
