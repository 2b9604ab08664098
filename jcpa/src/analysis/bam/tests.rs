use crate::analysis::bam::{BamCache, BamCpa, BlockAbstraction};
use crate::analysis::cfa::{CfaBuilder, ProgramLocation};
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::reached::{ProgramLocationDependentReachedSet, ReachedSet};
use crate::analysis::cpa::state::LocationState;
use crate::analysis::jvm::heap::{HeapFactories, HeapModel, JvmHeapAbstractState};
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::value::ConstantSemantics;
use crate::error::CpaError;
use jcpa_bytecode::builder::ClassBuilder;
use jcpa_bytecode::{ClassPool, MethodSignature};
use std::cmp::Ordering;

/// A counter at a location, ordered only against counters at the same location.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Located {
    location: ProgramLocation,
    value: i32,
}

impl PartialOrd for Located {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.location == other.location).then(|| self.value.cmp(&other.value))
    }
}

impl JoinSemiLattice for Located {
    fn join(&mut self, other: &Self) {
        self.value = self.value.max(other.value);
    }
}

impl LocationState for Located {
    fn location(&self) -> &ProgramLocation {
        &self.location
    }
}

fn callee() -> MethodSignature {
    MethodSignature::new("A", "callee", "(I)I")
}

fn entry(value: i32) -> Located {
    Located {
        location: ProgramLocation::entry(callee()),
        value,
    }
}

fn exit(value: i32) -> Located {
    Located {
        location: ProgramLocation::Exit(callee()),
        value,
    }
}

fn block(states: &[Located]) -> BlockAbstraction<Located> {
    let mut reached = ProgramLocationDependentReachedSet::new();
    for state in states {
        reached.add(state.clone());
    }
    BlockAbstraction {
        reached,
        waitlist: Vec::new(),
    }
}

#[test]
fn cached_blocks_cover_smaller_entries() {
    let mut cache = BamCache::new();
    cache.put(callee(), entry(5), None, block(&[entry(5), exit(1)]));

    let covered = cache.get(&callee(), &entry(3), None).unwrap();
    assert_eq!(covered.exit_states(callee()).collect::<Vec<_>>(), vec![&exit(1)]);
    assert!(cache.get(&callee(), &entry(7), None).is_none());
    assert!(cache.get(&callee(), &entry(3), Some(ProgramLocation::Unknown)).is_none());

    let other = MethodSignature::new("A", "other", "()V");
    assert!(cache.get(&other, &entry(3), None).is_none());
}

#[test]
fn exact_entries_win_over_covering_ones() {
    let mut cache = BamCache::new();
    cache.put(callee(), entry(5), None, block(&[entry(5), exit(1)]));
    cache.put(callee(), entry(3), None, block(&[entry(3), exit(2)]));
    assert_eq!(cache.len(), 2);
    let exact = cache.get(&callee(), &entry(3), None).unwrap();
    assert_eq!(exact.exit_states(callee()).collect::<Vec<_>>(), vec![&exit(2)]);
}

#[test]
fn put_replaces_equal_entries() {
    let mut cache = BamCache::new();
    cache.put(callee(), entry(5), None, block(&[entry(5)]));
    cache.put(callee(), entry(5), None, block(&[entry(5), exit(4)]));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.reached_len(), 2);
    assert_eq!(
        cache.states_at(&ProgramLocation::Exit(callee())).collect::<Vec<_>>(),
        vec![&exit(4)]
    );

    cache.put(callee(), entry(5), Some(ProgramLocation::Unknown), block(&[entry(5)]));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.entries_for(&callee()).len(), 2);
}

#[test]
fn method_view_is_read_only() {
    let mut cache = BamCache::new();
    cache.put(callee(), entry(5), None, block(&[entry(5)]));
    let methods = cache.get_all_methods();
    assert!(methods.contains(&callee()));
    assert_eq!(methods.len(), 1);
    assert!(matches!(
        methods.insert(MethodSignature::new("A", "other", "()V")),
        Err(CpaError::UnsupportedOperation(_))
    ));
    assert!(matches!(methods.remove(&callee()), Err(CpaError::UnsupportedOperation(_))));
    assert!(matches!(methods.clear(), Err(CpaError::UnsupportedOperation(_))));

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get_all_methods().len(), 0);
}

#[test]
fn analyzed_blocks_are_cached_once_per_entry() {
    let class = ClassBuilder::new("A")
        .static_method("callee", "(I)I", |code| {
            code.iload(0).iconst(1).iadd().ireturn();
        })
        .static_method("main", "()V", |code| {
            code.iconst(1)
                .invokestatic("A", "callee", "(I)I")
                .pop()
                .iconst(1)
                .invokestatic("A", "callee", "(I)I")
                .pop()
                .return_void();
        })
        .build()
        .unwrap();
    let mut pool = ClassPool::new();
    pool.add_class(class).unwrap();
    let cfa = CfaBuilder::new(&pool).build().unwrap();
    let main = MethodSignature::new("A", "main", "()V");

    let semantics = ConstantSemantics;
    let bam = BamCpa::jvm(&cfa, &semantics, false);
    let start = JvmAbstractState::entry(
        cfa.method(&main).unwrap(),
        &semantics,
        JvmHeapAbstractState::new(HeapModel::Forgetful, &HeapFactories::default()),
        Default::default(),
    );
    let exits = bam.analyze_block(main, start);
    assert_eq!(exits.len(), 1);
    assert!(!bam.aborted());
    assert!(bam.iterations() > 0);
    {
        let cache = bam.cache();
        assert_eq!(cache.entries_for(&callee()).len(), 1);
        assert!(cache.entries_for(&main)[0].block.is_complete());
    }
    bam.clear_cache();
    assert!(bam.cache().is_empty());
}

#[test]
fn recursion_with_a_new_entry_is_analyzed() {
    let class = ClassBuilder::new("A")
        .static_method("count", "(I)V", |code| {
            code.iconst(1)
                .invokestatic("A", "count", "(I)V")
                .return_void();
        })
        .static_method("main", "()V", |code| {
            code.iconst(0)
                .invokestatic("A", "count", "(I)V")
                .return_void();
        })
        .build()
        .unwrap();
    let mut pool = ClassPool::new();
    pool.add_class(class).unwrap();
    let cfa = CfaBuilder::new(&pool).build().unwrap();
    let main = MethodSignature::new("A", "main", "()V");
    let count = MethodSignature::new("A", "count", "(I)V");

    let semantics = ConstantSemantics;
    let bam = BamCpa::jvm(&cfa, &semantics, false);
    let start = JvmAbstractState::entry(
        cfa.method(&main).unwrap(),
        &semantics,
        JvmHeapAbstractState::new(HeapModel::Forgetful, &HeapFactories::default()),
        Default::default(),
    );
    let exits = bam.analyze_block(main, start);
    assert_eq!(exits.len(), 1);

    // count(0) calls count(1), analyzed from the joined entry; inside it the call is covered
    let cache = bam.cache();
    let entries = cache.entries_for(&count);
    assert_eq!(entries.len(), 2);
    let first_locals: Vec<_> = entries
        .iter()
        .map(|e| e.entry.frame.load(0).as_int())
        .collect();
    assert!(first_locals.contains(&Some(0)));
    assert!(first_locals.contains(&None));
}
