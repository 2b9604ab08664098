use crate::analysis::cfa::ProgramLocation;
use crate::analysis::cpa::reached::{ProgramLocationDependentReachedSet, ReachedSet};
use crate::analysis::cpa::state::LocationState;
use crate::analysis::cpa::view::ReadOnlySet;
use jcpa_bytecode::MethodSignature;
use std::collections::{BTreeMap, BTreeSet};

/// The result of analyzing one method body from one entry state.
#[derive(Debug, Clone)]
pub struct BlockAbstraction<S> {
    pub reached: ProgramLocationDependentReachedSet<S>,
    /// States left unexplored when the run was aborted; empty for a finished run.
    pub waitlist: Vec<S>,
}

impl<S: LocationState> BlockAbstraction<S> {
    pub fn exit_states(&self, signature: MethodSignature) -> impl Iterator<Item = &S> {
        self.reached.states_at(&ProgramLocation::Exit(signature))
    }

    pub fn is_complete(&self) -> bool {
        self.waitlist.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BamCacheEntry<S> {
    pub entry: S,
    /// Distinguishes blocks with equal entry states; unused by the default analysis.
    pub key: Option<ProgramLocation>,
    pub block: BlockAbstraction<S>,
}

/// Memoized block abstractions, keyed by method and reduced entry state.
///
/// Entries live until [`BamCache::clear`]; a block is reused for any entry state it
/// covers.
#[derive(Debug, Clone)]
pub struct BamCache<S> {
    blocks: BTreeMap<MethodSignature, Vec<BamCacheEntry<S>>>,
    methods: BTreeSet<MethodSignature>,
}

impl<S> Default for BamCache<S> {
    fn default() -> Self {
        Self {
            blocks: BTreeMap::new(),
            methods: BTreeSet::new(),
        }
    }
}

impl<S: LocationState> BamCache<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `block`, replacing the block cached for an equal entry state and key.
    pub fn put(
        &mut self,
        signature: MethodSignature,
        entry: S,
        key: Option<ProgramLocation>,
        block: BlockAbstraction<S>,
    ) {
        self.methods.insert(signature);
        let entries = self.blocks.entry(signature).or_default();
        match entries
            .iter_mut()
            .find(|e| e.key == key && e.entry == entry)
        {
            Some(existing) => existing.block = block,
            None => entries.push(BamCacheEntry { entry, key, block }),
        }
    }

    /// A block whose entry state covers `entry`, preferring an exact match.
    pub fn get(
        &self,
        signature: &MethodSignature,
        entry: &S,
        key: Option<ProgramLocation>,
    ) -> Option<&BlockAbstraction<S>> {
        let entries = self.blocks.get(signature)?;
        let candidates = || entries.iter().filter(move |e| e.key == key);
        candidates()
            .find(|e| &e.entry == entry)
            .or_else(|| candidates().find(|e| entry.is_less_or_equal(&e.entry)))
            .map(|e| &e.block)
    }

    /// The methods with at least one cached block.
    pub fn get_all_methods(&self) -> ReadOnlySet<'_, MethodSignature> {
        ReadOnlySet::new(&self.methods)
    }

    pub fn entries_for(&self, signature: &MethodSignature) -> &[BamCacheEntry<S>] {
        self.blocks
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (MethodSignature, &BamCacheEntry<S>)> {
        self.blocks
            .iter()
            .flat_map(|(sig, entries)| entries.iter().map(move |e| (*sig, e)))
    }

    /// Every state reached in any cached block.
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.iter().flat_map(|(_, e)| e.block.reached.iter())
    }

    /// Every cached state at `location`.
    pub fn states_at<'a>(&'a self, location: &'a ProgramLocation) -> impl Iterator<Item = &'a S> {
        let entries = location
            .signature()
            .map(|sig| self.entries_for(&sig))
            .unwrap_or(&[]);
        entries
            .iter()
            .flat_map(move |e| e.block.reached.states_at(location))
    }

    pub fn len(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.methods.clear();
    }

    /// Total number of reached states over all blocks.
    pub fn reached_len(&self) -> usize {
        self.iter().map(|(_, e)| e.block.reached.len()).sum()
    }
}
