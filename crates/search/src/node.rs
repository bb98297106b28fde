use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chem::{ChemistryEngine, Molecule, MoleculeId, TemplateId};

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// Resolution status of one molecule in a [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Still needs a reaction or a stock hit.
    Unresolved,
    /// Purchasable; a leaf of the route.
    InStock,
    /// Broken down by the reaction on the edge that consumed it.
    Expanded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub molecule: Molecule,
    pub resolution: Resolution,
}

impl StateEntry {
    pub fn new(molecule: Molecule, resolution: Resolution) -> Self {
        Self {
            molecule,
            resolution,
        }
    }
}

/// The molecules of one search node, each tagged with its resolution.
///
/// Immutable. Transitions build a new `State`; entries are only appended,
/// so an entry keeps its index in every descendant state. Clones share the
/// entry slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    entries: Arc<[StateEntry]>,
}

impl State {
    pub fn new(entries: Vec<StateEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Root state: the target as the sole unresolved entry.
    pub fn target(molecule: Molecule) -> Self {
        Self::new(vec![StateEntry::new(molecule, Resolution::Unresolved)])
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unresolved entries with their indices, in state order.
    pub fn unresolved(&self) -> impl Iterator<Item = (usize, &Molecule)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.resolution == Resolution::Unresolved)
            .map(|(i, e)| (i, &e.molecule))
    }

    /// Entries that are not broken down further (route leaves).
    pub fn leaves(&self) -> impl Iterator<Item = &StateEntry> + '_ {
        self.entries
            .iter()
            .filter(|e| e.resolution != Resolution::Expanded)
    }

    pub fn unresolved_count(&self) -> usize {
        self.count(Resolution::Unresolved)
    }

    pub fn in_stock_count(&self) -> usize {
        self.count(Resolution::InStock)
    }

    /// Number of reactions that led to this state.
    pub fn expanded_count(&self) -> usize {
        self.count(Resolution::Expanded)
    }

    fn count(&self, resolution: Resolution) -> usize {
        self.entries
            .iter()
            .filter(|e| e.resolution == resolution)
            .count()
    }

    pub fn is_solved(&self) -> bool {
        self.unresolved_count() == 0
    }

    /// Fraction of leaves that are in stock (1.0 for a state without leaves).
    pub fn fraction_in_stock(&self) -> f64 {
        let leaves = self.in_stock_count() + self.unresolved_count();
        if leaves == 0 {
            1.0
        } else {
            self.in_stock_count() as f64 / leaves as f64
        }
    }

    /// Sorted multiset of unresolved molecule ids under `engine`'s identity.
    ///
    /// Two states with equal keys need exactly the same work to be solved.
    pub fn equivalence_key(&self, engine: &dyn ChemistryEngine) -> Vec<MoleculeId> {
        let mut key: Vec<MoleculeId> = self
            .unresolved()
            .map(|(_, m)| engine.canonical_id(m))
            .collect();
        key.sort();
        key
    }

    /// New state with the unresolved entries in `in_stock` marked `InStock`.
    pub fn with_in_stock(&self, in_stock: &[usize]) -> State {
        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                if e.resolution == Resolution::Unresolved && in_stock.contains(&i) {
                    StateEntry::new(e.molecule.clone(), Resolution::InStock)
                } else {
                    e.clone()
                }
            })
            .collect();
        State::new(entries)
    }

    /// New state after breaking down entry `index` into `precursors`.
    ///
    /// The consumed entry becomes `Expanded`; precursors are appended with
    /// their stock status.
    pub fn apply_reaction(&self, index: usize, precursors: &[(Molecule, bool)]) -> State {
        let mut entries: Vec<StateEntry> = Vec::with_capacity(self.len() + precursors.len());
        for (i, e) in self.entries.iter().enumerate() {
            if i == index {
                entries.push(StateEntry::new(e.molecule.clone(), Resolution::Expanded));
            } else {
                entries.push(e.clone());
            }
        }
        for (molecule, in_stock) in precursors {
            let resolution = if *in_stock {
                Resolution::InStock
            } else {
                Resolution::Unresolved
            };
            entries.push(StateEntry::new(molecule.clone(), resolution));
        }
        State::new(entries)
    }
}

/// The edge leading into a node: one applied reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub template: TemplateId,
    /// The molecule the template was applied to.
    pub molecule: Molecule,
    /// Index of `molecule` in the parent state.
    pub entry_index: usize,
    /// Precursors produced, appended to the child state in this order.
    pub precursors: Vec<Molecule>,
    /// Probability assigned by the expansion policy.
    pub probability: f64,
    /// Filter policy score, `None` when no filter ran.
    pub filter_score: Option<f64>,
}

/// Visit count and cumulative reward of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    pub visits: u32,
    pub total_reward: f64,
}

/// A node of the search tree.
///
/// Structural fields (`id`, `parent`, `reaction`, `depth`) are fixed at
/// creation. Mutable parts are behind per-node locks and atomics so that
/// selection, backpropagation and expansions of other nodes can proceed
/// concurrently.
#[derive(Debug)]
pub struct SearchNode {
    id: NodeId,
    parent: Option<NodeId>,
    reaction: Option<Reaction>,
    depth: u32,
    state: RwLock<State>,
    stats: Mutex<NodeStats>,
    children: RwLock<Vec<NodeId>>,
    expanded: AtomicBool,
    solved: AtomicBool,
    proven: AtomicBool,
    stock_checked: AtomicBool,
    /// Whether this node was counted as an open leaf when created.
    counted_open: bool,
    pub(crate) expansion: tokio::sync::Mutex<()>,
}

impl SearchNode {
    /// Root node for `target`. Its stock status is checked on first expansion.
    pub(crate) fn root(target: Molecule) -> Self {
        Self::build(0, None, None, 0, State::target(target), false, true)
    }

    /// Child node reached by `reaction`. Precursor stock status is already in `state`.
    pub(crate) fn child(
        id: NodeId,
        parent: NodeId,
        reaction: Reaction,
        depth: u32,
        state: State,
        max_transforms: u32,
    ) -> Self {
        let open = !state.is_solved() && depth < max_transforms;
        Self::build(id, Some(parent), Some(reaction), depth, state, true, open)
    }

    fn build(
        id: NodeId,
        parent: Option<NodeId>,
        reaction: Option<Reaction>,
        depth: u32,
        state: State,
        stock_checked: bool,
        counted_open: bool,
    ) -> Self {
        let solved = state.is_solved();
        Self {
            id,
            parent,
            reaction,
            depth,
            state: RwLock::new(state),
            stats: Mutex::new(NodeStats::default()),
            children: RwLock::new(Vec::new()),
            expanded: AtomicBool::new(false),
            solved: AtomicBool::new(solved),
            proven: AtomicBool::new(solved),
            stock_checked: AtomicBool::new(stock_checked),
            counted_open,
            expansion: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The reaction on the edge from the parent, `None` for the root.
    pub fn reaction(&self) -> Option<&Reaction> {
        self.reaction.as_ref()
    }

    /// Number of reactions from the root.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Snapshot of the current state (cheap clone).
    pub fn state(&self) -> State {
        self.state.read().unwrap().clone()
    }

    pub fn stats(&self) -> NodeStats {
        *self.stats.lock().unwrap()
    }

    pub fn visits(&self) -> u32 {
        self.stats().visits
    }

    pub fn total_reward(&self) -> f64 {
        self.stats().total_reward
    }

    /// Mean reward, `None` before the first visit.
    pub fn mean_reward(&self) -> Option<f64> {
        let s = self.stats();
        (s.visits > 0).then(|| s.total_reward / s.visits as f64)
    }

    /// Child ids in creation order.
    pub fn children(&self) -> Vec<NodeId> {
        self.children.read().unwrap().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().unwrap().len()
    }

    /// Whether expansion has been attempted to completion.
    pub fn is_expanded(&self) -> bool {
        self.expanded.load(Ordering::Acquire)
    }

    /// Whether this node's own state has no unresolved molecules.
    pub fn is_solved(&self) -> bool {
        self.solved.load(Ordering::Acquire)
    }

    /// Whether this node or a descendant is solved.
    pub fn is_proven(&self) -> bool {
        self.proven.load(Ordering::Acquire)
    }

    pub(crate) fn stock_checked(&self) -> bool {
        self.stock_checked.load(Ordering::Acquire)
    }

    pub(crate) fn counted_open(&self) -> bool {
        self.counted_open
    }

    /// Replace the state after resolving entries in place.
    pub(crate) fn set_state(&self, state: State) {
        let solved = state.is_solved();
        *self.state.write().unwrap() = state;
        self.stock_checked.store(true, Ordering::Release);
        if solved {
            self.solved.store(true, Ordering::Release);
            self.proven.store(true, Ordering::Release);
        }
    }

    pub(crate) fn mark_stock_checked(&self) {
        self.stock_checked.store(true, Ordering::Release);
    }

    /// Add one visit carrying `reward`.
    pub(crate) fn record_visit(&self, reward: f64) {
        let mut stats = self.stats.lock().unwrap();
        stats.visits += 1;
        stats.total_reward += reward;
    }

    pub(crate) fn push_child(&self, child: NodeId) {
        self.children.write().unwrap().push(child);
    }

    /// Mark expanded; returns `true` only for the call that flipped the flag.
    pub(crate) fn mark_expanded(&self) -> bool {
        !self.expanded.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn mark_proven(&self) -> bool {
        !self.proven.swap(true, Ordering::AcqRel)
    }
}
