//! Arena-backed search tree: UCT selection, expansion and backpropagation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chem::{dedup_precursor_sets, Molecule, MoleculeId};

use crate::config::SearchConfig;
use crate::engine::{CancelHandle, Collaborator, Collaborators, ReactionCandidate, SearchError};
use crate::node::{NodeId, Reaction, SearchNode, State};

/// Tree-level parameters derived from [`SearchConfig`].
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub exploration_constant: f64,
    pub optimistic_value: f64,
    pub max_transforms: u32,
    pub cutoff_cumulative: f64,
    pub filter_cutoff: f64,
    /// Molecule the stock must never report as purchasable (the target, when excluded).
    pub excluded_from_stock: Option<MoleculeId>,
    pub collaborator_timeout: Option<Duration>,
}

impl TreeParams {
    pub fn from_config(config: &SearchConfig, target: &Molecule) -> Self {
        Self {
            exploration_constant: config.exploration_constant,
            optimistic_value: config.optimistic_value,
            max_transforms: config.max_transforms,
            cutoff_cumulative: config.cutoff_cumulative,
            filter_cutoff: config.filter_cutoff,
            excluded_from_stock: config
                .exclude_target_from_stock
                .then(|| target.id().clone()),
            collaborator_timeout: config.collaborator_timeout(),
        }
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        let config = SearchConfig::default();
        Self {
            exploration_constant: config.exploration_constant,
            optimistic_value: config.optimistic_value,
            max_transforms: config.max_transforms,
            cutoff_cumulative: config.cutoff_cumulative,
            filter_cutoff: config.filter_cutoff,
            excluded_from_stock: None,
            collaborator_timeout: None,
        }
    }
}

/// What a single `expand` call did.
#[derive(Debug, Clone, Default)]
pub struct ExpansionReport {
    /// Nothing to do: the node was already expanded, solved or too deep.
    pub skipped: bool,
    /// The node became solved from stock lookups alone (no edge created).
    pub resolved_by_stock: bool,
    pub children_created: usize,
    pub molecules_attempted: usize,
    pub molecules_without_candidates: usize,
    pub candidates_proposed: usize,
    pub candidates_inapplicable: usize,
    pub candidates_filtered: usize,
    /// Chemistry/stock failures that only cost one candidate.
    pub collaborator_failures: usize,
    pub policy_time: Duration,
    pub chemistry_time: Duration,
    pub filter_time: Duration,
    pub stock_time: Duration,
}

/// The search tree.
///
/// Nodes live in an append-only arena and are addressed by [`NodeId`]; the
/// root is always node 0. A child is pushed into the arena fully initialized
/// before its id is published in the parent's child list, so selection never
/// sees a half-built edge.
pub struct SearchTree {
    nodes: RwLock<Vec<Arc<SearchNode>>>,
    params: TreeParams,
    open_leaves: AtomicUsize,
    cancel: CancelHandle,
}

impl SearchTree {
    /// Create a tree whose root holds `target` as the only unresolved molecule.
    pub fn new(target: Molecule, params: TreeParams) -> Self {
        Self::with_cancel(target, params, CancelHandle::default())
    }

    /// Like [`SearchTree::new`], observing an existing cancellation handle.
    pub fn with_cancel(target: Molecule, params: TreeParams, cancel: CancelHandle) -> Self {
        Self {
            nodes: RwLock::new(vec![Arc::new(SearchNode::root(target))]),
            params,
            open_leaves: AtomicUsize::new(1),
            cancel,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn root(&self) -> Arc<SearchNode> {
        self.node(0)
    }

    /// Look up a node. Panics on an id that was never handed out.
    pub fn node(&self, id: NodeId) -> Arc<SearchNode> {
        Arc::clone(&self.nodes.read().unwrap()[id])
    }

    /// Snapshot of every node in creation order.
    pub fn nodes(&self) -> Vec<Arc<SearchNode>> {
        self.nodes.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes that may still be expanded.
    pub fn open_leaves(&self) -> usize {
        self.open_leaves.load(Ordering::Acquire)
    }

    /// Solved, at the depth limit, or expanded without producing children.
    pub fn is_terminal(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.is_solved()
            || node.depth() >= self.params.max_transforms
            || (node.is_expanded() && node.child_count() == 0)
    }

    /// UCT score of `child` under a parent with `parent_visits` visits.
    ///
    /// An unvisited child counts as one visit with the optimistic mean.
    pub fn ucb(&self, parent_visits: u32, child: &SearchNode) -> f64 {
        let stats = child.stats();
        let (q, n) = if stats.visits == 0 {
            (self.params.optimistic_value, 1.0)
        } else {
            (
                stats.total_reward / stats.visits as f64,
                stats.visits as f64,
            )
        };
        let ln_parent = (parent_visits.max(1) as f64).ln();
        q + self.params.exploration_constant * (ln_parent / n).sqrt()
    }

    /// Descend from the root along maximal UCT children.
    ///
    /// Stops at a node that is not expanded yet or is terminal. Ties go to
    /// the child created first.
    pub fn select_leaf(&self) -> NodeId {
        self.select_leaf_excluding(&HashSet::new()).unwrap_or(0)
    }

    /// Selection that never enters a node in `busy`.
    ///
    /// Returns `None` when every way down is blocked.
    pub fn select_leaf_excluding(&self, busy: &HashSet<NodeId>) -> Option<NodeId> {
        let mut current = self.root();
        loop {
            if busy.contains(&current.id()) {
                return None;
            }
            if !current.is_expanded() || self.is_terminal(current.id()) {
                return Some(current.id());
            }
            let parent_visits = current.visits();
            let mut best: Option<(f64, Arc<SearchNode>)> = None;
            for child_id in current.children() {
                if busy.contains(&child_id) {
                    continue;
                }
                let child = self.node(child_id);
                let score = self.ucb(parent_visits, &child);
                if best.as_ref().map_or(true, |(top, _)| score > *top) {
                    best = Some((score, child));
                }
            }
            current = best?.1;
        }
    }

    /// Unvisited child with the highest policy probability (first on ties).
    pub fn promising_child(&self, id: NodeId) -> Option<NodeId> {
        let mut best: Option<(f64, NodeId)> = None;
        for child_id in self.node(id).children() {
            let child = self.node(child_id);
            if child.visits() > 0 {
                continue;
            }
            let p = child.reaction().map_or(0.0, |r| r.probability);
            if best.map_or(true, |(top, _)| p > top) {
                best = Some((p, child_id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Add one visit and `reward` to `id` and every ancestor.
    ///
    /// A solved (or proven) start node marks each ancestor as proven.
    pub fn backpropagate(&self, id: NodeId, reward: f64) {
        let mut carry_proven = false;
        let mut current = Some(self.node(id));
        while let Some(node) = current {
            node.record_visit(reward);
            if carry_proven {
                node.mark_proven();
            }
            carry_proven = node.is_proven();
            current = node.parent().map(|p| self.node(p));
        }
    }

    /// Expand node `id` with the given collaborators.
    ///
    /// Unresolved molecules are tried in state order until one of them
    /// yields at least one accepted child. Children already attached stay
    /// attached when a later collaborator call fails.
    pub async fn expand(
        &self,
        id: NodeId,
        collab: &Collaborators<'_>,
        max_children: usize,
    ) -> Result<ExpansionReport, SearchError> {
        let node = self.node(id);
        let _guard = node.expansion.lock().await;
        let mut report = ExpansionReport::default();

        if node.is_expanded() || node.is_solved() {
            report.skipped = true;
            return Ok(report);
        }
        self.check_cancelled()?;

        if !node.stock_checked() {
            self.resolve_from_stock(&node, collab, &mut report).await?;
            if node.is_solved() {
                report.resolved_by_stock = true;
                self.finish_expansion(&node);
                tracing::debug!(node = id, "Node solved from stock");
                return Ok(report);
            }
        }

        if node.depth() >= self.params.max_transforms {
            report.skipped = true;
            self.finish_expansion(&node);
            return Ok(report);
        }

        let state = node.state();
        let mut attempted: HashSet<MoleculeId> = HashSet::new();
        for (index, molecule) in state.unresolved() {
            if !attempted.insert(collab.chemistry.canonical_id(molecule)) {
                continue;
            }
            report.molecules_attempted += 1;
            let result = self
                .expand_molecule(&node, &state, index, molecule, collab, max_children, &mut report)
                .await;
            if let Err(err) = result {
                if node.child_count() > 0 {
                    self.finish_expansion(&node);
                }
                return Err(err);
            }
            if node.child_count() > 0 {
                break;
            }
        }

        self.finish_expansion(&node);
        tracing::debug!(
            node = id,
            depth = node.depth(),
            children = report.children_created,
            proposed = report.candidates_proposed,
            filtered = report.candidates_filtered,
            inapplicable = report.candidates_inapplicable,
            "Expanded node"
        );
        Ok(report)
    }

    async fn resolve_from_stock(
        &self,
        node: &SearchNode,
        collab: &Collaborators<'_>,
        report: &mut ExpansionReport,
    ) -> Result<(), SearchError> {
        let state = node.state();
        let mut hits = Vec::new();
        for (index, molecule) in state.unresolved() {
            if self.in_stock(molecule, collab, &mut report.stock_time).await? {
                hits.push(index);
            }
        }
        self.check_cancelled()?;
        if hits.is_empty() {
            node.mark_stock_checked();
        } else {
            node.set_state(state.with_in_stock(&hits));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn expand_molecule(
        &self,
        node: &SearchNode,
        state: &State,
        index: usize,
        molecule: &Molecule,
        collab: &Collaborators<'_>,
        max_children: usize,
        report: &mut ExpansionReport,
    ) -> Result<(), SearchError> {
        let proposed = self
            .call(
                Collaborator::ExpansionPolicy,
                &mut report.policy_time,
                collab.expansion.propose(molecule, max_children),
            )
            .await?;
        self.check_cancelled()?;

        let candidates = self.apply_cutoffs(proposed, max_children);
        if candidates.is_empty() {
            report.molecules_without_candidates += 1;
            tracing::debug!(node = node.id(), molecule = %molecule, "No candidates proposed");
            return Ok(());
        }
        report.candidates_proposed += candidates.len();

        for candidate in candidates {
            self.check_cancelled()?;

            let applied = self
                .call(
                    Collaborator::ChemistryEngine,
                    &mut report.chemistry_time,
                    collab.chemistry.apply(&candidate.template, molecule),
                )
                .await;
            let sets = match applied {
                Ok(sets) => dedup_precursor_sets(sets, |m| collab.chemistry.canonical_id(m)),
                Err(err) => {
                    report.collaborator_failures += 1;
                    tracing::warn!(
                        template = %candidate.template,
                        molecule = %molecule,
                        error = %err,
                        "Skipping candidate"
                    );
                    continue;
                }
            };
            let Some(precursors) = sets.into_iter().next() else {
                report.candidates_inapplicable += 1;
                continue;
            };

            let mut flagged = Vec::with_capacity(precursors.len());
            let mut stock_error = None;
            for precursor in &precursors {
                match self.in_stock(precursor, collab, &mut report.stock_time).await {
                    Ok(hit) => flagged.push((precursor.clone(), hit)),
                    Err(err) => {
                        stock_error = Some(err);
                        break;
                    }
                }
            }
            if let Some(err) = stock_error {
                report.collaborator_failures += 1;
                tracing::warn!(template = %candidate.template, error = %err, "Skipping candidate");
                continue;
            }

            let filter_score = match collab.filter {
                Some(filter) => {
                    let score = self
                        .call(
                            Collaborator::FilterPolicy,
                            &mut report.filter_time,
                            filter.accept(&candidate.template, molecule, &precursors),
                        )
                        .await?;
                    if score < self.params.filter_cutoff {
                        report.candidates_filtered += 1;
                        tracing::debug!(
                            template = %candidate.template,
                            score,
                            cutoff = self.params.filter_cutoff,
                            "Filter rejected reaction"
                        );
                        continue;
                    }
                    Some(score)
                }
                None => None,
            };

            self.check_cancelled()?;
            let child_state = state.apply_reaction(index, &flagged);
            let reaction = Reaction {
                template: candidate.template,
                molecule: molecule.clone(),
                entry_index: index,
                precursors,
                probability: candidate.probability,
                filter_score,
            };
            self.attach_child(node, reaction, child_state);
            report.children_created += 1;
        }
        Ok(())
    }

    /// Keep at most `max` candidates, stopping once the cumulative
    /// probability reaches the configured cutoff.
    fn apply_cutoffs(
        &self,
        mut candidates: Vec<ReactionCandidate>,
        max: usize,
    ) -> Vec<ReactionCandidate> {
        candidates.truncate(max);
        let mut cumulative = 0.0;
        for (i, candidate) in candidates.iter().enumerate() {
            cumulative += candidate.probability;
            if cumulative >= self.params.cutoff_cumulative {
                candidates.truncate(i + 1);
                break;
            }
        }
        candidates
    }

    fn attach_child(&self, parent: &SearchNode, reaction: Reaction, state: State) -> NodeId {
        let id = {
            let mut nodes = self.nodes.write().unwrap();
            let id = nodes.len();
            let child = SearchNode::child(
                id,
                parent.id(),
                reaction,
                parent.depth() + 1,
                state,
                self.params.max_transforms,
            );
            if child.counted_open() {
                self.open_leaves.fetch_add(1, Ordering::AcqRel);
            }
            nodes.push(Arc::new(child));
            id
        };
        parent.push_child(id);
        id
    }

    fn finish_expansion(&self, node: &SearchNode) {
        if node.mark_expanded() && node.counted_open() {
            self.open_leaves.fetch_sub(1, Ordering::AcqRel);
        }
    }

    async fn in_stock(
        &self,
        molecule: &Molecule,
        collab: &Collaborators<'_>,
        spent: &mut Duration,
    ) -> Result<bool, SearchError> {
        if self.params.excluded_from_stock.as_ref() == Some(molecule.id()) {
            return Ok(false);
        }
        self.call(Collaborator::Stock, spent, collab.stock.contains(molecule))
            .await
    }

    /// Await a collaborator call under the configured timeout.
    async fn call<T, E, F>(
        &self,
        collaborator: Collaborator,
        spent: &mut Duration,
        fut: F,
    ) -> Result<T, SearchError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        let start = Instant::now();
        let result = match self.params.collaborator_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(r) => r.map_err(Into::into),
                Err(_) => Err(anyhow::anyhow!(
                    "timed out after {:.1}s",
                    limit.as_secs_f64()
                )),
            },
            None => fut.await.map_err(Into::into),
        };
        *spent += start.elapsed();
        result.map_err(|source| SearchError::CollaboratorUnavailable {
            collaborator,
            source,
        })
    }

    fn check_cancelled(&self) -> Result<(), SearchError> {
        if self.cancel.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
