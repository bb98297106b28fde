//! Mock collaborators for testing the search without models or a chemistry toolkit.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chem::{ChemError, ChemistryEngine, Molecule, MoleculeId, TemplateId};

use crate::engine::{ExpansionPolicy, FilterPolicy, ReactionCandidate, Stock};

/// Molecule whose id is its text.
pub fn mol(smiles: &str) -> Molecule {
    Molecule::from_canonical(smiles)
}

/// Convenience constructor for a `ReactionCandidate`.
pub fn candidate(template: &str, probability: f64) -> ReactionCandidate {
    ReactionCandidate::new(template, probability)
}

// ---------------------------------------------------------------------------
// MockExpansionPolicy
// ---------------------------------------------------------------------------

/// Expansion policy returning canned candidates by molecule id.
pub struct MockExpansionPolicy {
    responses: HashMap<String, Vec<ReactionCandidate>>,
    default_responses: Vec<ReactionCandidate>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for MockExpansionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExpansionPolicy {
    /// A policy with no responses: every molecule gets zero candidates.
    pub fn new() -> Self {
        Self::with_default(Vec::new())
    }

    /// A policy answering `candidates` for any molecule without its own response.
    pub fn with_default(candidates: Vec<ReactionCandidate>) -> Self {
        Self {
            responses: HashMap::new(),
            default_responses: candidates,
            failing: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long in every call before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_response(&mut self, molecule: &str, candidates: Vec<ReactionCandidate>) {
        self.responses.insert(molecule.to_string(), candidates);
    }

    /// Make every call for `molecule` fail.
    pub fn fail_on(&mut self, molecule: &str) {
        self.failing.insert(molecule.to_string());
    }

    /// Number of `propose` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ExpansionPolicy for MockExpansionPolicy {
    async fn propose(
        &self,
        molecule: &Molecule,
        max: usize,
    ) -> anyhow::Result<Vec<ReactionCandidate>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let id = molecule.id().as_str();
        if self.failing.contains(id) {
            anyhow::bail!("expansion model unavailable for {id}");
        }
        let mut candidates = self
            .responses
            .get(id)
            .unwrap_or(&self.default_responses)
            .clone();
        candidates.truncate(max);
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// RandomExpansionPolicy
// ---------------------------------------------------------------------------

/// Seeded stochastic policy.
///
/// Proposes `width` templates `r0..r{width-1}` with random probabilities
/// summing to one. The answer depends only on the seed and the molecule, so
/// it is identical across runs and call orders.
pub struct RandomExpansionPolicy {
    seed: u64,
    width: usize,
}

impl RandomExpansionPolicy {
    pub fn new(seed: u64, width: usize) -> Self {
        Self { seed, width }
    }
}

#[async_trait]
impl ExpansionPolicy for RandomExpansionPolicy {
    async fn propose(
        &self,
        molecule: &Molecule,
        max: usize,
    ) -> anyhow::Result<Vec<ReactionCandidate>> {
        let mut hasher = DefaultHasher::new();
        molecule.id().hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(self.seed ^ hasher.finish());

        let weights: Vec<f64> = (0..self.width).map(|_| rng.gen_range(0.05..1.0)).collect();
        let total: f64 = weights.iter().sum();
        let mut candidates: Vec<ReactionCandidate> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| ReactionCandidate::new(format!("r{i}"), w / total))
            .collect();
        candidates.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        candidates.truncate(max);
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// MockChemistry
// ---------------------------------------------------------------------------

/// Chemistry engine with canned template applications.
///
/// Unknown `(template, product)` pairs do not match. In generative mode they
/// instead produce the single precursor `"{product}/{template}"`, which
/// gives an unbounded tree of fresh molecules.
#[derive(Default)]
pub struct MockChemistry {
    reactions: HashMap<(String, String), Vec<Vec<String>>>,
    failing: HashSet<String>,
    generative: bool,
    fold_case: bool,
}

impl MockChemistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generative() -> Self {
        Self {
            generative: true,
            ..Self::default()
        }
    }

    /// Identify molecules by their uppercased id, so `cco` and `CCO` are one molecule.
    pub fn with_case_folded_ids(mut self) -> Self {
        self.fold_case = true;
        self
    }

    /// Register one precursor set for `template` applied to `product`.
    pub fn add_reaction(&mut self, template: &str, product: &str, precursors: &[&str]) {
        self.reactions
            .entry((template.to_string(), product.to_string()))
            .or_default()
            .push(precursors.iter().map(|s| s.to_string()).collect());
    }

    /// Make every application of `template` fail.
    pub fn fail_on(&mut self, template: &str) {
        self.failing.insert(template.to_string());
    }
}

#[async_trait]
impl ChemistryEngine for MockChemistry {
    async fn canonicalize(&self, representation: &str) -> Result<Molecule, ChemError> {
        let trimmed = representation.trim();
        if trimmed.is_empty() {
            return Err(ChemError::Parse(representation.to_string()));
        }
        Ok(mol(trimmed))
    }

    async fn apply(
        &self,
        template: &TemplateId,
        molecule: &Molecule,
    ) -> Result<Vec<Vec<Molecule>>, ChemError> {
        if self.failing.contains(template.as_str()) {
            return Err(ChemError::Engine(anyhow::anyhow!(
                "toolkit crashed on {template}"
            )));
        }
        let key = (
            template.as_str().to_string(),
            molecule.id().as_str().to_string(),
        );
        match self.reactions.get(&key) {
            Some(sets) => Ok(sets
                .iter()
                .map(|set| set.iter().map(|s| mol(s)).collect())
                .collect()),
            None if self.generative => Ok(vec![vec![mol(&format!("{molecule}/{template}"))]]),
            None => Ok(Vec::new()),
        }
    }

    fn canonical_id(&self, molecule: &Molecule) -> MoleculeId {
        if self.fold_case {
            MoleculeId::new(molecule.id().as_str().to_uppercase())
        } else {
            molecule.id().clone()
        }
    }
}

// ---------------------------------------------------------------------------
// MockFilter
// ---------------------------------------------------------------------------

/// Filter policy scoring reactions by template.
pub struct MockFilter {
    default_score: f64,
    scores: HashMap<String, f64>,
    failing: HashSet<String>,
}

impl MockFilter {
    /// Every template scores `default_score` unless set otherwise.
    pub fn new(default_score: f64) -> Self {
        Self {
            default_score,
            scores: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn set_score(&mut self, template: &str, score: f64) {
        self.scores.insert(template.to_string(), score);
    }

    pub fn fail_on(&mut self, template: &str) {
        self.failing.insert(template.to_string());
    }
}

#[async_trait]
impl FilterPolicy for MockFilter {
    async fn accept(
        &self,
        template: &TemplateId,
        _product: &Molecule,
        _precursors: &[Molecule],
    ) -> anyhow::Result<f64> {
        if self.failing.contains(template.as_str()) {
            anyhow::bail!("filter model unavailable");
        }
        Ok(self
            .scores
            .get(template.as_str())
            .copied()
            .unwrap_or(self.default_score))
    }
}

// ---------------------------------------------------------------------------
// MockStock
// ---------------------------------------------------------------------------

/// Stock of molecule ids with failure injection.
#[derive(Default)]
pub struct MockStock {
    ids: HashSet<String>,
    failing: HashSet<String>,
}

impl MockStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            failing: HashSet::new(),
        }
    }

    /// Make lookups of `id` fail.
    pub fn fail_on(&mut self, id: &str) {
        self.failing.insert(id.to_string());
    }
}

#[async_trait]
impl Stock for MockStock {
    async fn contains(&self, molecule: &Molecule) -> anyhow::Result<bool> {
        let id = molecule.id().as_str();
        if self.failing.contains(id) {
            anyhow::bail!("stock database unreachable");
        }
        Ok(self.ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_policy_exact_and_default() {
        let mut policy = MockExpansionPolicy::with_default(vec![candidate("fallback", 0.1)]);
        policy.add_response("CCO", vec![candidate("t1", 0.9), candidate("t2", 0.1)]);

        let exact = policy.propose(&mol("CCO"), 10).await.unwrap();
        assert_eq!(exact.len(), 2);
        assert_eq!(exact[0].template.as_str(), "t1");

        let truncated = policy.propose(&mol("CCO"), 1).await.unwrap();
        assert_eq!(truncated.len(), 1);

        let fallback = policy.propose(&mol("N"), 10).await.unwrap();
        assert_eq!(fallback[0].template.as_str(), "fallback");
        assert_eq!(policy.calls(), 3);
    }

    #[tokio::test]
    async fn test_random_policy_is_deterministic() {
        let a = RandomExpansionPolicy::new(7, 4);
        let b = RandomExpansionPolicy::new(7, 4);
        let first = a.propose(&mol("CCO"), 10).await.unwrap();
        assert_eq!(first, b.propose(&mol("CCO"), 10).await.unwrap());
        assert_eq!(first.len(), 4);

        let total: f64 = first.iter().map(|c| c.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(first.windows(2).all(|w| w[0].probability >= w[1].probability));
    }

    #[tokio::test]
    async fn test_mock_chemistry() {
        let mut chem = MockChemistry::new();
        chem.add_reaction("t1", "T", &["A", "B"]);
        chem.fail_on("boom");

        let sets = chem.apply(&TemplateId::new("t1"), &mol("T")).await.unwrap();
        assert_eq!(sets, vec![vec![mol("A"), mol("B")]]);
        assert!(chem.apply(&TemplateId::new("t2"), &mol("T")).await.unwrap().is_empty());
        assert!(chem.apply(&TemplateId::new("boom"), &mol("T")).await.is_err());
        assert!(matches!(chem.canonicalize("  ").await, Err(ChemError::Parse(_))));
    }

    #[tokio::test]
    async fn test_generative_chemistry() {
        let chem = MockChemistry::generative();
        let sets = chem.apply(&TemplateId::new("r0"), &mol("T")).await.unwrap();
        assert_eq!(sets, vec![vec![mol("T/r0")]]);
    }

    #[tokio::test]
    async fn test_mock_filter_and_stock() {
        let mut filter = MockFilter::new(0.5);
        filter.set_score("bad", 0.01);
        assert_eq!(filter.accept(&TemplateId::new("x"), &mol("T"), &[]).await.unwrap(), 0.5);
        assert_eq!(filter.accept(&TemplateId::new("bad"), &mol("T"), &[]).await.unwrap(), 0.01);

        let mut stock = MockStock::with(&["A"]);
        stock.fail_on("Z");
        assert!(stock.contains(&mol("A")).await.unwrap());
        assert!(!stock.contains(&mol("B")).await.unwrap());
        assert!(stock.contains(&mol("Z")).await.is_err());
    }
}
