use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Errors reported by a chemistry engine.
#[derive(Debug, thiserror::Error)]
pub enum ChemError {
    /// The molecule representation could not be parsed.
    #[error("Cannot parse molecule: {0}")]
    Parse(String),

    /// The engine has no template with this id.
    #[error("Unknown reaction template: {0}")]
    UnknownTemplate(String),

    /// The engine backend failed (crashed toolkit, lost connection, ...).
    #[error("Chemistry engine failure: {0}")]
    Engine(#[source] anyhow::Error),
}

/// Stable canonical identifier of a molecule (e.g. a canonical SMILES or InChIKey).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoleculeId(Arc<str>);

impl MoleculeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque name of a reaction template known to the chemistry engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(Arc<str>);

impl TemplateId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable chemical entity.
///
/// Two molecules with the same canonical id are interchangeable: `Eq` and
/// `Hash` look at the id only, never at the display representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Molecule {
    id: MoleculeId,
    smiles: Arc<str>,
}

impl Molecule {
    /// Build a molecule from a display representation and its canonical id.
    pub fn new(smiles: impl AsRef<str>, id: impl AsRef<str>) -> Self {
        Self {
            id: MoleculeId::new(id),
            smiles: Arc::from(smiles.as_ref()),
        }
    }

    /// Build a molecule whose representation already is canonical.
    pub fn from_canonical(smiles: impl AsRef<str>) -> Self {
        let smiles: Arc<str> = Arc::from(smiles.as_ref());
        Self {
            id: MoleculeId(Arc::clone(&smiles)),
            smiles,
        }
    }

    pub fn id(&self) -> &MoleculeId {
        &self.id
    }

    pub fn smiles(&self) -> &str {
        &self.smiles
    }
}

impl PartialEq for Molecule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Molecule {}

impl Hash for Molecule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.smiles)
    }
}

/// Drop empty precursor sets and sets that repeat an earlier one.
///
/// Two sets are duplicates when they hold the same multiset of ids under
/// `id_of`, regardless of order. The first occurrence wins, so the result
/// keeps the engine's ordering.
pub fn dedup_precursor_sets<F>(sets: Vec<Vec<Molecule>>, id_of: F) -> Vec<Vec<Molecule>>
where
    F: Fn(&Molecule) -> MoleculeId,
{
    let mut seen: HashSet<Vec<MoleculeId>> = HashSet::new();
    sets.into_iter()
        .filter(|set| !set.is_empty())
        .filter(|set| {
            let mut key: Vec<MoleculeId> = set.iter().map(&id_of).collect();
            key.sort();
            seen.insert(key)
        })
        .collect()
}
