//! The chemistry engine contract.

use async_trait::async_trait;

use crate::types::{ChemError, Molecule, MoleculeId, TemplateId};

/// External chemistry toolkit: canonicalization and template application.
///
/// Implementations may block on a remote service; every method is a
/// suspension point for the search.
#[async_trait]
pub trait ChemistryEngine: Send + Sync {
    /// Parse and canonicalize a molecule representation.
    async fn canonicalize(&self, representation: &str) -> Result<Molecule, ChemError>;

    /// Apply a reaction template to `molecule` (in the retro direction).
    ///
    /// Returns every precursor set the template produces. An empty list means
    /// the template does not match; that is an expected outcome, not an error.
    async fn apply(
        &self,
        template: &TemplateId,
        molecule: &Molecule,
    ) -> Result<Vec<Vec<Molecule>>, ChemError>;

    /// Stable identifier used for equality and deduplication.
    fn canonical_id(&self, molecule: &Molecule) -> MoleculeId {
        molecule.id().clone()
    }
}
