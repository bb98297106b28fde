//! In-memory stock of purchasable molecules.

use std::collections::HashMap;

use async_trait::async_trait;

use chem::{Molecule, MoleculeId};

use crate::engine::{Stock, StockMetadata};

/// A stock held entirely in memory, keyed by canonical id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStock {
    entries: HashMap<MoleculeId, StockMetadata>,
}

impl InMemoryStock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a molecule id without price or count information.
    pub fn insert(&mut self, id: impl AsRef<str>) {
        self.entries
            .insert(MoleculeId::new(id), StockMetadata::default());
    }

    pub fn insert_with_metadata(&mut self, id: impl AsRef<str>, metadata: StockMetadata) {
        self.entries.insert(MoleculeId::new(id), metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for InMemoryStock {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut stock = Self::new();
        for id in iter {
            stock.insert(id);
        }
        stock
    }
}

#[async_trait]
impl Stock for InMemoryStock {
    async fn contains(&self, molecule: &Molecule) -> anyhow::Result<bool> {
        Ok(self.entries.contains_key(molecule.id()))
    }

    async fn metadata(&self, molecule: &Molecule) -> anyhow::Result<Option<StockMetadata>> {
        Ok(self.entries.get(molecule.id()).copied())
    }
}
