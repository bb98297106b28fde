//! Chemistry primitives consumed by the route search.
//!
//! The search never looks inside a molecule. It relies on three things from
//! this crate:
//!
//! - [`Molecule`] / [`MoleculeId`]: canonically identified, immutable values
//!   whose equality is decided by the canonical id alone
//! - [`TemplateId`]: the opaque name of a reaction template
//! - [`ChemistryEngine`]: the narrow contract for canonicalization and
//!   template application, implemented by an external toolkit
//!
//! Canonicalization results can be memoized through an explicit
//! [`CanonicalCache`] handed to a [`CachingEngine`]. There is no global cache,
//! so concurrent searches with separate caches never interfere.
//!
//! ```rust
//! use chem::{Molecule, TemplateId};
//!
//! let a = Molecule::new("OCC", "CCO");
//! let b = Molecule::from_canonical("CCO");
//! assert_eq!(a, b);
//! assert_eq!(TemplateId::new("amide_coupling").as_str(), "amide_coupling");
//! ```

pub mod cache;
pub mod engine;
pub mod types;

pub use cache::{CachingEngine, CanonicalCache};
pub use engine::ChemistryEngine;
pub use types::{dedup_precursor_sets, ChemError, Molecule, MoleculeId, TemplateId};
