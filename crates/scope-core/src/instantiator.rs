//! Sampleable role instantiation
//!
//! Roles whose category is sampleable are not tied to a room. Each one first
//! takes a random unused scene object of any concrete category under its
//! taxonomy node; when none is left a new object is imported.

use crate::catalog::{ImportRequest, SceneCatalog};
use crate::config::InstantiationPolicy;
use crate::error::{CatalogError, SamplingResult};
use crate::journal::{JournalRecord, Phase, SamplingJournal};
use crate::scope::ObjectScope;
use crate::task::TaskDefinition;
use crate::types::{Category, ObjectId, RoleId};
use indexmap::{IndexMap, IndexSet};
use nalgebra::Vector3;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

/// How a sampleable role got its object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Existing scene object
    Reused,
    /// Newly imported object
    Imported,
}

/// Binds sampleable roles
#[derive(Debug, Clone, Copy)]
pub struct SampleableInstantiator<'a> {
    policy: &'a InstantiationPolicy,
}

impl<'a> SampleableInstantiator<'a> {
    /// Instantiator following `policy`
    #[must_use]
    pub fn new(policy: &'a InstantiationPolicy) -> Self {
        Self { policy }
    }

    /// Bind every sampleable role of `task` in `scope`
    ///
    /// # Errors
    /// Catalog errors: no concrete category or model to import
    pub fn instantiate<B, R>(
        &self,
        task: &TaskDefinition,
        backend: &mut B,
        scope: &mut ObjectScope,
        rng: &mut R,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<IndexMap<RoleId, (ObjectId, Provenance)>>
    where
        B: SceneCatalog + ?Sized,
        R: Rng + ?Sized,
    {
        let mut bound = IndexMap::new();
        let mut used: IndexSet<ObjectId> = IndexSet::new();
        let mut imported = 0usize;

        for (category, roles) in task.sampleable_objects() {
            let concrete = backend.subtree_categories(category);
            let mut existing: Vec<ObjectId> = concrete
                .iter()
                .flat_map(|c| backend.objects_by_category(c))
                .collect();

            for role in roles {
                existing.retain(|o| !used.contains(o));
                let (object, provenance) = if existing.is_empty() {
                    let object = self.import(category, &concrete, imported, backend, rng)?;
                    imported += 1;
                    (object, Provenance::Imported)
                } else {
                    let idx = rng.gen_range(0..existing.len());
                    (existing.swap_remove(idx), Provenance::Reused)
                };
                used.insert(object);
                scope.bind(role, object);
                debug!(%role, %object, ?provenance, "sampleable role bound");
                journal.record(
                    JournalRecord::new(Phase::Instantiation, true)
                        .role(role)
                        .object(object)
                        .detail(match provenance {
                            Provenance::Reused => "reused",
                            Provenance::Imported => "imported",
                        }),
                );
                bound.insert(role.clone(), (object, provenance));
            }
        }
        if imported > 0 {
            info!(imported, "imported new objects for sampleable roles");
        }
        Ok(bound)
    }

    fn import<B, R>(
        &self,
        category: &Category,
        concrete: &[Category],
        index: usize,
        backend: &mut B,
        rng: &mut R,
    ) -> SamplingResult<ObjectId>
    where
        B: SceneCatalog + ?Sized,
        R: Rng + ?Sized,
    {
        let chosen = self
            .policy
            .preferred_categories
            .iter()
            .find(|p| concrete.contains(p))
            .or_else(|| concrete.choose(rng))
            .cloned()
            .ok_or_else(|| CatalogError::NoModel(category.clone()))?;

        let model = match self.policy.pinned_models.get(&chosen) {
            Some(model) => model.clone(),
            None => backend
                .available_models(&chosen)
                .choose(rng)
                .cloned()
                .ok_or_else(|| CatalogError::NoModel(chosen.clone()))?,
        };

        let count = backend.objects_by_category(&chosen).len();
        let request = ImportRequest {
            name: format!("{chosen}_{count}"),
            category: chosen,
            model,
            position: self.policy.spawn_origin + Vector3::new(index as f64, 0.0, 0.0),
        };
        debug!(name = %request.name, model = %request.model, "importing object");
        Ok(backend.import_object(request)?)
    }
}
