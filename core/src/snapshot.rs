//! Capacity snapshots for the waterfall cascade.
//!
//! A stage reads one immutable `CapacitySnapshot` and produces a
//! `StageDelta`; the next stage starts from `snapshot.apply(&delta)`.
//! Nothing mutates the loads a stage was planned against, so each
//! stage's decisions can be replayed and audited in isolation.

use crate::{
    strategy::{Placement, RunContext, Stage},
    thresholds::{Dimension, DimensionVector},
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CapacitySnapshot {
    loads: Vec<DimensionVector>,
    /// Rep per family position, once placed.
    placed: Vec<Option<usize>>,
}

impl CapacitySnapshot {
    pub fn empty(rep_count: usize, family_count: usize) -> Self {
        Self {
            loads: vec![DimensionVector::default(); rep_count],
            placed: vec![None; family_count],
        }
    }

    pub fn load(&self, rep: usize) -> &DimensionVector {
        &self.loads[rep]
    }

    pub fn rep_of(&self, family: usize) -> Option<usize> {
        self.placed[family]
    }

    pub fn is_placed(&self, family: usize) -> bool {
        self.placed[family].is_some()
    }

    /// Remaining room of `rep` on `dim`; never negative.
    pub fn headroom(&self, ctx: &RunContext<'_>, rep: usize, dim: Dimension) -> f64 {
        (ctx.capacity(rep, dim) - self.loads[rep][dim]).max(0.0)
    }

    /// The next snapshot: this one plus every placement in `delta`.
    pub fn apply(&self, delta: &StageDelta) -> Self {
        let mut next = self.clone();
        for (&rep, added) in &delta.added {
            next.loads[rep] += added;
        }
        for p in &delta.placements {
            next.placed[p.family] = Some(p.rep);
        }
        next
    }
}

/// What one stage decided.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDelta {
    pub stage: Stage,
    pub placements: Vec<Placement>,
    added: BTreeMap<usize, DimensionVector>,
}

impl StageDelta {
    pub fn new(stage: Stage) -> Self {
        Self { stage, placements: Vec::new(), added: BTreeMap::new() }
    }

    pub fn push(&mut self, placement: Placement, values: &DimensionVector) {
        *self.added.entry(placement.rep).or_default() += values;
        self.placements.push(placement);
    }

    /// Load of `rep` if this delta were applied on top of `base`.
    pub fn load_over(&self, base: &CapacitySnapshot, rep: usize) -> DimensionVector {
        let mut load = *base.load(rep);
        if let Some(added) = self.added.get(&rep) {
            load += added;
        }
        load
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}
