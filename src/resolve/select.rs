//! Payload selectors built on [`resolve`].

#![allow(missing_docs)]

use serde_json::Value;

use crate::resolve::engine::{Resolution, resolve};
use crate::state::store::ChipSource;
use crate::tree::model::{Atom, BucketedEntry, Conditional, FeatureId, GeometryAlternative, TileLayer};

/// Branch of a conditional atom selected by current state.
#[must_use]
pub fn conditional_branch<'a>(conditional: &'a Conditional, state: &impl ChipSource) -> Option<&'a Atom> {
    let found = resolve(conditional.conditions(), state).index()?;
    conditional.branches.get(found).map(|(_, atom)| atom)
}

/// Active bucketed entry, the first whose condition holds.
#[must_use]
pub fn active_bucketed<'a>(entries: &'a [BucketedEntry], state: &impl ChipSource) -> Option<&'a BucketedEntry> {
    let found = resolve(entries.iter().map(|e| &e.condition), state).index()?;
    entries.get(found)
}

/// Count shown by a histogram bar or swatch referencing bucket `index`.
///
/// Without any bucketed payload the wire value stands. With one, the active
/// bucket's count is used and any miss reads as 0.
#[must_use]
pub fn bucket_count(
    entries: &[BucketedEntry],
    index: i64,
    wire_value: i64,
    state: &impl ChipSource,
) -> u64 {
    if entries.is_empty() {
        return u64::try_from(wire_value).unwrap_or(0);
    }
    let Ok(index) = usize::try_from(index) else {
        return 0;
    };
    active_bucketed(entries, state)
        .and_then(|entry| entry.buckets.get(index))
        .map_or(0, crate::tree::model::Bucket::resolved_count)
}

/// Every `(feature, bucket index)` pair of the active bucketed entry.
#[must_use]
pub fn bucket_assignments(entries: &[BucketedEntry], state: &impl ChipSource) -> Vec<(FeatureId, usize)> {
    active_bucketed(entries, state)
        .map(|entry| {
            entry
                .buckets
                .iter()
                .enumerate()
                .flat_map(|(bucket, b)| b.ids.iter().map(move |id| (id.clone(), bucket)))
                .collect()
        })
        .unwrap_or_default()
}

/// Active geometry alternative as `(side table index, collection)`. An index
/// past the end of the side table counts as no geometry.
#[must_use]
pub fn active_geometry<'a>(
    alternatives: &[GeometryAlternative],
    geojson: &'a [Value],
    state: &impl ChipSource,
) -> Option<(usize, &'a Value)> {
    match resolve(alternatives.iter().map(|g| &g.condition), state) {
        Resolution::Found(i) => {
            let index = alternatives.get(i)?.index;
            geojson.get(index).map(|collection| (index, collection))
        }
        Resolution::NotFound => None,
    }
}

/// Tile layers whose condition currently holds, in payload order.
#[must_use]
pub fn active_layers<'a>(layers: &'a [TileLayer], state: &impl ChipSource) -> Vec<&'a TileLayer> {
    layers.iter().filter(|l| l.condition.is_satisfied(state)).collect()
}
