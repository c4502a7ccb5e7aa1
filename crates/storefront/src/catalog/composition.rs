//! Smart composition: one customizable unit per item of a cart line.
//!
//! Reconciliation keeps existing units (and their customization) in place
//! when the quantity changes. Growing appends default units and leaves the
//! existing ones untouched; shrinking drops trailing units and restamps the
//! survivors to `1..=qty`.

use corner_shop_core::{CompositionUnit, Product};

/// Compose `qty` units for `product`, reconciling against `existing`.
///
/// Pure and total. `qty == 0` yields an empty composition; removing the
/// line is the cart's job.
#[must_use]
pub fn compose(
    product: &Product,
    existing: Option<&[CompositionUnit]>,
    qty: u32,
) -> Vec<CompositionUnit> {
    let Some(existing) = existing else {
        return (1..=qty).map(|cod| CompositionUnit::fresh(product, cod)).collect();
    };

    let wanted = usize::try_from(qty).unwrap_or(usize::MAX);
    if wanted < existing.len() {
        return existing
            .iter()
            .take(wanted)
            .zip(1..)
            .map(|(unit, cod)| CompositionUnit {
                cod,
                ..unit.clone()
            })
            .collect();
    }

    let mut units = existing.to_vec();
    let next = u32::try_from(units.len()).map_or(u32::MAX, |len| len.saturating_add(1));
    units.extend((next..=qty).map(|cod| CompositionUnit::fresh(product, cod)));
    units
}
