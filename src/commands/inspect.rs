use crate::artifacts::Artifacts;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactReport<'a> {
    tree_count: usize,
    feature_count: usize,
    feature_names: &'a [String],
    product_count: usize,
    location_count: usize,
    locations: &'a [String],
    reference_products: usize,
    reference_locations: usize,
    composite_keys: usize,
}

/// Prints a summary of the loaded artifacts, mainly for checking that a
/// freshly exported model/encoder/reference trio lines up.
pub fn run(artifacts: &Artifacts) -> Result<()> {
    let products = artifacts.encoders.known_products()?;
    let locations = artifacts.encoders.known_locations()?;

    let report = ArtifactReport {
        tree_count: artifacts.booster.num_trees(),
        feature_count: artifacts.booster.num_features(),
        feature_names: artifacts.schema(),
        product_count: products.len(),
        location_count: locations.len(),
        locations,
        reference_products: artifacts.reference.products.len(),
        reference_locations: artifacts.reference.locations.len(),
        composite_keys: artifacts.reference.composites.len(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
