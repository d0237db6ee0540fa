//! Coverage aggregation and heatmap layers.
//!
//! [`Coverage`] turns `mitigates` relationships into per-taxonomy-item
//! scores for any subset of the catalog. A family whose every entry maps to
//! an item is reported as one family marker instead of its entries. The
//! [`layer`] functions apply it at catalog, family, entry and property scope.

mod aggregate;
pub mod layer;

pub use aggregate::{Coverage, CoverageEntry, Families, Heatmap, HeatmapItem};
pub use layer::{
    create_layer, layer_directory, overview_layers, property_layers, Layer, LayerFile,
    LayerSettings,
};
