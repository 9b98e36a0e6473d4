//! Grouping embedded reviews and summarising the groups.

pub mod agglomerative;
pub mod attributes;
pub mod insights;

pub use agglomerative::{agglomerative, cluster_rows, Linkage};
pub use attributes::{quantify_attributes, AttributeCluster, Observation};
pub use insights::{quantify, InsightReport};
