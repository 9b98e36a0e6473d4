//! Per-attribute observation clusters and their statistics.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::insights::{mean, percent, AsinShare};
use crate::{data::Review, nlp::attributes::Attribute};

/// One attribute value reported by one review.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub review_id: String,
    pub asin: String,
    pub rating: Option<u8>,
    pub attribute: Attribute,
    pub value: String,
}

/// Flatten the extracted attributes of every review, in review then attribute order.
pub fn observations(reviews: &[Review]) -> Vec<Observation> {
    reviews
        .iter()
        .flat_map(|review| {
            review.attributes.iter().flatten().map(|(attribute, value)| Observation {
                review_id: review.id.clone(),
                asin: review.asin.clone(),
                rating: review.rating,
                attribute: *attribute,
                value: value.clone(),
            })
        })
        .collect()
}

/// Cluster count for one attribute: capped by the number of distinct values.
pub fn attribute_k<'a, I>(values: I, max_clusters: usize) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = values.into_iter().collect();
    distinct.len().min(max_clusters)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeCluster {
    pub attribute: Attribute,
    pub cluster: usize,
    pub label: Option<String>,
    pub observation_count: usize,
    /// Share of the attribute's clustered observations, 0-100.
    pub percentage_of_attribute: f64,
    /// Observations relative to every analysed review, 0-100.
    pub percentage_of_reviews: f64,
    pub rating_avg: Option<f64>,
    pub review_ids: Vec<String>,
    /// Distinct observed values, in first-seen order.
    pub values: Vec<String>,
    pub by_asin: BTreeMap<String, AsinShare>,
}

/// Statistics for every `(attribute, cluster)` pair, ordered by attribute then cluster.
///
/// `assignments` is aligned with `observations`; unassigned observations are
/// ignored. `total_reviews` is the denominator of `percentage_of_reviews`.
pub fn quantify_attributes(
    observations: &[Observation],
    assignments: &[Option<usize>],
    labels: &BTreeMap<(Attribute, usize), String>,
    total_reviews: usize,
) -> Vec<AttributeCluster> {
    let mut grouped: BTreeMap<(Attribute, usize), Vec<&Observation>> = BTreeMap::new();
    let mut per_attribute: BTreeMap<Attribute, usize> = BTreeMap::new();
    let mut per_attribute_asin: BTreeMap<(Attribute, &str), usize> = BTreeMap::new();
    for (obs, cluster) in observations.iter().zip(assignments) {
        let Some(cluster) = cluster else { continue };
        grouped.entry((obs.attribute, *cluster)).or_default().push(obs);
        *per_attribute.entry(obs.attribute).or_default() += 1;
        *per_attribute_asin
            .entry((obs.attribute, obs.asin.as_str()))
            .or_default() += 1;
    }

    grouped
        .into_iter()
        .map(|((attribute, cluster), members)| {
            let ratings: Vec<u8> = members.iter().filter_map(|o| o.rating).collect();
            let values: IndexSet<&str> = members.iter().map(|o| o.value.as_str()).collect();
            let review_ids: IndexSet<&str> = members.iter().map(|o| o.review_id.as_str()).collect();

            let mut asin_members: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
            for obs in members.iter().copied() {
                asin_members.entry(obs.asin.as_str()).or_default().push(obs);
            }
            let by_asin = asin_members
                .into_iter()
                .map(|(asin, rows)| {
                    let ratings: Vec<u8> = rows.iter().filter_map(|o| o.rating).collect();
                    let total = per_attribute_asin
                        .get(&(attribute, asin))
                        .copied()
                        .unwrap_or_default();
                    let share = AsinShare {
                        observation_count: rows.len(),
                        percentage: percent(rows.len(), total),
                        rating_avg: mean(&ratings),
                    };
                    (asin.to_string(), share)
                })
                .collect();

            AttributeCluster {
                attribute,
                cluster,
                label: labels.get(&(attribute, cluster)).cloned(),
                observation_count: members.len(),
                percentage_of_attribute: percent(
                    members.len(),
                    per_attribute.get(&attribute).copied().unwrap_or_default(),
                ),
                percentage_of_reviews: percent(members.len(), total_reviews),
                rating_avg: mean(&ratings),
                review_ids: review_ids.into_iter().map(str::to_string).collect(),
                values: values.into_iter().map(str::to_string).collect(),
                by_asin,
            }
        })
        .collect()
}
