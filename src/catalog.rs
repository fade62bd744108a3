use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::correlation::{Moments, correlation_from_moments, cross_sum};
use crate::error::ReelError;

/// A known symbol: its name and canonical image.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub name: String,
    pub image: RgbImage,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Crops closer than this correlation distance (`1 - r`) are linked.
    pub distance_threshold: f64,
    /// Clusters need strictly more members than this to be kept.
    pub min_cluster_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.2,
            min_cluster_size: 5,
        }
    }
}

/// Groups raw symbol crops into canonical catalog images.
///
/// Crops are linked when their correlation distance is below the threshold;
/// each connected component of that graph is one symbol. The representative
/// is simply the lowest-index member, which is not necessarily the most
/// typical one.
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    config: ClusterConfig,
}

impl CatalogBuilder {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// One canonical image per retained cluster, in discovery order.
    pub fn build(&self, crops: &[RgbImage]) -> Result<Vec<RgbImage>, ReelError> {
        let clusters = self.clusters(crops)?;
        Ok(clusters
            .into_iter()
            .map(|members| crops[members[0]].clone())
            .collect())
    }

    /// Member indices of every retained cluster, each sorted ascending.
    pub fn clusters(&self, crops: &[RgbImage]) -> Result<Vec<Vec<usize>>, ReelError> {
        check_dimensions(crops)?;

        tracing::info!("computing correlation distances for {} crops", crops.len());
        let started = Instant::now();
        let distances = distance_matrix(crops);
        tracing::info!(
            "correlation distances done in {:.2}s",
            started.elapsed().as_secs_f64()
        );

        let started = Instant::now();
        let n = crops.len();
        let threshold = self.config.distance_threshold;
        let neighbors: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| j != i && distances[i * n + j] < threshold)
                    .collect()
            })
            .collect();

        let clusters: Vec<Vec<usize>> = connected_components(&neighbors)
            .into_iter()
            .filter(|c| c.len() > self.config.min_cluster_size)
            .collect();

        tracing::info!(
            "graph analysis done in {:.2}s, {} cluster(s) kept",
            started.elapsed().as_secs_f64(),
            clusters.len()
        );

        Ok(clusters)
    }
}

fn check_dimensions(crops: &[RgbImage]) -> Result<(), ReelError> {
    let Some(first) = crops.first() else {
        return Ok(());
    };
    let expected = first.dimensions();
    for (index, crop) in crops.iter().enumerate().skip(1) {
        if crop.dimensions() != expected {
            return Err(ReelError::DimensionMismatch {
                index,
                expected,
                found: crop.dimensions(),
            });
        }
    }
    Ok(())
}

/// Row-major `n x n` matrix of `1 - pearson`; undefined correlations are `NaN`,
/// which never passes a `<` threshold test.
fn distance_matrix(crops: &[RgbImage]) -> Vec<f64> {
    let n = crops.len();
    let moments: Vec<Moments> = crops.iter().map(|c| Moments::of(c.as_raw())).collect();
    let mut distances = vec![f64::NAN; n * n];

    for i in 0..n {
        for j in i..n {
            let sum_ij = cross_sum(crops[i].as_raw(), crops[j].as_raw());
            let d = correlation_from_moments(&moments[i], &moments[j], sum_ij)
                .map_or(f64::NAN, |r| 1.0 - r);
            distances[i * n + j] = d;
            distances[j * n + i] = d;
        }
    }

    distances
}

/// Components in order of their lowest member; members sorted ascending.
fn connected_components(neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut visited = vec![false; neighbors.len()];
    let mut components = Vec::new();

    for start in 0..neighbors.len() {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for &next in &neighbors[node] {
                if !visited[next] {
                    stack.push(next);
                }
            }
        }

        component.sort_unstable();
        components.push(component);
    }

    components
}
