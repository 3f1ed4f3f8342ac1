//! Density-based clustering of 2-D detections.

use serde::{Deserialize, Serialize};

use crate::prelude::{Float, RadarError, RadarResult};

/// Label of a point that belongs to no cluster.
pub const NOISE: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanConfig {
    /// Neighbours (the point itself included) needed for a core point.
    pub min_points: usize,
    /// Neighbourhood radius.
    pub eps: Float,
    /// Largest point count accepted by [`Dbscan::run`].
    pub max_points: usize,
}

/// DBSCAN with all work buffers sized at construction.
#[derive(Debug, Clone)]
pub struct Dbscan {
    config: DbscanConfig,
    visited: Vec<bool>,
    queued: Vec<bool>,
    seeds: Vec<usize>,
}

impl Dbscan {
    pub fn new(config: DbscanConfig) -> RadarResult<Self> {
        if config.min_points == 0 {
            return Err(RadarError::ArgumentInvalid("min_points is zero".into()));
        }
        if !(config.eps > 0.0) {
            return Err(RadarError::ArgumentOutOfBounds(format!("eps {}", config.eps)));
        }
        if config.max_points < config.min_points {
            return Err(RadarError::ArgumentInvalid(format!(
                "max_points {} below min_points {}",
                config.max_points, config.min_points
            )));
        }
        Ok(Self {
            config,
            visited: vec![false; config.max_points],
            queued: vec![false; config.max_points],
            seeds: Vec::with_capacity(config.max_points),
        })
    }

    pub fn config(&self) -> &DbscanConfig {
        &self.config
    }

    pub fn set_min_points(&mut self, min_points: usize) -> RadarResult<()> {
        if min_points == 0 || min_points > self.config.max_points {
            return Err(RadarError::ArgumentInvalid(format!("min_points {}", min_points)));
        }
        self.config.min_points = min_points;
        Ok(())
    }

    pub fn set_eps(&mut self, eps: Float) -> RadarResult<()> {
        if !(eps > 0.0) {
            return Err(RadarError::ArgumentOutOfBounds(format!("eps {}", eps)));
        }
        self.config.eps = eps;
        Ok(())
    }

    fn is_neighbour(&self, a: [Float; 2], b: [Float; 2]) -> bool {
        (a[0] - b[0]).hypot(a[1] - b[1]) <= self.config.eps
    }

    fn count_neighbours(&self, points: &[[Float; 2]], index: usize) -> usize {
        points
            .iter()
            .filter(|&&p| self.is_neighbour(points[index], p))
            .count()
    }

    /// Labels every point: [`NOISE`] or a cluster id starting at 1.
    /// Returns the number of clusters.
    pub fn run(&mut self, points: &[[Float; 2]], labels: &mut [usize]) -> RadarResult<usize> {
        let n = points.len();
        if n > self.config.max_points {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "{} points exceed the limit of {}",
                n, self.config.max_points
            )));
        }
        if labels.len() != n {
            return Err(RadarError::DimensionMismatch(format!(
                "{} labels for {} points",
                labels.len(),
                n
            )));
        }
        labels.fill(NOISE);
        self.visited[..n].fill(false);

        let mut clusters = 0;
        for i in 0..n {
            if self.visited[i] {
                continue;
            }
            self.visited[i] = true;
            if self.count_neighbours(points, i) < self.config.min_points {
                continue;
            }

            clusters += 1;
            labels[i] = clusters;
            self.queued[..n].fill(false);
            self.seeds.clear();
            self.queued[i] = true;
            self.enqueue_neighbours(points, i);

            let mut cursor = 0;
            while cursor < self.seeds.len() {
                let j = self.seeds[cursor];
                cursor += 1;
                if labels[j] == NOISE {
                    labels[j] = clusters;
                }
                if self.visited[j] {
                    continue;
                }
                self.visited[j] = true;
                if self.count_neighbours(points, j) >= self.config.min_points {
                    self.enqueue_neighbours(points, j);
                }
            }
        }
        Ok(clusters)
    }

    fn enqueue_neighbours(&mut self, points: &[[Float; 2]], index: usize) {
        for j in 0..points.len() {
            if !self.queued[j] && self.is_neighbour(points[index], points[j]) {
                self.queued[j] = true;
                self.seeds.push(j);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dbscan(min_points: usize, eps: Float) -> Dbscan {
        Dbscan::new(DbscanConfig {
            min_points,
            eps,
            max_points: 32,
        })
        .unwrap()
    }

    #[test]
    fn separates_two_groups_and_noise() {
        let points = [
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [10.0, -3.0],
        ];
        let mut labels = [99; 7];
        let clusters = dbscan(3, 0.3).run(&points, &mut labels).unwrap();
        assert_eq!(clusters, 2);
        assert_eq!(&labels[..3], &[1, 1, 1]);
        assert_eq!(&labels[3..6], &[2, 2, 2]);
        assert_eq!(labels[6], NOISE);
    }

    #[test]
    fn chain_of_core_points_forms_one_cluster() {
        let points: Vec<[Float; 2]> = (0..10).map(|i| [i as Float * 0.4, 0.0]).collect();
        let mut labels = vec![0; points.len()];
        assert_eq!(dbscan(2, 0.5).run(&points, &mut labels).unwrap(), 1);
        assert!(labels.iter().all(|&l| l == 1));
    }

    #[test]
    fn border_point_joins_cluster() {
        // the last point has one neighbour but sits within eps of a core point
        let points = [[0.0, 0.0], [0.2, 0.0], [0.0, 0.2], [0.6, 0.0]];
        let mut labels = [0; 4];
        dbscan(3, 0.45).run(&points, &mut labels).unwrap();
        assert_eq!(labels, [1, 1, 1, 1]);
    }

    #[test]
    fn enforces_limits() {
        assert!(Dbscan::new(DbscanConfig {
            min_points: 0,
            eps: 1.0,
            max_points: 4
        })
        .is_err());
        let mut d = dbscan(1, 1.0);
        let points: Vec<[Float; 2]> = vec![[0.0, 0.0]; 33];
        let mut labels = vec![0; 33];
        assert!(d.run(&points, &mut labels).is_err());
        assert!(d.set_eps(0.0).is_err());
        let mut short = [0; 1];
        assert!(d.run(&points[..2], &mut short).is_err());
        let mut none: [usize; 0] = [];
        assert_eq!(d.run(&[], &mut none).unwrap(), 0);
    }
}
