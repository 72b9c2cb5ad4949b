//! R-tree over projected trace points.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use rawnav_model::TracePoint;

use crate::projection::LocalTangentPlane;

/// A projected trace point with its position in the input slice.
#[derive(Debug, Clone, Copy)]
pub struct IndexedTracePoint {
    pub idx: usize,
    pub xy: [f64; 2],
}

impl RTreeObject for IndexedTracePoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xy)
    }
}

impl PointDistance for IndexedTracePoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.xy[0] - point[0];
        let dy = self.xy[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Nearest-neighbour index over one trip's trace.
pub struct TraceIndex {
    tree: RTree<IndexedTracePoint>,
}

impl TraceIndex {
    /// Points whose projected position is not finite are left out.
    pub fn new(points: &[TracePoint], plane: &LocalTangentPlane) -> Self {
        let indexed: Vec<IndexedTracePoint> = points
            .iter()
            .enumerate()
            .map(|(idx, point)| IndexedTracePoint {
                idx,
                xy: plane.project(point.lat, point.long),
            })
            .filter(|point| point.xy.iter().all(|value| value.is_finite()))
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns (slice index, distance in metres) of the nearest trace point.
    ///
    /// When several points sit at exactly the minimal distance, the one with
    /// the lowest slice index wins.
    pub fn nearest(&self, query: [f64; 2]) -> Option<(usize, f64)> {
        if !query.iter().all(|value| value.is_finite()) {
            return None;
        }
        let mut candidates = self.tree.nearest_neighbor_iter(&query);
        let first = candidates.next()?;
        let best_distance_2 = first.distance_2(&query);
        let best_idx = candidates
            .take_while(|point| point.distance_2(&query) <= best_distance_2)
            .map(|point| point.idx)
            .fold(first.idx, usize::min);
        Some((best_idx, best_distance_2.sqrt()))
    }
}
