//! Static k-d tree over 2-D points.
//!
//! The tree is built once from an ordered point sequence and never mutated.
//! Every stored point keeps its position in that sequence, so query results
//! map straight back to whatever the caller built the sequence from.

use std::cmp::Ordering;

pub type Point2D = [f64; 2];

/// Points per leaf before a node is split further.
pub const LEAF_SIZE: usize = 100;

/// Subtrees at least this large build their halves on separate rayon workers.
const PARALLEL_THRESHOLD: usize = 8192;

/// Result of a nearest-neighbor query: build position and squared distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub dist_sq: f64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    point: Point2D,
    position: usize,
}

#[derive(Debug)]
enum Node {
    /// Range `[start, end)` into `SpatialIndex::entries`.
    Leaf { start: usize, end: usize },
    Split {
        axis: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug)]
pub struct SpatialIndex {
    root: Option<Node>,
    entries: Vec<Entry>,
}

impl SpatialIndex {
    /// Build an index with the default leaf size.
    ///
    /// An empty input yields an index whose queries all return `None`.
    pub fn build(points: &[Point2D]) -> Self {
        Self::with_leaf_size(points, LEAF_SIZE)
    }

    pub fn with_leaf_size(points: &[Point2D], leaf_size: usize) -> Self {
        let leaf_size = leaf_size.max(1);
        let mut entries: Vec<Entry> = points
            .iter()
            .enumerate()
            .map(|(position, point)| Entry {
                point: *point,
                position,
            })
            .collect();
        let root = if entries.is_empty() {
            None
        } else {
            Some(build_node(&mut entries, 0, leaf_size))
        };
        SpatialIndex { root, entries }
    }

    /// Position of the point closest to `query` under Euclidean distance.
    ///
    /// Equidistant candidates resolve to the one visited first; the visiting
    /// order depends only on the build input, so results are repeatable.
    pub fn nearest(&self, query: &Point2D) -> Option<Neighbor> {
        let root = self.root.as_ref()?;
        let mut best = Neighbor {
            position: usize::MAX,
            dist_sq: f64::INFINITY,
        };
        self.nearest_recursive(root, query, &mut best);
        if best.position == usize::MAX {
            // only reachable when every distance is NaN
            return None;
        }
        Some(best)
    }

    fn nearest_recursive(&self, node: &Node, query: &Point2D, best: &mut Neighbor) {
        match node {
            Node::Leaf { start, end } => {
                for entry in &self.entries[*start..*end] {
                    let dist_sq = squared_distance(query, &entry.point);
                    if dist_sq < best.dist_sq {
                        best.dist_sq = dist_sq;
                        best.position = entry.position;
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[*axis] - value;
                let (near, far) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.nearest_recursive(near, query, best);
                if diff * diff < best.dist_sq {
                    self.nearest_recursive(far, query, best);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth of the deepest leaf, counting the root as 1.
    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        self.root.as_ref().map_or(0, depth_of)
    }
}

/// Partition `entries` in place and return the subtree covering it.
/// `offset` is the slice's start inside the full entry array.
fn build_node(entries: &mut [Entry], offset: usize, leaf_size: usize) -> Node {
    let count = entries.len();
    if count <= leaf_size {
        return Node::Leaf {
            start: offset,
            end: offset + count,
        };
    }

    let axis = widest_axis(entries);
    let mid = count / 2;
    entries.select_nth_unstable_by(mid, |a, b| compare_on(axis, a, b));
    let value = entries[mid].point[axis];

    let (lower, upper) = entries.split_at_mut(mid);
    let (left, right) = if count >= PARALLEL_THRESHOLD {
        rayon::join(
            || build_node(lower, offset, leaf_size),
            || build_node(upper, offset + mid, leaf_size),
        )
    } else {
        (
            build_node(lower, offset, leaf_size),
            build_node(upper, offset + mid, leaf_size),
        )
    };

    Node::Split {
        axis,
        value,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Axis with the greatest coordinate spread; ties pick axis 0.
fn widest_axis(entries: &[Entry]) -> usize {
    let mut lo = [f64::INFINITY; 2];
    let mut hi = [f64::NEG_INFINITY; 2];
    for entry in entries {
        for axis in 0..2 {
            lo[axis] = lo[axis].min(entry.point[axis]);
            hi[axis] = hi[axis].max(entry.point[axis]);
        }
    }
    if hi[1] - lo[1] > hi[0] - lo[0] {
        1
    } else {
        0
    }
}

// Total order: coordinate first, build position second. Keeps median
// selection deterministic when many points share a coordinate.
fn compare_on(axis: usize, a: &Entry, b: &Entry) -> Ordering {
    a.point[axis]
        .total_cmp(&b.point[axis])
        .then(a.position.cmp(&b.position))
}

#[inline]
pub fn squared_distance(a: &Point2D, b: &Point2D) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}
