use tessera_error::{TesseraResult, tessera_bail};

use crate::Point;
use crate::tree::leaf_ids;

#[derive(Debug)]
pub enum KdNode {
    Leaf {
        points: Vec<Point>,
    },
    Split {
        dimension: usize,
        /// Coordinate of the first point of the right half.
        value: f64,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
}

/// Median-split KD tree. Leaves hold at most `leaf_size` points.
#[derive(Debug)]
pub struct KdTree {
    root: KdNode,
    num_points: usize,
}

impl KdTree {
    pub fn build(points: Vec<Point>, leaf_size: usize) -> TesseraResult<Self> {
        if leaf_size == 0 {
            tessera_bail!(InvalidPartitionSize: leaf_size);
        }
        let num_points = points.len();
        Ok(Self {
            root: build_node(points, 0, leaf_size),
            num_points,
        })
    }

    pub fn root(&self) -> &KdNode {
        &self.root
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Leaves in depth-first order, left before right.
    pub fn leaves(&self) -> Vec<&[Point]> {
        let mut leaves = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                KdNode::Leaf { points } => leaves.push(points.as_slice()),
                KdNode::Split { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        leaves
    }

    /// Partition id of every point, indexed by the point's row.
    pub fn partition_ids(&self) -> TesseraResult<Vec<u32>> {
        leaf_ids(self.leaves().into_iter(), self.num_points)
    }
}

fn build_node(mut points: Vec<Point>, depth: usize, leaf_size: usize) -> KdNode {
    if points.len() <= leaf_size {
        return KdNode::Leaf { points };
    }
    let dimension = depth % points[0].dimensions();
    points.sort_by(|a, b| a.coord(dimension).total_cmp(&b.coord(dimension)));
    let right = points.split_off(points.len() / 2);
    KdNode::Split {
        dimension,
        value: right[0].coord(dimension),
        left: Box::new(build_node(points, depth + 1, leaf_size)),
        right: Box::new(build_node(right, depth + 1, leaf_size)),
    }
}
