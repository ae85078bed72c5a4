use tessera_error::{TesseraResult, tessera_bail};

use crate::Point;
use crate::tree::leaf_ids;

/// One of the four children of a quad tree split, in visiting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Quadrant of `(x, y)` around `center`. Points on a center line go to the first matching
    /// quadrant in visiting order.
    pub fn of(x: f64, y: f64, center: (f64, f64)) -> Self {
        let (cx, cy) = center;
        if x <= cx && y >= cy {
            Quadrant::NorthWest
        } else if x >= cx && y >= cy {
            Quadrant::NorthEast
        } else if x <= cx && y <= cy {
            Quadrant::SouthWest
        } else {
            Quadrant::SouthEast
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
pub enum QuadNode {
    Leaf {
        points: Vec<Point>,
    },
    Split {
        /// The two dimensions compared at this node, as `(x, y)`.
        dimensions: (usize, usize),
        center: (f64, f64),
        /// Indexed by [`Quadrant`]. Empty quadrants have no child.
        children: [Option<Box<QuadNode>>; 4],
    },
}

impl QuadNode {
    pub fn child(&self, quadrant: Quadrant) -> Option<&QuadNode> {
        match self {
            QuadNode::Leaf { .. } => None,
            QuadNode::Split { children, .. } => children[quadrant.index()].as_deref(),
        }
    }
}

/// Quad tree splitting two dimensions at a time around the midpoint of their ranges.
///
/// With more than two dimensions, the pair rotates with depth: `(d mod n, (d + 1) mod n)`.
/// A node becomes a leaf once it holds at most `capacity` points or its points cannot be
/// told apart on any dimension.
#[derive(Debug)]
pub struct QuadTree {
    root: QuadNode,
    num_points: usize,
}

impl QuadTree {
    pub fn build(points: Vec<Point>, capacity: usize) -> TesseraResult<Self> {
        if capacity == 0 {
            tessera_bail!(InvalidPartitionSize: capacity);
        }
        let num_points = points.len();
        Ok(Self {
            root: build_node(points, 0, 0, capacity),
            num_points,
        })
    }

    pub fn root(&self) -> &QuadNode {
        &self.root
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Leaves in depth-first order, visiting children NW, NE, SW, SE.
    pub fn leaves(&self) -> Vec<&[Point]> {
        let mut leaves = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                QuadNode::Leaf { points } => leaves.push(points.as_slice()),
                QuadNode::Split { children, .. } => {
                    stack.extend(children.iter().rev().flatten().map(Box::as_ref));
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

fn split_dimensions(depth: usize, dimensions: usize) -> (usize, usize) {
    if dimensions == 2 {
        (0, 1)
    } else {
        (depth % dimensions, (depth + 1) % dimensions)
    }
}

fn all_identical(points: &[Point]) -> bool {
    points
        .split_first()
        .is_none_or(|(first, rest)| rest.iter().all(|p| p.coords() == first.coords()))
}

/// Midpoint of the range of `points` on `dimension`.
fn midpoint(points: &[Point], dimension: usize) -> f64 {
    let (min, max) = points
        .iter()
        .map(|p| p.coord(dimension))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    (min + max) / 2.0
}

/// `stalled` counts the consecutive ancestors whose split kept every point together. Once it
/// covers every dimension pair no further split can separate the points.
fn build_node(points: Vec<Point>, depth: usize, stalled: usize, capacity: usize) -> QuadNode {
    let n = points.first().map_or(2, Point::dimensions);
    if points.len() <= capacity || all_identical(&points) || stalled >= n {
        return QuadNode::Leaf { points };
    }

    let dimensions = split_dimensions(depth, n);
    let center = (
        midpoint(&points, dimensions.0),
        midpoint(&points, dimensions.1),
    );
    let total = points.len();
    let mut groups: [Vec<Point>; 4] = Default::default();
    for point in points {
        let quadrant = Quadrant::of(point.coord(dimensions.0), point.coord(dimensions.1), center);
        groups[quadrant.index()].push(point);
    }

    let stalled = if groups.iter().any(|g| g.len() == total) {
        stalled + 1
    } else {
        0
    };
    let children = groups.map(|group| {
        (!group.is_empty()).then(|| Box::new(build_node(group, depth + 1, stalled, capacity)))
    });
    QuadNode::Split {
        dimensions,
        center,
        children,
    }
}
