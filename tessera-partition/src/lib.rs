//! Multidimensional partitioning of Parquet datasets.
//!
//! A [`Partitioning`] strategy groups the rows of one Parquet file by their values on two or
//! more columns, so that rows close to each other in that space end up in the same partition
//! file. Strategies are picked by [`PartitioningScheme`] and bound to their input with
//! [`create_partitioner`].
//!
//! Strategies fall in three families:
//!
//! * space splits over the column domains: [`FixedGridPartitioning`] and
//!   [`GridFilePartitioning`],
//! * data-driven trees and packings: [`KdTreePartitioning`], [`QuadTreePartitioning`] and
//!   [`StrTreePartitioning`],
//! * space-filling curve orders: [`HilbertCurvePartitioning`] and [`ZOrderCurvePartitioning`].
//!
//! Grid file, STR and the ingestion side of the fixed grid stream the file one batch at a time.
//! The trees and curves load every point of the partitioning columns into memory.

pub use domain::*;
pub use point::*;
pub use scheme::*;
pub use strategy::*;
pub use tree::*;

mod domain;
mod point;
mod scheme;
mod strategy;
pub mod tree;
