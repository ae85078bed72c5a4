use std::fs;
use std::path::PathBuf;

use tessera_error::{TesseraResult, tessera_err};
use tessera_io::DataReader;
use tessera_sort::{RUN_PREFIX, merge_files, write_sorted};

use crate::{Leaf, PartitionJob, PartitionSummary, Partitioning, PartitioningScheme};

/// Sort-Tile-Recursive packing with an external sort at every level.
///
/// With `P = ceil(rows / partition_size)` and `S = ceil(sqrt(P))`, every level sorts a slice on
/// the next column (round robin) and cuts it into `S` slices, until slices hold at most
/// `partition_size` rows. Sorting goes through disk one batch at a time, so memory stays
/// bounded by the batch size. Partition files keep the order of their last sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrTreePartitioning;

/// A slice of the dataset still to be sorted and tiled.
struct Slice {
    file: PathBuf,
    rows: usize,
    level: usize,
    path: Vec<u32>,
}

/// Number of slices every level is cut into.
pub fn slices_per_level(rows: usize, partition_size: usize) -> usize {
    let partitions = rows.div_ceil(partition_size.max(1));
    let mut slices = partitions.isqrt();
    if slices * slices < partitions {
        slices += 1;
    }
    slices.max(1)
}

impl Partitioning for StrTreePartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::StrTree
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let order = job.dimension_order()?;
        let slices = slices_per_level(job.num_rows(), job.partition_size());
        let work = job.working_dir(self.scheme())?;
        let writer = job.writer();
        let settings = job.settings().clone();
        log::debug!("STR packing into {slices} slices per level");

        let source = work.join(settings.file_name("source", ""));
        writer.copy_file(job.reader().path(), &source)?;
        let mut pending = vec![Slice {
            file: source,
            rows: job.num_rows(),
            level: 0,
            path: Vec::new(),
        }];

        let mut leaves = Vec::new();
        while let Some(slice) = pending.pop() {
            if slice.rows <= job.partition_size() {
                leaves.push(Leaf {
                    path: slice.path,
                    file: slice.file,
                    rows: slice.rows,
                });
                continue;
            }

            let column = &job.columns()[order[slice.level % order.len()]];
            let folder = work.join(slice_folder(&slice.path));
            fs::create_dir_all(&folder)?;

            let mut reader = DataReader::try_new(&slice.file, &settings)?;
            let mut run = 0;
            while let Some(batch) = reader.next_batch()? {
                write_sorted(
                    &batch,
                    column,
                    folder.join(settings.file_name(RUN_PREFIX, run)),
                    &writer,
                )?;
                run += 1;
            }
            drop(reader);
            fs::remove_file(&slice.file)?;

            let target = slice.rows.div_ceil(slices);
            let outputs = merge_files(&folder, column, target, &settings)?;
            log::debug!(
                "Level {} sorted {} rows on {column} in {run} runs into {} slices",
                slice.level,
                slice.rows,
                outputs.len()
            );
            for (index, file) in outputs.into_iter().enumerate().rev() {
                let mut path = slice.path.clone();
                path.push(
                    u32::try_from(index).map_err(|_| tessera_err!("too many slices: {index}"))?,
                );
                pending.push(Slice {
                    rows: target.min(slice.rows - index * target),
                    file,
                    level: slice.level + 1,
                    path,
                });
            }
        }

        work.finish(leaves, job.output(), &settings)
    }
}

fn slice_folder(path: &[u32]) -> String {
    let digits = path.iter().map(u32::to_string).collect::<Vec<_>>();
    format!("t{}", digits.join("_"))
}
