use std::fs;
use std::path::PathBuf;

use arrow_array::{BooleanArray, RecordBatch};
use arrow_select::filter::filter_record_batch;
use tessera_error::{TesseraResult, tessera_err};
use tessera_io::{DataReader, DataWriter, PartitionFileWriter, Settings, column_to_f64};

use crate::{Bounds, Domain, Leaf, PartitionJob, PartitionSummary, Partitioning, PartitioningScheme};

/// Adaptive grid file: splits the domain in half, one dimension at a time in round-robin
/// order, until every region holds at most `partition_size` rows.
///
/// Each region lives in its own file inside the working folder. Splitting streams the region's
/// file into two children and deletes it, so at most one batch is held in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridFilePartitioning;

/// A region of the domain waiting to be split or kept.
struct Region {
    file: PathBuf,
    rows: usize,
    domain: Domain,
    depth: usize,
    /// 0 for the lower and 1 for the upper half at every level.
    path: Vec<u32>,
}

impl Partitioning for GridFilePartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::GridFile
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let order = job.dimension_order()?;
        let work = job.working_dir(self.scheme())?;
        let writer = job.writer();
        let settings = job.settings().clone();
        let max_depth = settings.max_split_depth();

        let root = work.join(settings.file_name("n", ""));
        writer.copy_file(job.reader().path(), &root)?;
        let mut pending = vec![Region {
            file: root,
            rows: job.num_rows(),
            domain: job.domain()?,
            depth: 0,
            path: Vec::new(),
        }];

        let mut leaves = Vec::new();
        while let Some(region) = pending.pop() {
            if region.rows <= job.partition_size() {
                leaves.push(region.into_leaf());
                continue;
            }
            if region.depth >= max_depth {
                let limit = tessera_err!(RecursionLimitReached: max_depth);
                log::warn!(
                    "{} after {max_depth} splits, keeping {} rows in one partition",
                    limit.kind(),
                    region.rows
                );
                leaves.push(region.into_leaf());
                continue;
            }

            let dimension = order[region.depth % order.len()];
            let column = &job.columns()[dimension];
            let (lower, upper) = region.split(dimension, column, &writer, &settings)?;
            log::debug!(
                "Split {} rows on {column} into {} and {}",
                region.rows,
                lower.as_ref().map_or(0, |r| r.rows),
                upper.as_ref().map_or(0, |r| r.rows)
            );
            fs::remove_file(&region.file)?;
            pending.extend(upper);
            pending.extend(lower);
        }

        work.finish(leaves, job.output(), &settings)
    }
}

impl Region {
    fn into_leaf(self) -> Leaf {
        Leaf {
            path: self.path,
            file: self.file,
            rows: self.rows,
        }
    }

    fn child(&self, half: u32, bounds: Bounds, dimension: usize, rows: usize, file: PathBuf) -> Region {
        let mut path = self.path.clone();
        path.push(half);
        Region {
            file,
            rows,
            domain: self.domain.with_bounds(dimension, bounds),
            depth: self.depth + 1,
            path,
        }
    }

    /// Streams the rows below the midpoint of `dimension` into the lower child and the rest
    /// into the upper one. Row order is kept and empty children are not written.
    fn split(
        &self,
        dimension: usize,
        column: &str,
        writer: &DataWriter,
        settings: &Settings,
    ) -> TesseraResult<(Option<Region>, Option<Region>)> {
        let bounds = self.domain.bounds(dimension);
        let mid = bounds.midpoint();
        let name = |half: u32| {
            let digits: String = self.path.iter().chain([&half]).map(u32::to_string).collect();
            self.file.with_file_name(settings.file_name("n", digits))
        };

        let mut reader = DataReader::try_new(&self.file, settings)?;
        let mut halves: [Option<PartitionFileWriter>; 2] = [None, None];
        while let Some(batch) = reader.next_batch()? {
            let array = batch
                .column_by_name(column)
                .ok_or_else(|| tessera_err!(InvalidColumn: "{column} missing from {}", self.file.display()))?;
            let values = column_to_f64(array.as_ref())?;
            let below = values.iter().map(|v| *v < mid).collect::<Vec<_>>();
            for (half, mask) in [(0u32, below.clone()), (1, below.iter().map(|b| !b).collect())] {
                let rows = filter_record_batch(&batch, &BooleanArray::from(mask))?;
                if rows.num_rows() == 0 {
                    continue;
                }
                write_half(&mut halves[half as usize], &rows, || {
                    writer.open(name(half), batch.schema())
                })?;
            }
        }

        let [lower, upper] = halves;
        let lower = lower
            .map(|w| -> TesseraResult<Region> {
                let file = w.path().to_path_buf();
                let rows = w.finish()?;
                Ok(self.child(0, Bounds::new(bounds.min, mid), dimension, rows, file))
            })
            .transpose()?;
        let upper = upper
            .map(|w| -> TesseraResult<Region> {
                let file = w.path().to_path_buf();
                let rows = w.finish()?;
                Ok(self.child(1, Bounds::new(mid, bounds.max), dimension, rows, file))
            })
            .transpose()?;
        Ok((lower, upper))
    }
}

fn write_half(
    half: &mut Option<PartitionFileWriter>,
    rows: &RecordBatch,
    open: impl FnOnce() -> TesseraResult<PartitionFileWriter>,
) -> TesseraResult<()> {
    if half.is_none() {
        *half = Some(open()?);
    }
    match half {
        Some(writer) => writer.write(rows),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tessera_error::TesseraUnwrap;
    use tessera_io::Settings;

    use crate::strategy::test_harness::{
        Fixture, dates, int_partitions, partition_ids, read, string_sets,
    };
    use crate::{GridFilePartitioning, PartitionSummary};

    #[rstest]
    #[case(8)]
    #[case(3)]
    #[case(1)]
    fn school_regions(#[case] batch_size: usize) {
        let fixture = Fixture::new("school", Settings::default().with_batch_size(batch_size));
        let summary = fixture
            .run(&GridFilePartitioning, &["Age", "Student_id"], 2)
            .tessera_unwrap();
        assert_eq!(summary, PartitionSummary { partitions: 5, rows: 8 });
        assert_eq!(
            int_partitions(&fixture, "Age"),
            vec![vec![21, 18], vec![27], vec![23, 22], vec![30, 37], vec![41]]
        );
        assert_eq!(
            int_partitions(&fixture, "Student_id"),
            vec![vec![45, 21], vec![7], vec![111, 91], vec![16, 34], vec![74]]
        );
        assert_eq!(fixture.output_entries().len(), 5);
        assert!(partition_ids(&read(&fixture.partitions()[0], &fixture.settings)).is_empty());
    }

    #[test]
    fn cities_regions() {
        let fixture = Fixture::new("cities", Settings::default());
        fixture.run(&GridFilePartitioning, &["x", "y"], 2).tessera_unwrap();
        assert_eq!(
            int_partitions(&fixture, "x"),
            vec![vec![27], vec![5, 35], vec![52], vec![85, 90], vec![62, 82]]
        );
    }

    #[test]
    fn depth_limit_forces_leaves() {
        let fixture = Fixture::new("school", Settings::default().with_max_split_depth(1));
        let summary = fixture
            .run(&GridFilePartitioning, &["Age", "Student_id"], 2)
            .tessera_unwrap();
        assert_eq!(summary, PartitionSummary { partitions: 2, rows: 8 });
        assert_eq!(
            int_partitions(&fixture, "Age"),
            vec![vec![21, 18, 27, 23, 22], vec![30, 41, 37]]
        );
    }

    #[test]
    fn identical_rows_stop_at_the_depth_limit() {
        let fixture = Fixture::new("weather", Settings::default().with_max_split_depth(6));
        // Two rows share Month 1, the split never separates them from each other
        let summary = fixture
            .run(&GridFilePartitioning, &["Month", "Month"], 1)
            .tessera_unwrap();
        assert_eq!(summary.rows, 5);
        assert!(summary.partitions < 5);
    }

    #[test]
    fn skewness_changes_the_first_split() {
        let fixture = Fixture::new(
            "school",
            Settings::default().with_skewness_ordering(true),
        );
        fixture
            .run(&GridFilePartitioning, &["Age", "Student_id"], 4)
            .tessera_unwrap();
        // Student_id is the more skewed column and is split first at 59
        assert_eq!(
            int_partitions(&fixture, "Student_id"),
            vec![vec![45, 21, 7], vec![16, 34], vec![74, 111, 91]]
        );
    }

    #[rstest]
    #[case(8)]
    #[case(3)]
    fn dates_split_at_their_midpoint(#[case] batch_size: usize) {
        let fixture = Fixture::new("events", Settings::default().with_batch_size(batch_size));
        let summary = fixture
            .run(&GridFilePartitioning, &["Date", "Visitors"], 4)
            .tessera_unwrap();
        assert_eq!(summary, PartitionSummary { partitions: 2, rows: 8 });
        assert_eq!(
            string_sets(&fixture, "venue"),
            vec![
                vec!["Arena", "Club", "Expo", "Garden"],
                vec!["Bowl", "Dome", "Forum", "Hall"],
            ]
        );
        // Halfway between 2024-01-05 and 2024-12-24
        let midpoint = 19_904;
        let partitions = fixture.partitions();
        let low = dates(&read(&partitions[0], &fixture.settings), "Date");
        let high = dates(&read(&partitions[1], &fixture.settings), "Date");
        assert_eq!(low.len() + high.len(), 8);
        assert!(low.iter().all(|day| *day < midpoint));
        assert!(high.iter().all(|day| *day >= midpoint));
    }
}
