mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tessera::error::TesseraResult;
use tessera::io::{DataReader, Settings};
use tessera::{PartitionSummary, PartitioningScheme, create_partitioner};

use crate::logging::{default_env_filter, setup_logger};

/// Datasets laid out as `<dataset_path>/<name>/no-partition/<name>.parquet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dataset {
    Osm,
    Taxi,
    #[value(name = "tpch-sf1")]
    TpchSf1,
    #[value(name = "tpch-sf10")]
    TpchSf10,
    School,
    Cities,
    Weather,
    Events,
}

impl Dataset {
    fn name(&self) -> &'static str {
        match self {
            Dataset::Osm => "osm",
            Dataset::Taxi => "taxi",
            Dataset::TpchSf1 => "tpch-sf1",
            Dataset::TpchSf10 => "tpch-sf10",
            Dataset::School => "school",
            Dataset::Cities => "cities",
            Dataset::Weather => "weather",
            Dataset::Events => "events",
        }
    }
}

/// Partition a Parquet dataset on two or more of its columns.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Folder holding one sub-folder per dataset.
    dataset_path: PathBuf,
    #[arg(value_enum)]
    dataset_name: Dataset,
    /// One of no-partition, fixed-grid, grid-file, kd-tree, str-tree, quad-tree,
    /// hilbert-curve, z-order-curve.
    scheme_name: String,
    /// Rows per partition.
    partition_size: usize,
    /// Comma separated partitioning columns.
    #[arg(value_delimiter = ',', required = true)]
    columns: Vec<String>,
    /// Rows per batch when streaming the input.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Do not add a partition_id column to written partitions.
    #[arg(long)]
    no_partition_id: bool,
    /// Split on the most skewed columns first.
    #[arg(long)]
    order_by_skewness: bool,
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> Settings {
        let settings = Settings::default()
            .with_partition_id(!self.no_partition_id)
            .with_skewness_ordering(self.order_by_skewness);
        match self.batch_size {
            Some(batch_size) => settings.with_batch_size(batch_size),
            None => settings,
        }
    }

    fn input(&self, settings: &Settings) -> PathBuf {
        let name = self.dataset_name.name();
        self.dataset_path
            .join(name)
            .join(PartitioningScheme::NoPartition.name())
            .join(settings.file_name(name, ""))
    }

    fn output(&self) -> PathBuf {
        self.dataset_path
            .join(self.dataset_name.name())
            .join(&self.scheme_name)
            .join(self.partition_size.to_string())
    }
}

fn run(args: &Args) -> TesseraResult<PartitionSummary> {
    let settings = args.settings();
    let reader = DataReader::try_new(args.input(&settings), &settings)?;
    let mut partitioner = create_partitioner(
        &args.scheme_name,
        reader,
        &args.columns,
        args.partition_size,
        args.output(),
    )?;
    partitioner.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logger(default_env_filter(args.verbose));

    match run(&args) {
        Ok(summary) => {
            log::info!(
                "Wrote {} rows into {} partitions under {}",
                summary.rows,
                summary.partitions,
                args.output().display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}: {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;
    use rstest::rstest;
    use tempfile::tempdir;
    use tessera::error::{TesseraExpect, TesseraUnwrap};
    use tessera::io::fixtures::TableGenerator;

    use crate::{Args, Dataset, run};

    fn args(root: &Path, rest: &[&str]) -> Args {
        let root = root.to_string_lossy().into_owned();
        Args::try_parse_from(["tess", root.as_str()].into_iter().chain(rest.iter().copied()))
            .ok()
            .tessera_expect("valid arguments")
    }

    fn write_dataset(root: &Path, name: &str) {
        let args = args(root, &[name, "no-partition", "1", "a,b"]);
        let settings = args.settings();
        let table = TableGenerator::by_name(name)
            .tessera_expect("known fixture")
            .tessera_unwrap();
        TableGenerator::write(&table, args.input(&settings), &settings).tessera_unwrap();
    }

    #[test]
    fn parses_positionals_and_flags() {
        let args = args(
            Path::new("/data"),
            &[
                "tpch-sf10",
                "kd-tree",
                "1000",
                "l_shipdate,l_quantity",
                "--batch-size",
                "64",
                "--no-partition-id",
                "--order-by-skewness",
            ],
        );
        assert_eq!(args.dataset_name, Dataset::TpchSf10);
        assert_eq!(args.columns, vec!["l_shipdate", "l_quantity"]);
        let settings = args.settings();
        assert_eq!(settings.batch_size(), 64);
        assert!(!settings.add_partition_id());
        assert!(settings.order_by_skewness());
        assert_eq!(
            args.input(&settings),
            Path::new("/data/tpch-sf10/no-partition/tpch-sf10.parquet")
        );
        assert_eq!(args.output(), Path::new("/data/tpch-sf10/kd-tree/1000"));
    }

    #[test]
    fn rejects_unknown_datasets() {
        assert!(Args::try_parse_from(["tess", "/data", "lineitem", "kd-tree", "2", "a,b"]).is_err());
    }

    #[rstest]
    #[case("kd-tree", 4)]
    #[case("str-tree", 4)]
    #[case("no-partition", 1)]
    fn partitions_a_dataset(#[case] scheme: &str, #[case] partitions: usize) {
        let dir = tempdir().tessera_unwrap();
        write_dataset(dir.path(), "school");

        let args = args(dir.path(), &["school", scheme, "2", "Age,Student_id"]);
        let summary = run(&args).tessera_unwrap();
        assert_eq!(summary.rows, 8);
        assert_eq!(summary.partitions, partitions);
        assert!(dir.path().join("school").join(scheme).join("2").join("0.parquet").exists());
    }

    #[rstest]
    #[case("r-tree", "Age,Student_id", "UnknownScheme")]
    #[case("kd-tree", "Age", "InsufficientNumberOfColumns")]
    #[case("kd-tree", "Age,Grade", "InvalidColumn")]
    fn reports_error_kinds(#[case] scheme: &str, #[case] columns: &str, #[case] kind: &str) {
        let dir = tempdir().tessera_unwrap();
        write_dataset(dir.path(), "school");

        let args = args(dir.path(), &["school", scheme, "2", columns]);
        let err = run(&args).err().tessera_expect("run should fail");
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn missing_input_is_an_io_failure() {
        let dir = tempdir().tessera_unwrap();
        let args = args(dir.path(), &["cities", "kd-tree", "2", "x,y"]);
        let err = run(&args).err().tessera_expect("no input file");
        assert_eq!(err.kind(), "IOFailure");
    }
}
