use std::fs;
use std::path::{Path, PathBuf};

use tessera_error::TesseraResult;
use tessera_io::Settings;
use uuid::Uuid;

use crate::{PartitionSummary, PartitioningScheme};

/// A finished partition file still inside a [`WorkingDir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Position of the leaf in its strategy's split structure. Leaves are numbered in the
    /// lexicographic order of their paths.
    pub path: Vec<u32>,
    pub file: PathBuf,
    pub rows: usize,
}

/// Strategy-private scratch folder `.<scheme>-<uuid>` under the output folder.
///
/// Nothing else writes into it, so concurrent runs into the same output folder never see each
/// other's intermediate files.
#[derive(Debug)]
pub struct WorkingDir {
    path: PathBuf,
}

impl WorkingDir {
    pub fn create(output: &Path, scheme: PartitioningScheme) -> TesseraResult<Self> {
        let path = output.join(format!(".{scheme}-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        log::debug!("Created working folder {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Moves `leaves` to `output` as partitions `0..n` in path order, then removes the folder.
    pub fn finish(
        self,
        mut leaves: Vec<Leaf>,
        output: &Path,
        settings: &Settings,
    ) -> TesseraResult<PartitionSummary> {
        leaves.sort_by(|a, b| a.path.cmp(&b.path));
        for (id, leaf) in leaves.iter().enumerate() {
            fs::rename(&leaf.file, output.join(settings.partition_file_name(id)))?;
        }
        self.remove()?;
        Ok(PartitionSummary {
            partitions: leaves.len(),
            rows: leaves.iter().map(|l| l.rows).sum(),
        })
    }

    pub fn remove(self) -> TesseraResult<()> {
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;
    use tessera_error::TesseraUnwrap;
    use tessera_io::Settings;

    use crate::{Leaf, PartitionSummary, PartitioningScheme, WorkingDir};

    #[test]
    fn renames_leaves_in_path_order() {
        let dir = tempdir().tessera_unwrap();
        let work = WorkingDir::create(dir.path(), PartitioningScheme::GridFile).tessera_unwrap();
        let name = work
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert!(name.starts_with(".grid-file-"));

        let leaves = [vec![1, 0], vec![0, 1], vec![0, 0, 1], vec![1, 1]]
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let file = work.join(format!("leaf{i}"));
                fs::write(&file, path.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
                    .tessera_unwrap();
                Leaf {
                    path,
                    file,
                    rows: i + 1,
                }
            })
            .collect();

        let summary = work.finish(leaves, dir.path(), &Settings::default()).tessera_unwrap();
        assert_eq!(summary, PartitionSummary { partitions: 4, rows: 10 });
        let read = |id: usize| fs::read_to_string(dir.path().join(format!("{id}.parquet"))).tessera_unwrap();
        assert_eq!(
            (0..4).map(read).collect::<Vec<_>>(),
            vec!["0,0,1", "0,1", "1,0", "1,1"]
        );
        assert_eq!(fs::read_dir(dir.path()).tessera_unwrap().count(), 4);
    }
}
