use crate::store::error::StoreError;
use crate::types::feature_group::FeatureGroup;
use log::{debug, info};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Keyed, versioned table storage.
///
/// Implementations receive whole frames and are responsible for their own consistency;
/// callers assume a completed `insert` is visible to a subsequent `read`.
pub trait FeatureStore {
    /// Upserts `frame` into the group: rows whose primary key already exists are replaced,
    /// new keys are appended. Returns the number of rows stored for the group afterwards.
    fn insert(&self, group: &FeatureGroup, frame: &DataFrame) -> Result<usize, StoreError>;

    /// Reads a whole group back.
    fn read(&self, name: &str, version: u32) -> Result<DataFrame, StoreError>;
}

/// A [`FeatureStore`] keeping one Snappy-compressed Parquet file per group version.
#[derive(Debug, Clone)]
pub struct ParquetFeatureStore {
    root: PathBuf,
}

impl ParquetFeatureStore {
    pub fn new(root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root).map_err(|e| StoreError::DirCreation(root.to_path_buf(), e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn group_path(&self, name: &str, version: u32) -> PathBuf {
        self.root.join(format!("{name}_v{version}.parquet"))
    }

    fn write_atomic(&self, mut df: DataFrame, path: &Path) -> Result<(), StoreError> {
        let mut temp = NamedTempFile::new_in(&self.root)
            .map_err(|e| StoreError::ParquetWriteIo(path.to_path_buf(), e))?;
        ParquetWriter::new(temp.as_file_mut())
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| StoreError::ParquetWritePolars(path.to_path_buf(), e))?;
        temp.persist(path)
            .map_err(|e| StoreError::ParquetWriteIo(path.to_path_buf(), e.error))?;
        Ok(())
    }
}

impl FeatureStore for ParquetFeatureStore {
    fn insert(&self, group: &FeatureGroup, frame: &DataFrame) -> Result<usize, StoreError> {
        for column in &group.primary_key {
            if frame.get_column_index(column).is_none() {
                return Err(StoreError::MissingPrimaryKey {
                    group: group.name.clone(),
                    column: column.clone(),
                });
            }
        }

        let path = self.group_path(&group.name, group.version);
        let combined = if path.exists() {
            let mut existing = self.read(&group.name, group.version)?;
            existing
                .vstack_mut(frame)
                .map_err(|source| StoreError::SchemaMismatch {
                    group: group.name.clone(),
                    source,
                })?;
            existing
        } else {
            frame.clone()
        };

        let deduplicated = keep_last_per_key(&combined, &group.primary_key)?;
        let sorted = deduplicated.sort(group.primary_key.clone(), SortMultipleOptions::default())?;
        let stored = sorted.height();
        debug!(
            "Group {} v{}: {} incoming rows, {} after upsert",
            group.name,
            group.version,
            frame.height(),
            stored
        );
        self.write_atomic(sorted, &path)?;
        info!(
            "Wrote {} rows to feature group {} v{}",
            stored, group.name, group.version
        );
        Ok(stored)
    }

    fn read(&self, name: &str, version: u32) -> Result<DataFrame, StoreError> {
        let path = self.group_path(name, version);
        if !path.exists() {
            return Err(StoreError::GroupNotFound {
                name: name.to_string(),
                version,
            });
        }
        LazyFrame::scan_parquet(&path, Default::default())
            .and_then(|lf| lf.collect())
            .map_err(|e| StoreError::ParquetRead(path.clone(), e))
    }
}

/// Keeps, for every distinct primary key, only the row that appears last.
fn keep_last_per_key(df: &DataFrame, primary_key: &[String]) -> Result<DataFrame, StoreError> {
    let key_columns = primary_key
        .iter()
        .map(|name| df.column(name).and_then(|c| c.cast(&DataType::String)))
        .collect::<PolarsResult<Vec<Column>>>()?;
    let key_values = key_columns
        .iter()
        .map(|c| c.str().map(|ca| ca.into_iter().collect::<Vec<_>>()))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut last_row: HashMap<Vec<Option<&str>>, usize> = HashMap::with_capacity(df.height());
    for row in 0..df.height() {
        let key: Vec<Option<&str>> = key_values.iter().map(|values| values[row]).collect();
        last_row.insert(key, row);
    }
    let mut keep: Vec<IdxSize> = last_row.into_values().map(|row| row as IdxSize).collect();
    keep.sort_unstable();
    Ok(df.take(&IdxCa::from_vec("idx".into(), keep))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::series_layout::{LOCATION_ID, PICKUP_HOUR};

    fn group() -> FeatureGroup {
        FeatureGroup::new("test_features", 1, &[PICKUP_HOUR, LOCATION_ID])
    }

    fn frame(hours: &[i64], stations: &[&str], values: &[f64]) -> DataFrame {
        df!(
            PICKUP_HOUR => hours,
            LOCATION_ID => stations,
            "target" => values,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetFeatureStore::new(dir.path()).unwrap();
        let df = frame(&[2, 1], &["A", "A"], &[20.0, 10.0]);

        assert_eq!(store.insert(&group(), &df).unwrap(), 2);
        let read = store.read("test_features", 1).unwrap();
        let hours: Vec<i64> = read
            .column(PICKUP_HOUR)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(hours, [1, 2]);
        assert!(store.group_path("test_features", 1).exists());
    }

    #[test]
    fn test_upsert_replaces_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetFeatureStore::new(dir.path()).unwrap();
        store
            .insert(&group(), &frame(&[1, 2], &["A", "B"], &[1.0, 2.0]))
            .unwrap();
        let stored = store
            .insert(&group(), &frame(&[2, 3], &["B", "B"], &[5.0, 6.0]))
            .unwrap();
        assert_eq!(stored, 3);

        let read = store.read("test_features", 1).unwrap();
        let targets: Vec<f64> = read
            .column("target")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(targets, [1.0, 5.0, 6.0]);
    }

    #[test]
    fn test_missing_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetFeatureStore::new(dir.path()).unwrap();
        let err = store.read("nope", 3).unwrap_err();
        assert!(matches!(err, StoreError::GroupNotFound { version: 3, .. }));
    }

    #[test]
    fn test_missing_primary_key_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetFeatureStore::new(dir.path()).unwrap();
        let df = df!(PICKUP_HOUR => [1i64], "target" => [1.0]).unwrap();
        let err = store.insert(&group(), &df).unwrap_err();
        match err {
            StoreError::MissingPrimaryKey { column, .. } => assert_eq!(column, LOCATION_ID),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_schema_mismatch_on_second_insert() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetFeatureStore::new(dir.path()).unwrap();
        store
            .insert(&group(), &frame(&[1], &["A"], &[1.0]))
            .unwrap();
        let other = df!(
            PICKUP_HOUR => [2i64],
            LOCATION_ID => ["A"],
            "prediction" => [3.0],
            "extra" => [1i32],
        )
        .unwrap();
        let err = store.insert(&group(), &other).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }
}
