//! JSON persistence of model snapshots
//!
//! JSON has no NaN, so float vectors and matrices that may hold undefined
//! values go through `nan_vec` / `nan_matrix`, which write NaN as `null`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Pretty-print `value` to `path`, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// `Vec<f64>` with NaN stored as `null`
pub mod nan_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let wrapped: Vec<Option<f64>> = values.iter().map(|&v| v.is_finite().then_some(v)).collect();
        wrapped.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let wrapped = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(wrapped.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// `Array2<f64>` as `{ "dim": [rows, cols], "data": [...] }`, row-major, NaN as `null`
pub mod nan_matrix {
    use ndarray::Array2;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Stored {
        dim: (usize, usize),
        data: Vec<Option<f64>>,
    }

    pub fn serialize<S: Serializer>(matrix: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        Stored {
            dim: matrix.dim(),
            data: matrix.iter().map(|&v| v.is_finite().then_some(v)).collect(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Array2<f64>, D::Error> {
        let stored = Stored::deserialize(deserializer)?;
        let data = stored.data.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        Array2::from_shape_vec(stored.dim, data).map_err(D::Error::custom)
    }
}
