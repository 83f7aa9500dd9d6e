use crate::config::LabelsConfig;
use std::{
    fs::File,
    io::{self, BufRead},
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const GTSRB_CLASS_COUNT: usize = 43;

/// German Traffic Sign Recognition Benchmark classes, in model output order.
pub const GTSRB_CLASS_NAMES: [&str; GTSRB_CLASS_COUNT] = [
    "Speed limit (20km/h)",
    "Speed limit (30km/h)",
    "Speed limit (50km/h)",
    "Speed limit (60km/h)",
    "Speed limit (70km/h)",
    "Speed limit (80km/h)",
    "End of speed limit (80km/h)",
    "Speed limit (100km/h)",
    "Speed limit (120km/h)",
    "No passing",
    "No passing for vehicles over 3.5 metric tons",
    "Right-of-way at the next intersection",
    "Priority road",
    "Yield",
    "Stop",
    "No vehicles",
    "Vehicles over 3.5 metric tons prohibited",
    "No entry",
    "General caution",
    "Dangerous curve to the left",
    "Dangerous curve to the right",
    "Double curve",
    "Bumpy road",
    "Slippery road",
    "Road narrows on the right",
    "Road work",
    "Traffic signals",
    "Pedestrians",
    "Children crossing",
    "Bicycles crossing",
    "Beware of ice/snow",
    "Wild animals crossing",
    "End of all speed and passing limits",
    "Turn right ahead",
    "Turn left ahead",
    "Ahead only",
    "Go straight or right",
    "Go straight or left",
    "Keep right",
    "Keep left",
    "Roundabout mandatory",
    "End of no passing",
    "End of no passing by vehicles over 3.5 metric tons",
];

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("Failed to read labels file {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Labels file {path:?} has {actual} entries, expected {expected}")]
    WrongCount {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

/// Immutable class id to label lookup.
#[derive(Debug, Clone)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn gtsrb() -> Self {
        Self {
            labels: GTSRB_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(labels_cfg: &LabelsConfig) -> Result<Self, LabelsError> {
        match &labels_cfg.labels_file {
            Some(path) => load_labels(path),
            None => Ok(Self::gtsrb()),
        }
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::gtsrb()
    }
}

pub fn load_labels(filepath: &Path) -> Result<ClassLabels, LabelsError> {
    let io_err = |source| LabelsError::Io {
        path: filepath.to_path_buf(),
        source,
    };
    let file = File::open(filepath).map_err(io_err)?;
    let reader = io::BufReader::new(file);

    let mut labels = Vec::with_capacity(GTSRB_CLASS_COUNT);
    for line_result in reader.lines() {
        let line = line_result.map_err(io_err)?;
        let label = line.trim();
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }

    if labels.len() != GTSRB_CLASS_COUNT {
        return Err(LabelsError::WrongCount {
            path: filepath.to_path_buf(),
            expected: GTSRB_CLASS_COUNT,
            actual: labels.len(),
        });
    }

    Ok(ClassLabels { labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_gtsrb_lookup_is_total() {
        let labels = ClassLabels::gtsrb();

        assert_eq!(labels.len(), GTSRB_CLASS_COUNT);
        for class_id in 0..GTSRB_CLASS_COUNT {
            assert_eq!(labels.get(class_id), Some(GTSRB_CLASS_NAMES[class_id]));
        }
        assert_eq!(labels.get(GTSRB_CLASS_COUNT), None);
    }

    #[test]
    fn test_well_known_indices() {
        let labels = ClassLabels::gtsrb();

        assert_eq!(labels.get(0), Some("Speed limit (20km/h)"));
        assert_eq!(labels.get(14), Some("Stop"));
        assert_eq!(labels.get(17), Some("No entry"));
        assert_eq!(
            labels.get(42),
            Some("End of no passing by vehicles over 3.5 metric tons")
        );
    }

    #[test]
    fn test_no_labels_file_uses_builtin_table() {
        let labels = ClassLabels::from_config(&LabelsConfig::default()).unwrap();
        assert_eq!(labels.get(14), Some("Stop"));
    }

    #[test]
    fn test_load_labels_file() {
        let path = std::env::temp_dir().join(format!("labels-ok-{}.txt", std::process::id()));
        let mut file = File::create(&path).unwrap();
        for class_id in 0..GTSRB_CLASS_COUNT {
            writeln!(file, "  sign {}  ", class_id).unwrap();
        }
        writeln!(file).unwrap();
        drop(file);

        let labels = ClassLabels::from_config(&LabelsConfig {
            labels_file: Some(path.clone()),
        })
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(labels.len(), GTSRB_CLASS_COUNT);
        assert_eq!(labels.get(14), Some("sign 14"));
    }

    #[test]
    fn test_short_labels_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("labels-short-{}.txt", std::process::id()));
        std::fs::write(&path, "Stop\nYield\n").unwrap();

        let result = load_labels(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            result,
            Err(LabelsError::WrongCount { actual: 2, .. })
        ));
    }

    #[test]
    fn test_missing_labels_file() {
        let result = load_labels(Path::new("./no/such/labels.txt"));
        assert!(matches!(result, Err(LabelsError::Io { .. })));
    }
}
