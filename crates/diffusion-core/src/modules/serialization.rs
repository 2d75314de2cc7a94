use crate::domain::{DiffusionError, DiffusionResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn format_scientific_f64(value: f64, precision: usize) -> String {
    format!("{value:.precision$e}", precision = precision)
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> DiffusionResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|source| {
        DiffusionError::computation(
            "RUN.JSON_SERIALIZE",
            format!("failed to serialise '{}': {}", path.display(), source),
        )
    })?;
    write_text_artifact(path, &rendered).map_err(|source| {
        DiffusionError::io_system(
            "IO.ARTIFACT_WRITE",
            format!("failed to write '{}': {}", path.display(), source),
        )
    })
}

pub fn read_json_artifact<T: DeserializeOwned>(path: &Path) -> DiffusionResult<T> {
    let content = fs::read_to_string(path).map_err(|source| {
        DiffusionError::io_system(
            "IO.ARTIFACT_READ",
            format!("failed to read '{}': {}", path.display(), source),
        )
    })?;
    serde_json::from_str(&content).map_err(|source| {
        DiffusionError::data_precondition(
            "DATA.JSON_PARSE",
            format!("'{}' is not valid JSON for this record: {}", path.display(), source),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{
        format_fixed_f64, format_scientific_f64, normalize_text_artifact, read_json_artifact,
        write_json_artifact, write_text_artifact,
    };
    use crate::domain::DiffusionErrorCategory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn float_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 13, 5), "      1.23000");
        assert_eq!(format_scientific_f64(1.0e-5, 5), "1.00000e-5");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("summary.dat");
        let input = "line 1\r\nline 2\rline 3";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");

        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"line 1\nline 2\nline 3\n");
    }

    #[test]
    fn json_artifacts_read_back_and_report_bad_input() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("values.json");
        write_json_artifact(&path, &vec![1.5_f64, 2.5]).expect("json write should succeed");
        let values: Vec<f64> = read_json_artifact(&path).expect("json read should succeed");
        assert_eq!(values, vec![1.5, 2.5]);

        fs::write(&path, "{not json").expect("fixture write should succeed");
        let error = read_json_artifact::<Vec<f64>>(&path).expect_err("invalid json");
        assert_eq!(error.category(), DiffusionErrorCategory::DataPreconditionError);

        let missing = read_json_artifact::<Vec<f64>>(&temp.path().join("missing.json"))
            .expect_err("missing file");
        assert_eq!(missing.category(), DiffusionErrorCategory::IoSystemError);
    }
}
