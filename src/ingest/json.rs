//! JSON bundles: alignment experiments, localization error reports, ground-truth
//! position channels and batch diffusion results.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use super::read_input;
use crate::error::ValidationError;
use crate::types::{
    AlignmentExperiment, BatchRun, ExperimentRole, GProcessRecord, Image, LocalizationErrorReport,
    ModelRecord, MovieRecord, PositionSeries, RoleData, SubstrateRecord,
};

#[derive(Debug, Deserialize)]
struct RawAlignmentBundle {
    #[serde(rename = "Original")]
    original: RawRole,
    #[serde(rename = "Rotated")]
    rotated: RawRole,
    #[serde(rename = "Corrected")]
    corrected: RawRole,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    #[serde(rename = "Image")]
    image: Vec<Vec<f64>>,
    #[serde(rename = "Positions")]
    positions: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawLocalizationErrors {
    #[serde(rename = "errorX")]
    error_x: Vec<f64>,
    #[serde(rename = "errorY")]
    error_y: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawBatch {
    #[serde(rename = "Movies")]
    movies: MovieEntries,
}

/// `Movies` entries in document order, repeated ids included.
#[derive(Debug)]
struct MovieEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for MovieEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = MovieEntries;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of movie id to fit results")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MovieEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(MovieEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct RawMovie {
    #[serde(rename = "GProcess")]
    gprocess: Option<BTreeMap<String, RawModel>>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    dynamics: Option<Vec<Vec<f64>>>,
    #[serde(rename = "Substrate")]
    substrate: Option<RawSubstrate>,
}

#[derive(Debug, Deserialize)]
struct RawSubstrate {
    #[serde(rename = "DR")]
    dr: Option<f64>,
    #[serde(rename = "AR")]
    ar: Option<f64>,
}

pub fn load_alignment_experiment(path: &Path) -> Result<AlignmentExperiment, ValidationError> {
    let data = read_input(path, "alignment bundle")?;
    let experiment = parse_alignment_experiment(&data)?;
    tracing::debug!(
        path = %path.display(),
        samples = experiment.sample_count(),
        "ingest: loaded alignment experiment"
    );
    Ok(experiment)
}

pub fn parse_alignment_experiment(data: &str) -> Result<AlignmentExperiment, ValidationError> {
    let raw: RawAlignmentBundle = serde_json::from_str(data)
        .map_err(|e| ValidationError::json("parsing alignment bundle", e))?;
    AlignmentExperiment::new(
        role_data(ExperimentRole::Original, raw.original)?,
        role_data(ExperimentRole::Rotated, raw.rotated)?,
        role_data(ExperimentRole::Corrected, raw.corrected)?,
    )
}

fn role_data(role: ExperimentRole, raw: RawRole) -> Result<RoleData, ValidationError> {
    let image = Image::from_rows(raw.image).map_err(|err| match err {
        ValidationError::DimensionMismatch { message, .. } => {
            ValidationError::dimension(format!("{}.Image", role.as_str()), message)
        }
        other => other,
    })?;
    let positions = positions_from_rows(&format!("{}.Positions", role.as_str()), &raw.positions)?;
    Ok(RoleData { image, positions })
}

/// `[[x...], [y...]]`; frames are the column index.
fn positions_from_rows(context: &str, rows: &[Vec<f64>]) -> Result<PositionSeries, ValidationError> {
    match rows {
        [xs, ys] => PositionSeries::from_xy(xs, ys).map_err(|err| match err {
            ValidationError::DimensionMismatch { message, .. } => {
                ValidationError::dimension(context, message)
            }
            other => other,
        }),
        _ => Err(ValidationError::schema(
            context,
            format!("expected a 2xN array, found {} rows", rows.len()),
        )),
    }
}

pub fn load_localization_errors(path: &Path) -> Result<LocalizationErrorReport, ValidationError> {
    let data = read_input(path, "localization error report")?;
    let report = parse_localization_errors(&data)?;
    tracing::debug!(
        path = %path.display(),
        error_x = report.error_x.len(),
        error_y = report.error_y.len(),
        "ingest: loaded localization error report"
    );
    Ok(report)
}

pub fn parse_localization_errors(data: &str) -> Result<LocalizationErrorReport, ValidationError> {
    let raw: RawLocalizationErrors = serde_json::from_str(data)
        .map_err(|e| ValidationError::json("parsing localization error report", e))?;
    Ok(LocalizationErrorReport {
        error_x: raw.error_x,
        error_y: raw.error_y,
    })
}

/// Ground-truth bundle of the form `{"channel0": [[x...], [y...]], ...}`.
pub fn load_position_channels(
    path: &Path,
) -> Result<BTreeMap<String, PositionSeries>, ValidationError> {
    let data = read_input(path, "ground-truth positions")?;
    parse_position_channels(&data)
}

pub fn parse_position_channels(
    data: &str,
) -> Result<BTreeMap<String, PositionSeries>, ValidationError> {
    let raw: BTreeMap<String, Vec<Vec<f64>>> = serde_json::from_str(data)
        .map_err(|e| ValidationError::json("parsing ground-truth positions", e))?;
    raw.into_iter()
        .map(|(channel, rows)| {
            positions_from_rows(&channel, &rows).map(|series| (channel, series))
        })
        .collect()
}

pub fn load_batch_run(path: &Path) -> Result<BatchRun, ValidationError> {
    let data = read_input(path, "batch results")?;
    let batch = parse_batch_run(&data)?;
    tracing::debug!(
        path = %path.display(),
        movies = batch.len(),
        "ingest: loaded batch results"
    );
    Ok(batch)
}

/// Only the `Movies` mapping itself is fatal; each movie is parsed on its own
/// and a bad one becomes `MovieRecord::Malformed`. An id listed more than once
/// is ambiguous and every copy is dropped in favour of one malformed record.
pub fn parse_batch_run(data: &str) -> Result<BatchRun, ValidationError> {
    let raw: RawBatch = serde_json::from_str(data)
        .map_err(|e| ValidationError::json("parsing batch results", e))?;

    let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
    for (movie_id, _) in &raw.movies.0 {
        *occurrences.entry(movie_id.as_str()).or_default() += 1;
    }
    let duplicated: BTreeMap<String, usize> = occurrences
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(movie_id, count)| (movie_id.to_string(), count))
        .collect();

    let mut movies = BTreeMap::new();
    for (movie_id, value) in raw.movies.0 {
        let record = match duplicated.get(&movie_id) {
            Some(&count) => {
                if movies.contains_key(&movie_id) {
                    continue;
                }
                tracing::warn!(movie = movie_id.as_str(), count, "ingest: duplicate movie id");
                MovieRecord::Malformed {
                    reason: format!("movie id listed {count} times"),
                }
            }
            None => parse_movie(value),
        };
        movies.insert(movie_id, record);
    }
    Ok(BatchRun { movies })
}

fn parse_movie(value: Value) -> MovieRecord {
    if value.is_null() {
        return MovieRecord::Malformed {
            reason: "movie entry is null".to_string(),
        };
    }
    let raw: RawMovie = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            return MovieRecord::Malformed {
                reason: err.to_string(),
            }
        }
    };
    let Some(gprocess) = raw.gprocess else {
        return MovieRecord::Malformed {
            reason: "missing 'GProcess' section".to_string(),
        };
    };
    let models = gprocess
        .into_iter()
        .map(|(name, model)| {
            let record = ModelRecord {
                dynamics: model.dynamics,
                substrate: model.substrate.map(|substrate| SubstrateRecord {
                    dr: substrate.dr,
                    ar: substrate.ar,
                }),
            };
            (name, record)
        })
        .collect();
    MovieRecord::Parsed(GProcessRecord { models })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIGNMENT: &str = r#"{
        "Original":  {"Image": [[0, 1], [2, 3]], "Positions": [[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]]},
        "Rotated":   {"Image": [[0, 1], [2, 3]], "Positions": [[1.5, 2.5, 3.5], [1.0, 2.0, 3.0]]},
        "Corrected": {"Image": [[0, 1], [2, 3]], "Positions": [[1.1, 2.1, 3.1], [1.0, 2.0, 3.0]]}
    }"#;

    #[test]
    fn parses_alignment_bundle() {
        let experiment = parse_alignment_experiment(ALIGNMENT).expect("valid bundle");
        assert_eq!(experiment.sample_count(), 3);
        let rotated = experiment.role(ExperimentRole::Rotated);
        assert_eq!(rotated.image.shape(), (2, 2));
        assert_eq!(rotated.positions.positions()[2].x, 3.5);
        assert_eq!(rotated.positions.positions()[2].frame, 2);
    }

    #[test]
    fn missing_role_is_schema_error() {
        let data = r#"{"Original": {"Image": [[0]], "Positions": [[1], [1]]}}"#;
        let err = parse_alignment_experiment(data).unwrap_err();
        assert!(matches!(err, ValidationError::Schema { .. }), "{err}");
    }

    #[test]
    fn positions_must_have_two_rows() {
        let data = ALIGNMENT.replace(
            r#""Positions": [[1.1, 2.1, 3.1], [1.0, 2.0, 3.0]]"#,
            r#""Positions": [[1.1, 2.1, 3.1]]"#,
        );
        let err = parse_alignment_experiment(&data).unwrap_err();
        assert!(err.to_string().contains("Corrected.Positions"), "{err}");
    }

    #[test]
    fn mismatched_series_length_is_fatal() {
        let data = ALIGNMENT.replace(
            r#""Positions": [[1.5, 2.5, 3.5], [1.0, 2.0, 3.0]]"#,
            r#""Positions": [[1.5, 2.5], [1.0, 2.0]]"#,
        );
        let err = parse_alignment_experiment(&data).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch { .. }));
    }

    #[test]
    fn parses_localization_errors() {
        let report = parse_localization_errors(r#"{"errorX": [0.1, -0.2], "errorY": [0.3]}"#)
            .expect("valid report");
        assert_eq!(report.error_x, vec![0.1, -0.2]);
        assert_eq!(report.error_y, vec![0.3]);
    }

    #[test]
    fn parses_position_channels() {
        let channels =
            parse_position_channels(r#"{"channel0": [[1, 2], [3, 4]], "channel1": [[5], [6]]}"#)
                .expect("valid channels");
        assert_eq!(channels["channel0"].len(), 2);
        assert_eq!(channels["channel1"].positions()[0].y, 6.0);
    }

    #[test]
    fn malformed_movie_does_not_fail_batch() {
        let data = r#"{"Movies": {
            "mov1": {"GProcess": {"Single": {"dynamics": [[0, 0, 0.07, 0.5]]}}},
            "mov2": {"GProcess": {"Single": {"dynamics": "oops"}}},
            "mov3": {},
            "mov4": null
        }}"#;
        let batch = parse_batch_run(data).expect("batch parses");
        assert_eq!(batch.len(), 4);
        assert!(matches!(batch.movies["mov1"], MovieRecord::Parsed(_)));
        assert!(matches!(batch.movies["mov2"], MovieRecord::Malformed { .. }));
        assert!(matches!(
            &batch.movies["mov3"],
            MovieRecord::Malformed { reason } if reason.contains("GProcess")
        ));
        assert!(matches!(batch.movies["mov4"], MovieRecord::Malformed { .. }));
    }

    #[test]
    fn repeated_movie_id_is_malformed_not_collapsed() {
        let data = r#"{"Movies": {
            "mov1": {"GProcess": {"Single": {"dynamics": [[0, 0, 0.07, 0.5]]}}},
            "mov2": {"GProcess": {"Single": {"dynamics": [[0, 0, 0.08, 0.5]]}}},
            "mov1": {"GProcess": {"Single": {"dynamics": [[0, 0, 0.09, 0.5]]}}}
        }}"#;
        let batch = parse_batch_run(data).expect("batch parses");
        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.movies["mov2"], MovieRecord::Parsed(_)));
        assert!(matches!(
            &batch.movies["mov1"],
            MovieRecord::Malformed { reason } if reason == "movie id listed 2 times"
        ));
    }

    #[test]
    fn movies_must_be_an_object() {
        let err = parse_batch_run(r#"{"Movies": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, ValidationError::Schema { .. }), "{err}");
    }

    #[test]
    fn batch_without_movies_is_schema_error() {
        let err = parse_batch_run(r#"{"Films": {}}"#).unwrap_err();
        assert!(matches!(err, ValidationError::Schema { .. }));
    }

    #[test]
    fn unparseable_batch_is_json_error() {
        let err = parse_batch_run(r#"{"Movies": {"#).unwrap_err();
        assert!(matches!(err, ValidationError::Json { .. }));
    }

    #[test]
    fn substrate_fields_are_read() {
        let data = r#"{"Movies": {"m": {"GProcess": {"Corrected": {
            "dynamics": [[0, 0, 0.5, 0.3], [1, 0, 0.6, 0.2]],
            "Substrate": {"DR": 0.1, "AR": 1.0}
        }}}}}"#;
        let batch = parse_batch_run(data).expect("batch parses");
        let MovieRecord::Parsed(record) = &batch.movies["m"] else {
            panic!("movie should parse");
        };
        let model = &record.models["Corrected"];
        assert_eq!(model.dynamics.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            model.substrate,
            Some(SubstrateRecord {
                dr: Some(0.1),
                ar: Some(1.0)
            })
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_batch_run(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(matches!(err, ValidationError::Io { .. }));
    }
}
