//! Explicit cue files.
//!
//! Accepted shapes: a top-level array of cues, or an object holding the
//! array under `subtitles` or `cues`. Each cue has `start`, `text` and
//! either `length` or `end`. Cues with blank text or zero length are
//! skipped; `position`, `offset` and `width` hints are kept.

use serde_json::Value;
use std::path::Path;

use adreel_models::SubtitleCue;

use super::error::AlignmentError;

/// Read and validate a cue file.
pub async fn load_cue_file(path: &Path) -> Result<Vec<SubtitleCue>, AlignmentError> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_cues(&raw)
}

/// Parse and validate cue JSON.
pub fn parse_cues(raw: &str) -> Result<Vec<SubtitleCue>, AlignmentError> {
    let value: Value = serde_json::from_str(raw)?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("subtitles").or_else(|| map.remove("cues")) {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(AlignmentError::Malformed(
                    "expected an array under `subtitles` or `cues`".to_string(),
                ))
            }
        },
        _ => {
            return Err(AlignmentError::Malformed(
                "expected an array of cues".to_string(),
            ))
        }
    };

    let mut cues = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if let Some(cue) = parse_entry(index, entry)? {
            cues.push(cue);
        }
    }
    validate_cues(&cues)?;
    Ok(cues)
}

fn parse_entry(index: usize, entry: &Value) -> Result<Option<SubtitleCue>, AlignmentError> {
    let obj = entry
        .as_object()
        .ok_or_else(|| AlignmentError::invalid_cue(index, "expected an object"))?;

    let text = obj
        .get("text")
        .map(|t| match t {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Ok(None);
    }

    let start = number(obj.get("start"))
        .unwrap_or(Some(0.0))
        .ok_or_else(|| AlignmentError::invalid_cue(index, "`start` is not a number"))?;
    if !start.is_finite() || start < 0.0 {
        return Err(AlignmentError::invalid_cue(
            index,
            "`start` must be a non-negative number",
        ));
    }

    let length = match (number(obj.get("length")), number(obj.get("end"))) {
        (Some(Some(length)), _) => length,
        (_, Some(Some(end))) => end - start,
        (Some(None), _) | (_, Some(None)) => {
            return Err(AlignmentError::invalid_cue(
                index,
                "`length`/`end` is not a number",
            ))
        }
        (None, None) => {
            return Err(AlignmentError::invalid_cue(
                index,
                "missing `length` or `end`",
            ))
        }
    };
    if !length.is_finite() {
        return Err(AlignmentError::invalid_cue(
            index,
            "`length`/`end` must be finite",
        ));
    }
    if length < 0.0 {
        return Err(AlignmentError::NegativeLength { index });
    }
    if length == 0.0 {
        return Ok(None);
    }

    let mut cue = SubtitleCue::new(start, length, text);
    cue.position = obj.get("position").cloned();
    cue.offset = obj.get("offset").cloned();
    cue.width = obj.get("width").and_then(Value::as_f64);
    Ok(Some(cue))
}

/// `None` when absent, `Some(None)` when present but not numeric.
fn number(value: Option<&Value>) -> Option<Option<f64>> {
    value.map(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Check ordering and overlap of an explicit track.
pub fn validate_cues(cues: &[SubtitleCue]) -> Result<(), AlignmentError> {
    for (index, cue) in cues.iter().enumerate() {
        if !cue.start.is_finite() || !cue.length.is_finite() {
            return Err(AlignmentError::invalid_cue(index, "timing must be finite"));
        }
        if cue.length < 0.0 {
            return Err(AlignmentError::NegativeLength { index });
        }
        if index > 0 && cue.start < cues[index - 1].start {
            return Err(AlignmentError::NonMonotonic { index });
        }
    }
    for (index, pair) in cues.windows(2).enumerate() {
        if pair[0].end() > pair[1].start + 1e-6 {
            return Err(AlignmentError::Overlap { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_end() {
        let cues = parse_cues(
            r#"[
                {"start": 0.5, "end": 2.0, "text": " Hello "},
                {"start": 2.5, "length": 1.0, "text": "World", "position": "bottom", "width": 0.8}
            ]"#,
        )
        .unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello");
        assert!((cues[0].length - 1.5).abs() < 1e-9);
        assert_eq!(cues[1].position, Some(serde_json::json!("bottom")));
        assert_eq!(cues[1].width, Some(0.8));
    }

    #[test]
    fn test_parse_object_forms() {
        let a = parse_cues(r#"{"subtitles": [{"start": 0, "length": 1, "text": "a"}]}"#).unwrap();
        let b = parse_cues(r#"{"cues": [{"start": 0, "length": 1, "text": "a"}]}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_skips_blank_and_zero_length() {
        let cues = parse_cues(
            r#"[{"start": 0, "length": 1, "text": "  "},
                {"start": 1, "length": 0, "text": "zero"},
                {"start": 2, "length": 1, "text": "kept"}]"#,
        )
        .unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "kept");
    }

    #[test]
    fn test_negative_length_rejected() {
        let err = parse_cues(r#"[{"start": 2, "end": 1, "text": "back"}]"#).unwrap_err();
        assert!(matches!(err, AlignmentError::NegativeLength { index: 0 }));
    }

    #[test]
    fn test_non_finite_length_rejected() {
        for raw in [
            r#"[{"start": 0, "length": "inf", "text": "forever"}]"#,
            r#"[{"start": 0, "length": "NaN", "text": "nothing"}]"#,
            r#"[{"start": 1, "end": "inf", "text": "open"}]"#,
        ] {
            let err = parse_cues(raw).unwrap_err();
            assert!(
                matches!(err, AlignmentError::InvalidCue { index: 0, .. }),
                "{raw}: {err}"
            );
        }

        let cues = [SubtitleCue::new(0.0, f64::INFINITY, "forever")];
        assert!(validate_cues(&cues).is_err());
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let err = parse_cues(
            r#"[{"start": 3, "length": 1, "text": "b"}, {"start": 1, "length": 1, "text": "a"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, AlignmentError::NonMonotonic { index: 1 }));
    }

    #[test]
    fn test_overlap_rejected() {
        let err = parse_cues(
            r#"[{"start": 0, "length": 2, "text": "a"}, {"start": 1, "length": 1, "text": "b"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, AlignmentError::Overlap { index: 0 }));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            parse_cues("not json"),
            Err(AlignmentError::Json(_))
        ));
        assert!(matches!(
            parse_cues("42"),
            Err(AlignmentError::Malformed(_))
        ));
    }
}
