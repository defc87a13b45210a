use chrono::NaiveDateTime;

use parimate_types::{MetadataConfig, TimePolicy};

use crate::extractor::{MetadataMap, value_f64, value_text};
use crate::report::{MetadataCheck, MetadataReport};

const SOFTWARE_FIELDS: [&str; 7] = [
    "Software",
    "EncodingTool",
    "EncodedBy",
    "WritingLibrary",
    "MuxingApp",
    "HistorySoftwareAgent",
    "ProcessingTool",
];

const TIME_PAIRS: [(&str, &str); 3] = [
    ("CreateDate", "ModifyDate"),
    ("DateTimeOriginal", "FileModifyDate"),
    ("MediaCreateDate", "MediaModifyDate"),
];

const TIME_FORMATS: [&str; 3] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

const CONTAINER_DURATIONS: [&str; 2] = ["Duration", "MediaDuration"];
const TRACK_DURATIONS: [&str; 2] = ["TrackDuration", "AudioDuration"];

const ORIGINAL_PAIRS: [(&str, &str); 3] = [
    ("FrameRate", "OriginalFrameRate"),
    ("ImageWidth", "OriginalImageWidth"),
    ("ImageHeight", "OriginalImageHeight"),
];

const COMMENT_FIELDS: [&str; 2] = ["Comment", "UserComment"];

/// Run every heuristic over one tag map.
pub fn analyze(map: &MetadataMap, config: &MetadataConfig) -> MetadataReport {
    let mut report = MetadataReport::default();
    check_software(map, &mut report);
    check_time(map, config.time_policy, &mut report);
    check_audio_duration(map, config.audio_threshold, &mut report);
    check_original_parameters(map, config.original_threshold, &mut report);
    check_comment(map, config, &mut report);
    check_model_device(map, config, &mut report);
    report
}

fn check_software(map: &MetadataMap, report: &mut MetadataReport) {
    for field in SOFTWARE_FIELDS {
        if let Some(text) = map.get(field).and_then(value_text) {
            let text = text.trim();
            if !text.is_empty() {
                report.push(MetadataCheck::Software, format!("{field}={text}"));
            }
        }
    }
}

/// Parse an exiftool timestamp, ignoring sub-second digits and zone suffix.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let base = trimmed.get(..19).unwrap_or(trimmed);
    let base = base.split('.').next().unwrap_or(base);
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(base, fmt).ok())
}

fn check_time(map: &MetadataMap, policy: TimePolicy, report: &mut MetadataReport) {
    for (created_field, modified_field) in TIME_PAIRS {
        let created = map
            .get(created_field)
            .and_then(value_text)
            .and_then(|s| parse_timestamp(&s));
        let modified = map
            .get(modified_field)
            .and_then(value_text)
            .and_then(|s| parse_timestamp(&s));
        let (Some(created), Some(modified)) = (created, modified) else {
            continue;
        };
        let suspicious = match policy {
            TimePolicy::ModifiedAfter => modified > created,
            TimePolicy::AnyDifference => modified != created,
        };
        if suspicious {
            report.push(
                MetadataCheck::Time,
                format!("{created_field}={created} {modified_field}={modified}"),
            );
        }
    }
}

/// Parse a duration in seconds from a number, `H:MM:SS[.fff]`, `M:SS` or
/// `N[.N] s`. Trailing annotations such as `(approx)` are ignored.
pub fn parse_duration(value: &serde_json::Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let text = value.as_str()?;
    let text = text.split('(').next().unwrap_or(text).trim();
    let text = text.strip_suffix('s').map(str::trim_end).unwrap_or(text);

    if text.contains(':') {
        let mut total = 0.0;
        for part in text.split(':') {
            let part: f64 = part.trim().parse().ok()?;
            total = total * 60.0 + part;
        }
        Some(total)
    } else {
        text.parse().ok()
    }
}

fn check_audio_duration(map: &MetadataMap, threshold: f64, report: &mut MetadataReport) {
    let durations = |fields: [&'static str; 2]| {
        fields
            .into_iter()
            .filter_map(|f| {
                let secs = map.get(f).and_then(parse_duration)?;
                (secs > 0.0).then_some((f, secs))
            })
            .collect::<Vec<_>>()
    };
    let containers = durations(CONTAINER_DURATIONS);
    let tracks = durations(TRACK_DURATIONS);

    for (container_field, container) in &containers {
        for (track_field, track) in &tracks {
            let delta = (container - track).abs();
            if delta > threshold {
                report.push(
                    MetadataCheck::AudioDuration,
                    format!("{container_field}={container:.3}s {track_field}={track:.3}s"),
                );
            }
        }
    }
}

fn check_original_parameters(map: &MetadataMap, threshold: f64, report: &mut MetadataReport) {
    for (field, original_field) in ORIGINAL_PAIRS {
        let current = map.get(field).and_then(value_f64);
        let original = map.get(original_field).and_then(value_f64);
        if let (Some(current), Some(original)) = (current, original) {
            if (current - original).abs() > threshold {
                report.push(
                    MetadataCheck::OriginalParameters,
                    format!("{field}={current} {original_field}={original}"),
                );
            }
        }
    }
}

fn check_comment(map: &MetadataMap, config: &MetadataConfig, report: &mut MetadataReport) {
    for field in COMMENT_FIELDS {
        let Some(comment) = map.get(field).and_then(value_text) else {
            continue;
        };
        let lowered = comment.to_lowercase();
        let hit = config
            .editor_names
            .iter()
            .chain(config.edit_words.iter())
            .find(|needle| !needle.is_empty() && lowered.contains(&needle.to_lowercase()));
        if let Some(needle) = hit {
            report.push(
                MetadataCheck::Comment,
                format!("{field} mentions {needle:?}: {}", comment.trim()),
            );
        }
    }
}

fn check_model_device(map: &MetadataMap, config: &MetadataConfig, report: &mut MetadataReport) {
    let identity: Vec<String> = ["Make", "Model"]
        .into_iter()
        .filter_map(|f| map.get(f).and_then(value_text))
        .map(|s| s.to_lowercase())
        .collect();
    if identity.is_empty() {
        return;
    }
    let (Some(width), Some(height)) = (
        map.get("ImageWidth").and_then(value_f64),
        map.get("ImageHeight").and_then(value_f64),
    ) else {
        return;
    };
    let (width, height) = (width as u32, height as u32);

    for profile in &config.device_profiles {
        let name = profile.name.to_lowercase();
        if !identity.iter().any(|s| s.contains(&name)) {
            continue;
        }
        // Portrait recordings report the landscape dimensions swapped.
        let known = profile
            .resolutions
            .iter()
            .any(|&(w, h)| (w, h) == (width, height) || (h, w) == (width, height));
        if !known {
            report.push(
                MetadataCheck::ModelDevice,
                format!("{} recorded at unexpected {width}x{height}", profile.name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn map(value: Value) -> MetadataMap {
        value
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[test]
    fn test_clean_capture_has_no_findings() {
        let tags = map(json!({
            "Make": "Apple",
            "Model": "iPhone 13",
            "ImageWidth": 1920,
            "ImageHeight": 1080,
            "CreateDate": "2024:03:01 10:00:00",
            "ModifyDate": "2024:03:01 10:00:00",
            "Duration": "12.40 s",
            "TrackDuration": "12.40 s",
        }));
        let report = analyze(&tags, &MetadataConfig::default());
        assert!(report.is_clean(), "{:?}", report.lines());
    }

    #[test]
    fn test_software_field_flags() {
        let tags = map(json!({ "Software": "Adobe Premiere" }));
        let report = analyze(&tags, &MetadataConfig::default());
        assert_eq!(report.flagged(), vec![MetadataCheck::Software]);
        assert_eq!(
            report.findings(MetadataCheck::Software),
            ["Software=Adobe Premiere".to_string()]
        );
    }

    #[test]
    fn test_blank_software_is_ignored() {
        let tags = map(json!({ "Software": "  " }));
        assert!(analyze(&tags, &MetadataConfig::default()).is_clean());
    }

    #[test]
    fn test_modified_after_created() {
        let tags = map(json!({
            "CreateDate": "2024:03:01 10:00:00",
            "ModifyDate": "2024:03:02 09:00:00+03:00",
        }));
        let report = analyze(&tags, &MetadataConfig::default());
        assert_eq!(report.findings(MetadataCheck::Time).len(), 1);
    }

    #[test]
    fn test_time_policy_any_difference() {
        let tags = map(json!({
            "MediaCreateDate": "2024-03-02T10:00:00",
            "MediaModifyDate": "2024-03-01T10:00:00",
        }));
        let default = analyze(&tags, &MetadataConfig::default());
        assert!(default.findings(MetadataCheck::Time).is_empty());

        let strict = MetadataConfig {
            time_policy: TimePolicy::AnyDifference,
            ..MetadataConfig::default()
        };
        assert_eq!(analyze(&tags, &strict).findings(MetadataCheck::Time).len(), 1);
    }

    #[test]
    fn test_unparsable_time_pair_skipped() {
        let tags = map(json!({
            "CreateDate": "0000:00:00 00:00:00",
            "ModifyDate": "2024:03:02 09:00:00",
        }));
        assert!(analyze(&tags, &MetadataConfig::default()).is_clean());
    }

    #[test]
    fn test_parse_timestamp_strips_fraction_and_zone() {
        let parsed = parse_timestamp("2024:03:01 10:00:00.250+02:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-03-01 10:00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration(&json!(12.5)), Some(12.5));
        assert_eq!(parse_duration(&json!("12.5 s")), Some(12.5));
        assert_eq!(parse_duration(&json!("0:01:05")), Some(65.0));
        assert_eq!(parse_duration(&json!("1:30.5")), Some(90.5));
        assert_eq!(parse_duration(&json!("5.03 s (approx)")), Some(5.03));
        assert_eq!(parse_duration(&json!("n/a")), None);
    }

    #[test]
    fn test_audio_duration_mismatch() {
        let tags = map(json!({
            "Duration": "0:00:30",
            "AudioDuration": "12.0 s",
            "TrackDuration": 29.5,
        }));
        let report = analyze(&tags, &MetadataConfig::default());
        let findings = report.findings(MetadataCheck::AudioDuration);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("AudioDuration"));
    }

    #[test]
    fn test_original_parameters_mismatch() {
        let tags = map(json!({
            "FrameRate": 30,
            "OriginalFrameRate": "60",
            "ImageWidth": 1920,
            "OriginalImageWidth": 1920,
        }));
        let report = analyze(&tags, &MetadataConfig::default());
        assert_eq!(report.findings(MetadataCheck::OriginalParameters).len(), 1);
    }

    #[test]
    fn test_comment_mentions_editor() {
        let tags = map(json!({ "Comment": "Exported with DaVinci Resolve" }));
        let report = analyze(&tags, &MetadataConfig::default());
        assert_eq!(report.flagged(), vec![MetadataCheck::Comment]);

        let tags = map(json!({ "Comment": "colour ADJUSTMENT applied" }));
        assert!(!analyze(&tags, &MetadataConfig::default()).is_clean());

        let tags = map(json!({ "Comment": "holiday at the lake" }));
        assert!(analyze(&tags, &MetadataConfig::default()).is_clean());
    }

    #[test]
    fn test_device_profile_resolution() {
        let odd = map(json!({
            "Model": "iPhone 14 Pro",
            "ImageWidth": 1000,
            "ImageHeight": 700,
        }));
        let report = analyze(&odd, &MetadataConfig::default());
        assert_eq!(report.flagged(), vec![MetadataCheck::ModelDevice]);

        let portrait = map(json!({
            "Model": "iPhone 14 Pro",
            "ImageWidth": 1080,
            "ImageHeight": 1920,
        }));
        assert!(analyze(&portrait, &MetadataConfig::default()).is_clean());

        let unknown_device = map(json!({
            "Model": "Pixel 8",
            "ImageWidth": 1000,
            "ImageHeight": 700,
        }));
        assert!(analyze(&unknown_device, &MetadataConfig::default()).is_clean());
    }
}
