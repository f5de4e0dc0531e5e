use serde_json::json;

use super::checks::validate_submission;
use super::*;
use crate::config::EvalConfig;

fn expected() -> TimelinePostMapping {
    TimelinePostMapping::from([
        ("t1".to_string(), vec!["p1".to_string(), "p2".to_string()]),
        ("t2".to_string(), vec!["p3".to_string()]),
    ])
}

fn post(score: Value) -> Value {
    json!({
        "adaptive_evidence": ["coping well"],
        "maladaptive_evidence": [],
        "summary": "Doing better.",
        "wellbeing_score": score
    })
}

fn valid_submission() -> Value {
    json!({
        "t1": {
            "timeline_level": {"summary": "Improving over time."},
            "post_level": {"p1": post(json!(4)), "p2": post(json!(null))}
        },
        "t2": {
            "timeline_level": {"summary": "Stable."},
            "post_level": {"p3": post(json!(9))}
        }
    })
}

fn validate(data: &Value) -> ValidationContext {
    let mut context = ValidationContext::default();
    validate_submission(data, &expected(), &mut context);
    context
}

fn with_score(score: Value) -> ValidationContext {
    let mut data = valid_submission();
    data["t1"]["post_level"]["p1"]["wellbeing_score"] = score;
    validate(&data)
}

#[test]
fn well_formed_submission_is_valid() {
    let context = validate(&valid_submission());
    assert!(context.valid, "errors: {:?}", context.errors);
    assert!(context.timelines_with_issues.is_empty());
    assert!(context.warnings.is_empty());
}

#[test]
fn missing_timeline_is_recorded_and_invalid() {
    let mut data = valid_submission();
    data.as_object_mut().expect("object").remove("t2");

    let context = validate(&data);
    assert!(!context.valid);
    assert!(context.timelines_with_issues.contains("t2"));
    assert!(context.errors[0].contains("Missing expected timelines: t2"));
}

#[test]
fn unexpected_timelines_and_posts_only_warn() {
    let mut data = valid_submission();
    data["t9"] = json!({"timeline_level": {"summary": "x"}, "post_level": {"q": post(json!(5))}});
    data["t1"]["post_level"]["extra"] = post(json!(5));

    let context = validate(&data);
    assert!(context.valid, "errors: {:?}", context.errors);
    // t9 itself, the extra t1 post, and t9's post (t9 has no expected posts).
    assert_eq!(context.warnings.len(), 3, "warnings: {:#?}", context.warnings);
    assert!(context.warnings[0].contains("unexpected timelines: t9"));
    assert!(context.warnings[1].contains("unexpected posts: extra"));
}

#[test]
fn missing_posts_are_flagged_per_post() {
    let mut data = valid_submission();
    data["t1"]["post_level"]
        .as_object_mut()
        .expect("posts")
        .remove("p2");

    let context = validate(&data);
    assert!(!context.valid);
    assert!(
        context
            .posts_with_issues
            .contains(&("t1".to_string(), "p2".to_string()))
    );
    assert_eq!(context.timelines_with_issues.len(), 1);
}

#[test]
fn numeric_string_score_is_accepted() {
    let context = with_score(json!("7"));
    assert!(context.valid, "errors: {:?}", context.errors);
    assert!(context.warnings.is_empty());
}

#[test]
fn float_score_warns_about_truncation() {
    let context = with_score(json!(7.0));
    assert!(context.valid, "errors: {:?}", context.errors);
    assert_eq!(context.warnings.len(), 1);
    assert!(context.warnings[0].contains("truncated"));
}

#[test]
fn out_of_range_scores_are_rejected() {
    for score in [json!(11), json!(0), json!(10.5), json!("12")] {
        let context = with_score(score.clone());
        assert!(!context.valid, "{score} should be rejected");
        assert!(
            context
                .posts_with_issues
                .contains(&("t1".to_string(), "p1".to_string()))
        );
        assert!(context.errors.iter().any(|error| error.contains("between 1 and 10")));
    }
}

#[test]
fn malformed_score_types_are_rejected() {
    for score in [json!("seven"), json!(true), json!([7])] {
        let context = with_score(score.clone());
        assert!(!context.valid, "{score} should be rejected");
        assert!(context.errors[0].contains("Expected integer"));
    }
}

#[test]
fn structural_problems_accumulate_without_stopping() {
    let data = json!({
        "t1": {
            "timeline_level": {"summary": 3},
            "post_level": {
                "p1": {"adaptive_evidence": "nope", "maladaptive_evidence": [1, "ok"], "summary": ""},
                "p2": []
            }
        },
        "t2": []
    });

    let context = validate(&data);
    assert!(!context.valid);
    assert_eq!(
        context.timelines_with_issues.iter().collect::<Vec<_>>(),
        vec!["t1", "t2"]
    );
    assert_eq!(context.posts_with_issues.len(), 2);
    // summary type, missing wellbeing field, evidence type, evidence item, p2 type, t2 type
    assert_eq!(context.errors.len(), 6, "errors: {:#?}", context.errors);
    assert!(context.warnings.iter().any(|warning| warning.contains("summary is empty")));
}

#[test]
fn empty_and_non_object_roots_are_invalid() {
    for data in [json!({}), json!(null), json!([1, 2])] {
        let context = validate(&data);
        assert!(!context.valid, "{data} should be invalid");
        assert!(context.timelines_with_issues.is_empty());
    }
}

#[test]
fn unreadable_files_produce_failed_reports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{not json").expect("write");

    let report = validate_file(&broken, Split::Test, &expected());
    assert!(!report.valid);
    assert_eq!(report.status, "fail");
    assert!(report.errors[0].starts_with("Invalid JSON"));

    let missing = validate_file(&dir.path().join("absent.json"), Split::Test, &expected());
    assert!(missing.errors[0].starts_with("File not found"));
}

#[test]
fn run_filters_mapping_to_split_and_writes_report() {
    let root = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace {
        root: root.path().to_path_buf(),
        config_path: None,
        config: EvalConfig {
            dev_timeline_ids: vec!["t1".to_string()],
            ..EvalConfig::default()
        },
    };
    write_json_pretty(&workspace.mapping_path(), &expected()).expect("mapping");

    let submission_path = root.path().join("team_run1.json");
    let mut data = valid_submission();
    data.as_object_mut().expect("object").remove("t2");
    write_json_pretty(&submission_path, &data).expect("submission");

    let report_path = root.path().join("report.json");
    let report = run(
        &workspace,
        ValidateArgs {
            file_path: submission_path,
            dev: true,
            report_path: Some(report_path.clone()),
        },
    )
    .expect("validate");

    assert!(report.valid, "errors: {:?}", report.errors);
    let written: Value = read_json(&report_path).expect("report");
    assert_eq!(written["status"], "pass");
    assert_eq!(written["split"], "dev");
}

#[test]
fn missing_timeline_exits_with_status_one() {
    let dir = tempfile::tempdir().expect("tempdir");

    let complete = dir.path().join("team_ok.json");
    write_json_pretty(&complete, &valid_submission()).expect("write valid");
    let report = validate_file(&complete, Split::Test, &expected());
    assert_eq!(exit_code(&report), 0);

    let mut data = valid_submission();
    data.as_object_mut().expect("object").remove("t1");
    let partial = dir.path().join("team_partial.json");
    write_json_pretty(&partial, &data).expect("write partial");

    let report = validate_file(&partial, Split::Test, &expected());
    assert!(report.timelines_with_issues.contains(&"t1".to_string()));
    assert_eq!(report.status, "fail");
    assert_eq!(exit_code(&report), 1);
}

#[test]
fn run_requires_split_timeline_ids() {
    let root = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace {
        root: root.path().to_path_buf(),
        config_path: None,
        config: EvalConfig::default(),
    };

    let error = run(
        &workspace,
        ValidateArgs {
            file_path: root.path().join("x.json"),
            dev: false,
            report_path: None,
        },
    )
    .expect_err("no test exports configured");
    assert!(error.to_string().contains("unable to load test timeline ids"));
}
