use super::*;

const TIMELINE_FIELDS: &[&str] = &["timeline_level", "post_level"];
const POST_FIELDS: &[&str] = &[
    "adaptive_evidence",
    "maladaptive_evidence",
    "summary",
    "wellbeing_score",
];

/// Validates the submission at `file_path` against the split's timeline mapping.
///
/// Problems inside the submission are collected into the report; this never fails.
pub fn validate_file(
    file_path: &Path,
    split: Split,
    expected: &TimelinePostMapping,
) -> ValidationReport {
    let mut context = ValidationContext::default();

    match fs::read(file_path) {
        Ok(raw) => match serde_json::from_slice::<Value>(&raw) {
            Ok(data) => validate_submission(&data, expected, &mut context),
            Err(err) => context.error(Scope::File, format!("Invalid JSON: {err}")),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            context.error(Scope::File, format!("File not found: {}", file_path.display()));
        }
        Err(err) => context.error(Scope::File, format!("Error reading file: {err}")),
    }

    context.into_report(file_path, split)
}

pub(super) fn validate_submission(
    data: &Value,
    expected: &TimelinePostMapping,
    context: &mut ValidationContext,
) {
    if is_empty_json(data) {
        context.error(Scope::File, "JSON is empty (no timelines)".to_string());
        return;
    }
    if !context.check_type(data, JsonKind::Object, "Submission file", Scope::File) {
        return;
    }
    let Some(timelines) = data.as_object() else {
        return;
    };

    let missing = expected
        .keys()
        .filter(|timeline_id| !timelines.contains_key(timeline_id.as_str()))
        .cloned()
        .collect::<Vec<String>>();
    if !missing.is_empty() {
        context.error(
            Scope::File,
            format!("Missing expected timelines: {}", missing.join(", ")),
        );
        for timeline_id in &missing {
            context.log_timeline_issue(timeline_id);
        }
    }

    let mut unexpected = timelines
        .keys()
        .filter(|timeline_id| !expected.contains_key(timeline_id.as_str()))
        .cloned()
        .collect::<Vec<String>>();
    if !unexpected.is_empty() {
        unexpected.sort();
        context.warning(format!(
            "Found unexpected timelines: {}. They will be ignored during evaluation.",
            unexpected.join(", ")
        ));
    }

    for (timeline_id, timeline) in timelines {
        info!(timeline_id = %timeline_id, "validating timeline");
        let expected_posts = expected
            .get(timeline_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        validate_timeline(timeline, timeline_id, expected_posts, context);
    }
}

fn validate_timeline(
    timeline: &Value,
    timeline_id: &str,
    expected_posts: &[String],
    context: &mut ValidationContext,
) {
    let label = format!("Timeline {timeline_id}");
    let scope = Scope::Timeline(timeline_id);

    if !context.check_type(timeline, JsonKind::Object, &label, scope) {
        return;
    }
    let Some(object) = timeline.as_object() else {
        return;
    };
    if object.is_empty() {
        context.error(scope, format!("{label} is empty"));
        return;
    }

    context.check_required_fields(object, TIMELINE_FIELDS, &label, scope);

    if let Some(timeline_level) = object.get("timeline_level") {
        validate_timeline_level(timeline_level, timeline_id, context);
    }
    if let Some(post_level) = object.get("post_level") {
        validate_post_level(post_level, timeline_id, expected_posts, context);
    }
}

fn validate_timeline_level(timeline_level: &Value, timeline_id: &str, context: &mut ValidationContext) {
    let label = format!("Timeline {timeline_id}: timeline_level");
    let scope = Scope::Timeline(timeline_id);

    if !context.check_type(timeline_level, JsonKind::Object, &label, scope) {
        return;
    }
    let Some(object) = timeline_level.as_object() else {
        return;
    };
    if object.is_empty() {
        context.error(scope, format!("{label} is empty"));
        return;
    }
    if !context.check_required_fields(object, &["summary"], &label, scope) {
        return;
    }

    let summary = &object["summary"];
    if context.check_type(summary, JsonKind::String, &format!("{label} summary"), scope)
        && summary.as_str().is_some_and(|text| text.trim().is_empty())
    {
        context.warning(format!("{label} summary is empty"));
    }
}

fn validate_post_level(
    post_level: &Value,
    timeline_id: &str,
    expected_posts: &[String],
    context: &mut ValidationContext,
) {
    let label = format!("Timeline {timeline_id}: post_level");
    let scope = Scope::Timeline(timeline_id);

    if !context.check_type(post_level, JsonKind::Object, &label, scope) {
        return;
    }
    let Some(posts) = post_level.as_object() else {
        return;
    };
    if posts.is_empty() {
        context.error(scope, format!("{label} contains no posts"));
        return;
    }

    let missing = expected_posts
        .iter()
        .filter(|post_id| !posts.contains_key(post_id.as_str()))
        .collect::<BTreeSet<&String>>();
    if !missing.is_empty() {
        let listed = missing
            .iter()
            .map(|post_id| post_id.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        context.error(scope, format!("{label}: Missing expected posts: {listed}"));
        for post_id in missing {
            context.log_post_issue(timeline_id, post_id);
        }
    }

    let unexpected = posts
        .keys()
        .filter(|post_id| !expected_posts.contains(*post_id))
        .map(String::as_str)
        .collect::<Vec<&str>>();
    if !unexpected.is_empty() {
        context.warning(format!(
            "{label}: Found unexpected posts: {}. They will be ignored during evaluation.",
            unexpected.join(", ")
        ));
    }

    for (post_id, post) in posts {
        validate_post(post, timeline_id, post_id, context);
    }
}

fn validate_post(post: &Value, timeline_id: &str, post_id: &str, context: &mut ValidationContext) {
    let label = format!("Timeline {timeline_id}, Post {post_id}");
    let scope = Scope::Post(timeline_id, post_id);

    if !context.check_type(post, JsonKind::Object, &label, scope) {
        return;
    }
    let Some(object) = post.as_object() else {
        return;
    };
    if object.is_empty() {
        context.error(scope, format!("{label} is empty"));
        return;
    }

    context.check_required_fields(object, POST_FIELDS, &label, scope);

    for field in ["adaptive_evidence", "maladaptive_evidence"] {
        let Some(evidence) = object.get(field) else {
            continue;
        };
        let field_label = format!("{label}: {field}");
        if !context.check_type(evidence, JsonKind::Array, &field_label, scope) {
            continue;
        }
        for (index, span) in evidence.as_array().into_iter().flatten().enumerate() {
            context.check_type(span, JsonKind::String, &format!("{field_label}[{index}]"), scope);
        }
    }

    if let Some(summary) = object.get("summary")
        && context.check_type(summary, JsonKind::String, &format!("{label}: summary"), scope)
        && summary.as_str().is_some_and(|text| text.trim().is_empty())
    {
        context.warning(format!("{label}: summary is empty"));
    }

    if let Some(score) = object.get("wellbeing_score") {
        validate_wellbeing_score(score, &label, scope, context);
    }
}

fn validate_wellbeing_score(
    score: &Value,
    label: &str,
    scope: Scope<'_>,
    context: &mut ValidationContext,
) {
    let reading = ScoreReading::from_json(Some(score));

    match reading {
        ScoreReading::Missing => return,
        ScoreReading::Malformed { found } => {
            context.error(
                scope,
                format!("{label}: wellbeing_score: Expected integer, got {found}"),
            );
            return;
        }
        ScoreReading::Float { raw, truncated } => context.warning(format!(
            "{label}: Well-being score is float ({raw}). It will be truncated to {truncated} during evaluation."
        )),
        ScoreReading::NumericString(_) | ScoreReading::Integer(_) => {}
    }

    if reading.is_out_of_range() {
        let written = reading
            .numeric()
            .map(|value| value.to_string())
            .unwrap_or_else(|| score.to_string());
        context.error(
            scope,
            format!("{label}: Well-being score must be between 1 and 10 (inclusive), got {written}."),
        );
    }
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(object) => object.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
