use super::*;

/// Where a structural problem was found; decides which issue sets it lands in.
#[derive(Copy, Clone, Debug)]
pub(super) enum Scope<'a> {
    File,
    Timeline(&'a str),
    Post(&'a str, &'a str),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum JsonKind {
    Object,
    Array,
    String,
}

impl JsonKind {
    fn name(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
        }
    }
}

/// Accumulates every issue found in one submission; checks never stop early.
#[derive(Debug)]
pub struct ValidationContext {
    pub valid: bool,
    pub timelines_with_issues: BTreeSet<String>,
    pub posts_with_issues: BTreeSet<(String, String)>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            valid: true,
            timelines_with_issues: BTreeSet::new(),
            posts_with_issues: BTreeSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationContext {
    pub fn log_timeline_issue(&mut self, timeline_id: &str) {
        self.timelines_with_issues.insert(timeline_id.to_string());
        self.valid = false;
    }

    pub fn log_post_issue(&mut self, timeline_id: &str, post_id: &str) {
        self.posts_with_issues
            .insert((timeline_id.to_string(), post_id.to_string()));
        self.log_timeline_issue(timeline_id);
    }

    pub(super) fn flag(&mut self, scope: Scope<'_>) {
        match scope {
            Scope::File => self.valid = false,
            Scope::Timeline(timeline_id) => self.log_timeline_issue(timeline_id),
            Scope::Post(timeline_id, post_id) => self.log_post_issue(timeline_id, post_id),
        }
    }

    pub(super) fn error(&mut self, scope: Scope<'_>, message: String) {
        error!("{message}");
        self.errors.push(message);
        self.flag(scope);
    }

    pub(super) fn warning(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    pub(super) fn check_type(
        &mut self,
        value: &Value,
        expected: JsonKind,
        context: &str,
        scope: Scope<'_>,
    ) -> bool {
        if expected.matches(value) {
            return true;
        }

        self.error(
            scope,
            format!(
                "{context}: Expected {}, got {}",
                expected.name(),
                json_type_name(value)
            ),
        );
        false
    }

    pub(super) fn check_required_fields(
        &mut self,
        object: &Map<String, Value>,
        required: &[&str],
        context: &str,
        scope: Scope<'_>,
    ) -> bool {
        let missing = required
            .iter()
            .filter(|field| !object.contains_key(**field))
            .copied()
            .collect::<Vec<&str>>();

        if missing.is_empty() {
            return true;
        }

        self.error(
            scope,
            format!("{context}: Missing required fields: {}", missing.join(", ")),
        );
        false
    }

    pub fn into_report(self, file_path: &Path, split: Split) -> ValidationReport {
        ValidationReport {
            generated_at: now_utc_string(),
            file_path: file_path.display().to_string(),
            split: split.as_str().to_string(),
            status: if self.valid { "pass" } else { "fail" }.to_string(),
            valid: self.valid,
            timelines_with_issues: self.timelines_with_issues.into_iter().collect(),
            posts_with_issues: self
                .posts_with_issues
                .into_iter()
                .map(|(timeline_id, post_id)| PostIssue {
                    timeline_id,
                    post_id,
                })
                .collect(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PostIssue {
    pub timeline_id: String,
    pub post_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub generated_at: String,
    pub file_path: String,
    pub split: String,
    pub status: String,
    pub valid: bool,
    pub timelines_with_issues: Vec<String>,
    pub posts_with_issues: Vec<PostIssue>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}
