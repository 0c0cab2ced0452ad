//! Draft persistence types.
//!
//! These types model the composite storage key, the stored draft envelope,
//! and the in-memory projections (metadata, auto-save status) that the
//! registry keeps for cheap UI lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::form::{FormData, FormType};

/// User id used when no authenticated identity is available.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Separator between key segments.
const KEY_SEPARATOR: char = '_';

/// Composite identity of a draft: `(formType, courseId, lessonId, userId)`.
///
/// Rendered as `<namespace>_<formType>_<courseId>_<lessonId>_<userId>`.
/// Segments containing `_` or `%` are percent-escaped, so distinct tuples
/// never render to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    pub form_type: FormType,
    pub course_id: String,
    pub lesson_id: String,
    pub user_id: String,
}

impl StorageKey {
    pub fn new(
        form_type: FormType,
        course_id: impl Into<String>,
        lesson_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            form_type: form_type.canonical(),
            course_id: course_id.into(),
            lesson_id: lesson_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Render the key under the given namespace prefix.
    pub fn render(&self, namespace: &str) -> String {
        format!(
            "{namespace}_{}_{}_{}_{}",
            escape_segment(self.form_type.as_str()),
            escape_segment(&self.course_id),
            escape_segment(&self.lesson_id),
            escape_segment(&self.user_id),
        )
    }

    /// Recover a key from its rendered form.
    ///
    /// Returns `None` for keys outside the namespace or with the wrong
    /// number of segments.
    pub fn parse(namespace: &str, raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(namespace)?.strip_prefix(KEY_SEPARATOR)?;
        let parts: Vec<&str> = rest.split(KEY_SEPARATOR).collect();
        let [form_type, course_id, lesson_id, user_id] = parts.as_slice() else {
            return None;
        };
        Some(Self {
            form_type: FormType::from(unescape_segment(form_type)?),
            course_id: unescape_segment(course_id)?,
            lesson_id: unescape_segment(lesson_id)?,
            user_id: unescape_segment(user_id)?,
        })
    }

    /// Whether this key belongs to the given course/lesson/user scope.
    pub fn in_scope(&self, course_id: &str, lesson_id: &str, user_id: &str) -> bool {
        self.course_id == course_id && self.lesson_id == lesson_id && self.user_id == user_id
    }
}

fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            '_' => out.push_str("%5F"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_segment(segment: &str) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let code: String = chars.by_ref().take(2).collect();
        match code.as_str() {
            "25" => out.push('%'),
            "5F" => out.push('_'),
            _ => return None,
        }
    }
    Some(out)
}

/// Stored envelope around a form payload.
///
/// Serialized as `{"version": ..., "timestamp": <RFC 3339>, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    #[serde(rename = "version")]
    pub format_version: String,
    #[serde(rename = "timestamp")]
    pub saved_at: DateTime<Utc>,
    #[serde(rename = "data")]
    pub payload: FormData,
}

/// A draft successfully read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDraft {
    pub payload: FormData,
    pub saved_at: DateTime<Utc>,
}

/// Registry view of what is in storage for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftMetadata {
    /// Rendered storage key.
    pub key: String,
    pub saved_at: DateTime<Utc>,
    pub format_version: String,
    /// False when the stored payload has no questions and an empty title.
    pub has_data: bool,
}

impl DraftMetadata {
    /// Derive metadata from a decoded record.
    pub fn from_record(key: impl Into<String>, record: &DraftRecord) -> Self {
        let payload = &record.payload;
        let has_title = payload.title().is_some_and(|t| !t.trim().is_empty());
        Self {
            key: key.into(),
            saved_at: record.saved_at,
            format_version: record.format_version.clone(),
            has_data: has_title || payload.question_count() > 0,
        }
    }
}

/// Coarse auto-save phase derived from [`AutoSaveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSavePhase {
    Idle,
    Saving,
    Saved,
    Errored,
}

/// Per-key auto-save indicator state.
///
/// `idle -> saving -> (saved | errored)`; a new attempt moves either end
/// state back through `saving`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoSaveStatus {
    pub saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl AutoSaveStatus {
    pub fn phase(&self) -> AutoSavePhase {
        if self.saving {
            AutoSavePhase::Saving
        } else if self.error.is_some() {
            AutoSavePhase::Errored
        } else if self.last_saved.is_some() {
            AutoSavePhase::Saved
        } else {
            AutoSavePhase::Idle
        }
    }

    /// A save attempt began. Clears any previous error.
    pub fn begin(&mut self) {
        self.saving = true;
        self.error = None;
    }

    pub fn succeed(&mut self, saved_at: DateTime<Utc>) {
        self.saving = false;
        self.last_saved = Some(saved_at);
        self.error = None;
    }

    /// A save attempt failed. `last_saved` is preserved.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.saving = false;
        self.error = Some(error.into());
    }
}

/// Snapshot of storage usage for quota display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub available: bool,
    pub used_bytes: u64,
    pub ceiling_bytes: u64,
    pub draft_count: usize,
}

impl StorageInfo {
    /// Share of the ceiling in use, in percent.
    pub fn usage_percent(&self) -> f64 {
        if self.ceiling_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.ceiling_bytes as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(course: &str) -> StorageKey {
        StorageKey::new(FormType::MultipleChoice, course, "lesson1", "user1")
    }

    #[test]
    fn test_render_matches_documented_format() {
        assert_eq!(
            key("course1").render("task_draft"),
            "task_draft_multipleChoice_course1_lesson1_user1"
        );
    }

    #[test]
    fn test_parse_inverts_render() {
        let k = StorageKey::new(FormType::Other("essay".into()), "c_1", "l%2", ANONYMOUS_USER);
        let raw = k.render("task_draft");
        assert_eq!(StorageKey::parse("task_draft", &raw), Some(k));
    }

    #[test]
    fn test_underscore_ids_do_not_collide() {
        let a = StorageKey::new(FormType::TrueFalse, "a_b", "c", "u");
        let b = StorageKey::new(FormType::TrueFalse, "a", "b_c", "u");
        assert_ne!(a.render("ns"), b.render("ns"));
    }

    #[test]
    fn test_known_name_spelled_as_other_shares_the_key() {
        let spelled = StorageKey::new(FormType::Other("trueFalse".into()), "c1", "l1", "u1");
        let variant = StorageKey::new(FormType::TrueFalse, "c1", "l1", "u1");
        assert!(matches!(spelled.form_type, FormType::TrueFalse));
        assert_eq!(spelled, variant);
        assert_eq!(spelled.render("ns"), variant.render("ns"));

        let essay = StorageKey::new(FormType::Other("essay".into()), "c1", "l1", "u1");
        assert_ne!(essay, variant);
        assert_ne!(essay.render("ns"), variant.render("ns"));
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert_eq!(StorageKey::parse("task_draft", "theme"), None);
        assert_eq!(StorageKey::parse("task_draft", "task_draft_trueFalse_c1"), None);
        assert_eq!(StorageKey::parse("task_draft", "task_draftx_trueFalse_c_l_u"), None);
        assert_eq!(StorageKey::parse("task_draft", "task_draft_trueFalse_c%zz_l_u"), None);
    }

    #[test]
    fn test_in_scope() {
        let k = key("course1");
        assert!(k.in_scope("course1", "lesson1", "user1"));
        assert!(!k.in_scope("course1", "lesson1", "user2"));
    }

    #[test]
    fn test_record_wire_format() {
        let record = DraftRecord {
            format_version: "1.0".into(),
            saved_at: "2026-01-02T03:04:05Z".parse().unwrap(),
            payload: FormData::new(json!({"title": "Quiz"})),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["data"]["title"], "Quiz");
        assert!(value["timestamp"].as_str().unwrap().starts_with("2026-01-02T03:04:05"));
    }

    #[test]
    fn test_metadata_has_data() {
        let record = DraftRecord {
            format_version: "1.0".into(),
            saved_at: Utc::now(),
            payload: FormData::template(&FormType::TrueFalse, "c", "l"),
        };
        assert!(!DraftMetadata::from_record("k", &record).has_data);
    }

    #[test]
    fn test_status_transitions() {
        let mut status = AutoSaveStatus::default();
        assert_eq!(status.phase(), AutoSavePhase::Idle);

        status.begin();
        assert_eq!(status.phase(), AutoSavePhase::Saving);

        let ts = Utc::now();
        status.succeed(ts);
        assert_eq!(status.phase(), AutoSavePhase::Saved);

        status.begin();
        status.fail("quota exceeded");
        assert_eq!(status.phase(), AutoSavePhase::Errored);
        assert_eq!(status.last_saved, Some(ts));

        status.begin();
        assert!(status.error.is_none());
    }

    #[test]
    fn test_usage_percent() {
        let info = StorageInfo {
            available: true,
            used_bytes: 512,
            ceiling_bytes: 1024,
            draft_count: 1,
        };
        assert!((info.usage_percent() - 50.0).abs() < f64::EPSILON);
    }
}
