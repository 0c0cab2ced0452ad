//! Task-authoring form types.
//!
//! `FormType` is the closed set of form kinds the validator knows about,
//! plus an `Other` catch-all so that unknown kinds can still be stored.
//! `FormData` is the editing session's working copy. It is kept as a JSON
//! object so that fields this crate does not know about survive a
//! save/load cycle unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the form title.
pub const FIELD_TITLE: &str = "title";
/// Field holding the form type discriminator.
pub const FIELD_TYPE: &str = "type";
/// Field holding the ordered question list.
pub const FIELD_QUESTIONS: &str = "questions";
/// Field holding the owning course id.
pub const FIELD_COURSE_ID: &str = "courseId";
/// Field holding the owning lesson id.
pub const FIELD_LESSON_ID: &str = "lessonId";

/// Kind of task-authoring form.
///
/// Wire names match the ones used in storage keys and in the `type`
/// field of the payload. Equality and hashing go by wire name, so
/// `Other("trueFalse")` and `TrueFalse` are the same form type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormType {
    MultipleChoice,
    TrueFalse,
    FillInBlanks,
    /// Any form type without a dedicated validator.
    Other(String),
}

impl FormType {
    /// Wire name used in storage keys and payloads.
    pub fn as_str(&self) -> &str {
        match self {
            FormType::MultipleChoice => "multipleChoice",
            FormType::TrueFalse => "trueFalse",
            FormType::FillInBlanks => "fillInBlanks",
            FormType::Other(name) => name,
        }
    }

    /// Whether this form type has a dedicated structural validator.
    pub fn is_known(&self) -> bool {
        Self::known(self.as_str()).is_some()
    }

    /// Fold an `Other` carrying a known wire name onto its dedicated variant.
    pub fn canonical(self) -> Self {
        match self {
            FormType::Other(name) => Self::known(&name).unwrap_or(FormType::Other(name)),
            known => known,
        }
    }

    fn known(name: &str) -> Option<Self> {
        match name {
            "multipleChoice" => Some(FormType::MultipleChoice),
            "trueFalse" => Some(FormType::TrueFalse),
            "fillInBlanks" => Some(FormType::FillInBlanks),
            _ => None,
        }
    }
}

impl PartialEq for FormType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for FormType {}

impl std::hash::Hash for FormType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::known(s).unwrap_or_else(|| FormType::Other(s.to_string())))
    }
}

impl From<String> for FormType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(ft) => ft,
            Err(never) => match never {},
        }
    }
}

impl From<FormType> for String {
    fn from(ft: FormType) -> Self {
        ft.as_str().to_string()
    }
}

/// Working copy of a task-authoring form.
///
/// Always a JSON object in practice; anything else is rejected by the
/// validator rather than by construction so that corrupt payloads read
/// back from storage can still be represented and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(Value);

impl FormData {
    /// Wrap an arbitrary JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Fresh template for a new form: empty title, no questions.
    pub fn template(form_type: &FormType, course_id: &str, lesson_id: &str) -> Self {
        let mut map = Map::new();
        map.insert(FIELD_TITLE.into(), Value::String(String::new()));
        map.insert(FIELD_TYPE.into(), Value::String(form_type.to_string()));
        map.insert(FIELD_QUESTIONS.into(), Value::Array(Vec::new()));
        map.insert(FIELD_COURSE_ID.into(), Value::String(course_id.to_string()));
        map.insert(FIELD_LESSON_ID.into(), Value::String(lesson_id.to_string()));
        Self(Value::Object(map))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a top-level field. No-op when the payload is not an object.
    pub fn set(&mut self, field: &str, value: Value) {
        if let Value::Object(map) = &mut self.0 {
            map.insert(field.to_string(), value);
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.get(FIELD_TITLE).and_then(Value::as_str)
    }

    pub fn course_id(&self) -> Option<&str> {
        self.get(FIELD_COURSE_ID).and_then(Value::as_str)
    }

    pub fn lesson_id(&self) -> Option<&str> {
        self.get(FIELD_LESSON_ID).and_then(Value::as_str)
    }

    /// Number of questions, or zero when the field is missing or malformed.
    pub fn question_count(&self) -> usize {
        self.get(FIELD_QUESTIONS)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Overlay this payload on top of `template`.
    ///
    /// Top-level fields present in `self` win; fields only present in the
    /// template are kept as defaults. Older drafts therefore pick up fields
    /// added to the template after they were saved.
    pub fn merged_over(self, template: &FormData) -> FormData {
        match (template.0.clone(), self.0) {
            (Value::Object(mut base), Value::Object(overlay)) => {
                for (k, v) in overlay {
                    base.insert(k, v);
                }
                FormData(Value::Object(base))
            }
            (_, overlay) => FormData(overlay),
        }
    }

    /// Canonical serialized form used for change detection.
    pub fn fingerprint(&self) -> String {
        self.0.to_string()
    }
}

impl From<Value> for FormData {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
