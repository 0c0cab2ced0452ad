//! Structural validation of draft payloads.
//!
//! Drafts are unpublished, so these checks only guard shape, not
//! completeness: a multiple-choice question with no correct option is a
//! valid draft. Form types without a dedicated validator are accepted
//! without any checks so that new form kinds can still be stored.

use serde_json::Value;
use taskdraft_types::error::FormValidationError;
use taskdraft_types::form::{
    FIELD_COURSE_ID, FIELD_LESSON_ID, FIELD_QUESTIONS, FIELD_TITLE, FIELD_TYPE, FormData, FormType,
};

/// Fields every known form type must carry.
const REQUIRED_FIELDS: [&str; 5] = [
    FIELD_TITLE,
    FIELD_TYPE,
    FIELD_QUESTIONS,
    FIELD_COURSE_ID,
    FIELD_LESSON_ID,
];

/// Whether `data` is a structurally valid draft of `form_type`.
pub fn validate(form_type: &FormType, data: &FormData) -> bool {
    check(form_type, data).is_ok()
}

/// Validate `data` as a draft of `form_type`, reporting the first problem.
pub fn check(form_type: &FormType, data: &FormData) -> Result<(), FormValidationError> {
    let form_type = form_type.clone().canonical();
    if let FormType::Other(name) = &form_type {
        tracing::debug!(form_type = %name, "no validator for form type, accepting draft");
        return Ok(());
    }

    check_required(data, &REQUIRED_FIELDS)?;
    let questions = data
        .get(FIELD_QUESTIONS)
        .and_then(Value::as_array)
        .ok_or_else(|| FormValidationError::NotAList(FIELD_QUESTIONS.to_string()))?;

    for (index, question) in questions.iter().enumerate() {
        let result = match &form_type {
            FormType::MultipleChoice => check_multiple_choice(question),
            FormType::TrueFalse => check_true_false(question),
            FormType::FillInBlanks => check_fill_in_blanks(question),
            FormType::Other(_) => Ok(()),
        };
        result.map_err(|reason| FormValidationError::InvalidQuestion { index, reason })?;
    }

    Ok(())
}

/// Check that every field in `fields` is present and not null.
pub fn check_required(data: &FormData, fields: &[&str]) -> Result<(), FormValidationError> {
    let Value::Object(map) = data.as_value() else {
        return Err(FormValidationError::NotAnObject);
    };
    for field in fields {
        match map.get(*field) {
            None | Some(Value::Null) => {
                return Err(FormValidationError::MissingField((*field).to_string()));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn has_id(value: &Value) -> bool {
    !matches!(value.get("id"), None | Some(Value::Null))
}

fn has_non_empty_id(value: &Value) -> bool {
    match value.get("id") {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

fn check_multiple_choice(question: &Value) -> Result<(), String> {
    if !has_non_empty_id(question) {
        return Err("missing id".to_string());
    }
    let options = question
        .get("options")
        .and_then(Value::as_array)
        .ok_or("options must be a list")?;
    if options.len() < 2 {
        return Err(format!("needs at least 2 options, has {}", options.len()));
    }
    for (i, option) in options.iter().enumerate() {
        if !has_id(option) {
            return Err(format!("option {i} is missing an id"));
        }
        if !option.get("isCorrect").is_some_and(Value::is_boolean) {
            return Err(format!("option {i} needs a boolean isCorrect"));
        }
    }
    Ok(())
}

fn check_true_false(question: &Value) -> Result<(), String> {
    if !has_id(question) {
        return Err("missing id".to_string());
    }
    if !question.get("correctAnswer").is_some_and(Value::is_boolean) {
        return Err("needs a boolean correctAnswer".to_string());
    }
    Ok(())
}

fn check_fill_in_blanks(question: &Value) -> Result<(), String> {
    if !has_id(question) {
        return Err("missing id".to_string());
    }
    let blanks = question
        .get("blanks")
        .and_then(Value::as_array)
        .ok_or("blanks must be a list")?;
    if blanks.is_empty() {
        return Err("needs at least 1 blank".to_string());
    }
    if let Some(i) = blanks.iter().position(|b| !has_id(b)) {
        return Err(format!("blank {i} is missing an id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(form_type: &str, questions: Value) -> FormData {
        FormData::new(json!({
            "title": "Draft",
            "type": form_type,
            "questions": questions,
            "courseId": "c1",
            "lessonId": "l1"
        }))
    }

    #[test]
    fn empty_template_is_valid() {
        let t = FormData::template(&FormType::MultipleChoice, "c1", "l1");
        assert!(validate(&FormType::MultipleChoice, &t));
    }

    #[test]
    fn missing_required_field_is_reported_in_order() {
        let data = FormData::new(json!({"type": "trueFalse", "questions": []}));
        assert_eq!(
            check(&FormType::TrueFalse, &data),
            Err(FormValidationError::MissingField("title".into()))
        );
    }

    #[test]
    fn null_field_counts_as_missing() {
        let mut data = form("trueFalse", json!([]));
        data.set("lessonId", Value::Null);
        assert_eq!(
            check(&FormType::TrueFalse, &data),
            Err(FormValidationError::MissingField("lessonId".into()))
        );
    }

    #[test]
    fn questions_must_be_a_list() {
        let data = form("trueFalse", json!({"q1": {}}));
        assert_eq!(
            check(&FormType::TrueFalse, &data),
            Err(FormValidationError::NotAList("questions".into()))
        );
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let data = FormData::new(json!(["title"]));
        assert_eq!(
            check(&FormType::FillInBlanks, &data),
            Err(FormValidationError::NotAnObject)
        );
    }

    #[test]
    fn multiple_choice_without_correct_option_is_valid() {
        let data = form(
            "multipleChoice",
            json!([{
                "id": "q1",
                "text": "Pick one",
                "options": [
                    {"id": "a", "text": "A", "isCorrect": false},
                    {"id": "b", "text": "B", "isCorrect": false}
                ]
            }]),
        );
        assert!(validate(&FormType::MultipleChoice, &data));
    }

    #[test]
    fn multiple_choice_needs_two_options() {
        let data = form(
            "multipleChoice",
            json!([{"id": "q1", "options": [{"id": "a", "isCorrect": true}]}]),
        );
        let err = check(&FormType::MultipleChoice, &data).unwrap_err();
        assert!(matches!(err, FormValidationError::InvalidQuestion { index: 0, .. }));
    }

    #[test]
    fn multiple_choice_rejects_empty_id_and_non_boolean_flag() {
        let empty_id = form(
            "multipleChoice",
            json!([{"id": "", "options": [{"id": "a", "isCorrect": true}, {"id": "b", "isCorrect": false}]}]),
        );
        assert!(!validate(&FormType::MultipleChoice, &empty_id));

        let string_flag = form(
            "multipleChoice",
            json!([{"id": "q1", "options": [{"id": "a", "isCorrect": "yes"}, {"id": "b", "isCorrect": false}]}]),
        );
        assert!(!validate(&FormType::MultipleChoice, &string_flag));
    }

    #[test]
    fn true_false_requires_correct_answer() {
        let mut questions = json!([
            {"id": "q1", "text": "Sky is blue", "correctAnswer": true},
            {"id": "q2", "text": "Fire is cold", "correctAnswer": false}
        ]);
        assert!(validate(&FormType::TrueFalse, &form("trueFalse", questions.clone())));

        questions[1].as_object_mut().unwrap().remove("correctAnswer");
        assert!(!validate(&FormType::TrueFalse, &form("trueFalse", questions)));
    }

    #[test]
    fn fill_in_blanks_requires_identified_blanks() {
        let ok = form("fillInBlanks", json!([{"id": "q1", "blanks": [{"id": "b1", "answer": "x"}]}]));
        assert!(validate(&FormType::FillInBlanks, &ok));

        let none = form("fillInBlanks", json!([{"id": "q1", "blanks": []}]));
        assert!(!validate(&FormType::FillInBlanks, &none));

        let unnamed = form("fillInBlanks", json!([{"id": "q1", "blanks": [{"answer": "x"}]}]));
        let err = check(&FormType::FillInBlanks, &unnamed).unwrap_err();
        assert_eq!(err.to_string(), "question 0: blank 0 is missing an id");
    }

    #[test]
    fn known_type_named_through_other_is_still_validated() {
        let spelled = FormType::Other("trueFalse".into());
        let bad = form("trueFalse", json!([{"id": "q1", "correctAnswer": "yes"}]));
        let err = check(&spelled, &bad).unwrap_err();
        assert_eq!(err.to_string(), "question 0: needs a boolean correctAnswer");

        let good = form("trueFalse", json!([{"id": "q1", "correctAnswer": true}]));
        assert!(validate(&spelled, &good));
    }

    #[test]
    fn unknown_form_type_fails_open() {
        let data = FormData::new(json!({"anything": true}));
        assert!(validate(&FormType::Other("essay".into()), &data));
    }
}
