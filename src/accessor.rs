use crate::dom::{Document, ElementId};

/// Element kinds that can back a field reference, in search order.
const CANDIDATE_TAGS: [&str; 4] = ["input", "select", "div", "textarea"];

/// Find the element a field name refers to: the first element in document
/// order whose tag is a candidate kind and whose `name` attribute matches.
pub fn find_field(doc: &Document, name: &str) -> Option<ElementId> {
    if name.is_empty() {
        return None;
    }
    doc.attached().into_iter().find(|id| {
        doc.element(*id).map_or(false, |el| {
            CANDIDATE_TAGS.iter().any(|tag| el.is_tag(tag)) && el.attr("name") == Some(name)
        })
    })
}

/// Resolve the current value of a field.
///
/// Falls back from the interactive value to the static `value` attribute
/// (read-only renderings keep the raw value there) and then to the text
/// content. `None` only when no element matches; callers substitute an
/// empty string.
pub fn resolve(doc: &Document, name: &str) -> Option<String> {
    let id = find_field(doc, name)?;
    let el = doc.element(id)?;
    if let Some(value) = el.value.as_deref().filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }
    if let Some(value) = el.attr("value").filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }
    Some(doc.text_content(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Document {
        Document::from_json(json).unwrap()
    }

    #[test]
    fn interactive_value_wins() {
        let d = doc(r#"[{"tag": "input", "attrs": {"name": "x", "value": "1"}, "value": "2"}]"#);
        assert_eq!(resolve(&d, "x").as_deref(), Some("2"));
    }

    #[test]
    fn falls_back_to_value_attribute_then_text() {
        let d = doc(
            r#"[
            {"tag": "div", "attrs": {"name": "a", "value": "raw"}, "text": "Expanded"},
            {"tag": "div", "attrs": {"name": "b"}, "text": "Only text"}
        ]"#,
        );
        assert_eq!(resolve(&d, "a").as_deref(), Some("raw"));
        assert_eq!(resolve(&d, "b").as_deref(), Some("Only text"));
    }

    #[test]
    fn emptied_input_falls_through_to_attribute() {
        let d = doc(r#"[{"tag": "input", "attrs": {"name": "x", "value": "7"}, "value": ""}]"#);
        assert_eq!(resolve(&d, "x").as_deref(), Some("7"));
    }

    #[test]
    fn non_candidate_tags_are_ignored() {
        let d = doc(
            r#"[
            {"tag": "span", "attrs": {"name": "x"}, "text": "no"},
            {"tag": "textarea", "attrs": {"name": "x"}, "value": "yes"}
        ]"#,
        );
        assert_eq!(resolve(&d, "x").as_deref(), Some("yes"));
    }

    #[test]
    fn first_match_in_document_order() {
        let d = doc(
            r#"[
            {"tag": "select", "attrs": {"name": "x"}, "value": "first"},
            {"tag": "input", "attrs": {"name": "x"}, "value": "second"}
        ]"#,
        );
        assert_eq!(resolve(&d, "x").as_deref(), Some("first"));
    }

    #[test]
    fn missing_field_is_absent() {
        let d = doc(r#"[{"tag": "input", "attrs": {"name": "x"}}]"#);
        assert_eq!(resolve(&d, "y"), None);
        assert_eq!(resolve(&d, ""), None);
        assert_eq!(resolve(&d, "x").as_deref(), Some(""));
    }
}
