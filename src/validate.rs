use crate::accessor;
use crate::builder;
use crate::config::Config;
use crate::dom::{Document, ElementId};
use crate::registry::Registry;
use regex::Regex;
use std::sync::OnceLock;

// ── Error types ─────────────────────────────────────────────────────

/// A problem with the declarative logic of a form page.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
    /// Snapshot key of the element carrying the logic.
    pub element: String,
    /// Machine-readable error code.
    pub code: &'static str,
}

// ── Form validation ─────────────────────────────────────────────────

/// Check every registered conditional and computed element.
///
/// Returns an empty vec when all expressions are present, every referenced
/// field exists and every computed target resolves. Problems here never
/// stop a session; they explain placeholders and hidden sections.
pub fn validate_form(doc: &Document, registry: &Registry, config: &Config) -> Vec<ValidationError> {
    let name_pattern = field_name_pattern();
    let mut errors = Vec::new();

    let expressions = registry
        .conditionals
        .iter()
        .map(|c| (c.element, c.expression.as_deref()))
        .chain(
            registry
                .computed
                .iter()
                .map(|c| (c.element, c.expression.as_deref())),
        );
    for (element, expression) in expressions {
        match expression {
            Some(expr) => check_references(doc, element, expr, name_pattern, &mut errors),
            None => errors.push(ValidationError {
                message: format!(
                    "Missing expression attribute \"{}\"",
                    config.attributes.expression
                ),
                element: doc.key(element),
                code: "missing-expression",
            }),
        }
    }

    for computed in &registry.computed {
        let message = match computed.target_id.as_deref() {
            None => format!(
                "Missing target attribute \"{}\"",
                config.attributes.target
            ),
            Some(target) if doc.by_id(target).is_none() => {
                format!("Target element \"{}\" does not exist", target)
            }
            Some(_) => continue,
        };
        errors.push(ValidationError {
            message,
            element: doc.key(computed.element),
            code: "missing-target",
        });
    }

    errors
}

fn check_references(
    doc: &Document,
    element: ElementId,
    expression: &str,
    name_pattern: &Regex,
    errors: &mut Vec<ValidationError>,
) {
    for name in builder::field_references(expression) {
        if !name_pattern.is_match(&name) {
            errors.push(ValidationError {
                message: format!("Invalid field reference \"{}\"", name),
                element: doc.key(element),
                code: "invalid-field-name",
            });
        } else if accessor::find_field(doc, &name).is_none() {
            errors.push(ValidationError {
                message: format!("Reference to unknown field \"{}\"", name),
                element: doc.key(element),
                code: "unknown-field",
            });
        }
    }
}

fn field_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$") {
        Ok(re) => re,
        Err(e) => unreachable!("field name pattern is valid: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(json: &str) -> Vec<ValidationError> {
        let doc = Document::from_json(json).unwrap();
        let config = Config::default();
        let registry = Registry::build(&doc, &config.attributes);
        validate_form(&doc, &registry, &config)
    }

    #[test]
    fn well_formed_page_has_no_errors() {
        let errors = validate(
            r#"[
            {"tag": "input", "attrs": {"name": "age"}},
            {"tag": "div", "attrs": {"class": "formbar-conditional", "expr": "$age >= 18"}},
            {"tag": "div", "attrs": {"class": "formbar-evaluate", "expr": "$age * 12", "id": "months"}}
        ]"#,
        );
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn reports_each_problem_with_its_code() {
        let errors = validate(
            r#"[
            {"tag": "div", "attrs": {"class": "formbar-conditional"}},
            {"tag": "div", "attrs": {"class": "formbar-conditional", "expr": "$ghost > 1 and $(x"}},
            {"tag": "div", "attrs": {"class": "formbar-evaluate", "expr": "1", "id": "a", "target": "b"}},
            {"tag": "div", "attrs": {"class": "formbar-evaluate", "expr": "1"}}
        ]"#,
        );
        let codes: Vec<&str> = errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                "missing-expression",
                "unknown-field",
                "invalid-field-name",
                "missing-target"
            ]
        );
        assert_eq!(errors[0].element, "@0");
        assert_eq!(errors[3].element, "@3");
    }

    #[test]
    fn field_name_pattern_is_compiled_once() {
        assert!(std::ptr::eq(field_name_pattern(), field_name_pattern()));
        assert!(field_name_pattern().is_match("order.total-2"));
        assert!(!field_name_pattern().is_match("(x"));
    }
}
