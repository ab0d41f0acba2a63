use crate::config::AttributeConfig;
use crate::dom::{has_class, Document, ElementId};

/// How a conditional element reacts to its expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalMode {
    /// Show or hide the whole element.
    Visibility,
    /// Fade the element and lock the fields inside it.
    Readonly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub element: ElementId,
    /// Raw expression; `None` when the element lacks the attribute.
    pub expression: Option<String>,
    pub mode: ConditionalMode,
    pub eval_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub element: ElementId,
    pub expression: Option<String>,
    /// Id of the element receiving the result text.
    pub target_id: Option<String>,
    pub eval_url: Option<String>,
}

/// The elements carrying declarative logic, discovered once per document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub conditionals: Vec<Conditional>,
    pub computed: Vec<Computed>,
    /// Form controls whose changes trigger a refresh.
    pub tracked: Vec<ElementId>,
}

impl Registry {
    pub fn build(doc: &Document, attrs: &AttributeConfig) -> Self {
        let mut registry = Registry::default();
        for (id, el) in doc.iter() {
            let expression = || el.attr(&attrs.expression).map(str::to_string);
            if has_class(el, &attrs.conditional_class) {
                let mode = if has_class(el, &attrs.readonly_class) {
                    ConditionalMode::Readonly
                } else {
                    ConditionalMode::Visibility
                };
                registry.conditionals.push(Conditional {
                    element: id,
                    expression: expression(),
                    mode,
                    eval_url: eval_url(doc, id, attrs),
                });
            }
            if has_class(el, &attrs.computed_class) {
                registry.computed.push(Computed {
                    element: id,
                    expression: expression(),
                    target_id: el.attr(&attrs.target).map(str::to_string),
                    eval_url: eval_url(doc, id, attrs),
                });
            }
            if el.is_form_control() && is_inside_tracked_form(doc, id, attrs) {
                registry.tracked.push(id);
            }
        }
        log::debug!(
            "registry: {} conditionals, {} computed, {} tracked fields",
            registry.conditionals.len(),
            registry.computed.len(),
            registry.tracked.len()
        );
        registry
    }

    /// The first tracked control with the given `name`.
    pub fn tracked_field(&self, doc: &Document, name: &str) -> Option<ElementId> {
        self.tracked
            .iter()
            .copied()
            .find(|id| doc.element(*id).and_then(|el| el.attr("name")) == Some(name))
    }
}

/// Eval URL of the enclosing form, if set and non-empty.
fn eval_url(doc: &Document, id: ElementId, attrs: &AttributeConfig) -> Option<String> {
    let form = doc.closest(id, |el| el.is_tag("form"))?;
    doc.element(form)?
        .attr(&attrs.eval_url)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
}

/// Inside a `form` which is itself inside the form container. An empty
/// container class drops the container requirement.
fn is_inside_tracked_form(doc: &Document, id: ElementId, attrs: &AttributeConfig) -> bool {
    let Some(form) = doc.closest(id, |el| el.is_tag("form")) else {
        return false;
    };
    attrs.form_container_class.is_empty()
        || doc
            .closest(form, |el| has_class(el, &attrs.form_container_class))
            .is_some()
}
