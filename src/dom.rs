use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{FormbarError, Result};

/// Index of an element in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

/// Display state written by the refreshers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub visible: bool,
    pub opacity: f64,
    /// Duration of the last opacity transition, if one was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_ms: Option<u64>,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            visible: true,
            opacity: 1.0,
            transition_ms: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag_name: String,
    pub attrs: BTreeMap<String, String>,
    /// Current interactive value. `None` for elements that have none.
    pub value: Option<String>,
    /// Own text, rendered before the children.
    pub text: String,
    pub readonly: bool,
    pub style: Style,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// `input`, `select` and `textarea` carry an interactive value.
    pub fn is_form_control(&self) -> bool {
        self.is_tag("input") || self.is_tag("select") || self.is_tag("textarea")
    }
}

pub fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attr("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

/// Serialized shape of a document tree.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

/// A rendered form page: a flat arena of elements in document order.
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: Vec<Element>,
    roots: Vec<ElementId>,
    id_index: HashMap<String, ElementId>,
}

impl Document {
    /// Load a document from JSON: either a single element tree or an
    /// array of top-level trees.
    pub fn from_json(input: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(input)?;
        let specs: Vec<ElementSpec> = if raw.is_array() {
            serde_json::from_value(raw)?
        } else {
            vec![serde_json::from_value(raw)?]
        };
        Self::from_specs(&specs)
    }

    pub fn from_specs(specs: &[ElementSpec]) -> Result<Self> {
        let mut doc = Document::default();
        for spec in specs {
            let id = doc.insert(spec, None)?;
            doc.roots.push(id);
        }
        Ok(doc)
    }

    fn insert(&mut self, spec: &ElementSpec, parent: Option<ElementId>) -> Result<ElementId> {
        if spec.tag.trim().is_empty() {
            return Err(FormbarError::Document {
                details: "element with empty tag name".to_string(),
            });
        }
        let id = ElementId(self.elements.len());
        let value = match &spec.value {
            Some(v) => Some(v.clone()),
            None if is_control_tag(&spec.tag) => {
                Some(spec.attrs.get("value").cloned().unwrap_or_default())
            }
            None => None,
        };
        self.elements.push(Element {
            tag_name: spec.tag.to_ascii_lowercase(),
            attrs: spec.attrs.clone(),
            value,
            text: spec.text.clone(),
            readonly: spec.attrs.contains_key("readonly"),
            style: Style::default(),
            parent,
            children: Vec::new(),
        });
        if let Some(html_id) = spec.attrs.get("id") {
            if self.id_index.contains_key(html_id) {
                return Err(FormbarError::Document {
                    details: format!("duplicate element id {:?}", html_id),
                });
            }
            self.id_index.insert(html_id.clone(), id);
        }
        for child in &spec.children {
            let child_id = self.insert(child, Some(id))?;
            self.elements[id.0].children.push(child_id);
        }
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    /// All elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, el)| (ElementId(i), el))
    }

    /// Elements still attached to the tree, in document order.
    pub fn attached(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        for root in &self.roots {
            out.push(*root);
            out.extend(self.descendants(*root));
        }
        out
    }

    pub fn by_id(&self, html_id: &str) -> Option<ElementId> {
        self.id_index.get(html_id).copied()
    }

    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(self.element(id).and_then(|el| el.parent), move |cur| {
            self.element(*cur).and_then(|el| el.parent)
        })
    }

    /// Nearest ancestor (excluding `id` itself) satisfying `pred`.
    pub fn closest(&self, id: ElementId, pred: impl Fn(&Element) -> bool) -> Option<ElementId> {
        self.ancestors(id)
            .find(|a| self.element(*a).map_or(false, &pred))
    }

    /// Descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = match self.element(id) {
            Some(el) => el.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(cur) = stack.pop() {
            out.push(cur);
            if let Some(el) = self.element(cur) {
                stack.extend(el.children.iter().rev().copied());
            }
        }
        out
    }

    /// Own text followed by the text of all descendants.
    pub fn text_content(&self, id: ElementId) -> String {
        let mut out = String::new();
        if let Some(el) = self.element(id) {
            out.push_str(&el.text);
        }
        for d in self.descendants(id) {
            if let Some(el) = self.element(d) {
                out.push_str(&el.text);
            }
        }
        out
    }

    /// Replace the content of an element with plain text.
    pub fn set_text(&mut self, id: ElementId, text: &str) {
        let children = match self.element_mut(id) {
            Some(el) => {
                el.text = text.to_string();
                std::mem::take(&mut el.children)
            }
            None => return,
        };
        for child in children {
            if let Some(el) = self.element_mut(child) {
                el.parent = None;
            }
        }
    }

    /// A stable key for snapshots: the `id` attribute, else the `name`
    /// attribute, else the arena index.
    pub fn key(&self, id: ElementId) -> String {
        match self.element(id) {
            Some(el) => el
                .attr("id")
                .map(|v| format!("#{}", v))
                .or_else(|| el.attr("name").map(|v| format!("[name={}]", v)))
                .unwrap_or_else(|| format!("@{}", id.0)),
            None => format!("@{}", id.0),
        }
    }
}

fn is_control_tag(tag: &str) -> bool {
    ["input", "select", "textarea"]
        .iter()
        .any(|t| tag.eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "tag": "div", "attrs": {"class": "formbar-form"},
        "children": [
            {"tag": "form", "attrs": {"id": "f"}, "children": [
                {"tag": "input", "attrs": {"name": "age", "value": "17"}},
                {"tag": "div", "attrs": {"id": "out"}, "text": "a", "children": [
                    {"tag": "span", "text": "b"}
                ]}
            ]}
        ]
    }"#;

    #[test]
    fn loads_tree_in_document_order() {
        let doc = Document::from_json(PAGE).unwrap();
        assert_eq!(doc.len(), 5);
        let tags: Vec<&str> = doc.iter().map(|(_, el)| el.tag_name.as_str()).collect();
        assert_eq!(tags, ["div", "form", "input", "div", "span"]);
    }

    #[test]
    fn control_value_defaults_to_value_attribute() {
        let doc = Document::from_json(PAGE).unwrap();
        let input = doc.element(ElementId(2)).unwrap();
        assert_eq!(input.value.as_deref(), Some("17"));
        assert_eq!(doc.element(ElementId(3)).unwrap().value, None);
    }

    #[test]
    fn text_content_includes_descendants() {
        let doc = Document::from_json(PAGE).unwrap();
        let out = doc.by_id("out").unwrap();
        assert_eq!(doc.text_content(out), "ab");
    }

    #[test]
    fn set_text_replaces_children() {
        let mut doc = Document::from_json(PAGE).unwrap();
        let out = doc.by_id("out").unwrap();
        doc.set_text(out, "42");
        assert_eq!(doc.text_content(out), "42");
        assert_eq!(doc.attached().len(), 4);
    }

    #[test]
    fn closest_walks_ancestors() {
        let doc = Document::from_json(PAGE).unwrap();
        let form = doc.closest(ElementId(2), |el| el.is_tag("form"));
        assert_eq!(form, Some(ElementId(1)));
        let container = doc.closest(ElementId(2), |el| has_class(el, "formbar-form"));
        assert_eq!(container, Some(ElementId(0)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Document::from_json(
            r#"[{"tag": "div", "attrs": {"id": "x"}}, {"tag": "div", "attrs": {"id": "x"}}]"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "FB-2001");
    }
}
