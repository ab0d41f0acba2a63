//! A refresh runs in stages, computed fields before conditionals, so a
//! conditional reading a computed output sees this refresh's text. Each
//! stage has three steps: `plan` builds the stage's expressions from the
//! current field values, `evaluate_pass` runs them (possibly awaiting
//! remote calls), `apply_*` writes the results into the document.

use log::warn;

use crate::accessor;
use crate::builder;
use crate::config::DisplayConfig;
use crate::dom::{Document, ElementId};
use crate::evaluator::{Evaluator, RuleTransport};
use crate::registry::{ConditionalMode, Registry};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedConditional {
    pub element: ElementId,
    pub built: String,
    pub mode: ConditionalMode,
    pub eval_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedComputed {
    pub element: ElementId,
    pub built: String,
    pub target: ElementId,
    pub eval_url: Option<String>,
}

/// One refresher's share of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Computed,
    Conditionals,
}

/// Which refreshers a refresh covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Conditionals,
    Computed,
}

impl Scope {
    /// Stages in the order they must be planned and applied.
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Scope::All => &[Stage::Computed, Stage::Conditionals],
            Scope::Conditionals => &[Stage::Conditionals],
            Scope::Computed => &[Stage::Computed],
        }
    }
}

/// Expressions of one stage, built against the field values of one
/// generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPlan {
    pub generation: u64,
    pub conditionals: Vec<PlannedConditional>,
    pub computed: Vec<PlannedComputed>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalOutcome {
    pub element: ElementId,
    pub mode: ConditionalMode,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedOutcome {
    pub target: ElementId,
    /// `None` when the result was falsy; the placeholder is shown instead.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassResults {
    pub generation: u64,
    pub conditionals: Vec<ConditionalOutcome>,
    pub computed: Vec<ComputedOutcome>,
}

pub fn plan(doc: &Document, registry: &Registry, generation: u64, stage: Stage) -> RefreshPlan {
    let build = |raw: Option<&str>| {
        builder::build(raw.unwrap_or_default(), |name| accessor::resolve(doc, name))
    };

    let conditionals = if stage != Stage::Conditionals {
        Vec::new()
    } else {
        registry
            .conditionals
            .iter()
            .map(|c| PlannedConditional {
                element: c.element,
                built: build(c.expression.as_deref()),
                mode: c.mode,
                eval_url: c.eval_url.clone(),
            })
            .collect()
    };

    let computed = if stage != Stage::Computed {
        Vec::new()
    } else {
        registry
            .computed
            .iter()
            .filter_map(|c| {
                let target = c.target_id.as_deref().and_then(|t| doc.by_id(t));
                let Some(target) = target else {
                    warn!(
                        "computed element {} has no target element {:?}",
                        doc.key(c.element),
                        c.target_id
                    );
                    return None;
                };
                Some(PlannedComputed {
                    element: c.element,
                    built: build(c.expression.as_deref()),
                    target,
                    eval_url: c.eval_url.clone(),
                })
            })
            .collect()
    };

    RefreshPlan {
        generation,
        conditionals,
        computed,
    }
}

/// Evaluate every planned expression. Dropping the returned future
/// abandons any request still in flight.
pub async fn evaluate_pass<T: RuleTransport>(
    evaluator: &Evaluator<T>,
    plan: RefreshPlan,
) -> PassResults {
    let mut computed = Vec::with_capacity(plan.computed.len());
    for item in &plan.computed {
        let result = evaluator
            .evaluate(&item.built, item.eval_url.as_deref())
            .await;
        computed.push(ComputedOutcome {
            target: item.target,
            text: result.is_truthy().then(|| result.to_string()),
        });
    }

    let mut conditionals = Vec::with_capacity(plan.conditionals.len());
    for item in &plan.conditionals {
        let result = evaluator
            .evaluate(&item.built, item.eval_url.as_deref())
            .await;
        conditionals.push(ConditionalOutcome {
            element: item.element,
            mode: item.mode,
            enabled: result.is_truthy(),
        });
    }

    PassResults {
        generation: plan.generation,
        conditionals,
        computed,
    }
}

pub fn apply_computed(doc: &mut Document, outcome: &ComputedOutcome, display: &DisplayConfig) {
    let text = outcome.text.as_deref().unwrap_or(&display.placeholder);
    doc.set_text(outcome.target, text);
}

pub fn apply_conditional(doc: &mut Document, outcome: &ConditionalOutcome, display: &DisplayConfig) {
    match outcome.mode {
        ConditionalMode::Visibility => {
            if let Some(el) = doc.element_mut(outcome.element) {
                el.style.visible = outcome.enabled;
            }
        }
        ConditionalMode::Readonly => {
            if let Some(el) = doc.element_mut(outcome.element) {
                el.style.opacity = if outcome.enabled {
                    display.full_opacity
                } else {
                    display.faded_opacity
                };
                el.style.transition_ms = Some(display.transition_ms);
            }
            for id in doc.descendants(outcome.element) {
                if let Some(el) = doc.element_mut(id) {
                    if el.is_form_control() {
                        el.readonly = !outcome.enabled;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributeConfig;

    #[test]
    fn computed_stage_runs_first() {
        assert_eq!(Scope::All.stages(), [Stage::Computed, Stage::Conditionals]);
        assert_eq!(Scope::Conditionals.stages(), [Stage::Conditionals]);
    }

    #[test]
    fn plan_covers_only_its_stage() {
        let doc = Document::from_json(
            r#"[
            {"tag": "input", "attrs": {"name": "a", "value": "5"}},
            {"tag": "div", "attrs": {"class": "formbar-evaluate", "expr": "$a * 2", "id": "total"}},
            {"tag": "div", "attrs": {"class": "formbar-conditional", "expr": "$a > 1"}}
        ]"#,
        )
        .unwrap();
        let registry = Registry::build(&doc, &AttributeConfig::default());

        let computed = plan(&doc, &registry, 3, Stage::Computed);
        assert_eq!(computed.generation, 3);
        assert!(computed.conditionals.is_empty());
        assert_eq!(computed.computed[0].built, " 5 * 2");

        let conditionals = plan(&doc, &registry, 3, Stage::Conditionals);
        assert!(conditionals.computed.is_empty());
        assert_eq!(conditionals.conditionals[0].built, " 5 > 1");
    }
}
