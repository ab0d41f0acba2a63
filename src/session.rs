use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::accessor;
use crate::config::Config;
use crate::dom::{Document, Style};
use crate::error::{FormbarError, Result};
use crate::evaluator::{Evaluator, HttpTransport, RuleTransport};
use crate::page::PageNotifier;
use crate::refresh::{self, PassResults, RefreshPlan, Scope, Stage};
use crate::registry::Registry;

/// Display state of one attached element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDisplay {
    pub key: String,
    pub tag: String,
    #[serde(flatten)]
    pub style: Style,
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub text: String,
}

/// Everything the refreshers can change, for all attached elements.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DisplaySnapshot {
    pub elements: Vec<ElementDisplay>,
}

impl DisplaySnapshot {
    pub fn get(&self, key: &str) -> Option<&ElementDisplay> {
        self.elements.iter().find(|e| e.key == key)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A loaded form page together with its registry and evaluator.
///
/// Every field change bumps the generation; results of a pass planned
/// under an older generation are refused by [`FormSession::apply`].
pub struct FormSession<T> {
    document: Document,
    registry: Registry,
    evaluator: Arc<Evaluator<T>>,
    config: Config,
    generation: u64,
}

impl FormSession<HttpTransport> {
    pub fn with_http(document: Document, config: Config) -> Result<Self> {
        let transport = HttpTransport::new(config.remote.base_url.as_deref())?;
        Ok(Self::new(document, config, transport))
    }

    /// Page-change notifier sharing the evaluator's HTTP client.
    pub fn page_notifier(&self) -> Result<PageNotifier> {
        PageNotifier::from_config(
            self.evaluator.transport().client().clone(),
            &self.config.remote,
        )
    }
}

impl<T: RuleTransport> FormSession<T> {
    pub fn new(document: Document, config: Config, transport: T) -> Self {
        let registry = Registry::build(&document, &config.attributes);
        let evaluator = Arc::new(Evaluator::new(transport, config.remote.timeout()));
        FormSession {
            document,
            registry,
            evaluator,
            config,
            generation: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn evaluator(&self) -> Arc<Evaluator<T>> {
        Arc::clone(&self.evaluator)
    }

    /// Current value of a field as substituted into expressions.
    pub fn field_value(&self, name: &str) -> Option<String> {
        accessor::resolve(&self.document, name)
    }

    /// Record a change to a tracked field. Does not refresh by itself.
    pub fn change(&mut self, name: &str, value: &str) -> Result<()> {
        let id = self
            .registry
            .tracked_field(&self.document, name)
            .ok_or_else(|| FormbarError::UnknownField {
                name: name.to_string(),
            })?;
        if let Some(el) = self.document.element_mut(id) {
            el.value = Some(value.to_string());
        }
        self.generation += 1;
        debug!("field {:?} changed, generation {}", name, self.generation);
        Ok(())
    }

    pub fn plan(&self, stage: Stage) -> RefreshPlan {
        refresh::plan(&self.document, &self.registry, self.generation, stage)
    }

    /// Write pass results into the document. Returns `false`, leaving the
    /// document untouched, when the pass is stale.
    pub fn apply(&mut self, results: &PassResults) -> bool {
        if results.generation != self.generation {
            debug!(
                "discarding pass of generation {} (current {})",
                results.generation, self.generation
            );
            return false;
        }
        for outcome in &results.computed {
            refresh::apply_computed(&mut self.document, outcome, &self.config.display);
        }
        for outcome in &results.conditionals {
            refresh::apply_conditional(&mut self.document, outcome, &self.config.display);
        }
        true
    }

    /// Each stage is planned only after the previous one was applied.
    async fn run_pass(&mut self, scope: Scope) {
        let evaluator = self.evaluator();
        for &stage in scope.stages() {
            let plan = self.plan(stage);
            let results = refresh::evaluate_pass(&evaluator, plan).await;
            if !self.apply(&results) {
                return;
            }
        }
    }

    /// Computed fields first, then conditionals.
    pub async fn refresh(&mut self) {
        self.run_pass(Scope::All).await;
    }

    pub async fn refresh_conditionals(&mut self) {
        self.run_pass(Scope::Conditionals).await;
    }

    pub async fn refresh_computed(&mut self) {
        self.run_pass(Scope::Computed).await;
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        let elements = self
            .document
            .attached()
            .into_iter()
            .filter_map(|id| {
                let el = self.document.element(id)?;
                Some(ElementDisplay {
                    key: self.document.key(id),
                    tag: el.tag_name.clone(),
                    style: el.style.clone(),
                    readonly: el.readonly,
                    value: el.value.clone(),
                    text: self.document.text_content(id),
                })
            })
            .collect();
        DisplaySnapshot { elements }
    }
}
