pub mod accessor;
pub mod ast;
pub mod builder;
pub mod config;
pub mod dom;
pub mod driver;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod page;
pub mod parser;
pub mod refresh;
pub mod registry;
pub mod session;
pub mod validate;
pub mod value;

use dom::Document;
use value::Value;

pub use config::Config;
pub use driver::{drive, FormEvent};
pub use error::{ExprError, FormbarError, Result};
pub use evaluator::{Evaluator, HttpTransport, RemoteResponse, RuleTransport};
pub use session::{DisplaySnapshot, FormSession};
pub use validate::{validate_form, ValidationError};

// ── Core API ───────────────────────────────────────────────────────

/// Build a raw expression against the fields of `doc` and evaluate it
/// locally. Failures come back as `Value::Undefined`.
pub fn evaluate_in(doc: &Document, raw: &str) -> Value {
    let built = builder::build(raw, |name| accessor::resolve(doc, name));
    evaluator::evaluate_local(&built)
}

/// Parse and evaluate an already-built expression, keeping the error as
/// [`FormbarError::Expression`].
pub fn try_evaluate(built: &str) -> Result<Value> {
    let expr = parser::parse(built)?;
    Ok(interpreter::evaluate(&expr)?)
}
