use formbar_rust::dom::Document;
use formbar_rust::{
    accessor, builder, try_evaluate, validate_form, Config, ExprError, FormSession, FormbarError,
};

use std::io::{self, Read};
use std::path::PathBuf;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => fail(&err.to_string()),
    };

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        fail(&format!("cannot read stdin: {}", err));
    }
    let document = match Document::from_json(&input) {
        Ok(document) => document,
        Err(err) => fail(&err.to_string()),
    };

    let mut session = match FormSession::with_http(document, config) {
        Ok(session) => session,
        Err(err) => fail(&err.to_string()),
    };

    for err in validate_form(session.document(), session.registry(), session.config()) {
        eprintln!("WARNING IN {}: {} ({})", err.element, err.message, err.code);
    }
    report_local_syntax_errors(&session);

    session.refresh().await;
    match session.snapshot().to_json_pretty() {
        Ok(json) => println!("{}", json),
        Err(err) => fail(&err.to_string()),
    }
}

/// Show locally evaluated expressions that do not parse with the initial
/// field values, underlining the offending part.
fn report_local_syntax_errors<T: formbar_rust::RuleTransport>(session: &FormSession<T>) {
    let doc = session.document();
    let registry = session.registry();
    let local = registry
        .conditionals
        .iter()
        .filter(|c| c.eval_url.is_none())
        .map(|c| (c.element, c.expression.as_deref()))
        .chain(
            registry
                .computed
                .iter()
                .filter(|c| c.eval_url.is_none())
                .map(|c| (c.element, c.expression.as_deref())),
        );
    for (element, expression) in local {
        let Some(expression) = expression else {
            continue;
        };
        let built = builder::build(expression, |name| accessor::resolve(doc, name));
        if let Err(FormbarError::Expression(err)) = try_evaluate(&built) {
            if err.code == "expr-syntax-error" {
                eprintln!("ERROR IN {}:", doc.key(element));
                print_underlined(&built, &err);
            }
        }
    }
}

fn print_underlined(built: &str, err: &ExprError) {
    eprintln!("{}", built);

    let start_col = err.begin.column;
    let end_col = if err.end.column > start_col {
        err.end.column
    } else {
        start_col + 1
    };

    let mut underline = String::new();
    for _ in 0..start_col {
        underline.push(' ');
    }
    underline.push('^');
    for _ in (start_col + 1)..end_col {
        underline.push('_');
    }

    eprintln!("{}", underline);
    eprintln!("{}", err.message);
    eprintln!();
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}
