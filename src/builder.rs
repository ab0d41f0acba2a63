/// Field-reference marker.
pub const MARKER: char = '$';

/// One whitespace-separated piece of a raw expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    /// A field reference, holding the field name.
    Field(String),
}

/// Split a raw expression into literal tokens and field references.
///
/// A token containing an unescaped marker is a field reference named by
/// the token with its first marker removed. `\$` is a literal dollar sign
/// and keeps the whole token literal.
pub fn tokenize(raw: &str) -> Vec<Token> {
    raw.split_whitespace().map(classify).collect()
}

fn classify(token: &str) -> Token {
    if token.contains("\\$") {
        return Token::Literal(token.replace("\\$", "$"));
    }
    match token.find(MARKER) {
        Some(at) => {
            let mut name = String::with_capacity(token.len());
            name.push_str(&token[..at]);
            name.push_str(&token[at + MARKER.len_utf8()..]);
            Token::Field(name)
        }
        None => Token::Literal(token.to_string()),
    }
}

/// Names of all fields referenced by a raw expression, in order.
pub fn field_references(raw: &str) -> Vec<String> {
    tokenize(raw)
        .into_iter()
        .filter_map(|t| match t {
            Token::Field(name) => Some(name),
            Token::Literal(_) => None,
        })
        .collect()
}

/// Substitute field references with their current values, producing the
/// string handed to the evaluator. Every piece is preceded by one space.
pub fn build(raw: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::new();
    for token in tokenize(raw) {
        out.push(' ');
        match token {
            Token::Field(name) => {
                let value = resolve(&name).unwrap_or_default();
                log::trace!("substituting field {:?} -> {:?}", name, value);
                out.push_str(&value);
            }
            Token::Literal(text) => out.push_str(&text),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn literal_expression_gets_normalized_spacing() {
        assert_eq!(build("1  +\t2", fields(&[])), " 1 + 2");
        assert_eq!(build("", fields(&[])), "");
    }

    #[test]
    fn references_are_substituted() {
        let built = build("$a + $b", fields(&[("a", "2"), ("b", "3")]));
        assert_eq!(built, " 2 + 3");
    }

    #[test]
    fn absent_reference_becomes_empty() {
        assert_eq!(build("$a + $b", fields(&[("a", "2")])), " 2 + ");
    }

    #[test]
    fn marker_inside_token_is_removed_once() {
        assert_eq!(
            tokenize("x$y $$z"),
            vec![Token::Field("xy".to_string()), Token::Field("$z".to_string())]
        );
    }

    #[test]
    fn escaped_marker_is_literal() {
        assert_eq!(tokenize("'\\$5'"), vec![Token::Literal("'$5'".to_string())]);
        assert_eq!(build("'\\$5'", fields(&[])), " '$5'");
    }

    #[test]
    fn lists_references_in_order() {
        assert_eq!(field_references("$b > $a and 1"), vec!["b", "a"]);
    }
}
