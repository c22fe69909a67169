//! Calculator grammars: prefix evaluation, precedence-resolved infix, and
//! ambiguous infix under `accept: All`.

use std::sync::OnceLock;

use proptest::prelude::*;
use sitka::{FinalizeOptions, GrammarBuilder, Parser, Span, Token};

fn tokens<V>(parser: &Parser<V>, entries: &[(&str, Option<V>)]) -> Vec<Token<V>>
where
    V: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
{
    entries.iter()
        .enumerate()
        .map(|(i, (name, value))| {
            let kind = parser
                .terminal(name)
                .unwrap_or_else(|| panic!("terminal {name}"));
            let offset = i * 2;
            Token::new(kind, value.clone(), Span::point(offset, 1, offset as u32 + 1))
        })
        .collect()
}

fn prefix_parser() -> Parser<i64> {
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    builder.start("e").unwrap();
    builder
        .production("e", "NUM", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder
        .production("e", "PLS e e", |_, mut v, _| Ok(v.take(1) + v.take(2)))
        .unwrap();
    builder
        .production("e", "SUB e e", |_, mut v, _| Ok(v.take(1) - v.take(2)))
        .unwrap();
    builder
        .production("e", "MUL e e", |_, mut v, _| Ok(v.take(1) * v.take(2)))
        .unwrap();
    builder
        .production("e", "DIV e e", |_, mut v, _| Ok(v.take(1) / v.take(2)))
        .unwrap();
    builder.finalize(FinalizeOptions::default()).unwrap()
}

fn shared_prefix_parser() -> &'static Parser<i64> {
    static PARSER: OnceLock<Parser<i64>> = OnceLock::new();
    PARSER.get_or_init(prefix_parser)
}

#[test]
fn prefix_addition() {
    let parser = shared_prefix_parser();
    // + 1 2
    let input = tokens(
        parser,
        &[("PLS", None), ("NUM", Some(1)), ("NUM", Some(2)), ("EOS", None)],
    );
    assert_eq!(parser.parse(input, &mut ()).unwrap(), 3);
}

#[test]
fn prefix_nested_operators() {
    let parser = shared_prefix_parser();
    // + 1 * 2 3
    let input = tokens(
        parser,
        &[
            ("PLS", None),
            ("NUM", Some(1)),
            ("MUL", None),
            ("NUM", Some(2)),
            ("NUM", Some(3)),
        ],
    );
    // EOS left off: the runtime appends it at the last seen position.
    assert_eq!(parser.parse(input, &mut ()).unwrap(), 7);
}

#[test]
fn prefix_grammar_is_conflict_free() {
    let parser = shared_prefix_parser();
    assert!(parser.conflicts().is_empty());
}

fn infix_parser() -> Parser<i64> {
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    // MUL declared later, so it outranks PLS.
    builder.left(&["PLS"]).unwrap();
    builder.right(&["MUL"]).unwrap();
    builder.start("e").unwrap();
    builder
        .production("e", "NUM", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder
        .production("e", "e PLS e", |_, mut v, _| Ok(v.take(0) + v.take(2)))
        .unwrap();
    builder
        .production("e", "e MUL e", |_, mut v, _| Ok(v.take(0) * v.take(2)))
        .unwrap();
    builder.finalize(FinalizeOptions::default()).unwrap()
}

#[test]
fn infix_precedence_binds_multiplication_tighter() {
    let parser = infix_parser();
    // 1 + 2 * 3
    let input = tokens(
        &parser,
        &[
            ("NUM", Some(1)),
            ("PLS", None),
            ("NUM", Some(2)),
            ("MUL", None),
            ("NUM", Some(3)),
            ("EOS", None),
        ],
    );
    assert_eq!(parser.parse(input, &mut ()).unwrap(), 7);
}

#[test]
fn infix_reduce_wins_when_production_outranks_lookahead() {
    let parser = infix_parser();
    // 1 * 2 + 3: the MUL production outranks the PLS lookahead.
    let input = tokens(
        &parser,
        &[
            ("NUM", Some(1)),
            ("MUL", None),
            ("NUM", Some(2)),
            ("PLS", None),
            ("NUM", Some(3)),
            ("EOS", None),
        ],
    );
    assert_eq!(parser.parse(input, &mut ()).unwrap(), 5);
}

#[test]
fn infix_with_full_precedence_has_no_conflicts() {
    let parser = infix_parser();
    assert!(parser.conflicts().is_empty());
}

#[test]
fn left_associativity_resolves_to_reduce() {
    let parser = infix_parser();
    // 10 - ... no SUB here; 1 + 2 + 3 exercises the Left tie-break.
    let input = tokens(
        &parser,
        &[
            ("NUM", Some(1)),
            ("PLS", None),
            ("NUM", Some(2)),
            ("PLS", None),
            ("NUM", Some(3)),
            ("EOS", None),
        ],
    );
    let out = parser
        .parse_with(input, &mut (), &sitka::ParseOptions::default())
        .unwrap();
    assert_eq!(out.values, vec![6]);
    // Deterministic: the precedence discipline leaves a single spine.
    assert_eq!(out.stats.forks, 0);
    assert_eq!(out.stats.peak_spines, 1);
}

/// S3: the same infix grammar with no associativity declared is ambiguous;
/// `accept: All` returns every derivation shape.
fn ambiguous_parser() -> Parser<String> {
    let mut builder: GrammarBuilder<String> = GrammarBuilder::new();
    builder.start("e").unwrap();
    builder
        .production("e", "NUM", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder
        .production("e", "e PLS e", |_, mut v, _| {
            Ok(format!("({}+{})", v.take(0), v.take(2)))
        })
        .unwrap();
    builder.finalize(FinalizeOptions::default()).unwrap()
}

#[test]
fn ambiguous_infix_reports_conflicts_and_yields_both_shapes() {
    let parser = ambiguous_parser();
    assert!(!parser.conflicts().is_empty());

    let input = tokens(
        &parser,
        &[
            ("NUM", Some("1".to_owned())),
            ("PLS", None),
            ("NUM", Some("2".to_owned())),
            ("PLS", None),
            ("NUM", Some("3".to_owned())),
            ("EOS", None),
        ],
    );
    let mut shapes = parser.parse_all(input, &mut ()).unwrap();
    shapes.sort();
    assert_eq!(shapes, vec!["((1+2)+3)".to_owned(), "(1+(2+3))".to_owned()]);
}

#[test]
fn ambiguous_infix_accept_first_returns_one_shape() {
    let parser = ambiguous_parser();
    let input = tokens(
        &parser,
        &[
            ("NUM", Some("1".to_owned())),
            ("PLS", None),
            ("NUM", Some("2".to_owned())),
            ("PLS", None),
            ("NUM", Some("3".to_owned())),
            ("EOS", None),
        ],
    );
    let shape = parser.parse(input, &mut ()).unwrap();
    assert!(shape == "((1+2)+3)" || shape == "(1+(2+3))");
}

#[derive(Debug, Clone)]
enum Prefix {
    Num(i64),
    Add(Box<Prefix>, Box<Prefix>),
    Mul(Box<Prefix>, Box<Prefix>),
}

fn arb_prefix() -> impl Strategy<Value = Prefix> {
    let leaf = (0i64..20).prop_map(Prefix::Num);
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Prefix::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Prefix::Mul(Box::new(a), Box::new(b))),
        ]
    })
}

fn eval(expr: &Prefix) -> i64 {
    match expr {
        Prefix::Num(n) => *n,
        Prefix::Add(a, b) => eval(a) + eval(b),
        Prefix::Mul(a, b) => eval(a) * eval(b),
    }
}

fn flatten(expr: &Prefix, parser: &Parser<i64>, out: &mut Vec<Token<i64>>) {
    let offset = out.len() * 2;
    let span = Span::point(offset, 1, offset as u32 + 1);
    match expr {
        Prefix::Num(n) => out.push(Token::new(parser.terminal("NUM").unwrap(), Some(*n), span)),
        Prefix::Add(a, b) => {
            out.push(Token::new(parser.terminal("PLS").unwrap(), None, span));
            flatten(a, parser, out);
            flatten(b, parser, out);
        }
        Prefix::Mul(a, b) => {
            out.push(Token::new(parser.terminal("MUL").unwrap(), None, span));
            flatten(a, parser, out);
            flatten(b, parser, out);
        }
    }
}

proptest! {
    #[test]
    fn prefix_calculator_matches_direct_evaluation(expr in arb_prefix()) {
        let parser = shared_prefix_parser();
        let mut input = Vec::new();
        flatten(&expr, parser, &mut input);
        prop_assert_eq!(parser.parse(input, &mut ()).unwrap(), eval(&expr));
    }
}
