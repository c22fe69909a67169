//! EBNF operators: desugaring, the operator callback, and list building.

use std::sync::Arc;

use sitka::{
    EbnfClauseKind, FinalizeOptions, GrammarBuilder, ParseError, Parser, Reducer, Span, Token,
};

/// Semantic values for the list grammars: scalar number or built-up list.
#[derive(Debug, Clone, PartialEq)]
enum Val {
    Num(i64),
    List(Vec<i64>),
}

impl Val {
    fn num(self) -> i64 {
        match self {
            Val::Num(n) => n,
            Val::List(_) => panic!("expected number"),
        }
    }

    fn list(self) -> Vec<i64> {
        match self {
            Val::List(items) => items,
            Val::Num(_) => panic!("expected list"),
        }
    }
}

/// List-building reducers for every EBNF clause shape: the empty clause
/// yields `[]`, the base clause `[x]`, and the recursive clause prepends
/// the base onto the already-built rest.
fn list_reducer(clause: &sitka::EbnfClause) -> Reducer<Val, ()> {
    match clause.kind {
        EbnfClauseKind::Empty => Arc::new(|_, _, _| Ok(Val::List(Vec::new()))),
        EbnfClauseKind::Base => Arc::new(|_, mut v, _| Ok(Val::List(vec![v.take(0).num()]))),
        EbnfClauseKind::Recursive => Arc::new(|_, mut v, _| {
            let head = v.take(0).num();
            let mut rest = v.take(1).list();
            rest.insert(0, head);
            Ok(Val::List(rest))
        }),
    }
}

fn tokens(parser: &Parser<Val>, entries: &[(&str, Option<i64>)]) -> Vec<Token<Val>> {
    entries.iter()
        .enumerate()
        .map(|(i, &(name, value))| {
            let kind = parser
                .terminal(name)
                .unwrap_or_else(|| panic!("terminal {name}"));
            let offset = i * 2;
            Token::new(
                kind,
                value.map(Val::Num),
                Span::point(offset, 1, offset as u32 + 1),
            )
        })
        .collect()
}

fn plus_parser() -> Parser<Val> {
    let mut builder: GrammarBuilder<Val> = GrammarBuilder::new();
    builder.ebnf(list_reducer);
    builder.start("list").unwrap();
    builder
        .production("list", "NUM+", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder.finalize(FinalizeOptions::default()).unwrap()
}

#[test]
fn plus_builds_list_in_input_order() {
    let parser = plus_parser();
    let input = tokens(
        &parser,
        &[("NUM", Some(1)), ("NUM", Some(2)), ("NUM", Some(3)), ("EOS", None)],
    );
    let value = parser.parse(input, &mut ()).unwrap();
    assert_eq!(value.list(), vec![1, 2, 3]);
}

#[test]
fn plus_rejects_empty_input() {
    let parser = plus_parser();
    let input = tokens(&parser, &[("EOS", None)]);
    assert!(matches!(
        parser.parse(input, &mut ()),
        Err(ParseError::NotInLanguage { .. })
    ));
}

#[test]
fn plus_synthesizes_a_stable_helper_name() {
    let parser = plus_parser();
    let helper = parser.symbols().get("num_plus").expect("num_plus interned");
    assert!(parser.symbols().is_nonterminal(helper));
}

#[test]
fn star_accepts_empty_input() {
    let mut builder: GrammarBuilder<Val> = GrammarBuilder::new();
    builder.ebnf(list_reducer);
    builder.start("list").unwrap();
    builder
        .production("list", "NUM*", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    let empty = tokens(&parser, &[("EOS", None)]);
    assert_eq!(parser.parse(empty, &mut ()).unwrap().list(), Vec::<i64>::new());

    let two = tokens(&parser, &[("NUM", Some(4)), ("NUM", Some(5)), ("EOS", None)]);
    assert_eq!(parser.parse(two, &mut ()).unwrap().list(), vec![4, 5]);
}

#[test]
fn opt_yields_zero_or_one() {
    let mut builder: GrammarBuilder<Val> = GrammarBuilder::new();
    builder.ebnf(list_reducer);
    builder.start("item").unwrap();
    builder
        .production("item", "NUM? SEMI", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    let absent = tokens(&parser, &[("SEMI", None), ("EOS", None)]);
    assert_eq!(parser.parse(absent, &mut ()).unwrap().list(), Vec::<i64>::new());

    let present = tokens(&parser, &[("NUM", Some(9)), ("SEMI", None), ("EOS", None)]);
    assert_eq!(parser.parse(present, &mut ()).unwrap().list(), vec![9]);
}

#[test]
fn repeated_operator_reuses_one_helper() {
    let mut builder: GrammarBuilder<Val> = GrammarBuilder::new();
    builder.ebnf(list_reducer);
    builder.start("pair").unwrap();
    builder
        .production("pair", "NUM+ SEMI NUM+", |_, mut v, _| {
            let mut left = v.take(0).list();
            left.extend(v.take(2).list());
            Ok(Val::List(left))
        })
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    let input = tokens(
        &parser,
        &[
            ("NUM", Some(1)),
            ("NUM", Some(2)),
            ("SEMI", None),
            ("NUM", Some(3)),
            ("EOS", None),
        ],
    );
    assert_eq!(parser.parse(input, &mut ()).unwrap().list(), vec![1, 2, 3]);
}
