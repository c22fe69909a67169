//! Panic-mode recovery through ERROR productions, plus the BadToken and
//! NotInLanguage diagnostics.

use std::fmt;

use sitka::{
    FinalizeOptions, GrammarBuilder, ParseError, ParseOptions, Parser, Span, Token,
};

#[derive(Debug)]
struct AfterPls;

impl fmt::Display for AfterPls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operand missing after '+'")
    }
}

impl std::error::Error for AfterPls {}

fn tokens(parser: &Parser<i64>, entries: &[(&str, Option<i64>)]) -> Vec<Token<i64>> {
    entries.iter()
        .enumerate()
        .map(|(i, &(name, value))| {
            let kind = parser
                .terminal(name)
                .unwrap_or_else(|| panic!("terminal {name}"));
            let offset = i * 2;
            Token::new(kind, value, Span::point(offset, 1, offset as u32 + 1))
        })
        .collect()
}

/// `e -> NUM | e PLS e | e PLS ERROR`; the error clause's reducer either
/// raises `AfterPls` or repairs with the left operand.
fn addition_parser(raise: bool) -> Parser<i64> {
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    builder.left(&["PLS"]).unwrap();
    builder.start("e").unwrap();
    builder
        .production("e", "NUM", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder
        .production("e", "e PLS e", |_, mut v, _| Ok(v.take(0) + v.take(2)))
        .unwrap();
    builder
        .production("e", "e PLS ERROR", move |_, mut v, _| {
            if raise {
                Err(AfterPls.into())
            } else {
                Ok(v.take(0))
            }
        })
        .unwrap();
    builder.finalize(FinalizeOptions::default()).unwrap()
}

#[test]
fn error_handler_raises_handled_error_at_recovery_position() {
    let parser = addition_parser(true);
    // 1 + + 2: the second '+' sits at offset 4, column 5.
    let input = tokens(
        &parser,
        &[
            ("NUM", Some(1)),
            ("PLS", None),
            ("PLS", None),
            ("NUM", Some(2)),
            ("EOS", None),
        ],
    );
    let err = parser.parse(input, &mut ()).unwrap_err();
    match err {
        ParseError::HandledError { source, span } => {
            assert_eq!(source.to_string(), "operand missing after '+'");
            assert_eq!(span, Span::point(4, 1, 5));
        }
        other => panic!("expected HandledError, got {other:?}"),
    }
}

#[test]
fn error_handler_can_repair_and_resume() {
    let parser = addition_parser(false);
    // 1 + + 2: the error clause repairs to the left operand (1), then
    // parsing resumes at the second '+' and consumes "+ 2".
    let input = tokens(
        &parser,
        &[
            ("NUM", Some(1)),
            ("PLS", None),
            ("PLS", None),
            ("NUM", Some(2)),
            ("EOS", None),
        ],
    );
    let out = parser
        .parse_with(input, &mut (), &ParseOptions::default())
        .unwrap();
    assert_eq!(out.values, vec![3]);
    assert_eq!(out.stats.recoveries, 1);
}

#[test]
fn recovery_discards_tokens_until_one_is_acceptable() {
    // s -> NUM SEMI | ERROR SEMI; a malformed statement is skipped up to
    // its terminating semicolon.
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    builder.start("s").unwrap();
    builder
        .production("s", "NUM SEMI", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder
        .production("s", "ERROR SEMI", |_, _, _| Ok(-1))
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    // NUM NUM SEMI: the second NUM is unexpected; recovery pops to the
    // start state, shifts ERROR, discards the offending NUM and resumes at
    // the semicolon.
    let input = tokens(
        &parser,
        &[("NUM", Some(7)), ("NUM", Some(8)), ("SEMI", None), ("EOS", None)],
    );
    let out = parser
        .parse_with(input, &mut (), &ParseOptions::default())
        .unwrap();
    assert_eq!(out.values, vec![-1]);
    assert_eq!(out.stats.recoveries, 1);
}

#[test]
fn bad_token_reports_kind_and_position() {
    let parser = addition_parser(true);
    // A nonterminal id is not a terminal of the grammar.
    let e = parser.symbols().get("e").unwrap();
    let input = vec![Token::new(e, None, Span::point(5, 2, 3))];
    let err = parser.parse(input, &mut ()).unwrap_err();
    match err {
        ParseError::BadToken { kind, span } => {
            assert_eq!(kind, e);
            assert_eq!(span, Span::point(5, 2, 3));
        }
        other => panic!("expected BadToken, got {other:?}"),
    }
}

#[test]
fn no_error_production_means_not_in_language() {
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    builder.start("e").unwrap();
    builder
        .production("e", "NUM", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    let input = tokens(&parser, &[("NUM", Some(1)), ("NUM", Some(2)), ("EOS", None)]);
    let err = parser.parse(input, &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::NotInLanguage { span } if span.file_offset == 2));
}

#[test]
fn recovery_aborts_when_input_exhausts() {
    // s -> NUM SEMI | ERROR SEMI, but the input never reaches a semicolon.
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    builder.start("s").unwrap();
    builder
        .production("s", "NUM SEMI", |_, mut v, _| Ok(v.take(0)))
        .unwrap();
    builder
        .production("s", "ERROR SEMI", |_, _, _| Ok(-1))
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    let input = tokens(&parser, &[("NUM", Some(7)), ("NUM", Some(8)), ("EOS", None)]);
    let err = parser.parse(input, &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::NotInLanguage { .. }));
}

#[test]
fn domain_error_from_ordinary_reducer_propagates() {
    let mut builder: GrammarBuilder<i64> = GrammarBuilder::new();
    builder.start("e").unwrap();
    builder
        .production("e", "NUM", |_, _, _| Err(AfterPls.into()))
        .unwrap();
    let parser = builder.finalize(FinalizeOptions::default()).unwrap();

    let input = tokens(&parser, &[("NUM", Some(1)), ("EOS", None)]);
    let err = parser.parse(input, &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::Domain { .. }));
}
