//! FILENAME: parser/src/tests.rs
//! PURPOSE: Consolidated unit tests for the parser crate.

use crate::ast::{ConditionalForm, Conditional, FormulaKind, LodKeyword, TableCalcFunction};
use crate::lexer::{render, tokenize, Lexer};
use crate::parser::{classify, scan, Parser};
use crate::token::Token;

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_field_arithmetic() {
    let mut lexer = Lexer::new("[Sales] / [Quantity]");

    assert_eq!(lexer.next_token(), Token::Field("Sales".to_string()));
    assert_eq!(lexer.next_token(), Token::Slash);
    assert_eq!(lexer.next_token(), Token::Field("Quantity".to_string()));
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_tokenizes_functions() {
    let mut lexer = Lexer::new("sum([Profit], 10)");

    assert_eq!(lexer.next_token(), Token::Identifier("SUM".to_string()));
    assert_eq!(lexer.next_token(), Token::LParen);
    assert_eq!(lexer.next_token(), Token::Field("Profit".to_string()));
    assert_eq!(lexer.next_token(), Token::Comma);
    assert_eq!(lexer.next_token(), Token::Number("10".to_string()));
    assert_eq!(lexer.next_token(), Token::RParen);
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_handles_comparison_operators() {
    let mut lexer = Lexer::new("a <= b >= c <> d != e == f");
    let tokens: Vec<Token> = std::iter::from_fn(|| {
        let t = lexer.next_token();
        (t != Token::EOF).then_some(t)
    })
    .collect();

    assert!(tokens.contains(&Token::LessEqual));
    assert!(tokens.contains(&Token::GreaterEqual));
    assert!(tokens.contains(&Token::DoubleEquals));
    assert_eq!(tokens.iter().filter(|t| **t == Token::NotEqual).count(), 2);
}

#[test]
fn lexer_reads_both_quote_styles() {
    let mut lexer = Lexer::new(r#""East" 'It''s'"#);
    assert_eq!(lexer.next_token(), Token::String("East".to_string()));
    assert_eq!(lexer.next_token(), Token::SingleQuoted("It's".to_string()));
}

#[test]
fn lexer_reads_escaped_field_bracket() {
    let mut lexer = Lexer::new("[Ratio [%]]]");
    assert_eq!(lexer.next_token(), Token::Field("Ratio [%]".to_string()));
}

#[test]
fn lexer_reads_comments() {
    let lexemes = tokenize("SUM([Sales]) // total\n/* note */ + 1");
    let comments: Vec<&Token> = lexemes
        .iter()
        .map(|l| &l.token)
        .filter(|t| matches!(t, Token::Comment(_)))
        .collect();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0], &Token::Comment("// total".to_string()));
}

#[test]
fn lexer_reads_exponent_numbers() {
    let mut lexer = Lexer::new("2.5E-3 1e5 3e");
    assert_eq!(lexer.next_token(), Token::Number("2.5E-3".to_string()));
    assert_eq!(lexer.next_token(), Token::Number("1e5".to_string()));
    assert_eq!(lexer.next_token(), Token::Number("3".to_string()));
    assert_eq!(lexer.next_token(), Token::Identifier("E".to_string()));
}

#[test]
fn lexer_booleans() {
    let mut lexer = Lexer::new("true FALSE");
    assert_eq!(lexer.next_token(), Token::Boolean(true));
    assert_eq!(lexer.next_token(), Token::Boolean(false));
}

#[test]
fn render_preserves_inner_whitespace() {
    let source = "  IF [a]  >  1 THEN\n  'x' END  ";
    assert_eq!(render(&tokenize(source)), source.trim());
}

#[test]
fn lexeme_records_attachment() {
    let lexemes = tokenize("Orders[Sales] + [Cost]");
    assert!(lexemes[1].is_attached());
    assert!(!lexemes[3].is_attached());
}

// ========================================
// STRUCTURE TESTS
// ========================================

#[test]
fn finds_lod_block_with_dimensions() {
    let lexemes = tokenize("{FIXED [Region], [Segment] : SUM([Sales])}");
    let parser = Parser::new(&lexemes);
    let blocks = parser.lod_blocks();

    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.keyword, LodKeyword::Fixed);
    assert_eq!(block.dimensions.len(), 2);
    assert_eq!(render(&lexemes[block.inner.clone()]), "SUM([Sales])");
    assert_eq!(block.span, 0..lexemes.len());
}

#[test]
fn lod_without_keyword_is_table_scoped() {
    let lexemes = tokenize("{ SUM([Sales]) }");
    let block = Parser::new(&lexemes).parse_lod(0).unwrap();
    assert_eq!(block.keyword, LodKeyword::Fixed);
    assert!(block.dimensions.is_empty());
}

#[test]
fn lod_unclosed_is_not_recognized() {
    let lexemes = tokenize("{FIXED [Region] : SUM([Sales])");
    assert!(Parser::new(&lexemes).lod_blocks().is_empty());
}

#[test]
fn nested_lod_reports_outermost_only() {
    let lexemes = tokenize("{FIXED [Region] : AVG({INCLUDE [City] : SUM([Sales])})}");
    let blocks = Parser::new(&lexemes).lod_blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].keyword, LodKeyword::Fixed);
}

#[test]
fn parses_if_elseif_else() {
    let lexemes = tokenize("IF [a] > 1 THEN 'x' ELSEIF [a] > 0 THEN 'y' ELSE 'z' END");
    let parser = Parser::new(&lexemes);
    let block = parser.parse_if(0).unwrap();

    assert_eq!(block.branches.len(), 2);
    assert_eq!(render(&lexemes[block.branches[1].condition.clone()]), "[a] > 0");
    let otherwise = block.otherwise.unwrap();
    assert_eq!(render(&lexemes[otherwise]), "'z'");
    assert_eq!(block.span.end, lexemes.len());
}

#[test]
fn if_skips_nested_blocks() {
    let source = "IF [a] THEN IF [b] THEN 1 ELSE 2 END ELSE 3 END";
    let lexemes = tokenize(source);
    let block = Parser::new(&lexemes).parse_if(0).unwrap();

    assert_eq!(block.branches.len(), 1);
    assert_eq!(
        render(&lexemes[block.branches[0].value.clone()]),
        "IF [b] THEN 1 ELSE 2 END"
    );
    assert_eq!(render(&lexemes[block.otherwise.unwrap()]), "3");
}

#[test]
fn if_without_end_is_error() {
    let lexemes = tokenize("IF [a] THEN 1");
    assert!(Parser::new(&lexemes).parse_if(0).is_err());
}

#[test]
fn parses_case_block() {
    let lexemes = tokenize("CASE [Region] WHEN 'East' THEN 1 WHEN 'West' THEN 2 ELSE 0 END");
    let block = Parser::new(&lexemes).parse_case(0).unwrap();

    assert_eq!(render(&lexemes[block.subject.clone()]), "[Region]");
    assert_eq!(block.arms.len(), 2);
    assert!(block.otherwise.is_some());
}

#[test]
fn case_without_when_is_error() {
    let lexemes = tokenize("CASE [Region] ELSE 0 END");
    assert!(Parser::new(&lexemes).parse_case(0).is_err());
}

#[test]
fn conditionals_inside_calls_are_found() {
    let lexemes = tokenize("SUM(IF [a] THEN [b] END) + 1");
    let found = Parser::new(&lexemes).conditionals();
    assert_eq!(found.len(), 1);
    assert!(matches!(found[0], Conditional::If(_)));
    assert!(!found[0].is_multi_branch());
}

#[test]
fn parses_call_arguments() {
    let lexemes = tokenize("RANK(SUM([Sales]), 'desc')");
    let call = Parser::new(&lexemes).parse_call(0).unwrap();

    assert_eq!(call.name, "RANK");
    assert_eq!(call.args.len(), 2);
    assert_eq!(render(&lexemes[call.args[0].clone()]), "SUM([Sales])");
}

#[test]
fn empty_call_has_no_arguments() {
    let lexemes = tokenize("TODAY()");
    let call = Parser::new(&lexemes).parse_call(0).unwrap();
    assert!(call.args.is_empty());
}

#[test]
fn calls_filters_by_name() {
    let lexemes = tokenize("SUM([a]) + LOOKUP(SUM([b]), -1)");
    let calls = Parser::new(&lexemes).calls(|name| name == "LOOKUP");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args.len(), 2);
}

// ========================================
// CLASSIFICATION TESTS
// ========================================

#[test]
fn classify_standard() {
    assert_eq!(classify("SUM([Sales]) / SUM([Quantity])"), FormulaKind::Standard);
}

#[test]
fn classify_lod_describes_first_block() {
    match classify("{EXCLUDE [Region] : SUM([Sales])} / {FIXED : SUM([Sales])}") {
        FormulaKind::Lod {
            keyword,
            dimensions,
            inner,
        } => {
            assert_eq!(keyword, LodKeyword::Exclude);
            assert_eq!(dimensions, vec!["Region".to_string()]);
            assert_eq!(inner, "SUM([Sales])");
        }
        other => panic!("Expected LOD, got {:?}", other),
    }
}

#[test]
fn classify_lod_wins_over_conditional() {
    let kind = classify("IF {FIXED : MAX([d])} > 0 THEN 1 END");
    assert_eq!(kind.type_name(), "lod_expression");
}

#[test]
fn classify_conditional_wins_over_table_calc() {
    assert_eq!(
        classify("IF RANK(SUM([Sales])) = 1 THEN 'Top' END"),
        FormulaKind::Conditional {
            form: ConditionalForm::If
        }
    );
    assert_eq!(
        classify("CASE [x] WHEN 1 THEN 'a' END"),
        FormulaKind::Conditional {
            form: ConditionalForm::Case
        }
    );
}

#[test]
fn classify_table_calc_uses_fixed_order() {
    assert_eq!(
        classify("LOOKUP(SUM([a]), -1) + RANK(SUM([a]))"),
        FormulaKind::TableCalc {
            function: TableCalcFunction::Rank
        }
    );
}

#[test]
fn classify_table_calc_needs_a_call() {
    // Field names that merely contain a table-calc name stay standard
    assert_eq!(classify("SUM([RANK]) + [Running_Sum]"), FormulaKind::Standard);
}

#[test]
fn incomplete_if_is_standard() {
    assert_eq!(classify("IF [a] > 1 THEN 'x'"), FormulaKind::Standard);
}

#[test]
fn scan_collects_facts_without_repeats() {
    let facts = scan("SUM([Sales]) + sum([Sales]) + AVG([Profit]) + 'x' + 2");
    assert_eq!(facts.functions, vec!["SUM".to_string(), "AVG".to_string()]);
    assert_eq!(facts.fields, vec!["Sales".to_string(), "Profit".to_string()]);
    assert_eq!(facts.strings, vec!["x".to_string()]);
    assert_eq!(facts.numbers, vec!["2".to_string()]);
}

#[test]
fn table_calc_function_lookup_by_name() {
    assert_eq!(
        TableCalcFunction::from_name("running_sum"),
        Some(TableCalcFunction::RunningSum)
    );
    assert_eq!(TableCalcFunction::from_name("SUM"), None);
}
