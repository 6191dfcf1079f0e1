use crate::{BasmParser, Rule};
use ::pest::*;

#[test]
fn comment() {
    parses_to! {
        parser: BasmParser,
        input: "-- anything at all ;: 0x",
        rule: Rule::COMMENT,
        tokens: []
    };

    parses_to! {
        parser: BasmParser,
        input: "; snp style",
        rule: Rule::COMMENT,
        tokens: []
    };
}

#[test]
fn number() {
    parses_to! {
        parser: BasmParser,
        input: "4492",
        rule: Rule::number,
        tokens: [number(0, 4)]
    };

    parses_to! {
        parser: BasmParser,
        input: "-17",
        rule: Rule::number,
        tokens: [number(0, 3)]
    };

    parses_to! {
        parser: BasmParser,
        input: "0x1F",
        rule: Rule::number,
        tokens: [number(0, 4)]
    };
}

#[test]
fn identifier() {
    parses_to! {
        parser: BasmParser,
        input: "_soGe56abel",
        rule: Rule::identifier,
        tokens: [identifier(0, 11)]
    };
}

#[test]
fn org() {
    parses_to! {
        parser: BasmParser,
        input: "10:",
        rule: Rule::org,
        tokens: [org(0, 3)]
    };

    parses_to! {
        parser: BasmParser,
        input: "10",
        rule: Rule::org,
        tokens: [org(0, 2)]
    };
}

#[test]
fn label() {
    parses_to! {
        parser: BasmParser,
        input: "loop:",
        rule: Rule::label,
        tokens: [label(0, 5)]
    };
}

#[test]
fn expr() {
    parses_to! {
        parser: BasmParser,
        input: "1+2",
        rule: Rule::expr,
        tokens: [
            expr(0, 3, [
                number(0, 1),
                add_op(1, 2),
                number(2, 3)
            ])
        ]
    };

    parses_to! {
        parser: BasmParser,
        input: "$-start",
        rule: Rule::expr,
        tokens: [
            expr(0, 7, [
                here(0, 1),
                add_op(1, 2),
                identifier(2, 7)
            ])
        ]
    };
}

#[test]
fn instr() {
    parses_to! {
        parser: BasmParser,
        input: "LDN 3",
        rule: Rule::instr,
        tokens: [
            instr(0, 5, [
                identifier(0, 3),
                expr(4, 5, [number(4, 5)])
            ])
        ]
    };

    parses_to! {
        parser: BasmParser,
        input: "HLT",
        rule: Rule::instr,
        tokens: [
            instr(0, 3, [identifier(0, 3)])
        ]
    };
}

#[test]
fn macro_def() {
    parses_to! {
        parser: BasmParser,
        input: "MACRO x\nHLT\nENDM",
        rule: Rule::macro_def,
        tokens: [
            macro_def(0, 16, [
                kw_macro(0, 5),
                formals(6, 7, [identifier(6, 7)]),
                macro_body(8, 12, [
                    instr(8, 11, [identifier(8, 11)])
                ]),
                kw_endm(12, 16)
            ])
        ]
    };
}
