use crate::*;

use bcpu::arch;
use bcpu::{UWord, Word};

mod pest;

/// Assembles and returns every word from address 0 through the end of the
/// section, zero fill included.
fn words(source: &str) -> Vec<Word> {
    let assembler = assemble(source).unwrap();
    let section = assembler.section();
    (0..section.org() + section.length())
        .map(|addr| section.value(addr))
        .collect()
}

fn asm_err(source: &str) -> Error {
    assemble(source).unwrap_err()
}

#[test]
fn minimal_halt() {
    assert_eq!(words(" HLT"), vec![0xE000]);
}

#[test]
fn load_negate_store_halt() {
    let source = " LDN 3\n STO 4\n HLT\n NUM 5\n NUM 0";
    assert_eq!(words(source), vec![0x4003, 0x6004, 0xE000, 5, 0]);
}

#[test]
fn forward_label() {
    let source = " JMP end\n NUM 0\nend: HLT";
    assert_eq!(words(source), vec![0x0002, 0x0000, 0xE000]);
}

#[test]
fn dollar_is_the_current_address() {
    let source = "start: NUM $+1\n       NUM $-start";
    assert_eq!(words(source), vec![0x0001, 0x0001]);
}

#[test]
fn label_on_an_instruction_line_binds_that_word() {
    let source = " JMP loop\nloop: HLT";
    assert_eq!(words(source), vec![0x0001, 0xE000]);
}

#[test]
fn labels_count_preceding_instruction_records() {
    let source = " NUM b-a\na: NUM 0\nb: HLT";
    assert_eq!(words(source), vec![0x0001, 0x0000, 0xE000]);
}

#[test]
fn org_moves_the_cursor() {
    assert_eq!(words("2: HLT"), vec![0, 0, 0xE000]);
}

#[test]
fn org_applies_before_a_following_label() {
    let source = " JMP fin\n10: fin: HLT";
    let out = words(source);
    assert_eq!(out.len(), 11);
    assert_eq!(out[0], 0x000A);
    assert_eq!(out[10], 0xE000);
}

#[test]
fn mnemonics_fold_case_and_aliases_share_encodings() {
    assert_eq!(words(" cmp\n stp"), vec![0xC000, 0xE000]);
    assert_eq!(words(" SKN\n HLT"), vec![0xC000, 0xE000]);
}

#[test]
fn num_emits_raw_words() {
    assert_eq!(words(" NUM -1\n NUM 0x1F"), vec![-1, 31]);
}

#[test]
fn eja_emits_operand_minus_one() {
    assert_eq!(words(" EJA 5"), vec![4]);
}

#[test]
fn operand_field_is_masked_to_thirteen_bits() {
    assert_eq!(words(" LDN 0x2000"), vec![0x4000]);
}

#[test]
fn encoding_invariant_holds_for_every_mnemonic() {
    let source = " JMP 5\n JRP 6\n LDN 7\n STO 8\n SUB 9\n SKN\n HLT";
    let opcodes = [0, 1, 2, 3, 4, 6, 7];
    let operands = [5, 6, 7, 8, 9, 0, 0];

    for (i, word) in words(source).iter().enumerate() {
        let d = arch::decode(*word);
        assert_eq!(d.opcode, opcodes[i] as UWord);
        assert_eq!(d.operand, operands[i] as UWord);
        assert_eq!(d.data, 0);
    }
}

#[test]
fn macro_expansions_emit_their_body() {
    let source = "twice: MACRO x\n LDN x\n STO x\n ENDM\n twice 3\n twice 4";
    assert_eq!(words(source), vec![0x4003, 0x6003, 0x4004, 0x6004]);
}

#[test]
fn macro_labels_are_private_to_each_expansion() {
    // the same label resolves to a different address in each expansion
    let source = "jump_self: MACRO\nhere: JMP here\n ENDM\n jump_self\n jump_self";
    assert_eq!(words(source), vec![0x0000, 0x0001]);
}

#[test]
fn macro_argument_may_shadow_an_outer_name() {
    // the actual argument `v+1` refers to the outer label v even though the
    // formal parameter is also called v
    let source = "dup: MACRO v\n NUM v\n ENDM\nv: NUM 7\n dup v+1";
    assert_eq!(words(source), vec![0x0007, 0x0001]);
}

#[test]
fn macros_accept_constant_arguments() {
    let source = "put: MACRO at\n STO at\n ENDM\n put 28+2";
    assert_eq!(words(source), vec![0x601E]);
}

#[test]
fn multiple_sources_concatenate_into_one_section() {
    let mut assembler = Assembler::new();
    assembler.add_source("one.asm", " JMP fin\n NUM 0").unwrap();
    assembler.add_source("two.asm", "fin: HLT").unwrap();
    assembler.assemble().unwrap();

    let section = assembler.section();
    let out: Vec<Word> = (0..section.length()).map(|a| section.value(a)).collect();
    assert_eq!(out, vec![0x0002, 0x0000, 0xE000]);
}

#[test]
fn comments_run_to_end_of_line() {
    let source = " LDN 3 -- load\n HLT ; stop\n; whole line\n-- and this\n NUM 1";
    assert_eq!(words(source), vec![0x4003, 0xE000, 1]);
}

#[test]
fn surplus_operands_are_fatal() {
    match asm_err(" LDN 1 2") {
        Error::Asm { kind: AsmError::SurplusOperands, line, .. } => assert_eq!(line, 1),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn unknown_mnemonics_are_reported_by_name() {
    match asm_err(" NOP") {
        Error::Asm { kind: AsmError::UnknownMnemonic(name), .. } => assert_eq!(name, "NOP"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn undefined_labels_fail_in_pass_two() {
    match asm_err(" JMP nowhere") {
        Error::Asm { kind: AsmError::Undefined(name), .. } => assert_eq!(name, "nowhere"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn label_redefinition_is_an_error() {
    match asm_err("a: HLT\na: HLT") {
        Error::Asm { kind: AsmError::DuplicateLabel(name), line, .. } => {
            assert_eq!(name, "a");
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn labels_must_not_start_with_a_digit() {
    assert!(matches!(asm_err("1abc: HLT"), Error::Parse(_)));
}

#[test]
fn overlong_lines_are_rejected() {
    let source = format!("; {}", "x".repeat(MAX_SOURCE_LINE + 10));
    match asm_err(&source) {
        Error::Asm { kind: AsmError::LineTooLong(_), line, .. } => assert_eq!(line, 1),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn macro_arity_mismatch_is_fatal() {
    let source = "m: MACRO x\n NUM x\n ENDM\n m";
    match asm_err(source) {
        Error::Asm {
            kind: AsmError::MacroArity { name, formals, actuals },
            ..
        } => {
            assert_eq!(name, "m");
            assert_eq!(formals, 1);
            assert_eq!(actuals, 0);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn macro_definitions_need_a_name_label() {
    let source = " MACRO x\n NUM x\n ENDM";
    assert!(matches!(
        asm_err(source),
        Error::Asm { kind: AsmError::MacroWithoutName, .. }
    ));
}

#[test]
fn emitting_the_same_address_twice_is_an_error() {
    let source = " HLT\n0: HLT";
    assert!(matches!(
        asm_err(source),
        Error::Asm { kind: AsmError::Section(_), .. }
    ));
}

#[test]
fn listing_back_links_reach_the_source_line() {
    let assembler = assemble(" LDN 3\nend: HLT").unwrap();
    let section = assembler.section();

    let slot = section.slot(1).unwrap();
    let record = assembler.record(slot.debug.unwrap());
    assert_eq!(record.line, 2);
    assert_eq!(assembler.source(record.source).path, "<input>");
}
