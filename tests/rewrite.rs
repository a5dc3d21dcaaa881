//! End-to-end passes over a composed method: pattern rewriting, hand-scheduled edits, and pool
//! compaction with the follow-up remap.

use classpatch::code::matcher::{PatConst, PatSlot, PatternInsn, RepConst, RepSlot, ReplacementInsn};
use classpatch::code::{
    CodeComposer, CodeEditor, Instruction, Item, Opcode, Rewriter, Rule,
};
use classpatch::pool::{Constant, ConstantPool};

/// iconst_2; istore_0; goto L; iconst_3; L: ireturn
fn compose_sample(pool: &mut ConstantPool) -> classpatch::code::Code {
    let mut composer = CodeComposer::new(pool);
    composer.limits(1, 1);
    let after = composer.fresh_label();
    composer.const_int(2).unwrap();
    composer.push(Instruction::var(Opcode::ISTORE, 0));
    composer.push(Instruction::branch(Opcode::GOTO, after));
    composer.const_int(3).unwrap();
    composer.place_label(after).unwrap();
    composer.push(Instruction::Simple(Opcode::IRETURN));
    composer.finish().unwrap()
}

#[test]
fn composed_sample_has_the_expected_bytes() {
    let mut pool = ConstantPool::new();
    let code = compose_sample(&mut pool);
    assert_eq!(
        code.to_bytes().unwrap(),
        vec![0x05, 0x3b, 0xa7, 0x00, 0x04, 0x06, 0xac]
    );
}

#[test]
fn growing_rewrite_retargets_the_branch_over_it() {
    let mut pool = ConstantPool::new();
    let mut code = compose_sample(&mut pool);

    // iconst_2; istore_0  =>  sipush 1000; istore_0  (two bytes longer)
    let rewriter = Rewriter::new(vec![Rule {
        pool: ConstantPool::new(),
        pattern: vec![
            PatternInsn::Simple(Opcode::ICONST_2),
            PatternInsn::Var {
                opcode: Opcode::ISTORE,
                index: PatSlot::Is(0),
            },
        ],
        replacement: vec![
            ReplacementInsn::Push {
                opcode: Opcode::SIPUSH,
                value: classpatch::code::matcher::RepValue::Literal(1000),
            },
            ReplacementInsn::Var {
                opcode: Opcode::ISTORE,
                index: RepSlot::Literal(0),
            },
        ],
    }]);
    let (replaced, map) = rewriter.run(&mut code, &mut pool).unwrap();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].matched, 0..2);
    // The returned map places the replacement span in the rewritten buffer
    assert_eq!(map.get(replaced[0].matched.start), Some(0));
    assert_eq!(map.get(replaced[0].matched.end), Some(4));

    // sipush 1000; istore_0; goto +4; iconst_3; ireturn -- the goto still skips the iconst_3
    assert_eq!(
        code.to_bytes().unwrap(),
        vec![0x11, 0x03, 0xe8, 0x3b, 0xa7, 0x00, 0x04, 0x06, 0xac]
    );
}

#[test]
fn editor_and_rewriter_edits_compose_in_one_flush() {
    let mut pool = ConstantPool::new();
    let mut code = compose_sample(&mut pool);

    let rewriter = Rewriter::new(vec![Rule {
        pool: ConstantPool::new(),
        pattern: vec![PatternInsn::Simple(Opcode::ICONST_3)],
        replacement: vec![ReplacementInsn::Simple(Opcode::ICONST_4)],
    }]);

    let mut editor = CodeEditor::new(&mut code);
    editor
        .insert_before(0, vec![Item::Insn(Instruction::Simple(Opcode::NOP))])
        .unwrap();
    let replaced = rewriter.apply(&mut editor, &mut pool).unwrap();
    assert_eq!(replaced.len(), 1);
    let map = editor.flush().unwrap();

    assert_eq!(map.get(0), Some(0));
    assert_eq!(map.get(6), Some(7));
    assert_eq!(
        code.to_bytes().unwrap(),
        vec![0x00, 0x05, 0x3b, 0xa7, 0x00, 0x04, 0x07, 0xac]
    );
}

#[test]
fn compaction_remap_reaches_into_instructions() {
    // Build a pool with a duplicated string by pushing raw entries
    let mut pool = ConstantPool::new();
    let first_utf8 = pool.push(Constant::Utf8("shared".to_owned())).unwrap();
    let first = pool.push(Constant::String(first_utf8)).unwrap();
    let second_utf8 = pool.push(Constant::Utf8("shared".to_owned())).unwrap();
    let second = pool.push(Constant::String(second_utf8)).unwrap();
    assert_ne!(first, second);

    let mut code = classpatch::code::Code {
        instructions: vec![
            Instruction::ldc(first),
            Instruction::Simple(Opcode::POP),
            Instruction::ldc(second),
            Instruction::Simple(Opcode::ARETURN),
        ],
        ..Default::default()
    };

    let remap = pool.sort_and_compact().unwrap();
    code.remap_constants(&remap).unwrap();

    // Both loads now name the same surviving entry
    let a = code.instructions[0].constant_index().unwrap();
    let b = code.instructions[2].constant_index().unwrap();
    assert_eq!(a, b);
    assert!(matches!(pool.get(a), Some(Constant::String(_))));
    assert_eq!(pool.entry_count(), 2);
}

#[test]
fn cross_pool_rule_constants_are_minted_on_demand() {
    let mut rule_pool = ConstantPool::new();
    let pattern_method = rule_pool
        .method_ref("java/lang/System", "gc", "()V")
        .unwrap();
    let replacement_method = rule_pool
        .method_ref("pkg/Hooks", "onGc", "()V")
        .unwrap();

    let mut pool = ConstantPool::new();
    let mut composer = CodeComposer::new(&mut pool);
    composer.limits(0, 0);
    composer
        .invoke_static("java/lang/System", "gc", "()V")
        .unwrap();
    composer.push(Instruction::Simple(Opcode::RETURN));
    let mut code = composer.finish().unwrap();

    let rewriter = Rewriter::new(vec![Rule {
        pool: rule_pool,
        pattern: vec![PatternInsn::Const {
            opcode: Opcode::INVOKESTATIC,
            index: PatConst::Is(pattern_method),
        }],
        replacement: vec![ReplacementInsn::Const {
            opcode: Opcode::INVOKESTATIC,
            index: RepConst::Literal(replacement_method),
        }],
    }]);
    let (replaced, _) = rewriter.run(&mut code, &mut pool).unwrap();
    assert_eq!(replaced.len(), 1);

    let index = code.instructions[0].constant_index().unwrap();
    match pool.get(index) {
        Some(Constant::MethodRef { class, .. }) => {
            let class_name = match pool.get(*class) {
                Some(Constant::Class(name)) => pool.get(*name),
                _ => None,
            };
            assert_eq!(class_name, Some(&Constant::Utf8("pkg/Hooks".to_owned())));
        }
        other => panic!("expected a method ref, got {:?}", other),
    }
}
