use std::fs::{self};

use cadexpr::{
    error::{ErrorKind, ParseError, RuntimeError},
    evaluate_source,
    interpreter::{evaluator::core::Context, value::core::Value},
    parse,
};
use pretty_assertions::assert_eq;
use walkdir::WalkDir;

#[test]
fn book_examples_work() {
    let mut count = 0;

    for entry in
        WalkDir::new("book/src").into_iter()
                                .filter_map(Result::ok)
                                .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
    {
        let path = entry.path();
        let content =
            fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {path:?}: {e}"));

        for (i, code) in extract_blocks(&content).into_iter().enumerate() {
            count += 1;
            if let Err(e) = evaluate_source(&mut Context::new(), &code) {
                panic!("Example {} in {:?} failed:\n{}\nError: {}", i + 1, path, code, e);
            }
        }
    }

    assert!(count > 0, "No examples found in book/src");
}

fn extract_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut inside = false;
    let mut buf = String::new();

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```cadexpr") {
            inside = true;
            buf.clear();
            continue;
        }
        if inside && trimmed.starts_with("```") {
            inside = false;
            blocks.push(buf.clone());
            continue;
        }
        if inside {
            buf.push_str(line);
            buf.push('\n');
        }
    }

    blocks
}

fn eval(src: &str) -> Value {
    evaluate_source(&mut Context::new(), src).unwrap_or_else(|e| panic!("Script failed: {e}"))
}

fn assert_value(src: &str, expected: &str) {
    assert_eq!(eval(src).to_string(), expected, "while evaluating {src:?}");
}

fn assert_failure(src: &str) -> RuntimeError {
    match evaluate_source(&mut Context::new(), src) {
        Ok(v) => panic!("Script succeeded with {v} but was expected to fail"),
        Err(e) => e,
    }
}

#[test]
fn integer_and_real_arithmetic() {
    assert_value("1 + 2 * 3", "7");
    assert_value("(1 + 2) * 3", "9");
    assert_value("7 / 2", "3.5");
    assert_value("8 / 2", "4");
    assert_value("-7 // 2", "-4");
    assert_value("-7 % 3", "2");
    assert_value("2 ** 10", "1024");
    assert_value("2 ^ 3", "8");
    assert_value("1.5 * 2", "3");
    assert_value("0.1 + 0.2 == 0.3", "True");
    assert_value("9007199254740993 - 1", "9007199254740992");
    assert_value("9223372036854775807 // 7", "1317624576693539401");
}

#[test]
fn unary_operators() {
    assert_value("-(3 - 5)", "2");
    assert_value("+4", "4");
    assert_value("not 0", "True");
    assert_value("not [1]", "False");
}

#[test]
fn comparisons_and_logic() {
    assert_value("2 < 3", "True");
    assert_value("3 <= 2", "False");
    assert_value("2 != 3", "True");
    assert_value("1 == 1.0", "True");
    assert_value("True and False", "False");
    assert_value("False or 1 > 0", "True");
    assert_value("1 < 2 ? 10 : 20", "10");
    assert_value("'yes' if 0 else 'no'", "no");
}

#[test]
fn integer_overflow_is_error() {
    let err = assert_failure("x = 2 ** 62\nx * 4");
    assert_eq!(err.kind(), ErrorKind::Overflow);
}

#[test]
fn deep_nesting_is_a_parse_error() {
    assert_value(&format!("{}1{}", "(".repeat(30), ")".repeat(30)), "1");
    assert_value("- - + 1", "1");

    let sources = [format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000)),
                   format!("{}1", "-".repeat(50_000)),
                   format!("{}2", "1 if a else ".repeat(5_000)),
                   format!("{}1", "lambda: ".repeat(5_000))];
    for src in &sources {
        let err = parse(src).unwrap_err();
        assert!(matches!(err, ParseError::TooDeeplyNested { line: 1 }), "{err}");
    }
    let err = assert_failure(&format!("eval('{}1')", "[".repeat(500)));
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn division_by_zero_is_error() {
    let err = assert_failure("x = 1 / 0");
    assert_eq!(err.kind(), ErrorKind::ZeroDivision);
    assert_eq!(err.message(), "Division by zero.");
}

#[test]
fn unknown_variable_is_error() {
    let err = assert_failure("foo + 1");
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.message(), "Name 'foo' not defined");
}

#[test]
fn evaluations_do_not_share_locals() {
    let mut ctx = Context::new();
    assert_eq!(evaluate_source(&mut ctx, "x = 1; x").unwrap().to_string(), "1");
    let err = evaluate_source(&mut ctx, "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn outermost_error_carries_expression_text() {
    let err = assert_failure("1 + missing");
    assert!(matches!(err, RuntimeError::Located { .. }));
    assert!(err.to_string().contains("in expression: 1 + missing"));
    assert!(matches!(err.root(), RuntimeError::UnknownVariable { .. }));
}

#[test]
fn strings_and_formatting() {
    assert_value("'ab' + \"cd\"", "abcd");
    assert_value("'ab' * 3", "ababab");
    assert_value("'%d mm' % 12", "12 mm");
    assert_value("'%s-%s' % ('a', 'b')", "a-b");
    assert_value("len('hello')", "5");
    assert_value("'Hello'.upper()", "HELLO");
    assert_value("repr('x')", "'x'");
    assert_value("'abc'[1]", "b");
    assert_value("'abcdef'[1:4]", "bcd");
}

#[test]
fn containers() {
    assert_value("[1, 'a', 2.5]", "[1, 'a', 2.5]");
    assert_value("(1,)", "(1,)");
    assert_value("[1, 2] + [3]", "[1, 2, 3]");
    assert_value("[0] * 3", "[0, 0, 0]");
    assert_value("{'a': 1, 'b': 2}['b']", "2");
    assert_value("d = {'a': 1}\nd['c'] = 3\nlen(d)", "2");
    assert_value("[1, 2, 3][-1]", "3");
    assert_value("[1, 2, 3, 4][::2]", "[1, 3]");
    assert_value("2 in [1, 2]", "True");
    assert_value("'z' not in 'abc'", "True");
}

#[test]
fn index_and_key_errors() {
    assert_eq!(assert_failure("[1, 2][5]").kind(), ErrorKind::Index);
    assert_eq!(assert_failure("{'a': 1}['b']").kind(), ErrorKind::Key);
}

#[test]
fn lists_are_shared_references() {
    assert_value("a = [1]\nb = a\nb.append(2)\na", "[1, 2]");
}

#[test]
fn assignments_and_unpacking() {
    assert_value("x = 2\nx += 3\nx", "5");
    assert_value("x = 7\nx -= 2\nx *= 3\nx", "15");
    assert_value("a = b = 4\na + b", "8");
    assert_value("a, b = 1, 2\na, b = b, a\n(a, b)", "(2, 1)");
    assert_value("first, *rest = 'abc'\nrest", "['b', 'c']");
    assert_value("x = 3", "3");
}

#[test]
fn invalid_assignment_targets_fail_to_parse() {
    assert_eq!(assert_failure("1 = x").kind(), ErrorKind::Parse);
    assert_eq!(assert_failure("*a, *b = [1, 2]").kind(), ErrorKind::Parse);
}

#[test]
fn if_elif_else() {
    let src = "def sign(x):\n    if x < 0:\n        return -1\n    elif x == 0:\n        return 0\n    else:\n        return 1\n(sign(-3), sign(0), sign(9))";
    assert_value(src, "(-1, 0, 1)");
}

#[test]
fn user_function_with_early_return() {
    let src = "def f(x):\n    if x < 0:\n        return -x\n    return x\nf(-5)";
    assert_value(src, "5");
}

#[test]
fn while_loop_with_break_and_else() {
    assert_value("i = 0\nwhile i < 10:\n    i += 1\n    if i == 4:\n        break\ni", "4");
    assert_value("i = 0\nfound = False\nwhile i < 3:\n    i += 1\nelse:\n    found = True\nfound",
                 "True");
}

#[test]
fn for_loop_with_else() {
    let src = "r = 0\nfor x in [1, 2, 3]:\n    r += x\nelse:\n    r *= 10\nr";
    assert_value(src, "60");
    let src = "r = 'none'\nfor x in range(5):\n    if x == 2:\n        r = x\n        break\nelse:\n    r = 'else'\nr";
    assert_value(src, "2");
}

#[test]
fn unmatched_break_is_error() {
    let err = assert_failure("break");
    assert!(err.message().contains("Unmatched 'break' statement."));
}

#[test]
fn comprehensions() {
    assert_value("[x * x for x in range(4)]", "[0, 1, 4, 9]");
    assert_value("[x for x in range(10) if x % 3 == 0]", "[0, 3, 6, 9]");
    assert_value("{k: v for k, v in zip('ab', [1, 2])}", "{'a': 1, 'b': 2}");
}

#[test]
fn lambdas_and_nonlocal() {
    assert_value("sq = lambda x: x * x\nsq(7)", "49");
    let src = "def outer():\n    n = 1\n    def inner():\n        nonlocal n\n        n += 4\n    inner()\n    return n\nouter()";
    assert_value(src, "5");
}

#[test]
fn callees_see_the_callers_variables() {
    let src = "def show():\n    return level\ndef run():\n    level = 3\n    return show()\nrun()";
    assert_value(src, "3");
}

#[test]
fn nonlocal_without_enclosing_binding_is_error() {
    let err = assert_failure("def f():\n    nonlocal q\n    q = 1\nf()");
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn global_statement_binds_outer_variable() {
    let src = "total = 1\ndef bump():\n    global total\n    total = 5\nbump()\ntotal";
    assert_value(src, "5");
}

#[test]
fn keyword_and_default_arguments() {
    let src = "def area(w, h=2, scale=1):\n    return w * h * scale\n(area(3), area(3, 4), area(w=1, h=1, scale=9))";
    assert_value(src, "(6, 12, 9)");
}

#[test]
fn argument_errors() {
    assert_failure("def f(a):\n    return a\nf()");
    assert_eq!(assert_failure("def f(a, a):\n    pass").kind(), ErrorKind::Parse);
    assert_eq!(assert_failure("g(a=1, 2)").kind(), ErrorKind::Parse);
}

#[test]
fn duplicate_parameter_message() {
    let err = assert_failure("def f(x, x):\n    pass");
    assert!(err.message().contains("Duplicate arg 'x'"), "{err}");
}

#[test]
fn recursion() {
    let src = "def fact(n):\n    return 1 if n <= 1 else n * fact(n - 1)\nfact(10)";
    assert_value(src, "3628800");
}

#[test]
fn runaway_recursion_hits_the_depth_limit() {
    let err = assert_failure("def f(n):\n    return f(n + 1)\nf(0)");
    assert!(matches!(err.root(), RuntimeError::RecursionLimit { .. }));
    assert_eq!(err.message(), "Maximum recursion depth exceeded.");
}

#[test]
fn try_except_catches_by_type() {
    let src = "try:\n    x = 1 / 0\nexcept ZeroDivisionError as e:\n    x = str(e)\nx";
    assert_value(src, "Division by zero.");

    let src = "try:\n    [][1]\nexcept LookupError:\n    r = 'lookup'\nr";
    assert_value(src, "lookup");

    let src = "try:\n    undefined_name\nexcept (KeyError, NameError):\n    r = 'name'\nr";
    assert_value(src, "name");
}

#[test]
fn try_else_and_finally() {
    let src = "log = []\ntry:\n    log.append('body')\nexcept:\n    log.append('except')\nelse:\n    log.append('else')\nfinally:\n    log.append('finally')\nlog";
    assert_value(src, "['body', 'else', 'finally']");

    let src = "log = []\ndef f():\n    try:\n        return 1\n    finally:\n        log.append('cleanup')\nf()\nlog";
    assert_value(src, "['cleanup']");
}

#[test]
fn uncaught_exception_propagates() {
    let err = assert_failure("try:\n    1 / 0\nexcept KeyError:\n    pass");
    assert_eq!(err.kind(), ErrorKind::ZeroDivision);
}

#[test]
fn raise_and_reraise() {
    let err = assert_failure("raise ValueError('bad input')");
    assert_eq!(err.kind(), ErrorKind::Raise);
    assert_eq!(err.message(), "bad input");

    let src = "try:\n    try:\n        raise KeyError('k')\n    except KeyError:\n        raise\nexcept KeyError as e:\n    r = str(e)\nr";
    assert_value(src, "k");
}

#[test]
fn invalid_try_statements_fail_to_parse() {
    let err = assert_failure("try:\n    pass\nx = 1");
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.message().contains("Invalid try statement"));

    let err = assert_failure("try:\n    pass\nfinally:\n    pass\nfinally:\n    pass");
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn del_removes_bindings_and_items() {
    assert_eq!(assert_failure("x = 1\ndel x\nx").kind(), ErrorKind::Name);
    assert_value("xs = [1, 2, 3]\ndel xs[0]\nxs", "[2, 3]");
}

#[test]
fn builtins() {
    assert_value("range(3)", "[0, 1, 2]");
    assert_value("list(1, 2)", "[1, 2]");
    assert_value("sorted([3, 1, 2], reverse=True)", "[3, 2, 1]");
    assert_value("int('42') + int(2.9)", "44");
    assert_value("float(3)", "3.0");
    assert_value("bool('')", "False");
    assert_value("isinstance(1, int)", "True");
    assert_value("enumerate('ab')", "[(0, 'a'), (1, 'b')]");
}

#[test]
fn blocked_builtins_are_rejected() {
    let err = assert_failure("open('x')");
    assert_eq!(err.kind(), ErrorKind::Security);
    assert_eq!(err.message(), "Built-in blocked");
}

#[test]
fn math_module_import() {
    assert_value("import math\nmath.floor(2.7)", "2");
    assert_value("from math import floor as fl\nfl(9.5)", "9");
    assert_value("import math as m\nround(m.pi * 100)", "314");
}

#[test]
fn unknown_module_import() {
    let err = assert_failure("import os");
    assert_eq!(err.kind(), ErrorKind::Security);
    assert_eq!(err.message(), "Module 'os' access denied.");
}

#[test]
fn comments_are_ignored() {
    assert_value("# leading comment\nx = 2 # trailing\nx * 2", "4");
}

#[test]
fn each_evaluation_gets_a_fresh_frame() {
    let mut ctx = Context::new();
    evaluate_source(&mut ctx, "secret = 42").unwrap();
    let err = evaluate_source(&mut ctx, "secret").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn geometry_builders() {
    assert_value("v = create('vector', 1, 2, 3)\nv.x + v.z", "4");
    assert_value("create('vector', 1, 0, 0) * create('vector', 0, 1, 0)", "0.0");
}
