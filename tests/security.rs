use std::{
    cell::Cell,
    rc::Rc,
};

use cadexpr::{
    Engine,
    config::EngineConfig,
    error::{ErrorKind, RuntimeError},
    evaluate_source,
    interpreter::{
        evaluator::core::Context,
        value::{
            core::Value,
            host::{HostFunction, HostModule},
        },
    },
};
use pretty_assertions::assert_eq;

fn probe(module: Option<&str>) -> Value {
    Value::Object(Rc::new(HostFunction::new("probe", module, |_, _, _, _| Ok(Value::Integer(7)))))
}

fn assert_failure(ctx: &mut Context, src: &str) -> RuntimeError {
    match evaluate_source(ctx, src) {
        Ok(v) => panic!("Script succeeded with {v} but was expected to fail"),
        Err(e) => e,
    }
}

#[test]
fn callables_from_unlisted_modules_are_denied() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Probe", probe(Some("shady")));

    let err = engine.evaluate("Probe()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Security);
    assert_eq!(err.message(), "Access denied of callable in module shady");

    engine.context_mut().set_module_access("shady", true);
    assert_eq!(engine.evaluate("Probe()").unwrap().to_string(), "7");

    engine.context_mut().set_module_access("shady", false);
    assert_eq!(engine.evaluate("Probe()").unwrap_err().kind(), ErrorKind::Security);
}

#[test]
fn callables_without_a_module_are_denied() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Probe", probe(None));

    let err = engine.evaluate("Probe()").unwrap_err();
    assert_eq!(err.message(), "Access denied of callable in unknown module");
}

#[test]
fn allowed_modules_cover_their_submodules() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Probe", probe(Some("Part.Shape")));
    assert_eq!(engine.evaluate("Probe()").unwrap().to_string(), "7");

    engine.context_mut().set_module_access("Part.Shape", false);
    assert_eq!(engine.evaluate("Probe()").unwrap_err().kind(), ErrorKind::Security);
}

#[test]
fn short_circuit_skips_the_call() {
    let called = Rc::new(Cell::new(false));
    let flag = Rc::clone(&called);
    let tool = HostFunction::new("tool", Some("App"), move |_, _, _, _| {
        flag.set(true);
        Ok(Value::Integer(1))
    });

    let mut engine = Engine::new();
    engine.scratch().set_property("Tool", Value::Object(Rc::new(tool)));

    assert_eq!(engine.evaluate("False and Tool()").unwrap().to_string(), "False");
    assert_eq!(engine.evaluate("True or Tool()").unwrap().to_string(), "True");
    assert!(!called.get());

    assert_eq!(engine.evaluate("True and Tool()").unwrap().to_string(), "True");
    assert!(called.get());
}

#[test]
fn blocked_builtins_are_never_callable() {
    let mut ctx = Context::new();
    for src in ["open('notes.txt')", "input()", "__import__('os')"] {
        let err = assert_failure(&mut ctx, src);
        assert_eq!(err.kind(), ErrorKind::Security, "{src}");
        assert_eq!(err.message(), "Built-in blocked");
    }
}

#[test]
fn bound_methods_share_one_cache_entry() {
    let mut ctx = Context::new();
    let fill = |n: usize| format!("xs = []\nfor i in range({n}):\n    xs.append(i)\n    xs.count(i)\nlen(xs)");

    assert_eq!(evaluate_source(&mut ctx, &fill(10)).unwrap().to_string(), "10");
    let cached = ctx.security().cached();
    assert_eq!(evaluate_source(&mut ctx, &fill(300)).unwrap().to_string(), "300");
    assert_eq!(ctx.security().cached(), cached);
}

#[test]
fn registered_modules_need_access() {
    let geo = HostModule::new("geo");
    geo.add_function("echo", |_, args, _, _| Ok(args.into_iter().next().unwrap_or_default()));

    let mut ctx = Context::new();
    ctx.register_module(geo);

    let err = assert_failure(&mut ctx, "import geo\ngeo.echo(3)");
    assert_eq!(err.kind(), ErrorKind::Security);
    assert_eq!(err.message(), "Module 'geo' access denied.");

    ctx.set_module_access("geo", true);
    assert_eq!(evaluate_source(&mut ctx, "import geo\ngeo.echo(3)").unwrap().to_string(), "3");
    assert_eq!(evaluate_source(&mut ctx, "from geo import echo as e\ne('x')").unwrap().to_string(), "x");
}

#[test]
fn allowed_but_unknown_modules_are_not_found() {
    let mut ctx = Context::new();
    ctx.set_module_access("ghost", true);
    let err = assert_failure(&mut ctx, "import ghost");
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.message(), "Module 'ghost' not found.");
}

#[test]
fn disabled_calls_reject_functions_and_property_writes() {
    let mut engine = Engine::new();
    let plate = engine.document().add_object("Plate");
    plate.set_property("Width", Value::Integer(1));

    {
        let _guard = engine.context_mut().disable_calls();
        let err = engine.evaluate("def f():\n    return 1\nf()").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FunctionCallDisabled);
        assert_eq!(err.message(), "Function call is disabled");

        let err = engine.evaluate("Plate.Width = 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FunctionCallDisabled);
        assert_eq!(plate.get_property_by_name("Width"), Some(Value::Integer(1)));

        // Reading is still fine.
        assert_eq!(engine.evaluate("Plate.Width + 1").unwrap().to_string(), "2");
    }

    engine.evaluate("Plate.Width = 2").unwrap();
    assert_eq!(plate.get_property_by_name("Width"), Some(Value::Integer(2)));
}

#[test]
fn disabled_calls_reject_writes_through_any_path() {
    let mut engine = Engine::new();
    let plate = engine.document().add_object("Plate");
    plate.set_property("Width", Value::Integer(1));
    plate.set_property("Holes", Value::list(vec![Value::Integer(3)]));

    let _guard = engine.context_mut().disable_calls();
    for src in ["p = Plate\np.Width = 2",
                "parts = [Plate]\nparts[0].Width = 2",
                "Plate.Holes[0] = 9",
                "Plate.Holes += [4]"]
    {
        let err = engine.evaluate(src).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FunctionCallDisabled, "{src}");
    }
    assert_eq!(plate.get_property_by_name("Width"), Some(Value::Integer(1)));
    assert_eq!(engine.evaluate("Plate.Holes").unwrap().to_string(), "[3]");

    // Plain variables stay writable.
    assert_eq!(engine.evaluate("xs = [1]\nxs += [2]\nxs").unwrap().to_string(), "[1, 2]");
}

#[test]
fn nested_guards_keep_calls_disabled() {
    let mut ctx = Context::new();
    let outer = ctx.disable_calls();
    let inner = ctx.disable_calls();
    drop(inner);
    assert!(ctx.calls_disabled());
    drop(outer);
    assert!(!ctx.calls_disabled());
}

#[test]
fn loops_poll_the_cancel_check() {
    let mut ctx = Context::new();
    ctx.set_cancel_check(|| true);

    let err = assert_failure(&mut ctx, "while True:\n    pass");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(err.message(), "Evaluation aborted.");

    let err = assert_failure(&mut ctx, "for i in range(1000):\n    pass");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn short_loops_finish_before_the_first_poll() {
    let polls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&polls);
    let mut ctx = Context::new();
    ctx.set_cancel_check(move || {
           counter.set(counter.get() + 1);
           false
       });

    let v = evaluate_source(&mut ctx, "n = 0\nfor i in range(250):\n    n += 1\nn").unwrap();
    assert_eq!(v.to_string(), "250");
    assert_eq!(polls.get(), 2);
}

#[test]
fn loop_check_pragma_applies_to_its_function() {
    let polls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&polls);
    let mut ctx = Context::new();
    ctx.set_cancel_check(move || {
           counter.set(counter.get() + 1);
           false
       });

    let src = "def busy():\n    pragma('loop_check', 1)\n    n = 0\n    for i in range(3):\n        n += 1\n    return n\n\
               total = busy()\nfor i in range(3):\n    total += 1\ntotal";
    assert_eq!(evaluate_source(&mut ctx, src).unwrap().to_string(), "6");
    assert_eq!(polls.get(), 3);
}

#[test]
fn loop_check_pragma_cancels_on_the_first_iteration() {
    let polls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&polls);
    let mut ctx = Context::new();
    ctx.set_cancel_check(move || {
           counter.set(counter.get() + 1);
           true
       });

    let src = "def spin():\n    pragma('loop_check', 1)\n    while True:\n        pass\nspin()";
    let err = assert_failure(&mut ctx, src);
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(polls.get(), 1);

    let err = assert_failure(&mut ctx, "pragma('loop_check', 'often')");
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn zero_loop_check_disables_polling() {
    let config = EngineConfig { loop_check: 0,
                                ..EngineConfig::default() };
    let mut ctx = Context::with_config(config);
    ctx.set_cancel_check(|| true);

    let v = evaluate_source(&mut ctx, "i = 0\nwhile i < 500:\n    i += 1\ni").unwrap();
    assert_eq!(v.to_string(), "500");
}

#[test]
fn configured_depth_limits_recursion() {
    let config = EngineConfig::from_toml("max_depth = 5").unwrap();
    let mut ctx = Context::with_config(config);

    let src = "def down(n):\n    if n == 0:\n        return 0\n    return down(n - 1)\n";
    assert_eq!(evaluate_source(&mut ctx, &format!("{src}down(2)")).unwrap().to_string(), "0");

    let err = assert_failure(&mut ctx, &format!("{src}down(10)"));
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.message(), "Maximum recursion depth exceeded.");
}

#[test]
fn configuration_merges_module_entries() {
    let config = EngineConfig::from_toml("[modules]\nmath = false\ngeo = true").unwrap();
    assert_eq!(config.modules.get("math"), Some(&false));
    assert_eq!(config.modules.get("geo"), Some(&true));
    assert_eq!(config.modules.get("builtins"), Some(&true));

    let mut ctx = Context::with_config(config);
    let err = assert_failure(&mut ctx, "import math");
    assert_eq!(err.kind(), ErrorKind::Security);
}

#[test]
fn configuration_round_trips_through_toml() {
    let config = EngineConfig { loop_check: 7,
                                warnings: false,
                                ..EngineConfig::default() };
    let text = config.to_toml().unwrap();
    assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    assert!(EngineConfig::from_toml("loop_check = 'often'").is_err());
}
