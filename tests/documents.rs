use std::rc::Rc;

use cadexpr::{
    Engine,
    ast::{Expr, ExprKind, Expression},
    config::EngineConfig,
    document::Workspace,
    error::ErrorKind,
    interpreter::{evaluator::core::Context, value::core::Value},
    quantity::{Quantity, Unit},
};
use pretty_assertions::assert_eq;

fn mm(value: f64) -> Value {
    Value::Quantity(Quantity::new(value, Unit::LENGTH))
}

#[test]
fn properties_of_other_objects() {
    let mut engine = Engine::new();
    let plate = engine.document().add_object("Plate");
    plate.set_property("Width", mm(40.0));
    plate.set_property("Thickness", mm(3.0));

    assert_eq!(engine.evaluate("Plate.Width * 2").unwrap().to_string(), "80 mm");
    assert_eq!(engine.evaluate("Plate.Width + Plate.Thickness").unwrap().to_string(), "43 mm");
    assert_eq!(engine.evaluate("Plate.Name").unwrap().to_string(), "Plate");
}

#[test]
fn unqualified_names_resolve_against_the_owner() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Length", mm(12.0));
    assert_eq!(engine.evaluate("Length / 4").unwrap().to_string(), "3 mm");
    assert_eq!(engine.evaluate(".Length").unwrap().to_string(), "12 mm");
}

#[test]
fn variables_shadow_properties() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Length", mm(12.0));
    assert_eq!(engine.evaluate("Length = 1\nLength").unwrap().to_string(), "1");
    assert_eq!(engine.scratch().get_property_by_name("Length"), Some(mm(12.0)));
}

#[test]
fn label_references() {
    let mut engine = Engine::new();
    let plate = engine.document().add_object("Plate001");
    plate.set_label("Base Plate");
    plate.set_property("Width", mm(40.0));

    assert_eq!(engine.evaluate("<<Base Plate>>.Width").unwrap().to_string(), "40 mm");
    assert_eq!(engine.evaluate("<<Base Plate>>.Label").unwrap().to_string(), "Base Plate");
}

#[test]
fn cross_document_references() {
    let mut engine = Engine::new();
    let other = engine.workspace().add_document("Parts");
    let bolt = other.add_object("Bolt");
    bolt.set_property("Diameter", mm(8.0));

    assert_eq!(engine.evaluate("Parts#Bolt.Diameter / 2").unwrap().to_string(), "4 mm");
    assert_eq!(engine.evaluate("Missing#Bolt.Diameter").unwrap_err().kind(), ErrorKind::Name);
}

#[test]
fn properties_can_be_written() {
    let mut engine = Engine::new();
    let plate = engine.document().add_object("Plate");
    plate.set_property("Width", mm(40.0));
    plate.purge_touched();

    engine.evaluate("Plate.Width = 55 mm").unwrap();
    assert_eq!(plate.get_property_by_name("Width"), Some(mm(55.0)));
    assert!(plate.is_touched("Width"));
}

#[test]
fn cell_ranges_feed_aggregates() {
    let mut engine = Engine::new();
    let sheet = engine.scratch();
    sheet.set_property("A1", Value::Integer(1));
    sheet.set_property("A2", Value::Integer(2));
    sheet.set_property("A3", Value::Integer(3));

    assert_eq!(engine.evaluate("sum(A1:A3)").unwrap().to_string(), "6");
    assert_eq!(engine.evaluate("average(A1:A3)").unwrap().to_string(), "2");
    assert_eq!(engine.evaluate("stddev(A1:A3)").unwrap().to_string(), "1");
    assert_eq!(engine.evaluate("count(A1:A5)").unwrap().to_string(), "3");
    assert_eq!(engine.evaluate("A1:A3").unwrap().to_string(), "(1, 2, 3)");
}

#[test]
fn range_ends_may_be_aliases() {
    let mut engine = Engine::new();
    let sheet = engine.scratch();
    sheet.set_property("B1", mm(1.0));
    sheet.set_property("B2", mm(2.0));
    sheet.set_alias("B2", "Last");

    let range = Expr::new(ExprKind::Range { begin: "B1".into(),
                                            end:   "Last".into(), },
                          1);
    let expression = Expression::new(Some(sheet), range);
    let cells = engine.context_mut().evaluate_expression(&expression).unwrap();
    assert_eq!(cells.to_string(), "(1 mm, 2 mm)");
}

#[test]
fn ranges_need_an_owner() {
    let err = cadexpr::evaluate_source(&mut Context::new(), "sum(A1:A2)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
}

#[test]
fn absolute_cell_references_read_the_same_cell() {
    let mut engine = Engine::new();
    engine.scratch().set_property("C4", Value::Integer(7));
    assert_eq!(engine.evaluate("$C$4 + $C4 + C$4").unwrap().to_string(), "21");
}

#[test]
fn recompute_follows_dependencies() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let block = doc.add_object("Block");
    block.set_property("Length", Value::Integer(10));
    block.set_property("Width", Value::Integer(3));

    // Bound before the binding it depends on.
    doc.set_expression("Block",
                       "Volume",
                       Expression::parse(Some(&block), "Block.Length * Block.Width * Block.Height").unwrap());
    doc.set_expression("Block",
                       "Height",
                       Expression::parse(Some(&block), "Block.Length * 2").unwrap());

    let mut ctx = Context::new();
    assert_eq!(doc.recompute(&mut ctx).unwrap(), 2);
    assert_eq!(block.get_property_by_name("Height"), Some(Value::Integer(20)));
    assert_eq!(block.get_property_by_name("Volume"), Some(Value::Integer(600)));
}

#[test]
fn recompute_reports_cycles() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let block = doc.add_object("Block");
    doc.set_expression("Block", "P", Expression::parse(Some(&block), "Block.Q + 1").unwrap());
    doc.set_expression("Block", "Q", Expression::parse(Some(&block), "Block.P + 1").unwrap());

    let err = doc.recompute(&mut Context::new()).unwrap_err();
    assert_eq!(err.message(), "Cyclic dependency");
}

#[test]
fn hidden_references_break_cycles() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let block = doc.add_object("Block");
    block.set_property("Q", Value::Integer(0));
    doc.set_expression("Block",
                       "P",
                       Expression::parse(Some(&block), "hiddenref(Block.Q) + 1").unwrap());
    doc.set_expression("Block", "Q", Expression::parse(Some(&block), "Block.P + 1").unwrap());

    assert_eq!(doc.recompute(&mut Context::new()).unwrap(), 2);
    assert_eq!(block.get_property_by_name("P"), Some(Value::Integer(1)));
    assert_eq!(block.get_property_by_name("Q"), Some(Value::Integer(2)));
}

#[test]
fn engine_recompute_uses_the_scratch_document() {
    let mut engine = Engine::new();
    let scratch = Rc::clone(engine.scratch());
    scratch.set_property("Base", mm(5.0));
    let expression = engine.parse("Base * 3").unwrap();
    engine.document().set_expression(Engine::SCRATCH, "Result", expression);

    assert_eq!(engine.recompute().unwrap(), 1);
    assert_eq!(scratch.get_property_by_name("Result"), Some(mm(15.0)));
}

#[test]
fn touched_properties_mark_expressions() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let block = doc.add_object("Block");
    block.set_property("Length", Value::Integer(1));
    block.set_property("Width", Value::Integer(2));
    block.purge_touched();

    let expression = Expression::parse(Some(&block), "Length + 1").unwrap();
    assert!(!expression.is_touched());
    block.touch("Width");
    assert!(!expression.is_touched());
    block.touch("Length");
    assert!(expression.is_touched());
    doc.purge_touched();
    assert!(!expression.is_touched());
}

#[test]
fn links_expose_the_target_properties() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let part = doc.add_object("Part");
    part.set_property("Mass", Value::Integer(4));
    let link = doc.add_object("Link");
    link.set_link(&part, Default::default());

    let expression = Expression::parse(Some(&link), "Link.Mass * 2").unwrap();
    assert_eq!(expression.evaluate(&mut Context::new()).unwrap().to_string(), "8");
}

#[test]
fn bound_expression_errors_name_the_expression() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let block = doc.add_object("Block");
    let expression = Expression::parse(Some(&block), "Block.Missing + 1").unwrap();

    let err = expression.evaluate(&mut Context::new()).unwrap_err();
    assert!(err.to_string().contains("in expression: Block.Missing + 1"), "{err}");
}

fn warnings(engine: &mut Engine) -> Vec<(String, u8)> {
    let mut warned = engine.context_mut()
                           .emitted_warnings()
                           .map(|(function, code)| (function.to_string(), code))
                           .collect::<Vec<_>>();
    warned.sort();
    warned
}

#[test]
fn property_reads_in_functions_warn_once() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Length", Value::Integer(4));
    let src = "def area():\n    return Length * Length\ndef edge():\n    return Length\n\
               area() + area() + edge() + Length";
    assert_eq!(engine.evaluate(src).unwrap().to_string(), "40");
    assert_eq!(warnings(&mut engine),
               vec![("area".to_string(), 1), ("edge".to_string(), 1)]);
}

#[test]
fn property_writes_in_functions_warn() {
    let mut engine = Engine::new();
    let plate = engine.document().add_object("Plate");
    plate.set_property("Width", Value::Integer(1));
    engine.evaluate("def widen():\n    Plate.Width = 3\nwiden()").unwrap();
    assert_eq!(plate.get_property_by_name("Width"), Some(Value::Integer(3)));
    assert_eq!(warnings(&mut engine), vec![("widen".to_string(), 2)]);
}

#[test]
fn nowarn_pragma_silences_warnings() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Length", Value::Integer(4));
    let src = "def quiet():\n    pragma('nowarn')\n    return Length\n\
               def writes_only():\n    pragma('nowarn', 2)\n    return Length\n\
               quiet() + writes_only()";
    assert_eq!(engine.evaluate(src).unwrap().to_string(), "8");
    assert_eq!(warnings(&mut engine), vec![("writes_only".to_string(), 1)]);
}

#[test]
fn warn_pragma_restores_warnings() {
    let mut engine = Engine::new();
    engine.scratch().set_property("Length", Value::Integer(4));
    let src = "def f():\n    pragma('nowarn')\n    a = Length\n    pragma('warn', 1)\n    return a + Length\nf()";
    assert_eq!(engine.evaluate(src).unwrap().to_string(), "8");
    assert_eq!(warnings(&mut engine), vec![("f".to_string(), 1)]);
}

#[test]
fn disabled_warnings_are_never_recorded() {
    let config = EngineConfig { warnings: false,
                                ..EngineConfig::default() };
    let mut engine = Engine::with_config(config);
    engine.scratch().set_property("Length", Value::Integer(4));
    engine.evaluate("def f():\n    return Length\nf()").unwrap();
    assert!(warnings(&mut engine).is_empty());
}
