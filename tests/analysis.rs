use cadexpr::{
    document::{Workspace, cell::CellAddress},
    identifier::{ObjectIdentifier, ObjectName, PathComponent},
    interpreter::{
        analysis::{dependencies, move_cells, offset_cells, rename_identifiers, update_label_reference},
        evaluator::core::Context,
        simplify::simplify,
        value::core::Value,
    },
    evaluate_source, parse,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

fn dependency_names(src: &str) -> Vec<(String, bool)> {
    let tree = parse(src).unwrap_or_else(|e| panic!("Failed to parse {src:?}: {e}"));
    dependencies(&tree).into_iter()
                       .map(|(id, hidden)| (id.to_string(), hidden))
                       .collect()
}

fn visible(names: &[&str]) -> Vec<(String, bool)> {
    names.iter().map(|n| ((*n).to_string(), false)).collect()
}

#[test]
fn dependencies_list_every_reference_once() {
    assert_eq!(dependency_names("Box.Length * 2 + Plate.Width - Box.Length"),
               visible(&["Box.Length", "Plate.Width"]));
    assert_eq!(dependency_names("Doc#Box.Height + <<Base Plate>>.Width"),
               visible(&["Doc#Box.Height", "<<Base Plate>>.Width"]));
}

#[test]
fn unit_symbols_are_not_dependencies() {
    assert_eq!(dependency_names("10 mm + x"), visible(&["x"]));
}

#[test]
fn hidden_references_are_flagged() {
    assert_eq!(dependency_names("href(Box.Length) + 1"),
               vec![("Box.Length".to_string(), true)]);
    // A visible use wins.
    assert_eq!(dependency_names("hiddenref(Box.Length) + Box.Length"),
               visible(&["Box.Length"]));
}

#[test]
fn ranges_contribute_each_cell() {
    assert_eq!(dependency_names("sum(A1:A3)"), visible(&["A1", "A2", "A3"]));
}

#[test]
fn function_bodies_are_not_dependencies() {
    let deps = dependency_names("def f():\n    return Box.Height\nf() + Box.Width");
    assert!(deps.contains(&("Box.Width".to_string(), false)));
    assert!(!deps.iter().any(|(name, _)| name == "Box.Height"));

    let deps = dependency_names("g = lambda x: x + Box.Depth\ng(1)");
    assert!(!deps.iter().any(|(name, _)| name == "Box.Depth"));
}

#[test]
fn simplify_folds_constants() {
    let fold = |src: &str| simplify(&parse(src).unwrap()).to_string();
    assert_eq!(fold("2 * 3 + x"), "6 + x");
    assert_eq!(fold("sqrt(16) * a"), "4 * a");
    assert_eq!(fold("1 > 2 ? a : b"), "b");
    assert_eq!(fold("x if 1 < 2 else y"), "x");
    // Errors are left for evaluation.
    assert_eq!(fold("1 / 0"), "1 / 0");
}

#[test]
fn folded_integers_stay_exact() {
    let folded = simplify(&parse("2 ** 53 + 1").unwrap()).render(true, false, 0);
    assert_eq!(folded, "9007199254740993");

    let value = evaluate_source(&mut Context::new(), &folded).unwrap();
    assert_eq!(value, Value::Integer(9_007_199_254_740_993));
    assert_eq!(simplify(&parse(&folded).unwrap()).to_string(), folded);

    assert_eq!(simplify(&parse("-(2 * 3)").unwrap()).to_string(), "-6");
    assert_eq!(simplify(&parse("7 // 2 + y").unwrap()).to_string(), "3 + y");
}

#[test]
fn simplify_is_idempotent() {
    for src in ["2 * 3 + x", "(1 + 2) * b - 4 / 2", "sqrt(9) + abs(-2) * y", "a ? 1 + 1 : 2 * 2"] {
        let once = simplify(&parse(src).unwrap());
        let twice = simplify(&once);
        assert_eq!(twice.to_string(), once.to_string(), "while simplifying {src:?}");
    }
}

#[test]
fn persistent_source_reparses_to_the_same_text() {
    let sources = ["(1 + 2) * 3 - (4 - 5)",
                   "a - (b - c)",
                   "2 ** 3 ** 2",
                   "-x ** 2",
                   "10 mm + 2 in",
                   "2 (mm/s) * 9223372036854775807",
                   "a if b else c",
                   "a ? b : c",
                   "[x * 2 for x in range(3) if x]",
                   "{'a': 1, 'b': [1, 2]}",
                   "(1,)",
                   "sq = lambda x: x * x\nsq(3)",
                   "xs[1:3] + d['k'] + o.attr[0]",
                   "<<Base Plate>>.Width",
                   "Doc#Box.Length",
                   "$A$1 + B$2 + sum(A1:B2)",
                   "def f(a, b=2):\n    if a:\n        return b\n    return a\nf(1)",
                   "for i in range(3):\n    pass\nelse:\n    x = 1",
                   "try:\n    x = 1\nexcept ValueError as e:\n    pass\nfinally:\n    y = 2",
                   "import math as m\nm.floor(2.5)"];
    for src in sources {
        let once = parse(src).unwrap_or_else(|e| panic!("Failed to parse {src:?}: {e}"))
                             .render(true, false, 0);
        let twice = parse(&once).unwrap_or_else(|e| panic!("Failed to reparse {once:?}: {e}"))
                                .render(true, false, 0);
        assert_eq!(twice, once, "while rendering {src:?}");
    }
}

#[test]
fn renames_follow_the_canonical_form() {
    let workspace = Workspace::new();
    let doc = workspace.add_document("Doc");
    let block = doc.add_object("Box");
    block.set_property("Length", Value::Integer(1));

    let old = ObjectIdentifier::qualified(Some("Doc"),
                                          ObjectName::internal("Box"),
                                          vec![PathComponent::Name("Length".into())]);
    let renames = IndexMap::from([(old, ObjectIdentifier::simple("Size"))]);

    let mut tree = parse("Length + Box.Length + .Length + Width").unwrap();
    assert!(rename_identifiers(&mut tree, &renames, Some(&block)));
    assert_eq!(tree.to_string(), "Size + Size + Size + Width");
    assert!(!rename_identifiers(&mut tree, &renames, Some(&block)));
}

#[test]
fn label_references_follow_label_changes() {
    let mut tree = parse("<<Plate>>.Width + Plate.Width + <<Plates>>.Depth").unwrap();
    assert!(update_label_reference(&mut tree, "Plate", "Base"));
    assert_eq!(tree.to_string(), "<<Base>>.Width + Plate.Width + <<Plates>>.Depth");
}

#[test]
fn inserted_columns_move_later_cells() {
    let mut tree = parse("A1 + B1 + C2").unwrap();
    let b1 = CellAddress::parse("B1").unwrap();
    assert!(move_cells(&mut tree, &b1, 0, 1));
    assert_eq!(tree.to_string(), "A1 + C1 + D2");
}

#[test]
fn moves_leaving_the_sheet_are_ignored() {
    let mut tree = parse("A1 * 2").unwrap();
    let a1 = CellAddress::parse("A1").unwrap();
    assert!(!move_cells(&mut tree, &a1, -1, 0));
    assert_eq!(tree.to_string(), "A1 * 2");
}

#[test]
fn object_paths_are_not_cells() {
    let mut tree = parse("Sheet.A3 + Doc#Sheet.B2").unwrap();
    assert!(!offset_cells(&mut tree, 2, 2));
    assert_eq!(tree.to_string(), "Sheet.A3 + Doc#Sheet.B2");
}

#[test]
fn copied_formulas_shift_relative_cells() {
    let mut tree = parse("sum(A1:A3) / $B$1").unwrap();
    assert!(offset_cells(&mut tree, 0, 2));
    assert_eq!(tree.to_string(), "sum(C1:C3) / $B$1");
}
