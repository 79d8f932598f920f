use cadexpr::{
    error::{ErrorKind, RuntimeError},
    evaluate_source,
    interpreter::{evaluator::core::Context, value::core::Value},
    quantity::{Quantity, Unit},
};
use pretty_assertions::assert_eq;

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
fn adding_lengths() {
    assert_value("10mm + 5mm", "15 mm");
    assert_value("1 m + 1 mm", "1001 mm");
    assert_value("2 cm - 5 mm", "15 mm");
    assert_value("1 in", "25.4 mm");
}

#[test]
fn adding_a_plain_number_to_a_length_is_a_unit_mismatch() {
    let err = assert_failure("10mm + 5");
    assert_eq!(err.kind(), ErrorKind::UnitMismatch);
    assert!(err.message().starts_with("Unit mismatch"), "{err}");
    assert!(matches!(err.root(), RuntimeError::UnitMismatch { .. }));
}

#[test]
fn mixed_dimensions_do_not_add() {
    assert_eq!(assert_failure("1 mm + 1 s").kind(), ErrorKind::UnitMismatch);
    assert_eq!(assert_failure("1 kg - 1 mm").kind(), ErrorKind::UnitMismatch);
}

#[test]
fn products_and_quotients_combine_units() {
    assert_value("2 mm * 3 mm", "6 mm^2");
    assert_value("10 mm / 2 s", "5 mm/s");
    assert_value("6 mm^2 / 2 mm", "3 mm");
    assert_value("(4 mm) ^ 2", "16 mm^2");
    assert_value("2 * 3 mm", "6 mm");
}

#[test]
fn dimensionless_results_degrade_to_numbers() {
    assert_value("10 mm / 2 mm", "5");
    assert_value("1 mm / 4 mm", "0.25");
    let v = eval("3 mm / 1 mm");
    assert!(matches!(v, Value::Integer(3)));
}

#[test]
fn juxtaposed_terms_add_up() {
    assert_value("1 ft 6 in", "457.2 mm");
    assert_value("1 m 20 cm", "1200 mm");
}

#[test]
fn compound_unit_expressions() {
    assert_value("9.81 m/s^2 * 2 kg", "19620 mm*kg/s^2");
    assert_value("1 N", "1000 mm*kg/s^2");
    assert_value("2 (mm/s)", "2 mm/s");
}

#[test]
fn unit_symbols_read_as_one_unit() {
    assert_value("3 * cm", "30 mm");
    assert_value("x = 2\nx mm", "2 mm");
}

#[test]
fn unknown_unit_names_read_as_variables() {
    let err = assert_failure("2 mm/parsec");
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn comparisons_respect_units() {
    assert_value("5 mm == 0.5 cm", "True");
    assert_value("1 m > 999 mm", "True");
    assert_value("1 mm == 1", "False");
}

#[test]
fn math_functions_are_unit_aware() {
    assert_value("sqrt(9 mm^2)", "3 mm");
    assert_value("abs(-4 mm)", "4 mm");
    assert_value("round(2.6 mm)", "3 mm");
    assert_value("round(cos(60 deg) * 100)", "50");
    assert_value("asin(1)", "90 deg");
    assert_eq!(assert_failure("sin(2 mm)").kind(), ErrorKind::UnitMismatch);
    assert_eq!(assert_failure("sqrt(2 mm^3)").kind(), ErrorKind::UnitMismatch);
}

#[test]
fn aggregates_keep_units() {
    assert_value("sum(1 mm, 2 mm, 3 mm)", "6 mm");
    assert_value("max([1 mm, 7 mm, 3 mm])", "7 mm");
    assert_value("min(4, 2, 8)", "2");
    assert_value("average(2 mm, 4 mm)", "3 mm");
    assert_value("sum([])", "0");
    assert_eq!(assert_failure("sum(1 mm, 2)").kind(), ErrorKind::UnitMismatch);
}

#[test]
fn quantity_attributes() {
    assert_value("q = 12 mm\nq.Value", "12.0");
    assert_value("q = 12 mm\nq.Unit", "mm");
}

#[test]
fn quantities_convert_to_values() {
    assert_eq!(Value::Quantity(Quantity::new(15.0, Unit::LENGTH)).to_string(), "15 mm");
    assert_eq!(eval("10mm + 5mm"), Value::Quantity(Quantity::new(15.0, Unit::LENGTH)));
}

#[test]
fn string_formatting_of_quantities() {
    assert_value("str(2.5 mm)", "2.5 mm");
    assert_value("'%s' % (3 mm)", "3 mm");
}

#[test]
fn unit_algebra_holds_within_tolerance() {
    assert_value("p = 3.5 mm\nq = 1.25 mm\n(p + q) - q == p", "True");
    assert_value("p = 0.1 m\nq = 0.2 m\n(p + q) - q == p", "True");
    assert_value("p = -4 mm\nsqrt(p * p) == abs(p)", "True");
    assert_value("p = 2.5 kg\np / p == 1.0", "True");
}
