use super::*;
use crate::expression::parse_expression;
use crate::units::UnitRegistry;

fn resolve_with(formula: &str, x_unit: &str, y_unit: &str) -> ContourResult<ResolvedExpr> {
    let registry = UnitRegistry::new();
    let units = [registry.parse(x_unit)?, registry.parse(y_unit)?];
    let expr = parse_expression(formula, ["x", "y"])?;
    resolve(&expr, &units, &registry)
}

fn unit_of(formula: &str, x_unit: &str, y_unit: &str) -> Unit {
    resolve_with(formula, x_unit, y_unit).unwrap().unit
}

#[test]
fn test_literal_arithmetic_is_dimensionless() {
    for formula in ["1 + 2", "3 * 4 / 5", "2 ^ 0.5", "-(7 - 9) * pi", "sqrt(16) + exp(1)"] {
        let unit = unit_of(formula, "m", "s");
        assert!(unit.is_unity(), "{} resolved to {}", formula, unit);
    }
}

#[test]
fn test_addition_keeps_unit() {
    let unit = unit_of("x + y", "m", "m");
    assert_eq!(unit.symbol(), "m");
}

#[test]
fn test_addition_of_incompatible_dimensions_fails() {
    match resolve_with("x + y", "m", "s") {
        Err(ContourError::DimensionalMismatch {
            operator,
            expected,
            actual,
            span,
        }) => {
            assert_eq!(operator, "+");
            assert_eq!(expected, "m");
            assert_eq!(actual, "s");
            assert_eq!(span, Span::new(0, 5));
        }
        other => panic!("Expected mismatch, got {:?}", other),
    }
}

#[test]
fn test_subtraction_of_incompatible_dimensions_fails() {
    assert!(matches!(
        resolve_with("x - y", "kg", "s"),
        Err(ContourError::DimensionalMismatch { .. })
    ));
}

#[test]
fn test_mixed_scale_addition_uses_left_unit() {
    let resolved = resolve_with("x + y", "m", "ft").unwrap();
    assert_eq!(resolved.unit.symbol(), "m");
    match resolved.kind {
        ResolvedKind::Binary { scales, .. } => {
            assert_eq!(scales[0], 1.0);
            assert!((scales[1] - 0.3048).abs() < 1e-12);
        }
        _ => panic!("Expected binary node"),
    }
}

#[test]
fn test_multiplication_composes_units() {
    let unit = unit_of("x * y", "m", "s");
    assert_eq!(unit.symbol(), "m*s");
    assert_eq!(unit.scale(), 1.0);
}

#[test]
fn test_division_of_same_units_is_dimensionless() {
    let unit = unit_of("x / y", "s", "s");
    assert!(unit.is_unity());
}

#[test]
fn test_square_of_length() {
    assert_eq!(unit_of("x * x", "m", "s").symbol(), "m^2");
    assert_eq!(unit_of("x ^ 2", "m", "s").symbol(), "m^2");
    assert_eq!(unit_of("x ** 2", "m", "s").symbol(), "m^2");
}

#[test]
fn test_mixed_formula_from_rules() {
    // (m + m) / s
    assert_eq!(unit_of("(x + x) / y", "m", "s").symbol(), "m/s");
}

#[test]
fn test_rational_exponents() {
    assert_eq!(unit_of("x ^ (1/2)", "m", "s").symbol(), "m^(1/2)");
    assert_eq!(unit_of("sqrt(x * x)", "m", "s").symbol(), "m");
    assert_eq!(unit_of("x ^ -2", "m", "s").symbol(), "1/m^2");
}

#[test]
fn test_variable_exponent_on_dimensional_base_fails() {
    match resolve_with("x ^ y", "m", "1") {
        Err(ContourError::DimensionalMismatch { expected, .. }) => {
            assert_eq!(expected, "constant exponent");
        }
        other => panic!("Expected mismatch, got {:?}", other),
    }
}

#[test]
fn test_dimensional_exponent_fails() {
    assert!(matches!(
        resolve_with("2 ^ x", "m", "s"),
        Err(ContourError::DimensionalMismatch { .. })
    ));
}

#[test]
fn test_irrational_exponent_fails() {
    assert!(matches!(
        resolve_with("x ^ pi", "m", "s"),
        Err(ContourError::DimensionalMismatch { .. })
    ));
}

#[test]
fn test_dimensionless_base_takes_variable_exponent() {
    assert!(unit_of("y ^ x", "1", "1").is_unity());
}

#[test]
fn test_transcendental_requires_dimensionless() {
    match resolve_with("log(x)", "m", "s") {
        Err(ContourError::DimensionalMismatch {
            operator, expected, ..
        }) => {
            assert_eq!(operator, "log");
            assert_eq!(expected, "dimensionless");
        }
        other => panic!("Expected mismatch, got {:?}", other),
    }
    assert!(unit_of("sin(x / y)", "m", "ft").is_unity());
}

#[test]
fn test_angle_argument_is_scaled_to_radians() {
    let resolved = resolve_with("sin(x)", "deg", "s").unwrap();
    match resolved.kind {
        ResolvedKind::Call { scales, .. } => {
            assert!((scales[0] - std::f64::consts::PI / 180.0).abs() < 1e-15);
        }
        _ => panic!("Expected call node"),
    }
}

#[test]
fn test_literal_unit_suffix() {
    assert_eq!(unit_of("x * 9.81[m/s^2]", "kg", "s").symbol(), "kg*m/s^2");
    assert!(matches!(
        resolve_with("x + 2[s]", "m", "s"),
        Err(ContourError::DimensionalMismatch { .. })
    ));
}

#[test]
fn test_unknown_literal_unit() {
    assert!(matches!(
        resolve_with("x * 2[parsec]", "m", "s"),
        Err(ContourError::Unit(UnitError::UnknownUnit(_)))
    ));
}

#[test]
fn test_two_argument_functions() {
    assert!(unit_of("atan2(y, x)", "m", "km").is_unity());
    assert_eq!(unit_of("hypot(x, y)", "m", "km").symbol(), "m");
    assert_eq!(unit_of("max(x, y)", "ft", "in").symbol(), "ft");
    assert!(matches!(
        resolve_with("min(x, y)", "m", "s"),
        Err(ContourError::DimensionalMismatch { .. })
    ));
    assert_eq!(unit_of("pow(x, 3)", "m", "s").symbol(), "m^3");
}

#[test]
fn test_offset_units_reject_arithmetic() {
    assert!(resolve_with("x", "degC", "s").is_ok());
    assert!(matches!(
        resolve_with("x * 2", "degC", "s"),
        Err(ContourError::Unit(UnitError::OffsetCalculus(_)))
    ));
}

#[test]
fn test_same_tree_under_different_declarations() {
    let registry = UnitRegistry::new();
    let expr = parse_expression("x * y", ["x", "y"]).unwrap();
    let metric = [registry.parse("m").unwrap(), registry.parse("s").unwrap()];
    let imperial = [registry.parse("ft").unwrap(), registry.parse("h").unwrap()];

    let a = resolve(&expr, &metric, &registry).unwrap();
    let b = resolve(&expr, &imperial, &registry).unwrap();
    assert_eq!(a.unit.symbol(), "m*s");
    assert_eq!(b.unit.symbol(), "ft*h");
}

#[test]
fn test_exponent_overflow_is_a_unit_error() {
    match resolve_with("(x^100000)^100000", "m", "s") {
        Err(ContourError::DimensionalMismatch {
            operator,
            expected,
            span,
            ..
        }) => {
            assert_eq!(operator, "^");
            assert_eq!(expected, "rational exponent");
            assert_eq!(span.start, 11);
        }
        other => panic!("Expected mismatch, got {:?}", other),
    }
}

#[test]
fn test_nested_roots_overflow_cleanly() {
    let formula = format!("{}x{}", "sqrt(".repeat(40), ")".repeat(40));
    match resolve_with(&formula, "m", "s") {
        Err(ContourError::DimensionalMismatch { operator, .. }) => assert_eq!(operator, "sqrt"),
        other => panic!("Expected mismatch, got {:?}", other),
    }

    // Dimensionless arguments never grow an exponent.
    assert!(unit_of(&formula, "1", "s").is_unity());
}
