//! Tests for the unit layer.

use super::*;

fn parse(text: &str) -> Unit {
    UnitRegistry::new().parse(text).unwrap()
}

#[test]
fn test_base_and_named_units() {
    let m = parse("m");
    assert_eq!(m.dimension(), &Dimension::base(LENGTH, 1));
    assert_eq!(m.scale(), 1.0);

    let inch = parse("inch");
    assert!((inch.scale() - 0.0254).abs() < 1e-15);
    assert_eq!(inch.symbol(), "in");
}

#[test]
fn test_long_names_and_plurals() {
    assert_eq!(parse("meters").symbol(), "m");
    assert_eq!(parse("inches").symbol(), "in");
    assert_eq!(parse("feet").symbol(), "ft");
    assert_eq!(parse("minutes").symbol(), "min");
    assert_eq!(parse("weeks").symbol(), "week");
}

#[test]
fn test_si_prefixes() {
    assert!((parse("km").scale() - 1000.0).abs() < 1e-9);
    assert!((parse("mm").scale() - 1e-3).abs() < 1e-15);
    assert!((parse("kilometer").scale() - 1000.0).abs() < 1e-9);
    assert!((parse("kg").scale() - 1.0).abs() < 1e-12);
    assert!((parse("ms").scale() - 1e-3).abs() < 1e-15);
    assert!(parse("kPa").is_compatible(&parse("Pa")));
}

#[test]
fn test_prefixes_do_not_apply_to_imperial_units() {
    let registry = UnitRegistry::new();
    assert!(matches!(registry.parse("kft"), Err(UnitError::UnknownUnit(_))));
}

#[test]
fn test_unknown_unit() {
    let registry = UnitRegistry::new();
    assert_eq!(
        registry.parse("bogus1"),
        Err(UnitError::UnknownUnit("bogus1".to_string()))
    );
}

#[test]
fn test_unit_expressions() {
    let accel = parse("m/s^2");
    assert_eq!(accel.dimension(), &Dimension::from_exponents([1, 0, -2, 0, 0, 0, 0]));
    assert_eq!(accel.symbol(), "m/s^2");

    let area = parse("m**2");
    assert_eq!(area.symbol(), "m^2");

    let newton = parse("kg*m/s**2");
    assert!(newton.is_compatible(&parse("N")));

    let grouped = parse("J / (kg * K)");
    assert_eq!(grouped.symbol(), "J/(kg*K)");

    assert!(parse("").is_unity());
    assert!(parse("1").is_unity());
    assert!(parse("dimensionless").is_unity());
    assert_eq!(parse("1/s").symbol(), "1/s");
}

#[test]
fn test_fractional_exponent_in_unit_expression() {
    let root = parse("m^(1/2)");
    assert_eq!(
        root.dimension().exponent(LENGTH),
        Rational32::new(1, 2)
    );
    assert_eq!(parse("m^0.5"), root);
}

#[test]
fn test_malformed_unit_expression() {
    let registry = UnitRegistry::new();
    assert!(matches!(registry.parse("m/"), Err(UnitError::Malformed { .. })));
    assert!(matches!(registry.parse("(m"), Err(UnitError::Malformed { .. })));
    assert!(matches!(registry.parse("m^x"), Err(UnitError::Malformed { .. })));

    let nested = |depth: usize| format!("{}m{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(registry.parse(&nested(8)).unwrap().symbol(), "m");
    assert!(matches!(
        registry.parse(&nested(10_000)),
        Err(UnitError::Malformed { .. })
    ));
}

#[test]
fn test_factors_cancel() {
    let unit = parse("m").try_div(&parse("m")).unwrap();
    assert!(unit.is_unity());
    assert_eq!(unit.to_string(), "dimensionless");

    let mixed = parse("m").try_div(&parse("ft")).unwrap();
    assert!(mixed.is_dimensionless());
    assert!(!mixed.is_unity());
}

#[test]
fn test_unit_conversions() {
    let mm = parse("mm");
    let inch = parse("in");

    let conv = Conversion::between(&inch, &mm).unwrap();
    assert!((conv.apply(1.0) - 25.4).abs() < 1e-10);

    let back = Conversion::between(&mm, &inch).unwrap();
    assert!((back.apply(25.4) - 1.0).abs() < 1e-10);

    assert!(Conversion::between(&mm, &mm).unwrap().is_identity());
}

#[test]
fn test_temperature_offsets() {
    let c = parse("degC");
    let f = parse("degF");
    let k = parse("K");

    assert!((Conversion::between(&c, &k).unwrap().apply(0.0) - 273.15).abs() < 1e-10);
    assert!((Conversion::between(&f, &c).unwrap().apply(212.0) - 100.0).abs() < 1e-10);
    assert!((c.from_base(c.to_base(21.5)) - 21.5).abs() < 1e-10);
}

#[test]
fn test_offset_units_reject_composition() {
    let c = parse("degC");
    assert!(matches!(
        c.try_mul(&parse("m")),
        Err(UnitError::OffsetCalculus(_))
    ));
    assert!(matches!(
        UnitRegistry::new().parse("degC/s"),
        Err(UnitError::OffsetCalculus(_))
    ));
}

#[test]
fn test_incompatible_conversion() {
    assert!(matches!(
        Conversion::between(&parse("m"), &parse("s")),
        Err(UnitError::Incompatible { .. })
    ));
}

#[test]
fn test_unit_compatibility() {
    assert!(parse("mm").is_compatible(&parse("mile")));
    assert!(!parse("mm").is_compatible(&parse("deg")));
    assert!(parse("deg").is_compatible(&Unit::dimensionless()));
    assert!(parse("Hz").is_compatible(&parse("1/s")));
}

#[test]
fn test_rational_from_f64() {
    assert_eq!(rational_from_f64(0.5), Some(Rational32::new(1, 2)));
    assert_eq!(rational_from_f64(-2.0), Some(Rational32::from_integer(-2)));
    assert_eq!(rational_from_f64(std::f64::consts::PI), None);
    assert_eq!(rational_from_f64(f64::NAN), None);
}

#[test]
fn test_unit_serialization_round_trip() {
    let unit = parse("kg*m/s^2");
    let json = serde_json::to_string(&unit).unwrap();
    let restored: Unit = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, unit);
}

#[test]
fn test_convert_through_unit_system() {
    let registry = UnitRegistry::new();
    let value = registry.convert(3.0, &parse("ft"), &parse("in")).unwrap();
    assert!((value - 36.0).abs() < 1e-10);
}

#[test]
fn test_exponent_overflow() {
    let big = Rational32::from_integer(i32::MAX);
    let length = Dimension::base(LENGTH, 2);
    assert!(length.pow(big).is_none());
    assert!(length.mul(&Dimension::base(LENGTH, i32::MAX)).is_none());
    assert_eq!(
        length.div(&Dimension::base(LENGTH, 2)),
        Some(Dimension::dimensionless())
    );

    let registry = UnitRegistry::new();
    let metre = registry.parse("m").unwrap();
    let huge = metre.try_pow(big).unwrap();
    assert!(matches!(huge.try_mul(&metre), Err(UnitError::ExponentOverflow(_))));
    assert!(matches!(
        huge.try_pow(Rational32::from_integer(2)),
        Err(UnitError::ExponentOverflow(_))
    ));
    assert!(matches!(
        registry.parse("m^(1/1000) * m^(1/999) * m^(1/997) * m^(1/991)"),
        Err(UnitError::ExponentOverflow(_))
    ));
}
