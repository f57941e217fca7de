use super::*;

#[test]
fn test_count_of_eleven_has_unit_step() {
    let builder = GridBuilder::default();
    let axis = builder.axis("x", &SampleRange::count(0.0, 10.0, 11, "m")).unwrap();
    assert_eq!(axis.len(), 11);
    for (i, v) in axis.iter().enumerate() {
        assert!((v - i as f64).abs() < 1e-10);
    }
    assert_eq!(axis[10], 10.0);
}

#[test]
fn test_grid_orientation() {
    let grid = GridBuilder::default()
        .build(
            &SampleRange::count(0.0, 2.0, 3, "m"),
            &SampleRange::count(0.0, 3.0, 4, "s"),
        )
        .unwrap();
    assert_eq!(grid.shape(), (4, 3));
    assert_eq!(grid.y.shape(), (4, 3));
    for i in 0..4 {
        for j in 0..3 {
            // x varies along columns, y along rows
            assert!((grid.x[(i, j)] - j as f64).abs() < 1e-10);
            assert!((grid.y[(i, j)] - i as f64).abs() < 1e-10);
        }
    }
}

#[test]
fn test_step_sampling_includes_stop() {
    let builder = GridBuilder::default();
    let axis = builder.axis("x", &SampleRange::step(0.0, 0.3, 0.1, "")).unwrap();
    assert_eq!(axis.len(), 4);
    assert_eq!(axis[3], 0.3);

    let short = builder.axis("x", &SampleRange::step(0.0, 1.0, 0.4, "")).unwrap();
    assert_eq!(short.len(), 3);
    assert!((short[2] - 0.8).abs() < 1e-12);
}

#[test]
fn test_log_spacing() {
    let range = SampleRange::count(1.0, 1000.0, 4, "").with_spacing(Spacing::Log);
    let axis = GridBuilder::default().axis("x", &range).unwrap();
    let expected = [1.0, 10.0, 100.0, 1000.0];
    for (v, e) in axis.iter().zip(expected.iter()) {
        assert!((v - e).abs() / e < 1e-12);
    }
}

#[test]
fn test_invalid_ranges() {
    let builder = GridBuilder::default();
    let cases = [
        SampleRange::count(0.0, 1.0, 1, ""),
        SampleRange::count(0.0, 1.0, 0, ""),
        SampleRange::count(2.0, 1.0, 5, ""),
        SampleRange::count(f64::NAN, 1.0, 5, ""),
        SampleRange::step(0.0, 1.0, 0.0, ""),
        SampleRange::step(0.0, 1.0, -0.5, ""),
        SampleRange::step(0.0, 1.0, 2.0, ""),
        SampleRange::count(0.0, 1.0, 5, "").with_spacing(Spacing::Log),
        SampleRange::step(1.0, 10.0, 1.0, "").with_spacing(Spacing::Log),
    ];
    for range in cases {
        match builder.axis("t", &range) {
            Err(ContourError::InvalidRange { axis, .. }) => assert_eq!(axis, "t"),
            other => panic!("{:?}: expected invalid range, got {:?}", range, other),
        }
    }
}

#[test]
fn test_degenerate_range_with_count() {
    let axis = GridBuilder::default()
        .axis("x", &SampleRange::count(5.0, 5.0, 3, ""))
        .unwrap();
    assert!(axis.iter().all(|v| *v == 5.0));
}

#[test]
fn test_cell_limit() {
    let builder = GridBuilder::new(100);
    let ok = builder.build(
        &SampleRange::count(0.0, 1.0, 10, ""),
        &SampleRange::count(0.0, 1.0, 10, ""),
    );
    assert!(ok.is_ok());

    let too_big = builder.build(
        &SampleRange::count(0.0, 1.0, 10, ""),
        &SampleRange::count(0.0, 1.0, 11, ""),
    );
    assert!(matches!(too_big, Err(ContourError::LimitExceeded(_))));

    let tiny_step = builder.axis("x", &SampleRange::step(0.0, 1.0, 1e-12, ""));
    assert!(matches!(tiny_step, Err(ContourError::LimitExceeded(_))));
}

#[test]
fn test_range_from_json() {
    let range: SampleRange =
        serde_json::from_str(r#"{"start": 0, "stop": 2, "sampling": {"step": 0.5}, "unit": "mm"}"#)
            .unwrap();
    assert_eq!(range.sampling, Sampling::Step(0.5));
    assert_eq!(range.spacing, Spacing::Linear);
    assert_eq!(range.unit, "mm");

    let log: SampleRange = serde_json::from_str(
        r#"{"start": 1, "stop": 100, "sampling": {"count": 3}, "spacing": "log"}"#,
    )
    .unwrap();
    assert_eq!(log.spacing, Spacing::Log);
    assert_eq!(log.unit, "");
}
