use super::*;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(rng: &mut StdRng, n: usize) -> Vec<Point3<f64>> {
    (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            )
        })
        .collect()
}

fn random_rotation(rng: &mut StdRng) -> Rotation3<f64> {
    Rotation3::from_euler_angles(
        rng.gen_range(-3.0..3.0),
        rng.gen_range(-1.5..1.5),
        rng.gen_range(-3.0..3.0),
    )
}

fn apply(
    points: &[Point3<f64>],
    rotation: &Rotation3<f64>,
    scale: f64,
    t: &Vector3<f64>,
) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| Point3::from(rotation * p.coords * scale + t))
        .collect()
}

#[test]
fn test_rigid_self_registration_is_identity() {
    let mut rng = StdRng::seed_from_u64(7);
    for n in [3, 4, 10] {
        let from = random_points(&mut rng, n);

        let transform =
            solve(&from, &from, TransformFamily::Rigid, OutputRepresentation::LinearOnly).unwrap();
        let matrix = transform.as_matrix().unwrap();

        assert!((matrix - Matrix4::identity()).norm() < 1e-9);
        assert!(compute_rms_error(&from, &from, &transform).unwrap() < 1e-9);
    }
}

#[test]
fn test_rigid_recovers_random_motion() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let from = random_points(&mut rng, 6);
        let rotation = random_rotation(&mut rng);
        let translation = Vector3::new(
            rng.gen_range(-100.0..100.0),
            rng.gen_range(-100.0..100.0),
            rng.gen_range(-100.0..100.0),
        );
        let to = apply(&from, &rotation, 1.0, &translation);

        let solved =
            solve_with_diagnostics(&from, &to, TransformFamily::Rigid, OutputRepresentation::Any)
                .unwrap();
        let pose =
            fiducial_core::SimilarityPose::from_matrix(solved.transform.as_matrix().unwrap());

        assert!(!solved.degenerate);
        assert!((pose.rotation - rotation.matrix()).norm() < 1e-8);
        assert!((pose.translation - translation).norm() < 1e-7);
        assert!((pose.scale - 1.0).abs() < 1e-9);
        assert!(compute_rms_error(&from, &to, &solved.transform).unwrap() < 1e-7);
    }
}

#[test]
fn test_rigid_ignores_scale_difference() {
    let mut rng = StdRng::seed_from_u64(3);
    let from = random_points(&mut rng, 8);
    let to = apply(&from, &Rotation3::identity(), 2.0, &Vector3::zeros());

    let transform =
        solve(&from, &to, TransformFamily::Rigid, OutputRepresentation::LinearOnly).unwrap();
    let pose = fiducial_core::SimilarityPose::from_matrix(transform.as_matrix().unwrap());

    assert!((pose.scale - 1.0).abs() < 1e-9);
    assert!(compute_rms_error(&from, &to, &transform).unwrap() > 1.0);
}

#[test]
fn test_similarity_recovers_scale_rotation_translation() {
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..20 {
        let from = random_points(&mut rng, 5);
        let rotation = random_rotation(&mut rng);
        let scale = rng.gen_range(0.1..10.0);
        let translation = Vector3::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
        );
        let to = apply(&from, &rotation, scale, &translation);

        let transform = solve(
            &from,
            &to,
            TransformFamily::Similarity,
            OutputRepresentation::LinearOnly,
        )
        .unwrap();
        let pose = fiducial_core::SimilarityPose::from_matrix(transform.as_matrix().unwrap());

        assert!((pose.scale - scale).abs() < 1e-8 * scale.max(1.0));
        assert!((pose.rotation - rotation.matrix()).norm() < 1e-8);
        assert!((pose.translation - translation).norm() < 1e-6);
        assert!(compute_rms_error(&from, &to, &transform).unwrap() < 1e-6);
    }
}

#[test]
fn test_warping_interpolates_control_points() {
    let mut rng = StdRng::seed_from_u64(99);
    let from = random_points(&mut rng, 8);
    let to: Vec<_> = from
        .iter()
        .map(|p| {
            p + Vector3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            )
        })
        .collect();

    let transform = solve(&from, &to, TransformFamily::Warping, OutputRepresentation::Any).unwrap();

    assert!(!transform.is_linear());
    assert_eq!(transform.as_thin_plate_spline().unwrap().num_landmarks(), 8);
    assert!(compute_rms_error(&from, &to, &transform).unwrap() < 1e-6);
}

#[test]
fn test_warping_into_linear_target_is_rejected() {
    let from = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];

    let err = solve(&from, &from, TransformFamily::Warping, OutputRepresentation::LinearOnly)
        .unwrap_err();

    assert!(matches!(err, Error::IncompatibleOutputRepresentation(_)));
}

#[test]
fn test_solver_preconditions() {
    let three = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];

    let short = solve(&three[..2], &three[..2], TransformFamily::Rigid, OutputRepresentation::Any);
    assert!(matches!(short, Err(Error::InvalidInput(_))));

    let unequal = solve(&three, &three[..2], TransformFamily::Rigid, OutputRepresentation::Any);
    assert!(matches!(unequal, Err(Error::InvalidInput(_))));

    let unknown = solve_named(&three, &three, "Affine", OutputRepresentation::Any);
    assert!(matches!(unknown, Err(Error::InvalidFamily(_))));

    let named = solve_named(&three, &three, "Similarity", OutputRepresentation::Any);
    assert!(named.is_ok());
}

#[test]
fn test_translation_scenario() {
    let from = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let to = vec![
        Point3::new(10.0, 0.0, 0.0),
        Point3::new(11.0, 0.0, 0.0),
        Point3::new(10.0, 1.0, 0.0),
    ];

    let transform =
        solve(&from, &to, TransformFamily::Rigid, OutputRepresentation::LinearOnly).unwrap();

    let mut expected = Matrix4::identity();
    expected[(0, 3)] = 10.0;
    assert!((transform.as_matrix().unwrap() - expected).norm() < 1e-9);
}

#[test]
fn test_rms_error_known_value() {
    let from = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
    let to = vec![Point3::new(0.0, 0.0, 3.0), Point3::new(1.0, 4.0, 0.0)];

    // squared distances 9 and 16
    let rms = compute_rms_error(&from, &to, &Transform::identity()).unwrap();

    assert!((rms - 12.5_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_rms_error_rejects_bad_input() {
    let one = vec![Point3::new(0.0, 0.0, 0.0)];

    assert!(matches!(
        compute_rms_error(&[], &[], &Transform::identity()),
        Err(Error::DivideByZero(_))
    ));
    assert!(matches!(
        compute_rms_error(&one, &[], &Transform::identity()),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_large_point_set_transform_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(5);
    let points = random_points(&mut rng, 2048);
    let rotation = random_rotation(&mut rng);
    let mut matrix = Matrix4::identity();
    matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation.matrix());
    let transform = Transform::from(matrix);

    let mapped = transform.transform_points(&points);

    assert_eq!(mapped.len(), points.len());
    for (p, m) in points.iter().zip(&mapped) {
        assert!((transform.transform_point(p) - m).norm() < 1e-12);
    }
}

#[test]
fn test_family_names() {
    assert_eq!("Rigid".parse::<TransformFamily>().unwrap(), TransformFamily::Rigid);
    assert_eq!(TransformFamily::Warping.to_string(), "Warping");
    assert!("rigid".parse::<TransformFamily>().is_err());
    assert!(OutputRepresentation::LinearOnly.accepts(TransformFamily::Similarity));
    assert!(!OutputRepresentation::LinearOnly.accepts(TransformFamily::Warping));
}

#[test]
fn test_options_from_json_and_validation() {
    let options: RegistrationOptions =
        serde_json::from_str(r#"{ "check_collinearity": false }"#).unwrap();
    assert!(!options.check_collinearity);
    assert_eq!(options.eigenvalue_threshold, DEFAULT_EIGENVALUE_THRESHOLD);

    let bad = RegistrationOptions::default().with_eigenvalue_threshold(-1.0);
    assert!(bad.validate().is_err());

    assert_eq!(UpdateMode::parse_lenient("Automatic"), UpdateMode::Automatic);
    assert_eq!(UpdateMode::parse_lenient("automatic"), UpdateMode::Manual);
    assert_eq!(UpdateMode::parse_lenient("Sometimes"), UpdateMode::Manual);
}
