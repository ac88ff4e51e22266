use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime};
use timecell::predicate::format_instant;
use timecell::{
    ColumnSelector, Dataset, FeatureMatrix, QueryFunction, QueryFunctionConfig, RowLookup, Store,
    TrainingInput, TrainingInputConfig, Transform, TransformConfig, compile,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 2020-09-13 12:26:40.123456 UTC
fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000) + Duration::from_micros(123_456)
}

fn tomorrow() -> SystemTime {
    now() + Duration::from_secs(24 * 3600)
}

fn in_two_hours() -> SystemTime {
    now() + Duration::from_secs(2 * 3600)
}

/// Naive `YYYY-MM-DD HH:MM:SS.ffffff` rendering, read back as UTC.
fn naive(t: SystemTime) -> String {
    DateTime::<Utc>::from(t)
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next() % (hi - lo + 1) as u64) as i64
    }
}

/// Rows `0..8` at now, row `9` at tomorrow; `x == y == row id`.
fn load_test_dataset() -> Store {
    let dataset = Dataset::new("dataset1");
    for i in 0..9 {
        dataset
            .record_row(&i.to_string(), [("x", i.into(), now()), ("y", i.into(), now())])
            .unwrap();
    }
    dataset
        .record_row("9", [("x", 9.into(), tomorrow()), ("y", 9.into(), tomorrow())])
        .unwrap();
    dataset.commit().unwrap()
}

fn run_transform(store: &Store, output_id: &str, when: &str) -> Store {
    let config = TransformConfig::new(output_id).with_when(when);
    Transform::new(config).unwrap().run(store).unwrap()
}

#[test]
fn test_transform_with_when() {
    init_logging();
    let store = load_test_dataset();

    let wide = run_transform(
        &store,
        "dataset2",
        "timestamp() BETWEEN '2015-01-01' AND '2030-01-06'",
    );
    assert_eq!(wide.len(), 10);
    for row in wide.rows() {
        let first = &row.cells()[0];
        assert_eq!(first.value.as_f64().unwrap().to_string(), row.id());
    }

    let none = run_transform(
        &store,
        "dataset3",
        "timestamp() BETWEEN '2015-01-01' AND '2015-06-06'",
    );
    assert!(none.is_empty());
    let when = compile("timestamp() BETWEEN '2015-01-01' AND '2015-06-06'").unwrap();
    let scanned: Vec<_> = store.filter(&when).scan().collect();
    assert_eq!(scanned.len(), 10);
    assert!(scanned.iter().all(|row| row.is_empty()));

    let between = format!(
        "timestamp() between '{}' and '{}'",
        naive(now()),
        naive(in_two_hours())
    );
    let recent = run_transform(&store, "dataset4", &between);
    assert_eq!(recent.len(), 9);
    assert!(!recent.contains_row("9"));

    let until = format!("timestamp() <= '{}'", naive(in_two_hours()));
    let recent = run_transform(&store, "dataset5", &until);
    assert_eq!(recent.len(), 9);
    assert!(!recent.contains_row("9"));
    assert_eq!(recent.row("0").unwrap().cells()[0].timestamp, now());
}

#[test]
fn test_query_function_with_when() {
    init_logging();
    let store = load_test_dataset();

    let wide = QueryFunction::new(
        QueryFunctionConfig::new("9")
            .with_when("timestamp() BETWEEN '2015-01-01' AND '2030-01-06'"),
    )
    .unwrap();
    let output = wide.apply(&store).unwrap();
    assert_eq!(output.get("x").and_then(|v| v.as_f64()), Some(9.0));

    let narrow = QueryFunction::new(QueryFunctionConfig::new("9").with_when(format!(
        "timestamp() between '{}' and '{}'",
        naive(now()),
        naive(in_two_hours())
    )))
    .unwrap();
    assert!(narrow.apply(&store).unwrap().is_empty());
    assert_eq!(narrow.lookup(&store).unwrap(), RowLookup::FilteredOut);
}

/// Independent random columns at now, `y = 2x` at tomorrow.
fn load_svd_dataset() -> Store {
    let mut rng = Lcg(945);
    let dataset = Dataset::new("svd_example");
    for i in 0..100 {
        let x = rng.range(1, 1000);
        let y = rng.range(1, 1000);
        let z = rng.range(1, 1000);
        dataset
            .record_row(
                &format!("row_{}", i),
                [
                    ("x", x.into(), now()),
                    ("x", x.into(), tomorrow()),
                    ("y", y.into(), now()),
                    ("y", (2 * x).into(), tomorrow()),
                    ("z", z.into(), now()),
                    ("z", z.into(), tomorrow()),
                ],
            )
            .unwrap();
    }
    dataset.commit().unwrap()
}

fn training_matrix(store: &Store, when: String) -> FeatureMatrix {
    TrainingInput::new(TrainingInputConfig::default().with_when(when))
        .unwrap()
        .features(store)
        .unwrap()
}

#[test]
fn test_rank_of_time_slices() {
    init_logging();
    let store = load_svd_dataset();
    let later = format!("timestamp() > '{}'", format_instant(in_two_hours()));
    let earlier = format!("timestamp() < '{}'", format_instant(in_two_hours()));

    let tomorrow_slice = training_matrix(&store, later);
    assert_eq!(tomorrow_slice.len(), 100);
    assert_eq!(tomorrow_slice.width(), 3);
    assert_eq!(tomorrow_slice.rank(), 2);

    let now_slice = training_matrix(&store, earlier);
    assert_eq!(now_slice.rank(), 3);
}

#[test]
fn test_embedding_input_for_both_slices() {
    init_logging();
    let store = load_svd_dataset();
    for op in [">", "<"] {
        let when = format!("timestamp() {} '{}'", op, naive(in_two_hours()));
        let matrix = training_matrix(&store, when);
        assert_eq!(matrix.len(), 100);
        assert_eq!(matrix.columns(), ["x", "y", "z"]);
        assert_eq!(matrix.skipped_text(), 0);
    }
}

#[test]
fn test_classifier_input() {
    init_logging();
    let store = load_test_dataset();
    let split = naive(in_two_hours());

    let later = TrainingInput::new(
        TrainingInputConfig::new(ColumnSelector::All)
            .with_label("x")
            .with_when(format!("timestamp() > '{}'", split)),
    )
    .unwrap();
    let labeled = later.labeled(&store).unwrap();
    assert_eq!(labeled.labels, vec![9.0]);
    assert_eq!(labeled.features.columns(), ["x", "y"]);

    let earlier = TrainingInput::new(
        TrainingInputConfig::new(ColumnSelector::All)
            .with_label("x")
            .with_when(format!("timestamp() <= '{}'", split)),
    )
    .unwrap();
    let labeled = earlier.labeled(&store).unwrap();
    assert_eq!(labeled.len(), 9);
    assert_eq!(labeled.labels, (0..9).map(f64::from).collect::<Vec<_>>());
}

/// Clusters separated along x at now and along y at tomorrow.
fn load_kmeans_dataset() -> Store {
    let mut rng = Lcg(2);
    let dataset = Dataset::new("kmeans_example");
    for i in 1..3u32 {
        let offset = 10f64.powi(i as i32);
        for j in 0..100 {
            let x = rng.range(-5, 5) as f64;
            let y = rng.range(-5, 5) as f64;
            dataset
                .record_row(
                    &format!("row_{}_{}", i, j),
                    [
                        ("x", (x + offset).into(), now()),
                        ("x", x.into(), tomorrow()),
                        ("y", y.into(), now()),
                        ("y", (y + offset).into(), tomorrow()),
                    ],
                )
                .unwrap();
        }
    }
    dataset.commit().unwrap()
}

/// Two-cluster Lloyd iteration seeded with the first point and the point
/// farthest from it.
fn two_means(points: &[Vec<f64>]) -> [Vec<f64>; 2] {
    let distance = |a: &[f64], b: &[f64]| -> f64 {
        a.iter().zip(b).map(|(p, q)| (p - q) * (p - q)).sum()
    };
    let first = points[0].clone();
    let farthest = points
        .iter()
        .max_by(|a, b| distance(a, &first).total_cmp(&distance(b, &first)))
        .unwrap()
        .clone();
    let mut centroids = [first, farthest];

    for _ in 0..10 {
        let mut sums = [vec![0.0; points[0].len()], vec![0.0; points[0].len()]];
        let mut counts = [0usize; 2];
        for point in points {
            let (d0, d1) = (distance(point, &centroids[0]), distance(point, &centroids[1]));
            let k = usize::from(d1 < d0);
            counts[k] += 1;
            for (s, v) in sums[k].iter_mut().zip(point) {
                *s += v;
            }
        }
        for k in 0..2 {
            if counts[k] > 0 {
                centroids[k] = sums[k].iter().map(|s| s / counts[k] as f64).collect();
            }
        }
    }
    centroids
}

#[test]
fn test_kmeans_separating_axis_follows_when() {
    init_logging();
    let store = load_kmeans_dataset();
    let split = format_instant(in_two_hours());

    let later = training_matrix(&store, format!("timestamp() > '{}'", split));
    assert_eq!(later.columns(), ["x", "y"]);
    let [a, b] = two_means(&later.to_dense_default());
    assert!((a[0] - b[0]).abs() < 5.0, "x should not separate: {:?} {:?}", a, b);
    assert!((a[1] - b[1]).abs() > 50.0, "y should separate: {:?} {:?}", a, b);
    assert!(later.column_means()[0].abs() <= 5.0);

    let earlier = training_matrix(&store, format!("timestamp() < '{}'", split));
    let [a, b] = two_means(&earlier.to_dense_default());
    assert!((a[0] - b[0]).abs() > 50.0, "x should separate: {:?} {:?}", a, b);
    assert!((a[1] - b[1]).abs() < 5.0, "y should not separate: {:?} {:?}", a, b);
    assert!(earlier.column_means()[1].abs() <= 5.0);
}
