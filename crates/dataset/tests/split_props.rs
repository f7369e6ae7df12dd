use mtf_core::config::{BoundaryPolicy, SplitConfig};
use mtf_dataset::{TemporalSplitter, WindowBuilder};
use ndarray::Array2;
use proptest::prelude::*;

fn splitter(train_end: f64, validation_end: f64, boundary: BoundaryPolicy) -> TemporalSplitter {
    TemporalSplitter::new(&SplitConfig {
        train_end,
        validation_end,
        boundary,
    })
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn window_count_matches_rows(rows in 1usize..200, seq in 1usize..12) {
        let builder = WindowBuilder::new(seq).unwrap();
        let values = Array2::from_shape_fn((rows, 3), |(i, j)| (i * 3 + j) as f64);
        let times: Vec<i64> = (0..rows as i64).map(|i| i * 900).collect();
        let labels: Vec<u8> = (0..rows).map(|i| (i % 2) as u8).collect();

        let sources: Vec<usize> = (0..rows).collect();
        let expected = if seq == 1 { Some(rows) } else { rows.checked_sub(seq).filter(|&n| n > 0) };
        let built = builder
            .starts(&sources)
            .and_then(|starts| builder.build(values.view(), &times, &labels, &starts));
        match (built, expected) {
            (Ok(set), Some(n)) => {
                prop_assert_eq!(set.len(), n);
                prop_assert_eq!(set.windows.dim(), (n, seq, 3));
                prop_assert!(set.end_times.windows(2).all(|w| w[0] < w[1]));
                // Each window starts one row after the previous one.
                for i in 0..n {
                    prop_assert_eq!(set.windows[[i, 0, 0]], (i * 3) as f64);
                }
            }
            (Err(_), None) => {}
            (got, want) => prop_assert!(false, "got {:?}, want {:?}", got.map(|s| s.len()), want),
        }
    }

    #[test]
    fn windows_never_bridge_dropped_rows(
        kept in proptest::collection::vec(any::<bool>(), 2..120),
        seq in 1usize..6,
    ) {
        let sources: Vec<usize> = kept
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        let builder = WindowBuilder::new(seq).unwrap();
        let reach = if seq == 1 { 0 } else { seq };
        let unbroken = (0..sources.len().saturating_sub(reach))
            .filter(|&k| sources[k] + reach == sources[k + reach])
            .count();
        let Ok(starts) = builder.starts(&sources) else {
            prop_assert_eq!(unbroken, 0);
            return Ok(());
        };
        for &k in &starts {
            // Inputs and label row are one unbroken run of merged rows.
            for j in k..k + reach {
                prop_assert_eq!(sources[j] + 1, sources[j + 1]);
            }
        }
        prop_assert_eq!(starts.len(), unbroken);
    }

    #[test]
    fn overlap_split_partitions_range(
        n in 2usize..2000,
        train in 0.05f64..1.0,
        extra in 0.0f64..1.0,
    ) {
        let validation = train + (1.0 - train) * extra;
        let s = splitter(train, validation, BoundaryPolicy::Overlap);
        let Ok(ranges) = s.split(n, 1) else {
            // Only an empty training partition is rejected.
            prop_assert_eq!((train * n as f64).floor() as usize, 0);
            return Ok(());
        };

        prop_assert_eq!(ranges.train.start, 0);
        prop_assert_eq!(ranges.train.end, ranges.validation.start);
        prop_assert_eq!(ranges.validation.end, ranges.test.start);
        prop_assert_eq!(ranges.test.end, n);
        prop_assert_eq!(ranges.kept(), n);
        prop_assert_eq!(ranges.train.end, (train * n as f64).floor() as usize);
    }

    #[test]
    fn purged_split_leaves_no_shared_rows(
        n in 2usize..2000,
        seq in 1usize..16,
        train in 0.05f64..1.0,
        extra in 0.0f64..1.0,
    ) {
        let validation = train + (1.0 - train) * extra;
        let s = splitter(train, validation, BoundaryPolicy::Purge);
        let Ok(ranges) = s.split(n, seq) else {
            return Ok(());
        };
        let builder = WindowBuilder::new(seq).unwrap();

        prop_assert_eq!(ranges.kept() + ranges.purged, n);
        prop_assert!(ranges.train.end <= ranges.validation.start);
        prop_assert!(ranges.validation.end <= ranges.test.start);

        // Last row read by the window at index i: the close after its label row.
        let last_row = |i: usize| if seq == 1 { i + 1 } else { i + seq + 1 };
        let train_last = last_row(ranges.train.end - 1);
        if let Some(first) = ranges.validation.clone().next() {
            prop_assert!(first > train_last);
        }
        let before_test = ranges.validation.clone().last().map(last_row).unwrap_or(train_last);
        if let Some(first) = ranges.test.clone().next() {
            prop_assert!(first > before_test);
            prop_assert!(first > train_last);
        }
        let offset = if seq == 1 { 0 } else { seq };
        let sources: Vec<usize> = (0..n + offset).collect();
        let starts = builder.starts(&sources).unwrap();
        prop_assert_eq!(starts.len(), n);
        prop_assert_eq!(builder.fit_rows(&starts, ranges.train.len()), ranges.train.len() + seq - 1);
    }
}
