use std::collections::HashSet;

use proptest::prelude::*;
use review_lens::clusters::{cluster_rows, Linkage};

#[test]
fn ten_rows_into_three_clusters() {
    let rows: Vec<Option<Vec<f32>>> = (0..10)
        .map(|i| {
            let centre = (i % 3) as f32 * 20.0;
            Some(vec![centre + i as f32 * 0.1, centre])
        })
        .collect();
    let ids = cluster_rows(&rows, 3, Linkage::Ward).unwrap();
    assert_eq!(ids.len(), 10);
    let values: HashSet<usize> = ids.iter().map(|id| id.unwrap()).collect();
    assert_eq!(values, HashSet::from([0, 1, 2]));
    for i in 0..10 {
        for j in 0..10 {
            assert_eq!(ids[i] == ids[j], i % 3 == j % 3, "rows {i} and {j}");
        }
    }
}

#[test]
fn rows_without_embeddings_are_left_out() {
    let rows = vec![
        Some(vec![0.0, 1.0]),
        None,
        Some(vec![0.0, 1.1]),
        None,
        Some(vec![9.0, 9.0]),
    ];
    let ids = cluster_rows(&rows, 2, Linkage::Average).unwrap();
    assert_eq!(ids[1], None);
    assert_eq!(ids[3], None);
    assert_eq!(ids[0], ids[2]);
    assert_ne!(ids[0], ids[4]);
}

#[test]
fn more_clusters_than_rows_is_rejected() {
    let rows = vec![Some(vec![1.0]), None, Some(vec![2.0])];
    assert!(cluster_rows(&rows, 3, Linkage::Ward).is_err());
    assert!(cluster_rows(&rows, 0, Linkage::Ward).is_err());
}

#[test]
fn same_input_same_output() {
    let rows: Vec<Option<Vec<f32>>> = (0..15)
        .map(|i| Some(vec![(i * 7 % 11) as f32, (i * 3 % 5) as f32]))
        .collect();
    let first = cluster_rows(&rows, 4, Linkage::Complete).unwrap();
    let second = cluster_rows(&rows, 4, Linkage::Complete).unwrap();
    assert_eq!(first, second);
}

fn linkage() -> impl Strategy<Value = Linkage> {
    prop_oneof![
        Just(Linkage::Ward),
        Just(Linkage::Average),
        Just(Linkage::Complete),
        Just(Linkage::Single),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_row_gets_one_id_in_range(
        (rows, k) in (1usize..25, 1usize..4).prop_flat_map(|(n, dims)| {
            (
                prop::collection::vec(
                    prop::option::weighted(0.85, prop::collection::vec(-10.0f32..10.0, dims)),
                    n,
                ),
                1usize..=n,
            )
        }),
        linkage in linkage(),
    ) {
        let valid = rows.iter().filter(|r| r.is_some()).count();
        prop_assume!(valid >= k);

        let ids = cluster_rows(&rows, k, linkage).unwrap();
        prop_assert_eq!(ids.len(), rows.len());
        for (row, id) in rows.iter().zip(&ids) {
            prop_assert_eq!(row.is_some(), id.is_some());
        }
        let used: HashSet<usize> = ids.iter().flatten().copied().collect();
        prop_assert_eq!(used, (0..k).collect::<HashSet<_>>());
    }
}
