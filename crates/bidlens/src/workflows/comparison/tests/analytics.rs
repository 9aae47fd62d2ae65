use super::common::{aligned, pid};
use crate::workflows::comparison::analytics::{
    build_heatmap, heat_level, tornado_ranking, TORNADO_LIMIT,
};
use crate::workflows::comparison::domain::HeatLevel;

#[test]
fn tornado_ranks_by_absolute_spread_descending() {
    let items = vec![
        aligned("small gap", None, &[("a", 10.0), ("b", 12.0)]),
        aligned("large gap", None, &[("a", 100.0), ("b", 150.0)]),
    ];

    let ranking = tornado_ranking(&items, TORNADO_LIMIT);

    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].description, "large gap");
    assert_eq!(ranking[0].spread, 50.0);
    assert!((ranking[0].variance_pct - 50.0).abs() < 1e-9);
    assert_eq!(ranking[1].description, "small gap");
    assert_eq!(ranking[1].spread, 2.0);
}

#[test]
fn tornado_skips_unrankable_items() {
    let items = vec![
        aligned("single bidder", None, &[("a", 100.0)]),
        aligned("zero and positive", None, &[("a", 0.0), ("b", 80.0)]),
        aligned("identical bids", None, &[("a", 50.0), ("b", 50.0)]),
        aligned("rankable", None, &[("a", 40.0), ("b", 45.0)]),
    ];

    let ranking = tornado_ranking(&items, TORNADO_LIMIT);

    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].description, "rankable");
}

#[test]
fn tornado_keeps_only_the_top_entries() {
    let items: Vec<_> = (0..20)
        .map(|index| {
            let spread = (index + 1) as f64;
            aligned(
                &format!("item {index}"),
                None,
                &[("a", 100.0), ("b", 100.0 + spread)],
            )
        })
        .collect();

    let ranking = tornado_ranking(&items, TORNADO_LIMIT);

    assert_eq!(ranking.len(), TORNADO_LIMIT);
    assert_eq!(ranking[0].description, "item 19");
    assert_eq!(ranking.last().map(|entry| entry.spread), Some(9.0));
}

#[test]
fn heat_levels_use_the_inclusive_neutral_band() {
    assert_eq!(heat_level(-20.0), HeatLevel::VeryLow);
    assert_eq!(heat_level(-15.0), HeatLevel::Low);
    assert_eq!(heat_level(-5.0), HeatLevel::Neutral);
    assert_eq!(heat_level(-4.0), HeatLevel::Neutral);
    assert_eq!(heat_level(0.0), HeatLevel::Neutral);
    assert_eq!(heat_level(5.0), HeatLevel::Neutral);
    assert_eq!(heat_level(5.1), HeatLevel::High);
    assert_eq!(heat_level(15.0), HeatLevel::High);
    assert_eq!(heat_level(100.0), HeatLevel::VeryHigh);
}

#[test]
fn heatmap_levels_deviation_from_the_row_average() {
    // row average across the three bids is 100
    let items = vec![aligned(
        "installation",
        None,
        &[("a", 80.0), ("b", 96.0), ("c", 124.0)],
    )];
    let vendors = vec![pid("a"), pid("b"), pid("c"), pid("d")];

    let heatmap = build_heatmap(&items, &vendors);

    assert_eq!(heatmap.len(), 1);
    let cells = &heatmap[0].cells;
    assert_eq!(cells[&pid("a")].level, HeatLevel::VeryLow);
    assert_eq!(cells[&pid("b")].level, HeatLevel::Neutral);
    assert_eq!(cells[&pid("c")].level, HeatLevel::VeryHigh);
    assert_eq!(cells[&pid("d")].level, HeatLevel::Missing);
    assert_eq!(cells[&pid("d")].amount, None);

    let deviation = cells[&pid("a")].deviation_pct.expect("present amount");
    assert!((deviation - -20.0).abs() < 1e-9);
}

#[test]
fn heatmap_skips_rows_without_two_amounts() {
    let items = vec![aligned("lonely", None, &[("a", 100.0)])];
    let heatmap = build_heatmap(&items, &[pid("a"), pid("b")]);
    assert!(heatmap.is_empty());
}
