use super::common::{aligned, pid};
use crate::workflows::comparison::domain::{AlignedItem, CostCategory};
use crate::workflows::comparison::table::{view, SortDirection, SortKey, TableQuery};

fn sample_rows() -> Vec<AlignedItem> {
    vec![
        aligned(
            "onsite install",
            None,
            &[("p1", 9_000.0), ("p2", 9_500.0)],
        ),
        aligned(
            "Senior Engineer",
            Some(CostCategory::Labor),
            &[("p1", 100_000.0), ("p2", 150_000.0)],
        ),
        aligned(
            "apprentice hours",
            Some(CostCategory::Labor),
            &[("p1", 20_000.0), ("p2", 21_000.0)],
        ),
        aligned(
            "Workstations",
            Some(CostCategory::Material),
            &[("p2", 24_000.0)],
        ),
    ]
}

fn descriptions(rows: &[&AlignedItem]) -> Vec<String> {
    rows.iter().map(|row| row.description.clone()).collect()
}

#[test]
fn category_sort_groups_with_description_tiebreak_and_uncategorized_last() {
    let rows = sample_rows();
    let query = TableQuery {
        sort: SortKey::Category,
        ..TableQuery::default()
    };

    let sorted = view(&rows, &query);

    assert_eq!(
        descriptions(&sorted),
        vec![
            "apprentice hours",
            "Senior Engineer",
            "Workstations",
            "onsite install",
        ]
    );
}

#[test]
fn reversing_direction_mirrors_the_ascending_order_exactly() {
    let rows = sample_rows();
    let ascending = view(
        &rows,
        &TableQuery {
            sort: SortKey::Category,
            ..TableQuery::default()
        },
    );
    let descending = view(
        &rows,
        &TableQuery {
            sort: SortKey::Category,
            direction: SortDirection::Desc,
            ..TableQuery::default()
        },
    );

    let mut mirrored = descriptions(&descending);
    mirrored.reverse();
    assert_eq!(descriptions(&ascending), mirrored);
}

#[test]
fn vendor_sort_treats_missing_amounts_as_zero() {
    let rows = sample_rows();
    let query = TableQuery {
        sort: SortKey::Vendor(pid("p1")),
        ..TableQuery::default()
    };

    let sorted = view(&rows, &query);

    // Workstations has no p1 amount, so it sorts first ascending.
    assert_eq!(sorted[0].description, "Workstations");
    assert_eq!(sorted.last().map(|row| row.description.as_str()), Some("Senior Engineer"));
}

#[test]
fn variance_filter_applies_before_sorting() {
    let rows = sample_rows();
    let query = TableQuery {
        sort: SortKey::Variance,
        direction: SortDirection::Desc,
        min_variance_pct: 10.0,
        category: None,
    };

    let filtered = view(&rows, &query);

    // Only the 50% spread row passes a 10% floor; the single-amount row has
    // no variance at all and is excluded by the filter.
    assert_eq!(descriptions(&filtered), vec!["Senior Engineer"]);
}

#[test]
fn category_filter_keeps_only_matching_rows() {
    let rows = sample_rows();
    let query = TableQuery {
        category: Some(CostCategory::Labor),
        ..TableQuery::default()
    };

    let filtered = view(&rows, &query);

    assert_eq!(
        descriptions(&filtered),
        vec!["apprentice hours", "Senior Engineer"]
    );
}

#[test]
fn views_never_mutate_the_underlying_items() {
    let rows = sample_rows();
    let before = rows.clone();

    let _ = view(
        &rows,
        &TableQuery {
            sort: SortKey::Vendor(pid("p2")),
            direction: SortDirection::Desc,
            min_variance_pct: 5.0,
            category: Some(CostCategory::Labor),
        },
    );

    assert_eq!(rows, before);
}
