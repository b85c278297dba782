mod common;

use std::path::Path;

use common::{
    config_with, notice, notice_class, open, product, product_class, review, review_class,
    segment, shop,
};
use tempfile::tempdir;
use vitalsql_store::{
    Aggregation, AggregationKind, CollectStats, Comparator, CriteriaContainer, CriteriaElement,
    DistinctSpec, ExecutionMode, ObjectApi, PropertyCriterion, QueryApi, Segment, SelectQuery,
    SortDirection, SortProperty, Truth, TypeCriterion, Value, VitalSqlError, VitalSqlResult,
    VitalSqlStore, vocab,
};

const NAMES: [&str; 9] = [
    "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta", "Theta", "Iota",
];

/// Nine products spread over three segments plus two reviews in the first one.
async fn seeded(base: &Path) -> (VitalSqlStore, Vec<Segment>) {
    let store = open(&config_with(base, true, true, ExecutionMode::SetAlgebra), base).await;
    let mut segments = Vec::new();
    for id in ["s1", "s2", "s3"] {
        segments.push(segment(&store, id).await);
    }
    for (index, name) in NAMES.iter().enumerate() {
        let number = index + 1;
        let tags: &[&str] = if number % 2 == 0 { &["blue", "red"] } else { &["blue"] };
        let target = &segments[index % 3];
        store
            .save(
                None,
                target,
                vec![product(&format!("p{number}"), name, number as f64, tags)],
                &segments,
            )
            .await
            .expect("save product");
    }
    store
        .save(
            None,
            &segments[0],
            vec![review("r1", "Fine"), review("r2", "Poor")],
            &segments,
        )
        .await
        .expect("save reviews");
    (store, segments)
}

/// Every optimizer and execution mode combination over the same database file.
async fn variants(base: &Path) -> Vec<VitalSqlStore> {
    let mut stores = Vec::new();
    for mode in [ExecutionMode::SetAlgebra, ExecutionMode::SingleStatement] {
        for optimized in [true, false] {
            stores.push(open(&config_with(base, optimized, optimized, mode), base).await);
        }
    }
    stores
}

fn uris(store_result: &vitalsql_store::ResultList) -> Vec<String> {
    store_result
        .results
        .iter()
        .map(|element| element.object.uri.clone())
        .collect()
}

async fn select_everywhere(base: &Path, query: &SelectQuery) -> Vec<String> {
    let mut outcomes = Vec::new();
    for store in variants(base).await {
        let result = store.select(query).await.expect("select");
        outcomes.push((result.total, uris(&result)));
    }
    let first = outcomes[0].clone();
    for outcome in &outcomes {
        assert_eq!(outcome, &first);
    }
    first.1
}

fn name_is(name: &str) -> CriteriaElement {
    PropertyCriterion::new(shop("hasName"), Comparator::Eq, name).into()
}

fn products() -> CriteriaElement {
    TypeCriterion::is(product_class()).into()
}

#[tokio::test]
async fn equality_selects_one_object() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let query = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![products(), name_is("Gamma")]),
    );
    assert_eq!(select_everywhere(dir.path(), &query).await, vec!["urn:product:p3"]);
}

#[tokio::test]
async fn impossible_conjunction_matches_nothing() -> VitalSqlResult<()> {
    let dir = tempdir().expect("tempdir");
    let (store, segments) = seeded(dir.path()).await;
    let query = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![
            name_is("Nope"),
            PropertyCriterion::new(shop("hasPrice"), Comparator::Gt, 1.0).into(),
        ]),
    )
    .stats(CollectStats::Detailed);
    let result = store.select(&query).await?;
    assert_eq!(result.total, 0);
    assert!(result.results.is_empty());
    let stats = result.stats.expect("stats");
    assert!(stats.queries.is_some_and(|queries| !queries.is_empty()));
    assert!(select_everywhere(dir.path(), &query).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn type_disjunction_covers_both_classes() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let query = SelectQuery::new(
        segments,
        CriteriaContainer::or(vec![
            TypeCriterion::is(product_class()).into(),
            TypeCriterion::is(review_class()).into(),
        ]),
    );
    let matched = select_everywhere(dir.path(), &query).await;
    assert_eq!(matched.len(), 11);
    assert_eq!(matched[0], "urn:product:p1");
    assert_eq!(matched[10], "urn:review:r2");
}

#[tokio::test]
async fn substring_comparators_respect_case() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let sensitive = SelectQuery::new(
        segments.clone(),
        CriteriaContainer::and(vec![
            PropertyCriterion::new(shop("hasName"), Comparator::ContainsCaseSensitive, "eta").into(),
        ]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &sensitive).await,
        vec!["urn:product:p2", "urn:product:p6", "urn:product:p8"]
    );
    let insensitive = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![
            PropertyCriterion::new(shop("hasName"), Comparator::ContainsCaseInsensitive, "ETA").into(),
        ]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &insensitive).await,
        vec![
            "urn:product:p2",
            "urn:product:p6",
            "urn:product:p7",
            "urn:product:p8"
        ]
    );
}

#[tokio::test]
async fn multi_value_membership_and_its_negation() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let red = || PropertyCriterion::new(shop("hasTags"), Comparator::Contains, "red");
    let with_red = SelectQuery::new(
        segments.clone(),
        CriteriaContainer::and(vec![products(), red().into()]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &with_red).await,
        vec!["urn:product:p2", "urn:product:p4", "urn:product:p6", "urn:product:p8"]
    );
    let without_red = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![
            products(),
            red().with_comparator(Comparator::NotContains).into(),
        ]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &without_red).await,
        vec![
            "urn:product:p1",
            "urn:product:p3",
            "urn:product:p5",
            "urn:product:p7",
            "urn:product:p9"
        ]
    );
}

#[tokio::test]
async fn numeric_range_and_nested_disjunction() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let range = SelectQuery::new(
        segments.clone(),
        CriteriaContainer::and(vec![
            PropertyCriterion::new(shop("hasPrice"), Comparator::Ge, 3.0).into(),
            PropertyCriterion::new(shop("hasPrice"), Comparator::Lt, 6.0).into(),
        ]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &range).await,
        vec!["urn:product:p3", "urn:product:p4", "urn:product:p5"]
    );

    let nested = SelectQuery::new(
        segments.clone(),
        CriteriaContainer::or(vec![
            name_is("Alpha"),
            CriteriaContainer::and(vec![TypeCriterion::is(review_class()).into(), name_is("Fine")])
                .into(),
        ]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &nested).await,
        vec!["urn:product:p1", "urn:review:r1"]
    );

    let typed = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![
            products(),
            CriteriaContainer::or(vec![name_is("Alpha"), name_is("Fine")]).into(),
        ]),
    );
    assert_eq!(select_everywhere(dir.path(), &typed).await, vec!["urn:product:p1"]);
}

#[tokio::test]
async fn permuted_children_select_the_same_objects() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let cheap = || -> CriteriaElement {
        PropertyCriterion::new(shop("hasPrice"), Comparator::Ge, 3.0).into()
    };
    let red = || -> CriteriaElement {
        PropertyCriterion::new(shop("hasTags"), Comparator::Contains, "red").into()
    };
    let forward = SelectQuery::new(
        segments.clone(),
        CriteriaContainer::and(vec![
            products(),
            cheap(),
            CriteriaContainer::or(vec![name_is("Alpha"), red(), name_is("Fine")]).into(),
        ]),
    );
    let backward = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![
            CriteriaContainer::or(vec![name_is("Fine"), red(), name_is("Alpha")]).into(),
            cheap(),
            products(),
        ]),
    );
    let expected = vec!["urn:product:p4", "urn:product:p6", "urn:product:p8"];
    assert_eq!(select_everywhere(dir.path(), &forward).await, expected);
    assert_eq!(select_everywhere(dir.path(), &backward).await, expected);
}

#[tokio::test]
async fn pages_do_not_depend_on_segment_order() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let mut reversed = segments.clone();
    reversed.reverse();
    let page = |pool: Vec<Segment>, sort: Option<SortProperty>| {
        let query = SelectQuery::new(pool, CriteriaContainer::and(vec![products()]))
            .offset(1)
            .limit(2);
        match sort {
            Some(sort) => query.sort_by(sort),
            None => query,
        }
    };

    let by_uri = select_everywhere(dir.path(), &page(segments.clone(), None)).await;
    assert_eq!(by_uri, vec!["urn:product:p2", "urn:product:p3"]);
    assert_eq!(select_everywhere(dir.path(), &page(reversed.clone(), None)).await, by_uri);

    let by_price = SortProperty::desc(shop("hasPrice"));
    let sorted = select_everywhere(dir.path(), &page(segments, Some(by_price.clone()))).await;
    assert_eq!(sorted, vec!["urn:product:p8", "urn:product:p7"]);
    assert_eq!(select_everywhere(dir.path(), &page(reversed, Some(by_price))).await, sorted);
}

#[tokio::test]
async fn timestamp_and_channel_columns_agree_with_property_rows() {
    let dir = tempdir().expect("tempdir");
    let (store, segments) = seeded(dir.path()).await;
    let notices = [
        ("n1", 100, "urn:channel:a"),
        ("n2", 200, "urn:channel:a"),
        ("n3", 300, "urn:channel:b"),
        ("n4", 350, "urn:channel:a"),
        ("n5", 400, "urn:channel:a"),
    ];
    for (index, (id, timestamp, channel)) in notices.into_iter().enumerate() {
        store
            .save(None, &segments[index % 3], vec![notice(id, timestamp, channel)], &segments)
            .await
            .expect("save notice");
    }
    let at_least = |value: i64| -> CriteriaElement {
        PropertyCriterion::new(vocab::HAS_TIMESTAMP, Comparator::Ge, value).into()
    };
    let before = |value: i64| -> CriteriaElement {
        PropertyCriterion::new(vocab::HAS_TIMESTAMP, Comparator::Lt, value).into()
    };

    let windowed = SelectQuery::new(
        segments.clone(),
        CriteriaContainer::and(vec![
            TypeCriterion::is(notice_class()).into(),
            at_least(200),
            before(400),
            PropertyCriterion::new(
                vocab::HAS_CHANNEL_URI,
                Comparator::Eq,
                Value::Uri("urn:channel:a".into()),
            )
            .into(),
        ]),
    );
    assert_eq!(
        select_everywhere(dir.path(), &windowed).await,
        vec!["urn:notice:n2", "urn:notice:n4"]
    );

    let range_only = SelectQuery::new(segments, CriteriaContainer::and(vec![at_least(150), before(351)]));
    assert_eq!(
        select_everywhere(dir.path(), &range_only).await,
        vec!["urn:notice:n2", "urn:notice:n3", "urn:notice:n4"]
    );
}

#[tokio::test]
async fn missing_property_short_circuits_before_the_composed_statement() -> VitalSqlResult<()> {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let store = open(
        &config_with(dir.path(), true, true, ExecutionMode::SingleStatement),
        dir.path(),
    )
    .await;
    let query = SelectQuery::new(
        segments,
        CriteriaContainer::and(vec![
            PropertyCriterion::new(shop("hasRating"), Comparator::Eq, Truth::Yes).into(),
            PropertyCriterion::new(shop("hasPrice"), Comparator::Gt, 0.5).into(),
        ]),
    )
    .stats(CollectStats::Detailed);
    let result = store.select(&query).await?;
    assert_eq!(result.total, 0);
    let queries = result.stats.and_then(|stats| stats.queries).expect("recorded queries");
    assert!(!queries.is_empty());
    assert!(queries.iter().all(|query| query.label != "SELECT"));
    assert!(select_everywhere(dir.path(), &query).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn sorted_pages_merge_across_segments() {
    let dir = tempdir().expect("tempdir");
    let (_, segments) = seeded(dir.path()).await;
    let by_price = SelectQuery::new(segments.clone(), CriteriaContainer::and(vec![products()]))
        .sort_by(SortProperty::desc(shop("hasPrice")))
        .offset(2)
        .limit(3);
    assert_eq!(
        select_everywhere(dir.path(), &by_price).await,
        vec!["urn:product:p7", "urn:product:p6", "urn:product:p5"]
    );

    let by_name = SelectQuery::new(segments, CriteriaContainer::and(vec![products()]))
        .sort_by(SortProperty::asc(shop("hasName")))
        .limit(4);
    assert_eq!(
        select_everywhere(dir.path(), &by_name).await,
        vec!["urn:product:p1", "urn:product:p2", "urn:product:p4", "urn:product:p5"]
    );
}

#[tokio::test]
async fn aggregations_and_distinct_values() -> VitalSqlResult<()> {
    let dir = tempdir().expect("tempdir");
    let (store, segments) = seeded(dir.path()).await;
    let base = || SelectQuery::new(segments.clone(), CriteriaContainer::and(vec![products()]));

    let count = store.select(&base().aggregate(Aggregation::count_all())).await?;
    assert_eq!(count.aggregation.expect("count").value, 9.0);

    let sum = store
        .select(&base().aggregate(Aggregation::new(AggregationKind::Sum, shop("hasPrice"))))
        .await?;
    assert_eq!(sum.aggregation.expect("sum").value, 45.0);

    let average = store
        .select(&base().aggregate(Aggregation::new(AggregationKind::Average, shop("hasPrice"))))
        .await?;
    assert_eq!(average.aggregation.expect("average").value, 5.0);

    let distinct_tags = store
        .select(&base().aggregate(Aggregation::new(AggregationKind::Count, shop("hasTags")).distinct()))
        .await?;
    assert_eq!(distinct_tags.aggregation.expect("distinct count").value, 2.0);

    let values = store
        .select(&base().distinct(DistinctSpec::new(shop("hasTags")).sorted(SortDirection::Desc)))
        .await?;
    assert_eq!(
        values.distinct_values,
        Some(vec![Value::String("red".to_string()), Value::String("blue".to_string())])
    );

    let projection = store.select(&base().projection_only()).await?;
    assert_eq!(projection.total, 9);
    assert!(projection.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_queries_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let (store, segments) = seeded(dir.path()).await;

    let empty = SelectQuery::new(segments.clone(), CriteriaContainer::and(Vec::new()));
    assert!(matches!(
        store.select(&empty).await,
        Err(VitalSqlError::QueryValidation { .. })
    ));

    let relevance = SelectQuery::new(segments.clone(), CriteriaContainer::and(vec![products()]))
        .sort_by(SortProperty::desc(vocab::RELEVANCE));
    assert!(matches!(
        store.select(&relevance).await,
        Err(VitalSqlError::QueryValidation { .. })
    ));

    let multi_sort = SelectQuery::new(segments, CriteriaContainer::and(vec![products()]))
        .sort_by(SortProperty::asc(shop("hasTags")));
    assert!(matches!(
        store.select(&multi_sort).await,
        Err(VitalSqlError::QueryValidation { .. })
    ));

    let missing = SelectQuery::new(
        vec![Segment::new("ghost", "urn:segment:ghost")],
        CriteriaContainer::and(vec![products()]),
    );
    assert!(matches!(
        store.select(&missing).await,
        Err(VitalSqlError::NotFound { .. })
    ));
}
