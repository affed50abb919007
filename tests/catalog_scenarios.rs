//! Scenario-level coverage of the five catalog operations, end to end
//! against an in-memory object store.

use datafusion::arrow::array::{Int64Array, RecordBatch, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use lakecat::{
    CatalogConfig, CatalogError, Compression, DataFusionColumnar, FnPartitioner, InsertBatch,
    InsertOptions, MergePolicy, ObjectStoreClient,
};
use object_store::memory::InMemory;
use std::sync::Arc;

fn store() -> ObjectStoreClient {
    ObjectStoreClient::new(Arc::new(InMemory::new()), "tenant")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_rows() -> RecordBatch {
    let schema = Arc::new(ArrowSchema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("date", DataType::Utf8, false),
        Field::new("ts", DataType::Int64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["A", "B", "A"])),
            Arc::new(StringArray::from(vec![
                "2024-01-01",
                "2024-01-01",
                "2024-01-02",
            ])),
            Arc::new(Int64Array::from(vec![100, 200, 300])),
        ],
    )
    .unwrap()
}

fn partitioner() -> FnPartitioner<impl Fn(&RecordBatch, usize) -> String> {
    FnPartitioner(|b: &RecordBatch, i: usize| {
        let user = b
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let date = b
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        format!("u={}/d={}", user.value(i), date.value(i))
    })
}

#[tokio::test]
async fn s1_round_trip_insert_yields_one_live_marker_per_partition() {
    init_tracing();
    let store = store();
    let config = CatalogConfig::new("tenant", "host-a");
    let collaborator = Arc::new(DataFusionColumnar);

    let markers = lakecat::insert(
        &store,
        &config,
        &partitioner(),
        collaborator.clone(),
        collaborator,
        &InsertOptions::default(),
        InsertBatch::new(sample_rows()),
        1_000,
    )
    .await
    .unwrap();

    assert_eq!(markers.len(), 3);

    let keys = lakecat::log::current_log_keys(&store).await.unwrap();
    assert_eq!(keys.len(), 1);
    let state = lakecat::log::fold_forward(&store, &keys).await.unwrap();
    assert_eq!(state.live_files().len(), 3);
    assert_eq!(state.markers.len(), 3);
}

#[tokio::test]
async fn s2_merge_picks_the_partition_with_most_files() {
    init_tracing();
    let store = store();
    let config = CatalogConfig::new("tenant", "host-a");
    let collaborator = Arc::new(DataFusionColumnar);

    for i in 0..10 {
        lakecat::insert(
            &store,
            &config,
            &partitioner(),
            collaborator.clone(),
            collaborator.clone(),
            &InsertOptions::default(),
            InsertBatch::new(sample_rows()),
            1_000 + i,
        )
        .await
        .unwrap();
    }

    let before = lakecat::log::current_log_keys(&store).await.unwrap();
    let before_state = lakecat::log::fold_forward(&store, &before).await.unwrap();
    assert_eq!(before_state.live_files().len(), 30);

    let policy = MergePolicy {
        max_file_size: 10_000_000,
        max_file_count: 10,
        ascending: false,
    };
    let outcome = lakecat::merge_once(&store, &config, collaborator, policy, None, 10_000, 2_000)
        .await
        .unwrap()
        .expect("expected the densest partition to be merged");

    assert_eq!(outcome.cohort.len(), 10);
    assert!(["u=A/d=2024-01-01", "u=B/d=2024-01-01", "u=A/d=2024-01-02"]
        .contains(&outcome.partition.as_str()));

    let keys = lakecat::log::current_log_keys(&store).await.unwrap();
    let state = lakecat::log::fold_forward(&store, &keys).await.unwrap();
    assert_eq!(state.live_files().len(), 21);
}

#[tokio::test]
async fn s3_aggregating_merge_sums_counts_per_user() {
    init_tracing();
    let store = store();
    let config = CatalogConfig::new("tenant", "host-a");
    let collaborator = Arc::new(DataFusionColumnar);

    let arrow_schema = Arc::new(ArrowSchema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("cnt", DataType::Int64, false),
        Field::new("ts", DataType::Int64, false),
    ]));
    let make_batch = |ts_offset: i64| {
        RecordBatch::try_new(
            arrow_schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["A", "B"])),
                Arc::new(Int64Array::from(vec![1, 1])),
                Arc::new(Int64Array::from(vec![100 + ts_offset, 200 + ts_offset])),
            ],
        )
        .unwrap()
    };
    let single_partition = FnPartitioner(|_: &RecordBatch, _: usize| "u=all".to_string());

    for (i, ts_offset) in [0, 1000].into_iter().enumerate() {
        lakecat::insert(
            &store,
            &config,
            &single_partition,
            collaborator.clone(),
            collaborator.clone(),
            &InsertOptions::default(),
            InsertBatch::new(make_batch(ts_offset)),
            1_000 + i as i64,
        )
        .await
        .unwrap();
    }

    let query =
        "SELECT user_id, SUM(cnt) AS cnt, MAX(ts) AS ts FROM source_files GROUP BY user_id";
    let policy = MergePolicy {
        max_file_size: 10_000_000,
        max_file_count: 2,
        ascending: false,
    };
    let outcome = lakecat::merge_once(
        &store,
        &config,
        collaborator,
        policy,
        Some(query),
        10_000,
        5_000,
    )
    .await
    .unwrap()
    .expect("expected a merge");
    assert_eq!(outcome.cohort.len(), 2);

    let bytes = store.get(&outcome.new_marker.path).await.unwrap();
    let reader =
        datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(bytes)
            .unwrap()
            .build()
            .unwrap();
    let mut total_rows = 0;
    let mut total_cnt: i64 = 0;
    for batch in reader {
        let batch = batch.unwrap();
        total_rows += batch.num_rows();
        let cnt_col = batch
            .column_by_name("cnt")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        total_cnt += cnt_col.iter().flatten().sum::<i64>();
    }
    assert_eq!(total_rows, 2, "one row per distinct user");
    assert_eq!(total_cnt, 4, "two inserts x two users each cnt=1");
}

#[tokio::test]
async fn s4_schema_conflict_rejects_the_insert_and_leaves_no_trace() {
    init_tracing();
    let store = store();
    let config = CatalogConfig::new("tenant", "host-a");
    let collaborator = Arc::new(DataFusionColumnar);

    let string_schema = Arc::new(ArrowSchema::new(vec![Field::new(
        "user_id",
        DataType::Utf8,
        false,
    )]));
    let first = RecordBatch::try_new(
        string_schema,
        vec![Arc::new(StringArray::from(vec!["A"]))],
    )
    .unwrap();
    let single_partition = FnPartitioner(|_: &RecordBatch, _: usize| "u=all".to_string());
    lakecat::insert(
        &store,
        &config,
        &single_partition,
        collaborator.clone(),
        collaborator.clone(),
        &InsertOptions::default(),
        InsertBatch::new(first),
        1_000,
    )
    .await
    .unwrap();

    let int_schema = Arc::new(ArrowSchema::new(vec![Field::new(
        "user_id",
        DataType::Int64,
        false,
    )]));
    let second = RecordBatch::try_new(int_schema, vec![Arc::new(Int64Array::from(vec![7]))])
        .unwrap();

    let err = lakecat::insert(
        &store,
        &config,
        &single_partition,
        collaborator.clone(),
        collaborator,
        &InsertOptions::default(),
        InsertBatch::new(second),
        2_000,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CatalogError::SchemaConflict { .. }));

    let keys = lakecat::log::current_log_keys(&store).await.unwrap();
    assert_eq!(keys.len(), 1, "the rejected insert must not have appended a log object");
    let state = lakecat::log::fold_forward(&store, &keys).await.unwrap();
    assert_eq!(state.live_files().len(), 1);
}

#[tokio::test]
async fn s5_tombstone_collection_waits_out_the_grace_period() {
    init_tracing();
    let store = store();
    let config = CatalogConfig::new("tenant", "host-a");
    let collaborator = Arc::new(DataFusionColumnar);
    let single_partition = FnPartitioner(|_: &RecordBatch, _: usize| "u=all".to_string());

    let arrow_schema = Arc::new(ArrowSchema::new(vec![Field::new(
        "user_id",
        DataType::Utf8,
        false,
    )]));
    for i in 0..2 {
        let batch = RecordBatch::try_new(
            arrow_schema.clone(),
            vec![Arc::new(StringArray::from(vec!["A"]))],
        )
        .unwrap();
        lakecat::insert(
            &store,
            &config,
            &single_partition,
            collaborator.clone(),
            collaborator.clone(),
            &InsertOptions::default(),
            InsertBatch::new(batch),
            100 + i,
        )
        .await
        .unwrap();
    }

    let policy = MergePolicy {
        max_file_size: 10_000_000,
        max_file_count: 2,
        ascending: false,
    };
    lakecat::merge_once(&store, &config, collaborator, policy, None, 10_000, 1_000)
        .await
        .unwrap()
        .expect("expected a merge at t=1000");

    let first_pass = lakecat::collect_tombstones(&store, &config, Some(1_000), 1_500)
        .await
        .unwrap()
        .expect("a merge log exists, so a consolidation pass still runs");
    assert!(first_pass.deleted_logs.is_empty());
    assert!(first_pass.deleted_data.is_empty());

    let second_pass = lakecat::collect_tombstones(&store, &config, Some(1_000), 2_500)
        .await
        .unwrap()
        .expect("grace period has now elapsed");
    assert_eq!(second_pass.deleted_data.len(), 2);
    assert_eq!(second_pass.deleted_logs.len(), 1);
}

#[tokio::test]
async fn s6_partition_removal_tombstones_only_matching_partitions() {
    init_tracing();
    let store = store();
    let config = CatalogConfig::new("tenant", "host-a");
    let collaborator = Arc::new(DataFusionColumnar);

    lakecat::insert(
        &store,
        &config,
        &partitioner(),
        collaborator.clone(),
        collaborator,
        &InsertOptions::default(),
        InsertBatch::new(sample_rows()),
        1_000,
    )
    .await
    .unwrap();

    let outcome = lakecat::remove_partitions(
        &store,
        &config,
        &|p: &str| p.contains("d=2024-01-01"),
        2_000,
    )
    .await
    .unwrap()
    .expect("two partitions share d=2024-01-01");

    assert_eq!(outcome.tombstoned_markers, 2);

    let keys = lakecat::log::current_log_keys(&store).await.unwrap();
    let state = lakecat::log::fold_forward(&store, &keys).await.unwrap();
    let alive: Vec<_> = state.live_files();
    assert_eq!(alive.len(), 1);
    assert_eq!(alive[0].partition(), Some("u=A/d=2024-01-02"));
    // No data object is deleted by removal; that's collection's job.
    assert_eq!(state.markers.len(), 3);
}
