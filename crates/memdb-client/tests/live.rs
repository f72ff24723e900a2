use memdb_client::{HttpContractExecutor, InMemoryDbClient, in_memory_db, status};
use std::time::{SystemTime, UNIX_EPOCH};

fn live_client() -> InMemoryDbClient<HttpContractExecutor> {
    let contract_address = std::env::var("MEMDB_CONTRACT_ADDRESS")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .expect("set MEMDB_CONTRACT_ADDRESS to a deployed in-memory database contract");
    in_memory_db(HttpContractExecutor::from_env(), contract_address)
}

fn unique_table_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("live_{nanos}")
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "live test; requires a wallet gateway and a deployed contract"]
async fn live_table_lifecycle_against_deployed_contract() {
    let client = live_client();
    let table = unique_table_name();

    assert_eq!(client.create_table(&table).await.expect("create_table"), status::OK);
    assert!(client
        .list_tables()
        .await
        .expect("list_tables")
        .contains(&table));

    let inserted = client
        .insert_record(
            &table,
            "k1",
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
        )
        .await
        .expect("insert_record");
    assert_eq!(inserted, status::OK);
    assert_eq!(client.table_size(&table).await.expect("table_size"), 1);
    assert_eq!(
        client.get_value(&table, "k1", "b").await.expect("get_value"),
        Some("2".to_string())
    );
    assert_eq!(
        client
            .get_fields(&table, "k1", &["a".to_string(), "missing".to_string()])
            .await
            .expect("get_fields"),
        vec![("a".to_string(), "1".to_string())]
    );

    assert_eq!(client.remove_record(&table, "k1").await.expect("remove_record"), status::OK);
    assert!(client
        .get_all_fields(&table, "k1")
        .await
        .expect("get_all_fields")
        .is_empty());
    assert_eq!(client.drop_table(&table).await.expect("drop_table"), status::OK);
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "live test; requires a wallet gateway and a deployed contract"]
async fn live_get_fields_on_missing_record_against_deployed_contract() {
    let client = live_client();
    let table = unique_table_name();
    client.create_table(&table).await.expect("create_table");

    let result = client
        .get_fields(&table, "never-written", &["a".to_string()])
        .await;
    client.drop_table(&table).await.expect("drop_table");

    assert_eq!(result.expect("missing record should not fail"), Vec::new());
}
