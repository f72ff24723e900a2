use crate::error::{MemDbError, MemDbResult};
use crate::executor::{ContractAddress, ContractExecutor, ExecuteRequest};
use crate::schema::{
    self, FieldArgs, FieldPair, FieldValueArgs, GetFieldsArgs, InsertRecordArgs,
    InsertRecordsArgs, Method, NoArgs, PromptCatalog, RecordArgs, RecordEntry, TableNameArgs,
    ToolDefinition,
};
use serde::Serialize;
use serde_json::Value;

/// Client for one deployed in-memory database contract.
///
/// Holds the executor and the contract address and nothing else; every call
/// builds its own arguments, so a shared client can serve concurrent tasks.
#[derive(Clone, Debug)]
pub struct InMemoryDbClient<E> {
    executor: E,
    contract_address: ContractAddress,
}

impl<E> InMemoryDbClient<E> {
    pub fn new(executor: E, contract_address: impl Into<ContractAddress>) -> Self {
        Self {
            executor,
            contract_address: contract_address.into(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }
}

impl<E> InMemoryDbClient<E>
where
    E: ContractExecutor,
{
    pub async fn create_table(&self, table_name: &str) -> MemDbResult<i32> {
        let args = TableNameArgs {
            table_name: table_name.to_string(),
        };
        let raw = self.execute(Method::CreateTable, &args).await?;
        schema::decode_status(Method::CreateTable, &raw)
    }

    pub async fn drop_table(&self, table_name: &str) -> MemDbResult<i32> {
        let args = TableNameArgs {
            table_name: table_name.to_string(),
        };
        let raw = self.execute(Method::DropTable, &args).await?;
        schema::decode_status(Method::DropTable, &raw)
    }

    pub async fn list_tables(&self) -> MemDbResult<Vec<String>> {
        let raw = self.execute(Method::ListTables, &NoArgs {}).await?;
        schema::decode_names(Method::ListTables, &raw)
    }

    pub async fn table_size(&self, table_name: &str) -> MemDbResult<i32> {
        let args = TableNameArgs {
            table_name: table_name.to_string(),
        };
        let raw = self.execute(Method::TableSize, &args).await?;
        schema::decode_status(Method::TableSize, &raw)
    }

    pub async fn insert(
        &self,
        table: &str,
        key: &str,
        field: &str,
        value: &str,
    ) -> MemDbResult<i32> {
        let args = field_value_args(table, key, field, value);
        let raw = self.execute(Method::Insert, &args).await?;
        schema::decode_status(Method::Insert, &raw)
    }

    pub async fn update(
        &self,
        table: &str,
        key: &str,
        field: &str,
        value: &str,
    ) -> MemDbResult<i32> {
        let args = field_value_args(table, key, field, value);
        let raw = self.execute(Method::Update, &args).await?;
        schema::decode_status(Method::Update, &raw)
    }

    /// `None` when the table, the record or the field does not exist.
    pub async fn get_value(
        &self,
        table: &str,
        key: &str,
        field: &str,
    ) -> MemDbResult<Option<String>> {
        let args = field_args(table, key, field);
        let raw = self.execute(Method::GetValue, &args).await?;
        schema::decode_optional_value(Method::GetValue, &raw)
    }

    pub async fn remove_field(&self, table: &str, key: &str, field: &str) -> MemDbResult<i32> {
        let args = field_args(table, key, field);
        let raw = self.execute(Method::RemoveField, &args).await?;
        schema::decode_status(Method::RemoveField, &raw)
    }

    pub async fn remove_record(&self, table: &str, key: &str) -> MemDbResult<i32> {
        let args = record_args(table, key);
        let raw = self.execute(Method::RemoveRecord, &args).await?;
        schema::decode_status(Method::RemoveRecord, &raw)
    }

    pub async fn insert_record(
        &self,
        table: &str,
        key: &str,
        fields: &[FieldPair],
    ) -> MemDbResult<i32> {
        let args = InsertRecordArgs {
            table: table.to_string(),
            key: key.to_string(),
            fields: fields.to_vec(),
        };
        let raw = self.execute(Method::InsertRecord, &args).await?;
        schema::decode_status(Method::InsertRecord, &raw)
    }

    pub async fn insert_records(&self, table: &str, records: &[RecordEntry]) -> MemDbResult<i32> {
        let args = InsertRecordsArgs {
            table: table.to_string(),
            records: records.to_vec(),
        };
        let raw = self.execute(Method::InsertRecords, &args).await?;
        schema::decode_status(Method::InsertRecords, &raw)
    }

    /// Returns one pair per requested field that exists on the record, in
    /// request order. Missing fields are left out rather than reported.
    pub async fn get_fields(
        &self,
        table: &str,
        key: &str,
        fields: &[String],
    ) -> MemDbResult<Vec<FieldPair>> {
        let args = GetFieldsArgs {
            table: table.to_string(),
            key: key.to_string(),
            fields: fields.to_vec(),
        };
        let raw = self.execute(Method::GetFields, &args).await?;
        schema::decode_field_pairs(Method::GetFields, &raw)
    }

    pub async fn get_all_fields(&self, table: &str, key: &str) -> MemDbResult<Vec<FieldPair>> {
        let args = record_args(table, key);
        let raw = self.execute(Method::GetAllFields, &args).await?;
        schema::decode_field_pairs(Method::GetAllFields, &raw)
    }

    /// The contract returns its manifest as a JSON string; both layers are
    /// decoded here.
    pub async fn tools(&self) -> MemDbResult<Vec<ToolDefinition>> {
        let raw = self.execute(Method::Tools, &NoArgs {}).await?;
        let manifest = schema::decode_text(Method::Tools, &raw)?;
        schema::decode_tool_manifest(Method::Tools, &manifest)
    }

    pub async fn prompts(&self) -> MemDbResult<PromptCatalog> {
        let raw = self.execute(Method::Prompts, &NoArgs {}).await?;
        let catalog = schema::decode_text(Method::Prompts, &raw)?;
        schema::decode_prompt_catalog(Method::Prompts, &catalog)
    }

    /// Calls `method` with a free-form JSON argument object.
    ///
    /// The object is checked against the method's argument schema before
    /// anything is sent, and the result is decoded against its result schema.
    pub async fn invoke(&self, method: Method, args: Value) -> MemDbResult<Value> {
        let encoded = method.validate_args(args)?;
        let raw = self.dispatch(method, encoded).await?;
        method.decode_result_value(&raw)
    }

    async fn execute<A: Serialize>(&self, method: Method, args: &A) -> MemDbResult<String> {
        let encoded = schema::encode_args(method, args)?;
        self.dispatch(method, encoded).await
    }

    async fn dispatch(&self, method: Method, method_args: String) -> MemDbResult<String> {
        tracing::debug!(
            method = method.name(),
            contract = %self.contract_address,
            mutating = method.is_mutating(),
            "executing contract function"
        );

        let raw = self
            .executor
            .execute(ExecuteRequest {
                contract_address: self.contract_address.clone(),
                method_name: method.name().to_string(),
                method_args,
            })
            .await
            .map_err(|source| MemDbError::Transport {
                method: method.name(),
                source,
            })?;

        tracing::debug!(method = method.name(), bytes = raw.len(), "contract function returned");
        Ok(raw)
    }
}

fn field_value_args(table: &str, key: &str, field: &str, value: &str) -> FieldValueArgs {
    FieldValueArgs {
        table: table.to_string(),
        key: key.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn field_args(table: &str, key: &str, field: &str) -> FieldArgs {
    FieldArgs {
        table: table.to_string(),
        key: key.to_string(),
        field: field.to_string(),
    }
}

fn record_args(table: &str, key: &str) -> RecordArgs {
    RecordArgs {
        table: table.to_string(),
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorError;
    use crate::testing::{EchoExecutor, StubContract};
    use serde_json::json;

    #[test]
    fn construction_expected_no_io() {
        let stub = StubContract::new();
        let client = InMemoryDbClient::new(&stub, "contract-1");
        assert_eq!(client.contract_address(), "contract-1");
        assert_eq!(client.executor().execute_calls(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn each_operation_expected_single_execute_call() {
        let stub = StubContract::new();
        let client = InMemoryDbClient::new(&stub, "contract-1");

        client.create_table("t").await.expect("create_table");
        assert_eq!(stub.execute_calls(), 1);
        client.insert("t", "k", "f", "v").await.expect("insert");
        assert_eq!(stub.execute_calls(), 2);
        client.get_all_fields("t", "k").await.expect("get_all_fields");
        assert_eq!(stub.execute_calls(), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn request_expected_method_name_and_encoded_args() {
        let echo = EchoExecutor::new();
        let client = InMemoryDbClient::new(&echo, "contract-9");

        let _ = client.get_value("t", "k", "f").await;

        let requests = echo.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].contract_address, "contract-9");
        assert_eq!(requests[0].method_name, "get_value");
        assert_eq!(
            serde_json::from_str::<Value>(&requests[0].method_args).expect("json args"),
            json!({"table": "t", "key": "k", "field": "f"})
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn revert_expected_transport_error_with_method() {
        let stub = StubContract::new();
        stub.fail_next(ExecutorError::Reverted("out of gas".to_string()));
        let client = InMemoryDbClient::new(&stub, "contract-1");

        let error = client.drop_table("t").await.expect_err("revert should surface");
        assert!(matches!(
            error,
            MemDbError::Transport {
                method: "drop_table",
                source: ExecutorError::Reverted(_),
            }
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mismatched_result_expected_decoding_error() {
        let echo = EchoExecutor::new();
        let client = InMemoryDbClient::new(&echo, "contract-1");

        // The echo hands back the argument object, which is not an i32.
        let error = client.create_table("t").await.expect_err("object is not i32");
        assert!(matches!(
            error,
            MemDbError::ResultDecoding {
                method: "create_table",
                ..
            }
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invoke_invalid_args_expected_no_execute_call() {
        let stub = StubContract::new();
        let client = InMemoryDbClient::new(&stub, "contract-1");

        let error = client
            .invoke(Method::CreateTable, json!({"table_name": 7}))
            .await
            .expect_err("number is not a table name");
        assert!(matches!(error, MemDbError::ArgumentValidation { .. }));
        assert_eq!(stub.execute_calls(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invoke_valid_args_expected_decoded_json() {
        let stub = StubContract::new();
        let client = InMemoryDbClient::new(&stub, "contract-1");

        let status = client
            .invoke(Method::CreateTable, json!({"table_name": "people"}))
            .await
            .expect("create_table via invoke");
        assert_eq!(status, json!(200));

        let tables = client
            .invoke(Method::ListTables, json!({}))
            .await
            .expect("list_tables via invoke");
        assert_eq!(tables, json!(["people"]));
    }
}
