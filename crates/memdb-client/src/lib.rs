#![doc = r#"
Typed client for the in-memory database contract.

Operation mapping:

| Client method | Contract function | Arguments | Result |
| --- | --- | --- | --- |
| `InMemoryDbClient::create_table` | `create_table` | `{table_name}` | `i32` status |
| `InMemoryDbClient::drop_table` | `drop_table` | `{table_name}` | `i32` status |
| `InMemoryDbClient::list_tables` | `list_tables` | `{}` | `[string]` |
| `InMemoryDbClient::table_size` | `table_size` | `{table_name}` | `i32` row count |
| `InMemoryDbClient::insert` | `insert` | `{table, key, field, value}` | `i32` status |
| `InMemoryDbClient::update` | `update` | `{table, key, field, value}` | `i32` status |
| `InMemoryDbClient::get_value` | `get_value` | `{table, key, field}` | `string` or `null` |
| `InMemoryDbClient::remove_field` | `remove_field` | `{table, key, field}` | `i32` status |
| `InMemoryDbClient::remove_record` | `remove_record` | `{table, key}` | `i32` status |
| `InMemoryDbClient::insert_record` | `insert_record` | `{table, key, fields: [[f, v]]}` | `i32` status |
| `InMemoryDbClient::insert_records` | `insert_records` | `{table, records: [[key, [[f, v]]]]}` | `i32` status |
| `InMemoryDbClient::get_fields` | `get_fields` | `{table, key, fields: [f]}` | `[[f, v]]` |
| `InMemoryDbClient::get_all_fields` | `get_all_fields` | `{table, key}` | `[[f, v]]` |
| `InMemoryDbClient::tools` | `tools` | `{}` | manifest JSON as a string |
| `InMemoryDbClient::prompts` | `prompts` | `{}` | prompt catalogue JSON as a string |

Implementation notes:
- Every call is validate, execute once, decode. There is no retry, caching or batching.
- Status codes are returned exactly as the contract produced them.
- Executors are anything implementing `ContractExecutor`; a direct wallet and a wallet connection look the same here.
"#]

pub mod client;
pub mod error;
pub mod executor;
pub mod http;
pub mod schema;
pub mod status;
pub mod testing;

pub use client::InMemoryDbClient;
pub use error::{MemDbError, MemDbResult};
pub use executor::{ContractAddress, ContractExecutor, ExecuteRequest, ExecutorError};
pub use http::{DEFAULT_GATEWAY_URL, HttpContractExecutor};
pub use schema::{
    FieldPair, Method, PromptCatalog, RecordEntry, RecordKey, TableName, ToolDefinition,
};
pub use testing::{EchoExecutor, StubContract};

/// Builds a client for the contract at `contract_address`.
pub fn in_memory_db<E: ContractExecutor>(
    executor: E,
    contract_address: impl Into<ContractAddress>,
) -> InMemoryDbClient<E> {
    InMemoryDbClient::new(executor, contract_address)
}
