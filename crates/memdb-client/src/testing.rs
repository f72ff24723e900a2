use crate::executor::{ContractExecutor, ExecuteRequest, ExecutorError};
use crate::schema::{
    self, FieldArgs, FieldPair, FieldValueArgs, GetFieldsArgs, InsertRecordArgs,
    InsertRecordsArgs, Method, NoArgs, RecordArgs, RecordEntry, TableNameArgs,
};
use crate::status;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-process stand-in for a deployed in-memory database contract.
///
/// Answers every entry point with the status codes and result shapes the
/// contract produces, keeps fields in insertion order, and counts execute
/// calls so tests can assert that nothing was sent.
#[derive(Clone, Debug, Default)]
pub struct StubContract {
    inner: Arc<Mutex<StubState>>,
}

#[derive(Debug, Default)]
struct StubState {
    tables: Vec<String>,
    records: BTreeMap<String, TableState>,
    execute_calls: usize,
    queued_failure: Option<ExecutorError>,
}

#[derive(Clone, Debug, Default)]
struct TableState {
    // Record keys in insertion order.
    keys: Vec<String>,
    rows: BTreeMap<String, Vec<FieldPair>>,
}

impl TableState {
    fn upsert(&mut self, key: &str, fields: &[FieldPair]) {
        if !self.rows.contains_key(key) {
            self.keys.push(key.to_string());
        }
        let row = self.rows.entry(key.to_string()).or_default();
        for (field, value) in fields {
            set_field(row, field, value);
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.rows.remove(key).is_none() {
            return false;
        }
        self.keys.retain(|existing| existing != key);
        true
    }
}

fn set_field(row: &mut Vec<FieldPair>, field: &str, value: &str) {
    match row.iter_mut().find(|(name, _)| name == field) {
        Some(existing) => existing.1 = value.to_string(),
        None => row.push((field.to_string(), value.to_string())),
    }
}

// Names containing the contract's composite-key separator are refused.
fn is_safe(name: &str) -> bool {
    !name.contains('|')
}

impl StubState {
    fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|name| name == table)
    }

    fn row(&self, table: &str, key: &str) -> Option<&Vec<FieldPair>> {
        if !self.has_table(table) {
            return None;
        }
        self.records.get(table)?.rows.get(key)
    }

    fn create_table(&mut self, args: TableNameArgs) -> i32 {
        if !is_safe(&args.table_name) {
            return status::BAD_REQUEST;
        }
        if self.has_table(&args.table_name) {
            return status::CONFLICT;
        }
        self.records
            .insert(args.table_name.clone(), TableState::default());
        self.tables.push(args.table_name);
        status::OK
    }

    fn drop_table(&mut self, args: TableNameArgs) -> i32 {
        if !self.has_table(&args.table_name) {
            return status::NOT_FOUND;
        }
        self.tables.retain(|name| name != &args.table_name);
        self.records.remove(&args.table_name);
        status::OK
    }

    fn table_size(&self, args: TableNameArgs) -> i32 {
        self.records
            .get(&args.table_name)
            .map(|table| table.keys.len() as i32)
            .unwrap_or(0)
    }

    fn insert(&mut self, args: FieldValueArgs) -> i32 {
        if !self.has_table(&args.table) {
            return status::NOT_FOUND;
        }
        if !is_safe(&args.key) {
            return status::BAD_REQUEST;
        }
        self.records
            .entry(args.table)
            .or_default()
            .upsert(&args.key, &[(args.field, args.value)]);
        status::OK
    }

    fn update(&mut self, args: FieldValueArgs) -> i32 {
        if !self.has_table(&args.table) {
            return status::NOT_FOUND;
        }
        let Some(row) = self
            .records
            .get_mut(&args.table)
            .and_then(|table| table.rows.get_mut(&args.key))
        else {
            return status::NOT_FOUND;
        };
        set_field(row, &args.field, &args.value);
        status::OK
    }

    fn get_value(&self, args: FieldArgs) -> Option<String> {
        self.row(&args.table, &args.key)?
            .iter()
            .find(|(name, _)| name == &args.field)
            .map(|(_, value)| value.clone())
    }

    fn remove_field(&mut self, args: FieldArgs) -> i32 {
        if !self.has_table(&args.table) {
            return status::NOT_FOUND;
        }
        let Some(table) = self.records.get_mut(&args.table) else {
            return status::NOT_FOUND;
        };
        let Some(row) = table.rows.get_mut(&args.key) else {
            return status::NOT_FOUND;
        };
        let Some(position) = row.iter().position(|(name, _)| name == &args.field) else {
            return status::OK;
        };
        row.remove(position);
        if row.is_empty() {
            table.remove(&args.key);
        }
        status::OK
    }

    fn remove_record(&mut self, args: RecordArgs) -> i32 {
        if !self.has_table(&args.table) {
            return status::NOT_FOUND;
        }
        match self.records.get_mut(&args.table) {
            Some(table) => {
                if table.remove(&args.key) {
                    status::OK
                } else {
                    status::NOT_FOUND
                }
            }
            None => status::NOT_FOUND,
        }
    }

    fn insert_records(&mut self, table: String, records: Vec<RecordEntry>) -> i32 {
        if !self.has_table(&table) {
            return 0;
        }
        let state = self.records.entry(table).or_default();
        let mut written = 0;
        for (key, fields) in records {
            if !is_safe(&key) {
                continue;
            }
            state.upsert(&key, &fields);
            written += 1;
        }
        written
    }

    fn insert_record(&mut self, args: InsertRecordArgs) -> i32 {
        let written = self.insert_records(args.table, vec![(args.key, args.fields)]);
        if written > 0 {
            status::OK
        } else {
            status::INTERNAL
        }
    }

    fn get_fields(&self, args: GetFieldsArgs) -> Vec<FieldPair> {
        let Some(row) = self.row(&args.table, &args.key) else {
            return Vec::new();
        };
        args.fields
            .iter()
            .filter_map(|requested| row.iter().find(|(name, _)| name == requested).cloned())
            .collect()
    }

    fn get_all_fields(&self, args: RecordArgs) -> Vec<FieldPair> {
        self.row(&args.table, &args.key).cloned().unwrap_or_default()
    }

    fn dispatch(&mut self, method: Method, raw_args: &str) -> Result<String, ExecutorError> {
        match method {
            Method::CreateTable => {
                let args = parse(method, raw_args)?;
                reply(self.create_table(args))
            }
            Method::DropTable => {
                let args = parse(method, raw_args)?;
                reply(self.drop_table(args))
            }
            Method::ListTables => {
                parse::<NoArgs>(method, raw_args)?;
                reply(&self.tables)
            }
            Method::TableSize => reply(self.table_size(parse(method, raw_args)?)),
            Method::Insert => {
                let args = parse(method, raw_args)?;
                reply(self.insert(args))
            }
            Method::Update => {
                let args = parse(method, raw_args)?;
                reply(self.update(args))
            }
            Method::GetValue => reply(self.get_value(parse(method, raw_args)?)),
            Method::RemoveField => {
                let args = parse(method, raw_args)?;
                reply(self.remove_field(args))
            }
            Method::RemoveRecord => {
                let args = parse(method, raw_args)?;
                reply(self.remove_record(args))
            }
            Method::InsertRecord => {
                let args = parse(method, raw_args)?;
                reply(self.insert_record(args))
            }
            Method::InsertRecords => {
                let args: InsertRecordsArgs = parse(method, raw_args)?;
                reply(self.insert_records(args.table, args.records))
            }
            Method::GetFields => reply(self.get_fields(parse(method, raw_args)?)),
            Method::GetAllFields => reply(self.get_all_fields(parse(method, raw_args)?)),
            Method::Tools => {
                parse::<NoArgs>(method, raw_args)?;
                let manifest = serde_json::to_string_pretty(&schema::tool_manifest()).map_err(
                    |err| ExecutorError::Backend(format!("manifest encode failed: {err}")),
                )?;
                reply(manifest)
            }
            Method::Prompts => {
                parse::<NoArgs>(method, raw_args)?;
                reply(r#"{"prompts":[]}"#)
            }
        }
    }
}

fn parse<A: DeserializeOwned>(method: Method, raw_args: &str) -> Result<A, ExecutorError> {
    serde_json::from_str(raw_args)
        .map_err(|_| ExecutorError::Reverted(format!("{}: invalid_args", method.name())))
}

fn reply<T: Serialize>(value: T) -> Result<String, ExecutorError> {
    serde_json::to_string(&value)
        .map_err(|err| ExecutorError::Backend(format!("stub result encode failed: {err}")))
}

impl StubContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute_calls(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.execute_calls)
            .unwrap_or_default()
    }

    /// Makes the next execute call fail with `error` without touching state.
    pub fn fail_next(&self, error: ExecutorError) {
        if let Ok(mut state) = self.inner.lock() {
            state.queued_failure = Some(error);
        }
    }
}

#[async_trait]
impl ContractExecutor for StubContract {
    async fn execute(&self, request: ExecuteRequest) -> Result<String, ExecutorError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| ExecutorError::Backend("stub contract mutex poisoned".to_string()))?;
        state.execute_calls += 1;
        if let Some(error) = state.queued_failure.take() {
            return Err(error);
        }

        let method: Method = request
            .method_name
            .parse()
            .map_err(ExecutorError::Reverted)?;
        state.dispatch(method, &request.method_args)
    }
}

/// Executor that answers every call with the encoded arguments it was given.
#[derive(Clone, Debug, Default)]
pub struct EchoExecutor {
    requests: Arc<Mutex<Vec<ExecuteRequest>>>,
}

impl EchoExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ExecuteRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn execute_calls(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl ContractExecutor for EchoExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<String, ExecutorError> {
        let raw = request.method_args.clone();
        self.requests
            .lock()
            .map_err(|_| ExecutorError::Backend("echo executor mutex poisoned".to_string()))?
            .push(request);
        Ok(raw)
    }
}
