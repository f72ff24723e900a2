//! Argument and result schemas for every contract entry point.
//!
//! Each argument set is a serde struct whose JSON form is the object the
//! contract parses; each result shape has one decoder. Validation is
//! deserialization: a value that does not fit the struct never leaves the
//! process.

use crate::error::{MemDbError, MemDbResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type TableName = String;
pub type RecordKey = String;
pub type FieldPair = (String, String);
pub type RecordEntry = (RecordKey, Vec<FieldPair>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    CreateTable,
    DropTable,
    ListTables,
    TableSize,
    Insert,
    Update,
    GetValue,
    RemoveField,
    RemoveRecord,
    InsertRecord,
    InsertRecords,
    GetFields,
    GetAllFields,
    Tools,
    Prompts,
}

/// Shape the contract's raw result is decoded against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    Status,
    Names,
    OptionalValue,
    FieldPairs,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    StringList,
    FieldPairs,
    Records,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringList | Self::FieldPairs | Self::Records => "array",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
}

// Struct literals keep the parameter tables promotable to `'static`.
macro_rules! param {
    ($name:expr, $kind:ident, $description:expr) => {
        Parameter {
            name: $name,
            kind: ParamKind::$kind,
            description: $description,
        }
    };
}

const TABLE: Parameter = param!("table", String, "name of the table");
const KEY: Parameter = param!("key", String, "the key / primary key of the record");

impl Method {
    pub const ALL: [Method; 15] = [
        Method::CreateTable,
        Method::DropTable,
        Method::ListTables,
        Method::TableSize,
        Method::Insert,
        Method::Update,
        Method::GetValue,
        Method::RemoveField,
        Method::RemoveRecord,
        Method::InsertRecord,
        Method::InsertRecords,
        Method::GetFields,
        Method::GetAllFields,
        Method::Tools,
        Method::Prompts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateTable => "create_table",
            Self::DropTable => "drop_table",
            Self::ListTables => "list_tables",
            Self::TableSize => "table_size",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::GetValue => "get_value",
            Self::RemoveField => "remove_field",
            Self::RemoveRecord => "remove_record",
            Self::InsertRecord => "insert_record",
            Self::InsertRecords => "insert_records",
            Self::GetFields => "get_fields",
            Self::GetAllFields => "get_all_fields",
            Self::Tools => "tools",
            Self::Prompts => "prompts",
        }
    }

    /// Whether the contract commits state for this entry point.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::CreateTable
                | Self::DropTable
                | Self::Insert
                | Self::Update
                | Self::RemoveField
                | Self::RemoveRecord
                | Self::InsertRecord
                | Self::InsertRecords
        )
    }

    /// Entry points that operate on tables and records, as opposed to the
    /// manifest queries.
    pub fn is_data_operation(self) -> bool {
        !matches!(self, Self::Tools | Self::Prompts)
    }

    pub fn result_shape(self) -> ResultShape {
        match self {
            Self::ListTables => ResultShape::Names,
            Self::GetValue => ResultShape::OptionalValue,
            Self::GetFields | Self::GetAllFields => ResultShape::FieldPairs,
            Self::Tools | Self::Prompts => ResultShape::Text,
            _ => ResultShape::Status,
        }
    }

    pub fn parameters(self) -> &'static [Parameter] {
        match self {
            Self::CreateTable => &[param!("table_name", String, "name of the table to be created")],
            Self::DropTable => &[param!("table_name", String, "name of the table to be deleted")],
            Self::TableSize => &[param!("table_name", String, "name of the table")],
            Self::Insert => &[
                TABLE,
                KEY,
                param!("field", String, "the field name inside the record"),
                param!("value", String, "the value associated with the field"),
            ],
            Self::Update => &[
                TABLE,
                KEY,
                param!("field", String, "the field name to update"),
                param!("value", String, "the new value of the field"),
            ],
            Self::GetValue => &[
                TABLE,
                KEY,
                param!("field", String, "the field name whose value is requested"),
            ],
            Self::RemoveField => &[
                TABLE,
                KEY,
                param!("field", String, "the field name to be removed"),
            ],
            Self::RemoveRecord | Self::GetAllFields => &[TABLE, KEY],
            Self::InsertRecord => &[
                TABLE,
                KEY,
                param!("fields", FieldPairs, "list of [field, value] pairs"),
            ],
            Self::InsertRecords => &[
                TABLE,
                param!("records", Records, "list of [key, [[field, value], ...]] records"),
            ],
            Self::GetFields => &[
                TABLE,
                KEY,
                param!("fields", StringList, "list of field names to retrieve"),
            ],
            Self::ListTables | Self::Tools | Self::Prompts => &[],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::CreateTable => {
                "creates a table (returns 200 success, 409 already exists, 400 invalid name)"
            }
            Self::DropTable => "drops/deletes a table (returns 200 success, 404 table not found)",
            Self::ListTables => {
                "list all the tables present in db now (returns list of table names, empty if none)"
            }
            Self::TableSize => {
                "gives size of any table (returns record count, 0 if table missing)"
            }
            Self::Insert => {
                "inserts field-value pair for a given key (returns 200 success, 404 table missing, 400 invalid input)"
            }
            Self::Update => {
                "updates a field value for a given key (returns 200 success, 404 table or record missing)"
            }
            Self::GetValue => {
                "get a single field value (returns the value if found, null otherwise)"
            }
            Self::RemoveField => {
                "removes a field from a record (returns 200 success, 404 table or record missing)"
            }
            Self::RemoveRecord => {
                "removes a complete record (returns 200 success, 404 table or record missing)"
            }
            Self::InsertRecord => {
                "inserts or merges a full record (returns 200 success, 500 when nothing was written)"
            }
            Self::InsertRecords => {
                "inserts or merges a batch of records (returns number of records written, 0 if table missing)"
            }
            Self::GetFields => {
                "retrieve multiple fields from a record (returns list of existing field-value pairs)"
            }
            Self::GetAllFields => {
                "retrieve the full record (returns all field-value pairs, empty if record missing)"
            }
            Self::Tools => "function-tool manifest of this contract",
            Self::Prompts => "prompt catalogue of this contract",
        }
    }

    /// Validates a free-form JSON argument object against this method's
    /// argument schema and returns the encoded arguments.
    pub fn validate_args(self, args: Value) -> MemDbResult<String> {
        match self {
            Self::CreateTable | Self::DropTable | Self::TableSize => {
                encode_args(self, &parse_args::<TableNameArgs>(self, args)?)
            }
            Self::ListTables | Self::Tools | Self::Prompts => {
                encode_args(self, &parse_args::<NoArgs>(self, args)?)
            }
            Self::Insert | Self::Update => {
                encode_args(self, &parse_args::<FieldValueArgs>(self, args)?)
            }
            Self::GetValue | Self::RemoveField => {
                encode_args(self, &parse_args::<FieldArgs>(self, args)?)
            }
            Self::RemoveRecord | Self::GetAllFields => {
                encode_args(self, &parse_args::<RecordArgs>(self, args)?)
            }
            Self::InsertRecord => encode_args(self, &parse_args::<InsertRecordArgs>(self, args)?),
            Self::InsertRecords => {
                encode_args(self, &parse_args::<InsertRecordsArgs>(self, args)?)
            }
            Self::GetFields => encode_args(self, &parse_args::<GetFieldsArgs>(self, args)?),
        }
    }

    /// Decodes a raw result against this method's result shape and hands the
    /// typed value back as JSON.
    pub fn decode_result_value(self, raw: &str) -> MemDbResult<Value> {
        match self.result_shape() {
            ResultShape::Status => to_value(self, decode_status(self, raw)?),
            ResultShape::Names => to_value(self, decode_names(self, raw)?),
            ResultShape::OptionalValue => to_value(self, decode_optional_value(self, raw)?),
            ResultShape::FieldPairs => to_value(self, decode_field_pairs(self, raw)?),
            ResultShape::Text => to_value(self, decode_text(self, raw)?),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.name() == value)
            .ok_or_else(|| format!("unknown contract method '{value}'"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableNameArgs {
    pub table_name: TableName,
}

/// Arguments of `insert` and `update`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldValueArgs {
    pub table: TableName,
    pub key: RecordKey,
    pub field: String,
    pub value: String,
}

/// Arguments of `get_value` and `remove_field`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldArgs {
    pub table: TableName,
    pub key: RecordKey,
    pub field: String,
}

/// Arguments of `remove_record` and `get_all_fields`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordArgs {
    pub table: TableName,
    pub key: RecordKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertRecordArgs {
    pub table: TableName,
    pub key: RecordKey,
    pub fields: Vec<FieldPair>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertRecordsArgs {
    pub table: TableName,
    pub records: Vec<RecordEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetFieldsArgs {
    pub table: TableName,
    pub key: RecordKey,
    pub fields: Vec<String>,
}

pub fn encode_args<A: Serialize>(method: Method, args: &A) -> MemDbResult<String> {
    serde_json::to_string(args).map_err(|error| MemDbError::ArgumentValidation {
        method: method.name(),
        message: format!("encode failed: {error}"),
    })
}

pub fn parse_args<A: DeserializeOwned>(method: Method, args: Value) -> MemDbResult<A> {
    serde_json::from_value(args).map_err(|error| MemDbError::ArgumentValidation {
        method: method.name(),
        message: error.to_string(),
    })
}

pub fn decode_result<T: DeserializeOwned>(method: Method, raw: &str) -> MemDbResult<T> {
    serde_json::from_str(raw).map_err(|error| {
        // serde_json quotes the offending value, so both parts are bounded.
        let detail = error.to_string();
        MemDbError::ResultDecoding {
            method: method.name(),
            message: format!(
                "{} (raw result: {})",
                truncate(&detail, 160),
                truncate(raw, 120)
            ),
        }
    })
}

pub fn decode_status(method: Method, raw: &str) -> MemDbResult<i32> {
    decode_result(method, raw)
}

pub fn decode_names(method: Method, raw: &str) -> MemDbResult<Vec<String>> {
    decode_result(method, raw)
}

pub fn decode_optional_value(method: Method, raw: &str) -> MemDbResult<Option<String>> {
    decode_result(method, raw)
}

pub fn decode_field_pairs(method: Method, raw: &str) -> MemDbResult<Vec<FieldPair>> {
    decode_result(method, raw)
}

pub fn decode_text(method: Method, raw: &str) -> MemDbResult<String> {
    decode_result(method, raw)
}

fn to_value<T: Serialize>(method: Method, value: T) -> MemDbResult<Value> {
    serde_json::to_value(value).map_err(|error| MemDbError::ResultDecoding {
        method: method.name(),
        message: error.to_string(),
    })
}

fn truncate(raw: &str, limit: usize) -> &str {
    match raw.char_indices().nth(limit) {
        Some((index, _)) => &raw[..index],
        None => raw,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, ToolProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProperty {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptCatalog {
    #[serde(default)]
    pub prompts: Vec<Value>,
}

/// Function-tool manifest describing every data operation.
pub fn tool_manifest() -> Vec<ToolDefinition> {
    Method::ALL
        .into_iter()
        .filter(|method| method.is_data_operation())
        .map(|method| ToolDefinition {
            kind: "function".to_string(),
            function: ToolFunction {
                name: method.name().to_string(),
                description: method.description().to_string(),
                parameters: ToolParameters {
                    kind: "object".to_string(),
                    properties: method
                        .parameters()
                        .iter()
                        .map(|parameter| {
                            (
                                parameter.name.to_string(),
                                ToolProperty {
                                    kind: parameter.kind.json_type().to_string(),
                                    description: parameter.description.to_string(),
                                },
                            )
                        })
                        .collect(),
                    required: method
                        .parameters()
                        .iter()
                        .map(|parameter| parameter.name.to_string())
                        .collect(),
                },
            },
        })
        .collect()
}

pub fn decode_tool_manifest(
    method: Method,
    manifest_json: &str,
) -> MemDbResult<Vec<ToolDefinition>> {
    decode_result(method, manifest_json)
}

pub fn decode_prompt_catalog(method: Method, catalog_json: &str) -> MemDbResult<PromptCatalog> {
    decode_result(method, catalog_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_names_expected_round_trip_through_from_str() {
        for method in Method::ALL {
            assert_eq!(method.name().parse::<Method>(), Ok(method));
        }
        assert!("select".parse::<Method>().is_err());
    }

    #[test]
    fn method_mutating_flags_expected_match_contract_markers() {
        let mutating: Vec<&str> = Method::ALL
            .into_iter()
            .filter(|method| method.is_mutating())
            .map(Method::name)
            .collect();
        assert_eq!(
            mutating,
            vec![
                "create_table",
                "drop_table",
                "insert",
                "update",
                "remove_field",
                "remove_record",
                "insert_record",
                "insert_records",
            ]
        );
    }

    #[test]
    fn field_value_args_expected_contract_field_names() {
        let encoded = encode_args(
            Method::Insert,
            &FieldValueArgs {
                table: "users".to_string(),
                key: "u1".to_string(),
                field: "name".to_string(),
                value: "ada".to_string(),
            },
        )
        .expect("encode should succeed");

        let value: Value = serde_json::from_str(&encoded).expect("valid json");
        assert_eq!(
            value,
            json!({"table": "users", "key": "u1", "field": "name", "value": "ada"})
        );
    }

    #[test]
    fn insert_records_args_expected_nested_arrays() {
        let encoded = encode_args(
            Method::InsertRecords,
            &InsertRecordsArgs {
                table: "t".to_string(),
                records: vec![(
                    "k1".to_string(),
                    vec![("a".to_string(), "1".to_string())],
                )],
            },
        )
        .expect("encode should succeed");

        assert_eq!(encoded, r#"{"table":"t","records":[["k1",[["a","1"]]]]}"#);
    }

    #[test]
    fn no_args_expected_empty_object() {
        assert_eq!(
            encode_args(Method::ListTables, &NoArgs {}).expect("encode"),
            "{}"
        );
    }

    #[test]
    fn validate_args_number_for_table_name_expected_validation_error() {
        let error = Method::CreateTable
            .validate_args(json!({"table_name": 42}))
            .expect_err("number should be rejected");
        assert!(matches!(
            error,
            MemDbError::ArgumentValidation {
                method: "create_table",
                ..
            }
        ));
    }

    #[test]
    fn validate_args_missing_field_expected_validation_error() {
        let error = Method::Insert
            .validate_args(json!({"table": "t", "key": "k", "field": "f"}))
            .expect_err("missing value should be rejected");
        assert!(error.to_string().contains("value"));
    }

    #[test]
    fn validate_args_unknown_field_expected_validation_error() {
        let result = Method::RemoveRecord.validate_args(json!({
            "table": "t",
            "key": "k",
            "cascade": true
        }));
        assert!(matches!(
            result,
            Err(MemDbError::ArgumentValidation { .. })
        ));
    }

    #[test]
    fn validate_args_bad_pair_arity_expected_validation_error() {
        let result = Method::InsertRecord.validate_args(json!({
            "table": "t",
            "key": "k",
            "fields": [["a", "1", "extra"]]
        }));
        assert!(matches!(
            result,
            Err(MemDbError::ArgumentValidation { .. })
        ));
    }

    #[test]
    fn decode_status_string_payload_expected_decoding_error() {
        let error = decode_status(Method::Insert, "\"200\"").expect_err("string is not i32");
        assert!(matches!(
            error,
            MemDbError::ResultDecoding {
                method: "insert",
                ..
            }
        ));
    }

    #[test]
    fn decode_status_out_of_range_expected_decoding_error() {
        assert!(decode_status(Method::TableSize, "4294967296").is_err());
    }

    #[test]
    fn decode_optional_value_null_expected_absent() {
        assert_eq!(
            decode_optional_value(Method::GetValue, "null").expect("null decodes"),
            None
        );
        assert_eq!(
            decode_optional_value(Method::GetValue, "\"1\"").expect("string decodes"),
            Some("1".to_string())
        );
    }

    #[test]
    fn decode_field_pairs_expected_order_preserved() {
        let pairs = decode_field_pairs(Method::GetAllFields, r#"[["b","2"],["a","1"]]"#)
            .expect("pairs decode");
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn decode_result_value_expected_shape_per_method() {
        assert_eq!(
            Method::ListTables
                .decode_result_value(r#"["x","y"]"#)
                .expect("names decode"),
            json!(["x", "y"])
        );
        assert_eq!(
            Method::GetValue
                .decode_result_value("null")
                .expect("option decodes"),
            Value::Null
        );
        assert!(Method::Update.decode_result_value("[]").is_err());
    }

    #[test]
    fn tool_manifest_expected_one_entry_per_data_operation() {
        let manifest = tool_manifest();
        assert_eq!(manifest.len(), 13);

        let get_fields = manifest
            .iter()
            .find(|tool| tool.function.name == "get_fields")
            .expect("get_fields should be listed");
        assert_eq!(get_fields.function.parameters.required, vec!["table", "key", "fields"]);
        assert_eq!(get_fields.function.parameters.properties["fields"].kind, "array");

        let list_tables = manifest
            .iter()
            .find(|tool| tool.function.name == "list_tables")
            .expect("list_tables should be listed");
        assert!(list_tables.function.parameters.properties.is_empty());
    }

    #[test]
    fn decode_truncates_long_raw_results_in_message() {
        let raw = format!("\"{}\"", "x".repeat(500));
        let error = decode_status(Method::TableSize, &raw).expect_err("string is not i32");
        let message = error.to_string();
        assert!(message.len() < 400, "message grew with payload: {}", message.len());
        assert!(message.contains("invalid type"));
        assert!(message.contains("raw result: \"xxx"));

        let longer = format!("\"{}\"", "x".repeat(5_000));
        let error = decode_status(Method::TableSize, &longer).expect_err("string is not i32");
        assert_eq!(error.to_string().len(), message.len());
    }
}
