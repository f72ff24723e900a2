use clap::{ArgAction, Parser, Subcommand};
use memdb_client::schema::{FieldPair, RecordEntry};
use memdb_client::{
    ContractExecutor, DEFAULT_GATEWAY_URL, HttpContractExecutor, InMemoryDbClient, Method,
    StubContract, in_memory_db, status,
};
use serde_json::{Value, json};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "memdb")]
#[command(about = "Command-line client for the in-memory database contract")]
struct Cli {
    #[arg(long, env = "MEMDB_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL, global = true)]
    gateway_url: String,
    #[arg(long, env = "MEMDB_CONTRACT_ADDRESS", global = true)]
    contract_address: Option<String>,
    #[arg(long, env = "MEMDB_SESSION_TOKEN", hide_env_values = true, global = true)]
    session_token: Option<String>,
    #[arg(long, env = "MEMDB_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,
    /// Run against an in-process stub contract instead of the gateway.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    stub: bool,
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    CreateTable(TableArgs),
    DropTable(TableArgs),
    ListTables,
    TableSize(TableArgs),
    Insert(FieldValueArgs),
    Update(FieldValueArgs),
    GetValue(FieldArgs),
    RemoveField(FieldArgs),
    RemoveRecord(RecordArgs),
    InsertRecord(InsertRecordArgs),
    InsertRecords(InsertRecordsArgs),
    GetFields(GetFieldsArgs),
    GetAllFields(RecordArgs),
    Tools,
    Prompts,
    /// Call any contract function with a JSON argument object.
    Call(CallArgs),
    /// List contract functions and their parameters. No network access.
    Methods,
    /// Print the resolved configuration. No network access.
    Config,
}

#[derive(clap::Args, Debug)]
struct TableArgs {
    table_name: String,
}

#[derive(clap::Args, Debug)]
struct RecordArgs {
    table: String,
    key: String,
}

#[derive(clap::Args, Debug)]
struct FieldArgs {
    table: String,
    key: String,
    field: String,
}

#[derive(clap::Args, Debug)]
struct FieldValueArgs {
    table: String,
    key: String,
    field: String,
    value: String,
}

#[derive(clap::Args, Debug)]
struct InsertRecordArgs {
    table: String,
    key: String,
    /// `name=value`, repeatable; order is kept.
    #[arg(long = "field", value_parser = parse_field_pair)]
    fields: Vec<FieldPair>,
}

#[derive(clap::Args, Debug)]
struct InsertRecordsArgs {
    table: String,
    /// JSON array of `[key, [[field, value], ...]]` entries.
    #[arg(long)]
    records: String,
}

#[derive(clap::Args, Debug)]
struct GetFieldsArgs {
    table: String,
    key: String,
    fields: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    method: String,
    #[arg(long, default_value = "{}")]
    args: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .try_init();
}

async fn run(cli: Cli) -> Result<String, String> {
    match cli.command {
        Commands::Methods => return render(&methods_listing()),
        Commands::Config => return render(&config_listing(&cli)),
        _ => {}
    }

    if cli.stub {
        let address = cli
            .contract_address
            .unwrap_or_else(|| "stub".to_string());
        let client = in_memory_db(StubContract::new(), address);
        return render(&dispatch(&client, cli.command).await?);
    }

    let address = cli.contract_address.ok_or_else(|| {
        "missing contract address; pass --contract-address or set MEMDB_CONTRACT_ADDRESS"
            .to_string()
    })?;
    let mut executor = HttpContractExecutor::new(cli.gateway_url);
    if let Some(token) = cli.session_token {
        executor = executor.with_session_token(token);
    }
    if let Some(secs) = cli.timeout_secs {
        executor = executor.with_timeout(Duration::from_secs(secs));
    }
    tracing::info!(gateway = executor.base_url(), contract = %address, "using wallet gateway");

    let client = in_memory_db(executor, address);
    render(&dispatch(&client, cli.command).await?)
}

async fn dispatch<E: ContractExecutor>(
    client: &InMemoryDbClient<E>,
    command: Commands,
) -> Result<Value, String> {
    let value = match command {
        Commands::CreateTable(args) => status_value(
            Method::CreateTable,
            client.create_table(&args.table_name).await.map_err(stringify)?,
        ),
        Commands::DropTable(args) => status_value(
            Method::DropTable,
            client.drop_table(&args.table_name).await.map_err(stringify)?,
        ),
        Commands::ListTables => json!(client.list_tables().await.map_err(stringify)?),
        Commands::TableSize(args) => {
            json!(client.table_size(&args.table_name).await.map_err(stringify)?)
        }
        Commands::Insert(args) => status_value(
            Method::Insert,
            client
                .insert(&args.table, &args.key, &args.field, &args.value)
                .await
                .map_err(stringify)?,
        ),
        Commands::Update(args) => status_value(
            Method::Update,
            client
                .update(&args.table, &args.key, &args.field, &args.value)
                .await
                .map_err(stringify)?,
        ),
        Commands::GetValue(args) => json!(
            client
                .get_value(&args.table, &args.key, &args.field)
                .await
                .map_err(stringify)?
        ),
        Commands::RemoveField(args) => status_value(
            Method::RemoveField,
            client
                .remove_field(&args.table, &args.key, &args.field)
                .await
                .map_err(stringify)?,
        ),
        Commands::RemoveRecord(args) => status_value(
            Method::RemoveRecord,
            client
                .remove_record(&args.table, &args.key)
                .await
                .map_err(stringify)?,
        ),
        Commands::InsertRecord(args) => status_value(
            Method::InsertRecord,
            client
                .insert_record(&args.table, &args.key, &args.fields)
                .await
                .map_err(stringify)?,
        ),
        Commands::InsertRecords(args) => {
            let records: Vec<RecordEntry> = serde_json::from_str(&args.records)
                .map_err(|error| format!("--records is not a valid record list: {error}"))?;
            json!(
                client
                    .insert_records(&args.table, &records)
                    .await
                    .map_err(stringify)?
            )
        }
        Commands::GetFields(args) => json!(
            client
                .get_fields(&args.table, &args.key, &args.fields)
                .await
                .map_err(stringify)?
        ),
        Commands::GetAllFields(args) => json!(
            client
                .get_all_fields(&args.table, &args.key)
                .await
                .map_err(stringify)?
        ),
        Commands::Tools => json!(client.tools().await.map_err(stringify)?),
        Commands::Prompts => json!(client.prompts().await.map_err(stringify)?),
        Commands::Call(args) => {
            let method: Method = args.method.parse()?;
            let call_args: Value = serde_json::from_str(&args.args)
                .map_err(|error| format!("--args is not valid JSON: {error}"))?;
            client.invoke(method, call_args).await.map_err(stringify)?
        }
        Commands::Methods | Commands::Config => {
            return Err("command does not call the contract".to_string());
        }
    };
    Ok(value)
}

// Statuses go to stdout verbatim; anything but 200 is also named on stderr.
fn status_value(method: Method, code: i32) -> Value {
    if code != status::OK {
        let meaning = status::describe(code).unwrap_or("unrecognised status");
        tracing::warn!(
            method = method.name(),
            status = code,
            meaning,
            "contract reported a non-success status"
        );
    }
    json!(code)
}

fn stringify(error: memdb_client::MemDbError) -> String {
    error.to_string()
}

fn render(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|error| format!("output encode failed: {error}"))
}

fn methods_listing() -> Value {
    Value::Array(
        Method::ALL
            .into_iter()
            .map(|method| {
                json!({
                    "name": method.name(),
                    "kind": if method.is_mutating() { "mutate" } else { "query" },
                    "parameters": method
                        .parameters()
                        .iter()
                        .map(|parameter| parameter.name)
                        .collect::<Vec<_>>(),
                    "description": method.description(),
                })
            })
            .collect(),
    )
}

fn config_listing(cli: &Cli) -> Value {
    json!({
        "gateway_url": cli.gateway_url,
        "contract_address": cli.contract_address,
        "session_token": cli.session_token.as_ref().map(|_| "<set>"),
        "timeout_secs": cli.timeout_secs,
        "backend": if cli.stub { "stub" } else { "gateway" },
    })
}

fn parse_field_pair(raw: &str) -> Result<FieldPair, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("field name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_pair_splits_on_first_equals() {
        assert_eq!(
            parse_field_pair("expr=a=b"),
            Ok(("expr".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_field_pair("empty="), Ok(("empty".to_string(), String::new())));
        assert!(parse_field_pair("novalue").is_err());
        assert!(parse_field_pair("=x").is_err());
    }

    #[test]
    fn cli_definition_expected_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn methods_listing_expected_all_methods() {
        let listing = methods_listing();
        let entries = listing.as_array().expect("listing is an array");
        assert_eq!(entries.len(), Method::ALL.len());
        assert_eq!(entries[0]["name"], "create_table");
        assert_eq!(entries[0]["kind"], "mutate");
        assert_eq!(entries[2]["kind"], "query");
    }
}
