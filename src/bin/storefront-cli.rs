use std::fs;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use serde_json::{Map, Value};
use storefront_client::{
    AdminApiClient, ApiClient, ClientHooks, Credentials, FetchOptions, OperationDefinition,
    RequestParams, StoreApiClient,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "storefront-cli",
    version,
    about = "Call storefront and administration API operations from the shell"
)]
struct Cli {
    /// API root, e.g. https://shop.example/store-api or https://shop.example/api.
    #[arg(long, env = "STOREFRONT_BASE_URL")]
    base_url: String,

    /// Sales channel access key (`sw-access-key`).
    #[arg(long, env = "STOREFRONT_ACCESS_KEY")]
    access_key: Option<String>,

    /// Context token to resume (`sw-context-token`).
    #[arg(long, env = "STOREFRONT_CONTEXT_TOKEN")]
    context_token: Option<String>,

    /// Talk to the administration API instead of the storefront API.
    #[arg(long)]
    admin: bool,

    /// Integration client id, used with `--admin`.
    #[arg(long, env = "ADMIN_CLIENT_ID")]
    client_id: Option<String>,

    /// Integration client secret, used with `--admin`.
    #[arg(long, env = "ADMIN_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print responses on a single line.
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the operations the selected client knows.
    Operations {
        /// Only show ids containing this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
    },
    /// Invoke a catalog operation, e.g. "readContext get /context".
    Call(CallArgs),
    /// Send METHOD PATH directly, bypassing the catalog.
    Request(RequestArgs),
}

#[derive(Debug, Args)]
struct CallArgs {
    operation_id: String,

    /// `{placeholder}` value as name=value; repeatable.
    #[arg(long = "path-param", value_name = "NAME=VALUE")]
    path_params: Vec<Pair>,

    #[command(flatten)]
    input: RequestInput,
}

#[derive(Debug, Args)]
struct RequestArgs {
    method: String,
    path: String,

    #[command(flatten)]
    input: RequestInput,
}

/// Inputs shared by `call` and `request`.
#[derive(Debug, Args)]
struct RequestInput {
    /// Query parameter as name=value; repeatable.
    #[arg(long = "query", value_name = "NAME=VALUE")]
    query: Vec<Pair>,

    /// Request header as name=value; repeatable.
    #[arg(long = "header", value_name = "NAME=VALUE")]
    headers: Vec<Pair>,

    /// JSON body, or `@path` to read it from a file.
    #[arg(long, value_name = "JSON|@FILE")]
    body: Option<String>,
}

impl RequestInput {
    fn is_empty(&self) -> bool {
        self.query.is_empty() && self.headers.is_empty() && self.body.is_none()
    }

    fn into_params(self, path_params: Vec<Pair>) -> Result<RequestParams> {
        let query: Map<String, Value> = self
            .query
            .into_iter()
            .map(|pair| (pair.name, Value::String(pair.value)))
            .collect();

        let mut params = RequestParams::new().query(Value::Object(query));
        for pair in path_params {
            params = params.path_param(pair.name, pair.value);
        }
        for pair in self.headers {
            params = params.header(pair.name, pair.value);
        }
        if let Some(body) = self.body {
            params = params.body(read_body(&body)?);
        }
        Ok(params)
    }
}

/// A `name=value` argument.
#[derive(Clone, Debug)]
struct Pair {
    name: String,
    value: String,
}

impl FromStr for Pair {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Self {
                name: name.to_owned(),
                value: value.to_owned(),
            }),
            Some(_) => Err(format!("'{raw}' has an empty name")),
            None => Err(format!("'{raw}' is not of the form name=value")),
        }
    }
}

enum Client {
    Store(StoreApiClient),
    Admin(AdminApiClient),
}

impl Client {
    fn operations(&self) -> Vec<OperationDefinition> {
        match self {
            Self::Store(client) => client.operations(),
            Self::Admin(client) => client.operations(),
        }
    }

    fn api(&self) -> &ApiClient {
        match self {
            Self::Store(client) => client.api(),
            Self::Admin(client) => client.api(),
        }
    }

    async fn invoke(&self, operation_id: &str, params: Option<RequestParams>) -> Result<Value> {
        let response = match self {
            Self::Store(client) => client.invoke(operation_id, params).await?,
            Self::Admin(client) => client.invoke(operation_id, params).await?,
        };
        Ok(response.data)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = connect(&cli)?;

    let data = match cli.command {
        Command::Operations { filter } => {
            list_operations(&client.operations(), filter.as_deref());
            return Ok(());
        }
        Command::Call(args) => {
            let operation_id = args.operation_id.clone();
            call(&client, args)
                .await
                .with_context(|| format!("'{operation_id}' failed"))?
        }
        Command::Request(args) => {
            let target = format!("{} {}", args.method, args.path);
            send(client.api(), args)
                .await
                .with_context(|| format!("{target} failed"))?
        }
    };

    let rendered = if cli.compact {
        serde_json::to_string(&data)
    } else {
        serde_json::to_string_pretty(&data)
    }
    .context("response is not printable as JSON")?;
    println!("{rendered}");
    Ok(())
}

fn connect(cli: &Cli) -> Result<Client> {
    let fetch_options = FetchOptions {
        timeout: cli.timeout.map(Duration::from_secs),
    };

    if cli.admin {
        let credentials = match (&cli.client_id, &cli.client_secret) {
            (Some(client_id), Some(client_secret)) => Some(Credentials::ClientCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            (None, None) => None,
            _ => bail!("--client-id and --client-secret must be given together"),
        };
        let mut builder = AdminApiClient::builder(&cli.base_url).fetch_options(fetch_options);
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        let client = builder
            .build()
            .with_context(|| format!("cannot use '{}' as admin API root", cli.base_url))?;
        return Ok(Client::Admin(client));
    }

    // Rotated tokens are logged so a later run can resume with --context-token.
    let hooks = ClientHooks::new().on_context_changed(|token| {
        info!(context_token = token, "context token changed");
    });
    let mut builder = StoreApiClient::builder(&cli.base_url)
        .fetch_options(fetch_options)
        .hooks(hooks);
    if let Some(key) = &cli.access_key {
        builder = builder.access_token(key.clone());
    }
    if let Some(token) = &cli.context_token {
        builder = builder.context_token(token.clone());
    }
    let client = builder
        .build()
        .with_context(|| format!("cannot use '{}' as storefront API root", cli.base_url))?;
    Ok(Client::Store(client))
}

/// Prints one aligned `name method path` row per operation.
fn list_operations(operations: &[OperationDefinition], filter: Option<&str>) {
    let needle = filter.map(str::to_ascii_lowercase);
    let shown: Vec<_> = operations
        .iter()
        .filter(|operation| match &needle {
            Some(needle) => operation.id().to_ascii_lowercase().contains(needle),
            None => true,
        })
        .collect();

    let name_width = shown.iter().map(|op| op.name.len()).max().unwrap_or(0);
    let method_width = shown
        .iter()
        .map(|op| op.method.as_str().len())
        .max()
        .unwrap_or(0);

    for op in shown {
        println!(
            "{:<name_width$}  {:<method_width$}  {}",
            op.name,
            op.method.as_str(),
            op.path_template
        );
    }
}

/// Operations without any input are invoked with no parameters, so the catalog
/// can reject those that require some.
async fn call(client: &Client, args: CallArgs) -> Result<Value> {
    let params = if args.path_params.is_empty() && args.input.is_empty() {
        None
    } else {
        Some(args.input.into_params(args.path_params)?)
    };
    client.invoke(&args.operation_id, params).await
}

async fn send(client: &ApiClient, args: RequestArgs) -> Result<Value> {
    let method = Method::from_str(&args.method.to_ascii_uppercase())
        .map_err(|_| anyhow!("'{}' is not an HTTP method", args.method))?;
    let params = args.input.into_params(Vec::new())?;
    let response = client.request(method, &args.path, params).await?;
    Ok(response.data)
}

fn read_body(raw: &str) -> Result<Value> {
    match raw.strip_prefix('@') {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read body file '{path}'"))?;
            serde_json::from_str(&text).with_context(|| format!("'{path}' does not hold JSON"))
        }
        None => serde_json::from_str(raw).context("--body is not valid JSON"),
    }
}
