use clap::Parser;
use serde_json::{json, Map, Value};

use admission_proxy::admission::{AdmissionGate, Disposition, HttpAdmissionClient, InboundRequest};
use admission_proxy::config::validation::parse_service_url;
use admission_proxy::config::{AdmissionConfig, UnclassifiedPolicy};

#[derive(Parser)]
#[command(name = "admission-probe")]
#[command(about = "Run one admission check and print the gate's disposition", long_about = None)]
struct Cli {
    /// Base URL of the admission service.
    #[arg(short, long, default_value = "http://127.0.0.1:18080")]
    service_url: String,

    /// Virtual host to check.
    #[arg(long)]
    host: String,

    /// Ask the service to open a waiting room for the host.
    #[arg(short, long)]
    enable: bool,

    /// Cookie header to forward (repeatable).
    #[arg(short, long)]
    cookie: Vec<String>,

    /// Block on statuses other than 200 and 429.
    #[arg(long)]
    fail_closed: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let service_url = parse_service_url(&cli.service_url)?;
    let policy = if cli.fail_closed {
        UnclassifiedPolicy::FailClosed
    } else {
        UnclassifiedPolicy::FailOpen
    };
    let client = HttpAdmissionClient::new(&service_url, AdmissionConfig::default().max_body_bytes);
    let gate = AdmissionGate::new(client, policy);

    let mut request = InboundRequest::new(cli.host.to_ascii_lowercase());
    for cookie in &cli.cookie {
        request = request.with_cookie(cookie.parse()?);
    }

    let disposition = gate.evaluate(&request, cli.enable).await;
    println!("{}", serde_json::to_string_pretty(&render(&disposition))?);

    if !disposition.is_continue() {
        std::process::exit(1);
    }
    Ok(())
}

fn render(disposition: &Disposition) -> Value {
    let mut headers = Map::new();
    for (name, value) in disposition.headers() {
        let value = Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned());
        match headers.get_mut(name.as_str()) {
            Some(Value::Array(values)) => values.push(value),
            _ => {
                headers.insert(name.as_str().to_string(), Value::Array(vec![value]));
            }
        }
    }

    match disposition {
        Disposition::Continue { .. } => json!({ "disposition": "continue", "headers": headers }),
        Disposition::Block { status, .. } => json!({
            "disposition": "block",
            "status": status.as_u16(),
            "headers": headers,
        }),
    }
}
