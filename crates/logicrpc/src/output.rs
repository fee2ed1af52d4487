use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use logicrpc_client::{to_json, CallResponse};
use serde::Serialize;
use serde_json::Value;

const CALL_RESULT_SCHEMA: &str = "https://schemas.3leaps.dev/logicrpc/cli/v1/call-result.schema.json";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Which call a printed response belongs to.
pub struct CallSummary<'a> {
    pub module_id: &'a str,
    pub method: &'a str,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct CallOutput<'a> {
    schema_id: &'static str,
    module_id: &'a str,
    method: &'a str,
    ok: bool,
    data: &'a Value,
    error_message: &'a str,
    elapsed_ms: u128,
}

pub fn render_response(response: &CallResponse, summary: &CallSummary<'_>, format: OutputFormat) -> String {
    let data = response.data.as_ref().map_or(Value::Null, to_json);
    let data = &data;
    match format {
        OutputFormat::Json => {
            let out = CallOutput {
                schema_id: CALL_RESULT_SCHEMA,
                module_id: summary.module_id,
                method: summary.method,
                ok: response.ok,
                data,
                error_message: &response.error_message,
                elapsed_ms: summary.elapsed.as_millis(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let outcome = if response.ok {
                compact(data)
            } else {
                response.error_message.clone()
            };
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MODULE", "METHOD", "OK", "RESULT", "ELAPSED"])
                .add_row(vec![
                    summary.module_id.to_string(),
                    summary.method.to_string(),
                    response.ok.to_string(),
                    outcome,
                    format!("{}ms", summary.elapsed.as_millis()),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => {
            if response.ok {
                serde_json::to_string_pretty(data).unwrap_or_else(|_| compact(data))
            } else {
                format!(
                    "{}.{} failed: {}",
                    summary.module_id, summary.method, response.error_message
                )
            }
        }
    }
}

pub fn print_response(response: &CallResponse, summary: &CallSummary<'_>, format: OutputFormat) {
    println!("{}", render_response(response, summary, format));
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
