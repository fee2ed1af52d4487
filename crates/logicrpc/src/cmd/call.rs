use std::fs;
use std::path::Path;
use std::time::Instant;

use logicrpc_client::{
    from_json, to_json, CallOptions, CallResponse, CancellationToken, Client, ClientConfig, Payload,
};
use serde_json::Value;
use logicrpc_schema::{CallTarget, SchemaRegistry};
use tracing::debug;

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{
    client_error, io_error, schema_error, CliError, CliResult, DATA_INVALID, REMOTE_ERROR, SUCCESS,
    USAGE,
};
use crate::output::{print_response, CallSummary, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let params = resolve_params(&args)?;
    let config = ClientConfig::new(&args.socket)
        .with_retry_delay(parse_duration(&args.retry_delay)?)
        .with_max_attempts(args.attempts)
        .with_call_timeout(args.timeout.as_deref().map(parse_duration).transpose()?);

    let target = CallTarget::new(&args.module_id, &args.method);
    let schemas = args.schemas.as_deref().map(load_schemas).transpose()?;
    if let Some(schemas) = &schemas {
        schemas
            .validate_params(&target, &params)
            .map_err(|err| schema_error("params rejected", err))?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    let started = Instant::now();
    let response = runtime.block_on(call(config, &args, from_json(&params)))?;
    let elapsed = started.elapsed();
    debug!(elapsed_ms = elapsed.as_millis() as u64, ok = response.ok, "call finished");

    if let (Some(schemas), true) = (&schemas, response.ok) {
        let data = response.data.as_ref().map_or(Value::Null, to_json);
        schemas
            .validate_result(&target, &data)
            .map_err(|err| schema_error("result rejected", err))?;
    }

    let summary = CallSummary {
        module_id: &args.module_id,
        method: &args.method,
        elapsed,
    };
    print_response(&response, &summary, format);

    Ok(if response.ok { SUCCESS } else { REMOTE_ERROR })
}

async fn call(config: ClientConfig, args: &CallArgs, params: Payload) -> CliResult<CallResponse> {
    let client = Client::new(config);
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let options = CallOptions::default().with_cancel(cancel);
    let result = client
        .call_raw_with_options(&args.module_id, &args.method, params, &args.origin, &options)
        .await;
    interrupt.abort();

    result.map_err(|err| client_error("call failed", err))
}

fn resolve_params(args: &CallArgs) -> CliResult<Value> {
    if let Some(json) = &args.params {
        return serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--params is not valid JSON: {err}")));
    }
    if let Some(path) = &args.params_file {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return serde_json::from_str(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("{} is not valid JSON: {err}", path.display()),
            )
        });
    }
    Ok(Value::Object(serde_json::Map::new()))
}

fn load_schemas(dir: &Path) -> CliResult<SchemaRegistry> {
    SchemaRegistry::from_directory(dir)
        .map_err(|err| schema_error(&format!("failed loading schemas from {}", dir.display()), err))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serde_json::json;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CallArgs,
    }

    fn parse(extra: &[&str]) -> CallArgs {
        let mut argv = vec!["call", "test_module", "test_function"];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).expect("call args should parse").args
    }

    #[test]
    fn params_default_to_empty_map() {
        assert_eq!(resolve_params(&parse(&[])).unwrap(), json!({}));
    }

    #[test]
    fn inline_params_parse() {
        let args = parse(&["--params", r#"{"value": 2}"#]);
        assert_eq!(resolve_params(&args).unwrap(), json!({"value": 2}));
    }

    #[test]
    fn invalid_inline_params_are_usage_errors() {
        let err = resolve_params(&parse(&["--params", "{nope"])).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn params_file_is_read() {
        let dir = std::env::temp_dir().join(format!(
            "lrpc-params-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock should be after epoch")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        let path = dir.join("params.json");
        fs::write(&path, r#"{"value": 7}"#).expect("params file should be written");

        let args = parse(&["--params-file", path.to_str().expect("utf-8 path")]);
        assert_eq!(resolve_params(&args).unwrap(), json!({"value": 7}));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_schema_dir_is_usage() {
        let err = load_schemas(Path::new("/nonexistent/lrpc-schemas")).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
