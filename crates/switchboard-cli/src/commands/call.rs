//! `call`: route a single capability request.

use anyhow::{Context, Result};
use serde_json::Value;
use switchboard_orchestrator::{AdapterResponse, SwitchboardConfig};

use super::{boot, shut_down};
use crate::theme::Theme;

/// Parse `--params` as JSON.
fn parse_params(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("--params must be valid JSON")
}

/// Start the critical set plus `extra`, route one request, and shut down.
pub(crate) async fn run_call(
    config: SwitchboardConfig,
    capability: &str,
    method: &str,
    params: &str,
    extra: &[String],
) -> Result<()> {
    let params = parse_params(params)?;
    let orchestrator = boot(config, true).await?;

    for id in extra {
        if let Err(e) = orchestrator.start(id).await {
            eprintln!("{}", Theme::warning(&e.to_string()));
        }
    }

    let result = orchestrator.execute(capability, method, params).await;
    shut_down(&orchestrator).await;

    let response = result?;
    print_response(&response);
    Ok(())
}

fn print_response(response: &AdapterResponse) {
    eprintln!("{}", Theme::dimmed(&format!("served by {}", response.service)));
    if let Some(structured) = &response.structured {
        match serde_json::to_string_pretty(structured) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{structured}"),
        }
    } else {
        println!("{}", response.text_content());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_json() {
        assert_eq!(
            parse_params(r#"{"url":"https://example.com"}"#).unwrap(),
            serde_json::json!({"url": "https://example.com"})
        );
        assert!(parse_params("url=https://example.com").is_err());
    }
}
