use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print rows as JSON, or one line per row with the chosen columns
pub fn output_rows(output_format: &OutputFormat, collection_name: &str, rows: &[Value], columns: &[&str]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: rows }))?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No {} found", collection_name);
            }
            for row in rows {
                let cells: Vec<String> = columns.iter().map(|column| cell(row.get(*column))).collect();
                println!("{}", cells.join("  "));
            }
        }
    }
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Read a JSON document from stdin
pub fn read_stdin_json() -> anyhow::Result<Value> {
    let mut input = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)?;
    if input.trim().is_empty() {
        return Err(anyhow::anyhow!("Expected JSON on stdin"));
    }
    Ok(serde_json::from_str(&input)?)
}

/// Parse an optional `--filter` JSON argument
pub fn parse_json_arg<T: serde::de::DeserializeOwned + Default>(raw: Option<&str>) -> anyhow::Result<T> {
    match raw {
        Some(text) => serde_json::from_str(text).map_err(|e| anyhow::anyhow!("Invalid JSON argument: {}", e)),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterData;

    #[test]
    fn parses_filter_argument() {
        let data: FilterData = parse_json_arg(Some(r#"{ "where": { "status": "חדש" }, "limit": 5 }"#)).unwrap();
        assert_eq!(data.limit, Some(5));
        assert_eq!(parse_json_arg::<FilterData>(None).unwrap(), FilterData::default());
        assert!(parse_json_arg::<FilterData>(Some("{")).is_err());
    }

    #[test]
    fn text_cells() {
        assert_eq!(cell(None), "-");
        assert_eq!(cell(Some(&json!("x"))), "x");
        assert_eq!(cell(Some(&json!(3))), "3");
    }
}
