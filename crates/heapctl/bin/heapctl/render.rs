use colored::*;
use eyre::Result;
use heapctl::output::is_byte_field;
use heapctl::{format_bytes, Format};
use prettytable::{color, Attr, Cell, Row, Table};
use serde_json::Value;

pub fn print(title: &str, value: &Value, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(value)?),
        Format::JsonPretty => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Table => print_table(title, value),
    }
    Ok(())
}

fn print_table(title: &str, value: &Value) {
    match value {
        Value::Null => {}
        // malloc_info XML and other free-form text go out untouched
        Value::String(text) => println!("{}", text),
        Value::Object(fields) => {
            let use_colors = std::env::var("NO_COLOR").is_err();
            let mut table = Table::new();

            let header: Vec<Cell> = ["field", "value"]
                .into_iter()
                .map(|h| {
                    if use_colors {
                        Cell::new(h)
                            .with_style(Attr::Bold)
                            .with_style(Attr::ForegroundColor(color::CYAN))
                    } else {
                        Cell::new(h).with_style(Attr::Bold)
                    }
                })
                .collect();
            table.add_row(Row::new(header));

            for (name, field) in fields {
                table.add_row(Row::new(vec![
                    Cell::new(name),
                    Cell::new(&render_field(name, field)),
                ]));
            }

            println!("{} {}", "[heapctl]".blue().bold(), title);
            table.printstd();
        }
        other => println!("{}", other),
    }
}

fn render_field(name: &str, value: &Value) -> String {
    match value.as_u64() {
        Some(bytes) if is_byte_field(name) => format!("{} ({})", format_bytes(bytes), bytes),
        _ => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_field() {
        assert_eq!(render_field("uordblks", &json!(2048)), "2.0 KB (2048)");
        assert_eq!(render_field("hblks", &json!(3)), "3");
        assert_eq!(render_field("version", &json!("5.3.0")), "5.3.0");
    }
}
