use serde_json::Value;

// Headline figures, most useful first
const HEADLINE_KEYS: [&str; 6] = [
    "equity_irr",
    "project_irr",
    "irr",
    "valid",
    "total_profit",
    "profit_on_cost",
];

/// Print only the headline answer of a command.
pub fn print_minimal(value: &Value) {
    let body = value.get("result").unwrap_or(value);
    let Value::Object(map) = body else {
        println!("{}", scalar(body));
        return;
    };

    let headline = HEADLINE_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()));
    match headline {
        Some(val) => println!("{}", scalar(val)),
        None => match map.iter().next() {
            Some((key, val)) => println!("{}: {}", key, scalar(val)),
            None => println!("{{}}"),
        },
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
