//! Lenient deserializers for free-text fields clients sometimes send as numbers.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

/// Accepts `"120k"`, `120000` or `null` for an optional text column.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "super::opt_string_or_number")]
        salary: Option<String>,
    }

    #[test]
    fn test_salary_accepts_text_and_numbers() {
        let p: Payload = serde_json::from_str(r#"{"salary": 120000}"#).unwrap();
        assert_eq!(p.salary.as_deref(), Some("120000"));
        let p: Payload = serde_json::from_str(r#"{"salary": "12 LPA"}"#).unwrap();
        assert_eq!(p.salary.as_deref(), Some("12 LPA"));
        let p: Payload = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.salary, None);
        let p: Payload = serde_json::from_str(r#"{"salary": null}"#).unwrap();
        assert_eq!(p.salary, None);
    }
}
