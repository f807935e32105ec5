use serde_json::Value;
use url::form_urlencoded::{Serializer, byte_serialize};

use crate::ClientError;

/// Replaces every `{name}` placeholder in `template` with the URL-encoded value
/// from `path_params`.
pub fn render_path(
    template: &str,
    path_params: &[(String, String)],
) -> Result<String, ClientError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(length) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + length];
        let value = path_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| ClientError::MissingPathParameter {
                template: template.to_owned(),
                parameter: name.to_owned(),
            })?;

        rendered.push_str(&rest[..start]);
        rendered.push_str(&encode_path_segment(value));
        rest = &rest[start + length + 1..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

/// Placeholder names of a path template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(length) = rest[start..].find('}') else {
            break;
        };
        names.push(rest[start + 1..start + length].to_owned());
        rest = &rest[start + length + 1..];
    }
    names
}

/// Appends `query` to `path`, skipping `null` entries.
///
/// `query` must be a JSON object (or `null`). The path is returned unchanged when
/// no entries remain.
pub fn append_query(path: &str, query: &Value) -> Result<String, ClientError> {
    let entries = match query {
        Value::Null => return Ok(path.to_owned()),
        Value::Object(entries) => entries,
        other => return Err(ClientError::InvalidQuery(kind_of(other).to_owned())),
    };

    let mut serializer = Serializer::new(String::new());
    let mut appended = false;
    for (key, value) in entries {
        if value.is_null() {
            continue;
        }
        serializer.append_pair(key, &query_value(value));
        appended = true;
    }

    if !appended {
        return Ok(path.to_owned());
    }

    let separator = if path.contains('?') { '&' } else { '?' };
    Ok(format!("{path}{separator}{}", serializer.finish()))
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => query_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// `byte_serialize` writes spaces as `+`, which only means space in query strings.
fn encode_path_segment(value: &str) -> String {
    byte_serialize(value.as_bytes())
        .map(|chunk| if chunk == "+" { "%20" } else { chunk })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{append_query, placeholders, render_path};
    use crate::ClientError;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn render_path_replaces_and_encodes_every_placeholder() {
        let path = render_path(
            "/document/download/{documentId}/{deepLinkCode}",
            &params(&[("deepLinkCode", "a b/c"), ("documentId", "doc-1")]),
        )
        .expect("path renders");
        assert_eq!(path, "/document/download/doc-1/a%20b%2Fc");
    }

    #[test]
    fn render_path_reports_missing_parameter() {
        let error =
            render_path("/product-listing/{categoryId}", &[]).expect_err("missing parameter");
        match error {
            ClientError::MissingPathParameter { template, parameter } => {
                assert_eq!(template, "/product-listing/{categoryId}");
                assert_eq!(parameter, "categoryId");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_brace_is_kept_verbatim() {
        assert_eq!(render_path("/a/{b", &[]).expect("renders"), "/a/{b");
    }

    #[test]
    fn placeholders_are_listed_in_order() {
        assert_eq!(
            placeholders("/order/download/{orderId}/{downloadId}"),
            vec!["orderId".to_owned(), "downloadId".to_owned()]
        );
    }

    #[test]
    fn query_skips_null_values_and_keeps_order() {
        let query = json!({
            "p": 2,
            "empty": null,
            "term": "red shoe",
            "ids": ["a", "b"],
            "on": true
        });
        let path = append_query("/search", &query).expect("query renders");
        assert_eq!(path, "/search?p=2&term=red+shoe&ids=a%2Cb&on=true");
    }

    #[test]
    fn query_respects_existing_question_mark() {
        let path = append_query("/search?limit=1", &json!({"p": 1})).expect("query renders");
        assert_eq!(path, "/search?limit=1&p=1");
    }

    #[test]
    fn query_is_omitted_when_nothing_remains() {
        assert_eq!(append_query("/context", &json!({"a": null})).expect("ok"), "/context");
        assert_eq!(append_query("/context", &json!({})).expect("ok"), "/context");
        assert_eq!(append_query("/context", &serde_json::Value::Null).expect("ok"), "/context");
    }

    #[test]
    fn non_object_query_is_rejected() {
        let error = append_query("/context", &json!([1, 2])).expect_err("array query");
        assert!(matches!(error, ClientError::InvalidQuery(_)));
    }
}
