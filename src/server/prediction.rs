use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// Inbound chat question as posted by the browser widget.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub question: Option<String>,
    pub user_id: Option<String>,
    pub chatflow_id: Option<String>,
}

/// A request with every required field present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPrediction {
    pub question: String,
    pub user_id: String,
    pub chatflow_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPrediction<'a> {
    pub question: &'a str,
    pub override_config: OverrideConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideConfig<'a> {
    pub user_id: &'a str,
}

impl PredictionRequest {
    /// Only a JSON object is a request; serde would otherwise fill the
    /// fields positionally from an array.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        match value {
            serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
            _ => Err(ProxyError::MissingParameters),
        }
    }

    pub fn validate(self) -> Result<ValidatedPrediction> {
        match (non_empty(self.question), non_empty(self.user_id), usable_chatflow_id(self.chatflow_id)) {
            (Some(question), Some(user_id), Some(chatflow_id)) => Ok(ValidatedPrediction {
                question,
                user_id,
                chatflow_id,
            }),
            _ => Err(ProxyError::MissingParameters),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// URL normalisation drops `.` and `..` segments, so they could never reach
// the upstream as a chatflow id.
fn usable_chatflow_id(value: Option<String>) -> Option<String> {
    non_empty(value).filter(|v| v != "." && v != "..")
}

impl ValidatedPrediction {
    pub fn upstream_body(&self) -> UpstreamPrediction<'_> {
        UpstreamPrediction {
            question: &self.question,
            override_config: OverrideConfig {
                user_id: &self.user_id,
            },
        }
    }

    /// `{base}/api/v1/prediction/{chatflowId}`; the id is a single encoded segment.
    pub fn endpoint(&self, base_url: &Url) -> Result<Url> {
        let mut url = base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProxyError::Config("upstream URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["api", "v1", "prediction", self.chatflow_id.as_str()]);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<ValidatedPrediction> {
        PredictionRequest::from_slice(body.to_string().as_bytes())?.validate()
    }

    fn sample() -> ValidatedPrediction {
        parse(json!({"question": "What is Rust?", "userId": "u-1", "chatflowId": "flow-42"})).unwrap()
    }

    #[test]
    fn accepts_complete_request() {
        let p = sample();
        assert_eq!(p.question, "What is Rust?");
        assert_eq!(p.user_id, "u-1");
        assert_eq!(p.chatflow_id, "flow-42");
    }

    #[test]
    fn rejects_missing_or_empty_fields() {
        let cases = [
            json!({"userId": "u-1", "chatflowId": "flow-42"}),
            json!({"question": "hi", "chatflowId": "flow-42"}),
            json!({"question": "hi", "userId": "u-1"}),
            json!({"question": "", "userId": "u-1", "chatflowId": "flow-42"}),
            json!({"question": "hi", "userId": "", "chatflowId": "flow-42"}),
            json!({"question": "hi", "userId": "u-1", "chatflowId": ""}),
            json!({"question": null, "userId": "u-1", "chatflowId": "flow-42"}),
            json!({"question": "hi", "userId": "u-1", "chatflowId": "."}),
            json!({"question": "hi", "userId": "u-1", "chatflowId": ".."}),
            json!({}),
        ];
        for case in cases {
            assert!(
                matches!(parse(case.clone()), Err(ProxyError::MissingParameters)),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn rejects_unparsable_bodies() {
        assert!(matches!(
            PredictionRequest::from_slice(b"not json"),
            Err(ProxyError::InvalidBody(_))
        ));
        assert!(matches!(
            PredictionRequest::from_slice(b""),
            Err(ProxyError::InvalidBody(_))
        ));
        assert!(matches!(
            parse(json!({"question": 7, "userId": "u-1", "chatflowId": "flow-42"})),
            Err(ProxyError::InvalidBody(_))
        ));
    }

    #[test]
    fn rejects_non_object_bodies() {
        for body in [
            r#"["What is Rust?","u-1","flow-42"]"#,
            r#""What is Rust?""#,
            "42",
            "null",
        ] {
            assert!(
                matches!(PredictionRequest::from_slice(body.as_bytes()), Err(ProxyError::MissingParameters)),
                "accepted {}",
                body
            );
        }
    }

    #[test]
    fn upstream_body_carries_override_config() {
        let p = sample();
        let body = serde_json::to_value(p.upstream_body()).unwrap();
        assert_eq!(
            body,
            json!({"question": "What is Rust?", "overrideConfig": {"userId": "u-1"}})
        );
    }

    #[test]
    fn endpoint_appends_prediction_path() {
        let p = sample();
        let base = Url::parse("https://flows.example.com").unwrap();
        assert_eq!(
            p.endpoint(&base).unwrap().as_str(),
            "https://flows.example.com/api/v1/prediction/flow-42"
        );
    }

    #[test]
    fn endpoint_keeps_base_prefix() {
        let p = sample();
        for raw in ["https://flows.example.com/flowise", "https://flows.example.com/flowise/"] {
            let base = Url::parse(raw).unwrap();
            assert_eq!(
                p.endpoint(&base).unwrap().as_str(),
                "https://flows.example.com/flowise/api/v1/prediction/flow-42"
            );
        }
    }

    #[test]
    fn endpoint_encodes_chatflow_id_as_one_segment() {
        let mut p = sample();
        p.chatflow_id = "../admin?x=1".into();
        let base = Url::parse("https://flows.example.com").unwrap();
        let url = p.endpoint(&base).unwrap();
        assert_eq!(url.path(), "/api/v1/prediction/..%2Fadmin%3Fx=1");
        assert!(url.query().is_none());
    }

    #[test]
    fn dot_segment_chatflow_ids_never_reach_endpoint() {
        for id in [".", ".."] {
            let body = json!({"question": "hi", "userId": "u-1", "chatflowId": id});
            assert!(matches!(parse(body), Err(ProxyError::MissingParameters)), "accepted {}", id);
        }

        let mut p = sample();
        p.chatflow_id = "...".into();
        let base = Url::parse("https://flows.example.com").unwrap();
        assert_eq!(p.endpoint(&base).unwrap().path(), "/api/v1/prediction/...");
    }
}
