//! Classification outcomes.

use serde::{Deserialize, Serialize};

/// Outcome of running one image through the detection pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// A human face was found; `breed` is the look-alike breed.
    Human { breed: String },
    /// A dog was found.
    Dog { breed: String },
    /// Neither a face nor a dog.
    Unknown,
    /// The image could not be decoded or the models failed on it.
    Failed { reason: String },
}

impl Verdict {
    /// User-facing message shown next to the image.
    pub fn message(&self) -> String {
        match self {
            Verdict::Human { breed } => format!(
                "Looks like a human! If this were a dog, though, I would guess a {}",
                breed
            ),
            Verdict::Dog { breed } => format!("Looks like a dog! Perhaps a {}", breed),
            Verdict::Unknown => {
                "Well...I have no idea what this is. Apologies. Please try another image."
                    .to_string()
            }
            Verdict::Failed { reason } => {
                format!("Sorry, this image could not be processed ({}).", reason)
            }
        }
    }

    /// Short label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Human { .. } => "human",
            Verdict::Dog { .. } => "dog",
            Verdict::Unknown => "unknown",
            Verdict::Failed { .. } => "failed",
        }
    }

    /// Predicted breed, if any.
    pub fn breed(&self) -> Option<&str> {
        match self {
            Verdict::Human { breed } | Verdict::Dog { breed } => Some(breed),
            _ => None,
        }
    }
}

/// Prediction for a single displayed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub url: String,
    pub message: String,
    pub verdict: Verdict,
}

impl Prediction {
    pub fn new(url: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            url: url.into(),
            message: verdict.message(),
            verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_message_mentions_breed() {
        let v = Verdict::Human {
            breed: "Dalmatian".to_string(),
        };
        let msg = v.message();
        assert!(msg.contains("human"));
        assert!(msg.ends_with("guess a Dalmatian"));
    }

    #[test]
    fn test_unknown_message() {
        assert!(Verdict::Unknown.message().contains("no idea"));
        assert_eq!(Verdict::Unknown.breed(), None);
    }

    #[test]
    fn test_verdict_serialization_is_tagged() {
        let v = Verdict::Dog {
            breed: "Beagle".to_string(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "dog");
        assert_eq!(json["breed"], "Beagle");
    }

    #[test]
    fn test_prediction_carries_message() {
        let p = Prediction::new("/uploads/a/b.jpg", Verdict::Unknown);
        assert_eq!(p.message, Verdict::Unknown.message());
        assert_eq!(p.verdict.as_str(), "unknown");
    }
}
