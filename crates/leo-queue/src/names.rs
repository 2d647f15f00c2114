use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueueError;

/// The fixed set of queues the content pipeline runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    ContentGeneration,
    ContentReview,
    PublishX,
    PublishBluesky,
    AttributionSync,
    DailyRollup,
}

impl QueueName {
    pub fn all() -> &'static [QueueName] {
        &[
            QueueName::ContentGeneration,
            QueueName::ContentReview,
            QueueName::PublishX,
            QueueName::PublishBluesky,
            QueueName::AttributionSync,
            QueueName::DailyRollup,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::ContentGeneration => "content-generation",
            QueueName::ContentReview => "content-review",
            QueueName::PublishX => "publish-x",
            QueueName::PublishBluesky => "publish-bluesky",
            QueueName::AttributionSync => "attribution-sync",
            QueueName::DailyRollup => "daily-rollup",
        }
    }

    /// Jobs processed at once by this queue's worker unless overridden.
    pub fn default_concurrency(self) -> usize {
        match self {
            QueueName::ContentGeneration | QueueName::ContentReview => 2,
            _ => 1,
        }
    }

    /// Publish queues de-duplicate on `data.idempotencyKey`.
    pub fn is_publish(self) -> bool {
        matches!(self, QueueName::PublishX | QueueName::PublishBluesky)
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::all()
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| QueueError::UnknownQueue(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_queues_with_documented_names() {
        let names: Vec<_> = QueueName::all().iter().map(|q| q.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "content-generation",
                "content-review",
                "publish-x",
                "publish-bluesky",
                "attribution-sync",
                "daily-rollup",
            ]
        );
    }

    #[test]
    fn serde_matches_as_str() {
        for q in QueueName::all() {
            let json = serde_json::to_string(q).unwrap();
            assert_eq!(json, format!("\"{}\"", q.as_str()));
            assert_eq!(q.as_str().parse::<QueueName>().unwrap(), *q);
        }
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = "publish-mastodon".parse::<QueueName>().unwrap_err();
        assert!(err.to_string().contains("publish-mastodon"));
    }

    #[test]
    fn concurrency_and_publish_flags() {
        assert_eq!(QueueName::ContentGeneration.default_concurrency(), 2);
        assert_eq!(QueueName::DailyRollup.default_concurrency(), 1);
        assert!(QueueName::PublishBluesky.is_publish());
        assert!(!QueueName::ContentReview.is_publish());
    }
}
