use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AiClient;

lazy_static! {
    // Models like to wrap the JSON in prose or code fences.
    static ref JSON_OBJECT_RE: Regex = Regex::new(r"\{[\s\S]*\}").unwrap();
}

pub const FALLBACK_TITLE: &str = "All Messages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub title: String,
    #[serde(default)]
    pub messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterPayload {
    clusters: Vec<Cluster>,
}

/// Outcome of asking the model to group messages by theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterAnalysis {
    Parsed(Vec<Cluster>),
    /// The model answered but not in the expected shape.
    FallbackSingleCluster(Cluster),
    /// The model could not be reached in time.
    Unavailable,
}

impl ClusterAnalysis {
    pub fn source(&self) -> &'static str {
        match self {
            ClusterAnalysis::Parsed(_) => "parsed",
            ClusterAnalysis::FallbackSingleCluster(_) => "fallback",
            ClusterAnalysis::Unavailable => "unavailable",
        }
    }

    pub fn into_clusters(self) -> Vec<Cluster> {
        match self {
            ClusterAnalysis::Parsed(clusters) => clusters,
            ClusterAnalysis::FallbackSingleCluster(cluster) => vec![cluster],
            ClusterAnalysis::Unavailable => Vec::new(),
        }
    }
}

pub fn build_prompt(messages: &[String]) -> String {
    let listing = messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, m))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are an assistant that analyzes anonymous messages and groups them into \
         meaningful themes.\n\n\
         Group the following messages into 3-5 clusters based on their themes, topics, \
         or sentiment.\n\n\
         Messages:\n{listing}\n\n\
         Respond with a JSON object in exactly this format:\n\
         {{\"clusters\": [{{\"title\": \"Theme name\", \"messages\": [\"message 1\", \"message 2\"]}}]}}\n\n\
         Rules:\n\
         - Create 3-5 meaningful clusters\n\
         - Each cluster has a clear, descriptive title\n\
         - Include every message in at least one cluster\n\
         - Return ONLY valid JSON, no extra text"
    )
}

/// Pulls the first JSON object out of a reply. Anything unparsable becomes
/// one cluster holding every message.
pub fn parse_reply(reply: &str, messages: &[String]) -> ClusterAnalysis {
    let parsed = JSON_OBJECT_RE
        .find(reply)
        .and_then(|m| serde_json::from_str::<ClusterPayload>(m.as_str()).ok());
    match parsed {
        Some(payload) => ClusterAnalysis::Parsed(payload.clusters),
        None => {
            warn!("ai reply was not cluster json, falling back");
            ClusterAnalysis::FallbackSingleCluster(Cluster {
                title: FALLBACK_TITLE.to_string(),
                messages: messages.to_vec(),
            })
        }
    }
}

/// Asks the model to cluster `messages`, giving up after `timeout`.
pub async fn analyze(ai: &dyn AiClient, messages: &[String], timeout: Duration) -> ClusterAnalysis {
    if messages.is_empty() {
        return ClusterAnalysis::Parsed(Vec::new());
    }
    debug!(count = messages.len(), "analyzing messages");
    let prompt = build_prompt(messages);
    match tokio::time::timeout(timeout, ai.generate(&prompt)).await {
        Ok(Ok(reply)) => parse_reply(&reply, messages),
        Ok(Err(e)) => {
            warn!(error = %e, "ai analysis failed");
            ClusterAnalysis::Unavailable
        }
        Err(_) => {
            warn!(?timeout, "ai analysis timed out");
            ClusterAnalysis::Unavailable
        }
    }
}
