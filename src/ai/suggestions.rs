use std::time::Duration;

use tracing::warn;

use super::AiClient;

pub const SEPARATOR: &str = "||";

pub const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "What's your favorite movie?",
    "Do you have any pets?",
    "What's your dream job?",
];

pub const PROMPT: &str = "Create a list of three open-ended and engaging questions formatted \
as a single string. Each question should be separated by '||'. These questions are for an \
anonymous social messaging platform and should be suitable for a diverse audience. Avoid \
personal or sensitive topics, focusing instead on universal themes that encourage friendly \
interaction. For example: 'What's a hobby you've recently started?||If you could have dinner \
with any historical figure, who would it be?||What's a simple thing that makes you happy?'. \
Return only the questions.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestions {
    Generated(Vec<String>),
    Default(Vec<String>),
}

impl Suggestions {
    pub fn defaults() -> Self {
        Suggestions::Default(DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect())
    }

    pub fn source(&self) -> &'static str {
        match self {
            Suggestions::Generated(_) => "generated",
            Suggestions::Default(_) => "default",
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            Suggestions::Generated(v) | Suggestions::Default(v) => v,
        }
    }
}

pub fn parse_reply(reply: &str) -> Suggestions {
    let questions: Vec<String> = reply
        .split(SEPARATOR)
        .map(|q| q.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if questions.is_empty() {
        return Suggestions::defaults();
    }
    Suggestions::Generated(questions)
}

pub async fn suggest(ai: &dyn AiClient, timeout: Duration) -> Suggestions {
    match tokio::time::timeout(timeout, ai.generate(PROMPT)).await {
        Ok(Ok(reply)) => parse_reply(&reply),
        Ok(Err(e)) => {
            warn!(error = %e, "ai suggestions failed");
            Suggestions::defaults()
        }
        Err(_) => {
            warn!(?timeout, "ai suggestions timed out");
            Suggestions::defaults()
        }
    }
}
