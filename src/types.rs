use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Assets and articles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: i64,
    pub ticker: String,
    pub name: String,
}

/// An article as produced by a news source, before it has a store id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub asset_id: i64,
    pub source: String,
    pub title: String,
    pub content: String,
    pub url: String,
    /// `YYYY-MM-DDTHH:MM:SS`, as reported by the feed (normalised to UTC).
    pub published_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub news_id: i64,
    pub asset_id: i64,
    pub source: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub published_at: String,
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Case-insensitive parse of a model label. Unknown labels yield None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "negative" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

/// Output of a sentiment classifier: the winning label and its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub confidence: f64,
}

impl SentimentResult {
    /// Signed score in [-1, 1]: +confidence for positive, -confidence for
    /// negative, 0 for neutral.
    pub fn signed_score(&self) -> f64 {
        match self.label {
            SentimentLabel::Positive => self.confidence,
            SentimentLabel::Negative => -self.confidence,
            SentimentLabel::Neutral => 0.0,
        }
    }
}

/// NLP row written for each scored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlpRecord {
    pub news_id: i64,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub summary: String,
    pub model_name: String,
}

// ---------------------------------------------------------------------------
// Aggregation input / output
// ---------------------------------------------------------------------------

/// A scored article exactly as read back from the store. Fields may be
/// missing or malformed; the aggregator validates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub asset_id: i64,
    pub published_at: String,
    pub sentiment_score: Option<f64>,
}

/// A validated scored article keyed by calendar day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredArticle {
    pub asset_id: i64,
    pub day: NaiveDate,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Too few articles to say anything.
    LowCoverage,
    /// Scores disagree strongly with each other.
    HighUncertainty,
    PositiveMomentum,
    Caution,
    Neutral,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::LowCoverage,
        Signal::HighUncertainty,
        Signal::PositiveMomentum,
        Signal::Caution,
        Signal::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::LowCoverage => "low_coverage",
            Signal::HighUncertainty => "high_uncertainty",
            Signal::PositiveMomentum => "positive_momentum",
            Signal::Caution => "caution",
            Signal::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Signal::ALL
            .into_iter()
            .find(|sig| sig.as_str() == s)
            .ok_or_else(|| format!("unknown signal: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub asset_id: i64,
    pub metric_date: NaiveDate,
    pub avg_sentiment: f64,
    pub news_volume: u32,
    pub sentiment_std: f64,
    pub signal: Signal,
}

// ---------------------------------------------------------------------------
// Briefs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BriefMode {
    /// Deterministic fixed template, no external service.
    Template,
    /// Hosted text generation, falling back to the template on failure.
    Model,
}

impl std::fmt::Display for BriefMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BriefMode::Template => write!(f, "template"),
            BriefMode::Model => write!(f, "model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBrief {
    /// Ticker the brief covers.
    pub scope: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub content: String,
    pub model_name: String,
}
