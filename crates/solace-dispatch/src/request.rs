//! Request model for inbound conversational turns
//!
//! A [`RequestDescriptor`] is transient: it describes one turn and is never
//! persisted. Urgency classification happens upstream (`classify(text)`);
//! this engine only consumes the declared class.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Task Type
// ============================================================================

/// Kind of work the turn asks a backend to do
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// General conversation
    Chat,
    /// Structured analysis of user input (e.g. mood form review)
    Analysis,
    /// Crisis support — always served at top quality
    Crisis,
    /// Culturally-adapted response generation
    Cultural,
    /// Creative writing
    Creative,
}

impl TaskType {
    /// Stable string form, matching the serde representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Analysis => "analysis",
            Self::Crisis => "crisis",
            Self::Cultural => "cultural",
            Self::Creative => "creative",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Urgency
// ============================================================================

/// Caller-declared priority class
///
/// `Critical` overrides cost optimization entirely: safety beats budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Background or deferred work
    Low,
    /// Normal conversational turn
    Medium,
    /// Latency-sensitive turn
    High,
    /// Safety-relevant turn; budget constraints are ignored
    Critical,
}

impl Urgency {
    /// Whether this urgency bypasses budget enforcement
    #[must_use]
    pub fn overrides_budget(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

// ============================================================================
// Complexity
// ============================================================================

/// Estimated difficulty of the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Short, formulaic exchanges
    Simple,
    /// Typical conversation
    Moderate,
    /// Multi-step reasoning or nuanced content
    Complex,
}

// ============================================================================
// Subscription Tier
// ============================================================================

/// Caller's billing plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// No paid plan; routed to the cheapest capable backend
    Free,
    /// Entry paid plan
    Pro,
    /// Mid paid plan
    Premium,
    /// Organization plan
    Enterprise,
}

impl SubscriptionTier {
    /// Whether the caller pays for the service
    #[must_use]
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

// ============================================================================
// Request Descriptor
// ============================================================================

/// One inbound conversational turn, as seen by the dispatch engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Kind of work requested
    pub task_type: TaskType,
    /// Caller-declared priority
    pub urgency: Urgency,
    /// Estimated difficulty
    pub complexity: Complexity,
    /// Stable caller identity (billing subject)
    pub caller_id: String,
    /// Session the turn belongs to, if known
    pub session_id: Option<String>,
    /// Caller's billing plan
    pub subscription_tier: SubscriptionTier,
    /// Cultural profile identifier, when the turn needs adapted output
    pub cultural_context: Option<String>,
}

impl RequestDescriptor {
    /// Create a descriptor with medium urgency, moderate complexity and free tier
    #[must_use]
    pub fn new(caller_id: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            task_type,
            urgency: Urgency::Medium,
            complexity: Complexity::Moderate,
            caller_id: caller_id.into(),
            session_id: None,
            subscription_tier: SubscriptionTier::Free,
            cultural_context: None,
        }
    }

    /// Set the urgency
    #[must_use]
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Set the complexity
    #[must_use]
    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Set the subscription tier
    #[must_use]
    pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.subscription_tier = tier;
        self
    }

    /// Attach a cultural profile
    #[must_use]
    pub fn with_cultural_context(mut self, context: impl Into<String>) -> Self {
        self.cultural_context = Some(context.into());
        self
    }

    /// Attach a session id
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
