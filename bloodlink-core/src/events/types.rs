use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Broker topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "blood-requests")]
    BloodRequests,
    #[serde(rename = "donation-offers")]
    DonationOffers,
    #[serde(rename = "email-notifications")]
    EmailNotifications,
}

impl Topic {
    pub const ALL: [Topic; 3] = [
        Topic::BloodRequests,
        Topic::DonationOffers,
        Topic::EmailNotifications,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Topic::BloodRequests => "blood-requests",
            Topic::DonationOffers => "donation-offers",
            Topic::EmailNotifications => "email-notifications",
        }
    }

    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.name() == name)
    }

    /// The realtime event a message on this topic is re-emitted as.
    pub fn realtime_event(self) -> Option<&'static str> {
        match self {
            Topic::BloodRequests => Some("blood-request-notification"),
            Topic::DonationOffers => Some("donation-accepted-notification"),
            Topic::EmailNotifications => None,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable published event.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub topic: Topic,
    pub payload: serde_json::Value,
    pub timestamp: OffsetDateTime,
}

impl DomainEvent {
    pub fn new(topic: Topic, payload: serde_json::Value) -> Self {
        Self {
            topic,
            payload,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.name()), Some(topic));
            assert_eq!(
                serde_json::to_value(topic).unwrap(),
                serde_json::Value::String(topic.name().into())
            );
        }
        assert_eq!(Topic::from_name("orders"), None);
    }

    #[test]
    fn test_email_topic_is_not_broadcast() {
        assert_eq!(Topic::EmailNotifications.realtime_event(), None);
        assert_eq!(
            Topic::DonationOffers.realtime_event(),
            Some("donation-accepted-notification")
        );
    }
}
