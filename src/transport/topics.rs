//! Topic registry.
//!
//! Topic, group and durable names are a compatibility surface shared with
//! other services on the bus and must not change:
//!
//! | Topic | Group | Durable |
//! |-------|-------|---------|
//! | `GIT-SENSOR.NEW-CI-MATERIAL` | - | - |
//! | `GIT-SENSOR.PULL` | `GIT-SENSOR.PULL.GRP` | `GIT-SENSOR.PULL.DURABLE` |
//! | `ORCHESTRATOR.WEBHOOK_EVENT` | `ORCHESTRATOR.WEBHOOK_EVENT_GRP` | `ORCHESTRATOR.WEBHOOK_EVENT_DURABLE` |
//!
//! Each topic lives in the broker-side stream named by its first subject
//! token.

/// A broker-side stream and the subjects it captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDef {
    pub name: &'static str,
    pub subjects: &'static [&'static str],
}

pub const GIT_SENSOR_STREAM: StreamDef = StreamDef {
    name: "GIT-SENSOR",
    subjects: &["GIT-SENSOR.>"],
};

pub const ORCHESTRATOR_STREAM: StreamDef = StreamDef {
    name: "ORCHESTRATOR",
    subjects: &["ORCHESTRATOR.>"],
};

/// Every stream the service provisions on startup.
pub const STREAMS: [StreamDef; 2] = [GIT_SENSOR_STREAM, ORCHESTRATOR_STREAM];

/// A named topic, with its consumer group and durable name when it has them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTopic {
    pub subject: &'static str,
    pub stream: &'static str,
    pub group: Option<&'static str>,
    pub durable: Option<&'static str>,
}

/// New buildable material. Fan-out: every subscriber sees every message.
pub const NEW_CI_MATERIAL: StreamTopic = StreamTopic {
    subject: "GIT-SENSOR.NEW-CI-MATERIAL",
    stream: GIT_SENSOR_STREAM.name,
    group: None,
    durable: None,
};

/// Polling work for the sensor.
pub const PULL: StreamTopic = StreamTopic {
    subject: "GIT-SENSOR.PULL",
    stream: GIT_SENSOR_STREAM.name,
    group: Some("GIT-SENSOR.PULL.GRP"),
    durable: Some("GIT-SENSOR.PULL.DURABLE"),
};

/// Reconciled pull request records.
pub const WEBHOOK_EVENT: StreamTopic = StreamTopic {
    subject: "ORCHESTRATOR.WEBHOOK_EVENT",
    stream: ORCHESTRATOR_STREAM.name,
    group: Some("ORCHESTRATOR.WEBHOOK_EVENT_GRP"),
    durable: Some("ORCHESTRATOR.WEBHOOK_EVENT_DURABLE"),
};

pub const ALL_TOPICS: [StreamTopic; 3] = [NEW_CI_MATERIAL, PULL, WEBHOOK_EVENT];

/// Finds the registered topic for `subject`.
pub fn lookup(subject: &str) -> Option<&'static StreamTopic> {
    ALL_TOPICS.iter().find(|t| t.subject == subject)
}

/// Finds the stream that captures `subject`.
pub fn stream_for(subject: &str) -> Option<&'static StreamDef> {
    let prefix = subject.split('.').next()?;
    STREAMS.iter().find(|s| s.name == prefix)
}

/// Converts a durable name to a legal broker consumer name.
///
/// Consumer names may not contain `.`, `*`, `>` or whitespace; each is
/// replaced with `_`.
pub fn consumer_name(durable: &str) -> String {
    durable
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

impl StreamTopic {
    /// Whether subscribers share a durable, grouped consumer.
    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// The broker consumer name backing this topic's durable subscription.
    pub fn consumer_name(&self) -> Option<String> {
        self.durable.map(consumer_name)
    }

    /// Subject the broker pushes this topic's deliveries to.
    ///
    /// Outside every stream's subjects, so deliveries are not re-captured.
    pub fn deliver_subject(&self) -> Option<String> {
        self.consumer_name().map(|name| format!("_DELIVER.{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_fixed() {
        assert_eq!(NEW_CI_MATERIAL.subject, "GIT-SENSOR.NEW-CI-MATERIAL");
        assert_eq!(PULL.group, Some("GIT-SENSOR.PULL.GRP"));
        assert_eq!(PULL.durable, Some("GIT-SENSOR.PULL.DURABLE"));
        assert_eq!(WEBHOOK_EVENT.subject, "ORCHESTRATOR.WEBHOOK_EVENT");
        assert_eq!(WEBHOOK_EVENT.group, Some("ORCHESTRATOR.WEBHOOK_EVENT_GRP"));
        assert_eq!(
            WEBHOOK_EVENT.durable,
            Some("ORCHESTRATOR.WEBHOOK_EVENT_DURABLE")
        );
    }

    #[test]
    fn every_topic_belongs_to_its_stream() {
        for topic in ALL_TOPICS {
            let stream = stream_for(topic.subject).unwrap();
            assert_eq!(stream.name, topic.stream, "{}", topic.subject);
        }
    }

    #[test]
    fn fan_out_topic_is_not_durable() {
        assert!(!NEW_CI_MATERIAL.is_durable());
        assert_eq!(NEW_CI_MATERIAL.consumer_name(), None);
        assert!(PULL.is_durable());
    }

    #[test]
    fn consumer_names_drop_dots() {
        assert_eq!(
            WEBHOOK_EVENT.consumer_name().as_deref(),
            Some("ORCHESTRATOR_WEBHOOK_EVENT_DURABLE")
        );
        assert_eq!(consumer_name("a.b *>c"), "a_b___c");
    }

    #[test]
    fn deliver_subjects_stay_outside_streams() {
        for topic in ALL_TOPICS {
            if let Some(subject) = topic.deliver_subject() {
                assert!(stream_for(&subject).is_none(), "{subject}");
            }
        }
    }

    #[test]
    fn lookup_finds_registered_topics_only() {
        assert_eq!(lookup("GIT-SENSOR.PULL"), Some(&PULL));
        assert_eq!(lookup("GIT-SENSOR.PULL.GRP"), None);
        assert_eq!(stream_for("UNKNOWN.TOPIC"), None);
    }
}
