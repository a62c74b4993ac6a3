//! Instruction presets for the views that drive a live session.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TOPIC_PLACEHOLDER: &str = "{topic}";
const DEFAULT_TOPIC: &str = "the uploaded study material";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPreset {
    /// Spoken lecture; the model leads.
    #[default]
    Lecture,
    /// One-on-one tutoring; the student leads.
    Tutor,
    /// Oral quiz with feedback after each answer.
    Quest,
}

impl SessionPreset {
    pub const ALL: [SessionPreset; 3] = [
        SessionPreset::Lecture,
        SessionPreset::Tutor,
        SessionPreset::Quest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SessionPreset::Lecture => "lecture",
            SessionPreset::Tutor => "tutor",
            SessionPreset::Quest => "quest",
        }
    }

    fn template(self) -> &'static str {
        match self {
            SessionPreset::Lecture => {
                "You are a friendly university lecturer giving a spoken lecture on {topic}. \
                 Explain one idea at a time in short spoken sentences. \
                 If the student interrupts, stop and answer their question before continuing."
            }
            SessionPreset::Tutor => {
                "You are a patient tutor helping a student understand {topic}. \
                 Let the student lead, ask what they already know, and check their \
                 understanding with short follow-up questions."
            }
            SessionPreset::Quest => {
                "You are a quiz master running an oral quiz on {topic}. \
                 Ask one question at a time, wait for the answer, then say whether it \
                 was right and explain briefly before the next question."
            }
        }
    }

    /// System instruction for `topic`. A custom instruction replaces the
    /// template; its `{topic}` placeholder is still filled in.
    pub fn instruction(self, topic: Option<&str>, custom: Option<&str>) -> String {
        let topic = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TOPIC);
        let template = custom
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.template());
        template.replace(TOPIC_PLACEHOLDER, topic)
    }

    /// First text sent once the session opens, so the model speaks first.
    pub fn priming_text(self) -> &'static str {
        match self {
            SessionPreset::Lecture => defaults::PRIMING_TEXT,
            SessionPreset::Tutor => "Hello, I'm ready to study.",
            SessionPreset::Quest => "Start the quiz.",
        }
    }
}

impl fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SessionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionPreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown preset '{}' (expected lecture, tutor or quest)", s))
    }
}
