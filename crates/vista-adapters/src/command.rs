//! Table-driven voice command matching.
//!
//! Recognized speech is matched against a fixed keyword table; the first
//! rule with a keyword contained in the transcript wins. Text with no
//! matching rule yields no command, never an error.

use std::collections::HashMap;

use vista_types::VoiceCommand;

/// One row of the keyword-to-action table.
#[derive(Debug, Clone)]
pub struct CommandRule {
    /// Action identifier emitted on match.
    pub action: &'static str,
    /// Case-insensitive substrings that trigger the action.
    pub keywords: &'static [&'static str],
    /// Fixed parameters attached to the command.
    pub parameters: &'static [(&'static str, &'static str)],
    /// Confidence reported for this rule.
    pub confidence: f64,
}

/// Default table covering the assistant's voice vocabulary. Chinese phrases
/// mirror the mobile client's primary locale.
const DEFAULT_RULES: &[CommandRule] = &[
    CommandRule {
        action: "capture_photo",
        keywords: &["拍照", "拍张照", "take a photo", "take a picture"],
        parameters: &[("mode", "photo")],
        confidence: 0.92,
    },
    CommandRule {
        action: "open_camera",
        keywords: &["打开相机", "open camera", "open the camera"],
        parameters: &[("mode", "photo")],
        confidence: 0.92,
    },
    CommandRule {
        action: "describe_scene",
        keywords: &["描述", "这是什么地方", "describe", "what do you see"],
        parameters: &[],
        confidence: 0.88,
    },
    CommandRule {
        action: "read_text",
        keywords: &["读一下", "念一下", "read this", "what does it say"],
        parameters: &[],
        confidence: 0.88,
    },
    CommandRule {
        action: "detect_objects",
        keywords: &["有什么东西", "前面有什么", "detect objects", "what is in front"],
        parameters: &[],
        confidence: 0.86,
    },
    CommandRule {
        action: "navigate",
        keywords: &["带我去", "导航", "navigate", "take me to"],
        parameters: &[],
        confidence: 0.84,
    },
    CommandRule {
        action: "stop",
        keywords: &["停止", "取消", "stop", "cancel"],
        parameters: &[],
        confidence: 0.9,
    },
];

/// Matches free-form transcripts against an ordered rule table.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    rules: Vec<CommandRule>,
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl CommandMatcher {
    /// Override the default table entirely. Rules are evaluated in order.
    pub fn with_rules(rules: Vec<CommandRule>) -> Self {
        Self { rules }
    }

    /// Match a transcript. Returns `None` when no rule applies.
    pub fn match_text(&self, text: &str) -> Option<VoiceCommand> {
        let haystack = text.to_lowercase();
        for rule in &self.rules {
            if rule
                .keywords
                .iter()
                .any(|kw| haystack.contains(&kw.to_lowercase()))
            {
                let parameters: HashMap<String, serde_json::Value> = rule
                    .parameters
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
                    .collect();
                return Some(VoiceCommand {
                    action: rule.action.to_string(),
                    parameters,
                    confidence: rule.confidence,
                });
            }
        }
        None
    }
}
