/// Coarse reading of a user message, used only where the dialogue branches locally
/// (consent, and starting over after a decision). Everything else goes to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Affirm,
    Decline,
    NewAssessment,
    Other,
}

const DECLINE_WORDS: &[&str] = &["no", "nope", "nah", "cancel", "stop", "quit", "exit"];
const DECLINE_PHRASES: &[&str] = &[
    "not now",
    "not yet",
    "don't",
    "do not",
    "maybe later",
    "rather not",
    "no thanks",
];
const AFFIRM_WORDS: &[&str] = &[
    "yes", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "proceed", "continue", "start",
    "begin", "go", "absolutely", "certainly", "please", "alright", "definitely", "ready",
];
const AFFIRM_PHRASES: &[&str] = &[
    "go ahead",
    "let's",
    "lets",
    "sounds good",
    "sounds great",
    "of course",
    "would like to",
    "want to",
    "go for it",
];
/// Words that signal consent wherever they appear in a short reply.
const AFFIRM_KEYWORDS: &[&str] = &[
    "yes", "yeah", "yep", "sure", "ok", "okay", "proceed", "continue", "start", "begin",
    "absolutely", "certainly", "alright", "definitely", "ready",
];
const NEW_ASSESSMENT_PHRASES: &[&str] = &[
    "new assessment",
    "another assessment",
    "another applicant",
    "another borrower",
    "new applicant",
    "new borrower",
    "start over",
    "start again",
    "assess another",
    "check another",
];

/// Replies longer than this are answers, not consent; only their opening counts.
const SHORT_REPLY_WORDS: usize = 12;

pub fn classify(input: &str) -> Intent {
    let normalized = normalize(input);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let first = words.first().copied().unwrap_or_default();
    let short = words.len() <= SHORT_REPLY_WORDS;

    if DECLINE_WORDS.contains(&first)
        || starts_with_any(&normalized, DECLINE_PHRASES)
        || (short && contains_any(&normalized, DECLINE_PHRASES))
    {
        return Intent::Decline;
    }
    if contains_any(&normalized, NEW_ASSESSMENT_PHRASES) {
        return Intent::NewAssessment;
    }
    if AFFIRM_WORDS.contains(&first) || starts_with_any(&normalized, AFFIRM_PHRASES) {
        return Intent::Affirm;
    }
    if short
        && (words.iter().any(|word| AFFIRM_KEYWORDS.contains(word))
            || contains_any(&normalized, AFFIRM_PHRASES))
    {
        return Intent::Affirm;
    }
    Intent::Other
}

fn normalize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\'' => '\'',
            c if c.is_alphanumeric() => c.to_ascii_lowercase(),
            _ => ' ',
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| {
        text.strip_prefix(phrase)
            .map(|rest| rest.is_empty() || rest.starts_with(' '))
            .unwrap_or(false)
    })
}

/// Phrase match on whole words: "want to" matches "i want to start", not "wantonly".
fn contains_any(text: &str, phrases: &[&str]) -> bool {
    let padded = format!(" {text} ");
    phrases
        .iter()
        .any(|phrase| padded.contains(&format!(" {phrase} ")))
}
