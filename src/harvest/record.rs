//! Extracted records and field derivation
//!
//! A record is a flat, string-valued map built from a tweet's `legacy`
//! object and its author's `legacy` object. Fields are kept in a `BTreeMap`
//! so serialization order is the sorted field-name order.

use crate::harvest::request::SITE_BASE_URL;
use serde_json::Value;
use std::collections::BTreeMap;

/// Tweet fields copied verbatim from the payload
pub const TWEET_FIELDS: [&str; 10] = [
    "conversation_id_str",
    "created_at",
    "favorite_count",
    "full_text",
    "id_str",
    "lang",
    "quote_count",
    "reply_count",
    "retweet_count",
    "user_id_str",
];

/// Fields computed from the tweet and its author
pub const DERIVED_FIELDS: [&str; 5] = [
    "image_url",
    "in_reply_to_screen_name",
    "location",
    "tweet_url",
    "username",
];

/// Characters replaced by a space before emoji removal
const NOISE_CHARS: [char; 13] = [
    '\n', ',', '"', '\u{2066}', '\u{2069}', '\u{2019}', '\u{2018}', '\u{201C}', '\u{201D}',
    '\u{2026}', '\u{2014}', '\u{2013}', '\u{2022}',
];

/// Code-point ranges treated as emoji
const EMOJI_RANGES: [(u32, u32); 11] = [
    (0x1F600, 0x1F64F),
    (0x1F300, 0x1F5FF),
    (0x1F680, 0x1F6FF),
    (0x1F700, 0x1F77F),
    (0x1F780, 0x1F7FF),
    (0x1F800, 0x1F8FF),
    (0x1F900, 0x1F9FF),
    (0x1FA00, 0x1FA6F),
    (0x1FA70, 0x1FAFF),
    (0x2600, 0x26FF),
    (0x2700, 0x27BF),
];

/// The raw tweet/author pair pulled out of one entry
#[derive(Debug, Clone)]
pub struct RawRecord<'a> {
    /// The tweet's `legacy` object
    pub tweet: &'a Value,
    /// The author's `legacy` object
    pub user: &'a Value,
    /// Author handle when the payload keeps it outside `legacy`
    pub fallback_handle: Option<&'a str>,
}

/// One flattened, ready-to-write record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    fields: BTreeMap<&'static str, String>,
}

impl ExtractedRecord {
    /// Builds a record from a raw pair
    ///
    /// `strip_reply_prefix` removes a leading `@handle ` that matches the
    /// first mention, which thread replies carry redundantly.
    pub fn from_raw(raw: &RawRecord<'_>, strip_reply_prefix: bool) -> Self {
        let mut fields = BTreeMap::new();

        for name in TWEET_FIELDS {
            fields.insert(name, value_to_string(raw.tweet.get(name)));
        }

        let mut text = clean_text(&value_to_string(raw.tweet.get("full_text")));
        if strip_reply_prefix {
            if let Some(reply_to) = first_mention(raw.tweet) {
                let prefix = format!("@{} ", reply_to);
                if let Some(rest) = text.strip_prefix(&prefix) {
                    text = rest.to_string();
                }
            }
        }
        fields.insert("full_text", text);

        let username = raw
            .user
            .get("screen_name")
            .and_then(Value::as_str)
            .or(raw.fallback_handle)
            .unwrap_or_default()
            .to_string();
        let id = fields.get("id_str").cloned().unwrap_or_default();

        fields.insert("tweet_url", format!("{}/{}/status/{}", SITE_BASE_URL, username, id));
        fields.insert(
            "image_url",
            raw.tweet
                .pointer("/entities/media/0/media_url_https")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        );
        fields.insert("location", value_to_string(raw.user.get("location")));
        fields.insert(
            "in_reply_to_screen_name",
            value_to_string(raw.tweet.get("in_reply_to_screen_name")),
        );
        fields.insert("username", username);

        Self { fields }
    }

    /// Field names in serialization order
    pub fn headers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Field values in serialization order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(String::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Screen name of the first user mentioned in a tweet
pub fn first_mention(tweet: &Value) -> Option<&str> {
    tweet
        .pointer("/entities/user_mentions/0/screen_name")
        .and_then(Value::as_str)
}

/// Removes noise punctuation and emoji, then collapses whitespace runs
pub fn clean_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .filter(|c| !is_emoji(*c))
        .map(|c| if NOISE_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    collapse_whitespace(&replaced)
}

fn is_emoji(c: char) -> bool {
    let code = c as u32;
    EMOJI_RANGES
        .iter()
        .any(|(start, end)| (*start..=*end).contains(&code))
}

/// Replaces every run of two or more whitespace characters with one space
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending: Option<char> = None;
    let mut run = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            run += 1;
            pending = Some(c);
            continue;
        }
        match run {
            0 => {}
            1 => out.extend(pending),
            _ => out.push(' '),
        }
        run = 0;
        pending = None;
        out.push(c);
    }
    match run {
        0 => {}
        1 => out.extend(pending),
        _ => out.push(' '),
    }

    out
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
