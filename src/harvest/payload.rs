//! Payload views over paginated responses
//!
//! Search and thread responses nest their entries and tweets at different
//! paths. Each crawl mode gets one [`PayloadView`] implementation, chosen once
//! per run, so the rest of the harvest code never branches on the mode to
//! walk a payload.

use crate::harvest::record::{first_mention, ExtractedRecord, RawRecord};
use crate::harvest::request::{CrawlMode, HarvestRequest};
use serde_json::Value;
use std::fmt;

/// Why an entry produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Advertisement entry
    Promoted,
    /// Cursor, module header or other non-tweet node
    NoContent,
    /// Thread entry that is not a reply mentioning the thread author
    NotThreadReply,
    /// Tweet result without author data
    NoAuthor,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Promoted => "promoted",
            Self::NoContent => "no tweet content",
            Self::NotThreadReply => "not a reply to the thread author",
            Self::NoAuthor => "no author",
        };
        write!(f, "{}", label)
    }
}

/// Mode-specific access to a decoded pagination payload
pub trait PayloadView: Send + Sync {
    fn mode(&self) -> CrawlMode;

    /// Entry list of the payload, or `None` when the payload carries none
    fn locate_entries<'a>(&self, payload: &'a Value) -> Option<&'a [Value]>;

    /// Turns one entry into a record, or says why it is skipped
    fn entry_to_record(&self, entry: &Value) -> Result<ExtractedRecord, SkipReason>;
}

/// Picks the view matching the request's crawl mode
pub fn view_for(request: &HarvestRequest) -> Box<dyn PayloadView> {
    match request.mode() {
        CrawlMode::Search => Box::new(SearchView),
        CrawlMode::Detail => Box::new(DetailView {
            thread_author: request.thread_author(),
        }),
    }
}

/// Search timeline payloads
#[derive(Debug, Clone, Default)]
pub struct SearchView;

impl PayloadView for SearchView {
    fn mode(&self) -> CrawlMode {
        CrawlMode::Search
    }

    fn locate_entries<'a>(&self, payload: &'a Value) -> Option<&'a [Value]> {
        entries_of(payload.pointer("/data/search_by_raw_query/search_timeline/timeline/instructions")?)
    }

    fn entry_to_record(&self, entry: &Value) -> Result<ExtractedRecord, SkipReason> {
        if is_promoted(entry) {
            return Err(SkipReason::Promoted);
        }

        let result = entry
            .pointer("/content/itemContent/tweet_results/result")
            .filter(|v| !v.is_null())
            .ok_or(SkipReason::NoContent)?;

        let raw = unwrap_result(result).ok_or(SkipReason::NoAuthor)?;
        Ok(ExtractedRecord::from_raw(&raw, false))
    }
}

/// Conversation thread payloads; only replies to the thread author are kept
#[derive(Debug, Clone, Default)]
pub struct DetailView {
    /// Handle of the thread's original poster, when known
    pub thread_author: Option<String>,
}

impl PayloadView for DetailView {
    fn mode(&self) -> CrawlMode {
        CrawlMode::Detail
    }

    fn locate_entries<'a>(&self, payload: &'a Value) -> Option<&'a [Value]> {
        entries_of(payload.pointer("/data/threaded_conversation_with_injections_v2/instructions")?)
    }

    fn entry_to_record(&self, entry: &Value) -> Result<ExtractedRecord, SkipReason> {
        if is_promoted(entry) {
            return Err(SkipReason::Promoted);
        }

        let item_content = entry
            .pointer("/content/items/0/item/itemContent")
            .filter(|v| !v.is_null())
            .ok_or(SkipReason::NoContent)?;

        let result = item_content
            .pointer("/tweet_results/result")
            .filter(|v| !v.is_null())
            .ok_or(SkipReason::NoContent)?;

        let raw = unwrap_result(result).ok_or(SkipReason::NoAuthor)?;

        let mention = first_mention(raw.tweet).ok_or(SkipReason::NotThreadReply)?;
        if let Some(author) = &self.thread_author {
            if !mention.eq_ignore_ascii_case(author) {
                return Err(SkipReason::NotThreadReply);
            }
        }

        Ok(ExtractedRecord::from_raw(&raw, true))
    }
}

/// Entries of the first instruction that carries an entry list
fn entries_of(instructions: &Value) -> Option<&[Value]> {
    instructions
        .as_array()?
        .iter()
        .find_map(|instruction| instruction.get("entries").and_then(Value::as_array))
        .map(Vec::as_slice)
}

fn is_promoted(entry: &Value) -> bool {
    entry
        .get("entryId")
        .and_then(Value::as_str)
        .is_some_and(|id| id.contains("promoted"))
}

/// Splits a tweet result into its tweet and author `legacy` objects
///
/// Visibility-limited tweets wrap the same structure under `tweet`.
fn unwrap_result(result: &Value) -> Option<RawRecord<'_>> {
    let inner = if result.get("legacy").is_some() {
        result
    } else {
        result.get("tweet")?
    };

    let tweet = inner.get("legacy")?;
    let user_result = inner.pointer("/core/user_results/result")?;
    let user = user_result.get("legacy")?;
    let fallback_handle = user_result
        .pointer("/core/screen_name")
        .and_then(Value::as_str);

    Some(RawRecord {
        tweet,
        user,
        fallback_handle,
    })
}
