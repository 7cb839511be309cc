//! Gmail API client for selecting reservation emails and flipping
//! their read state.
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use encoding_rs::{Encoding, UTF_8};
use futures::stream::BoxStream;
use htmd::HtmlToMarkdown;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::reservation::models::{CandidateMessage, MessageQuery};
use crate::reservation::ports::MessageSource;

pub const GMAIL_API_URL: &str = "https://gmail.googleapis.com";
pub const UNREAD_LABEL: &str = "UNREAD";

/// Gmail sends base64url bodies both with and without padding
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:(\d+)|x([0-9a-fA-F]+));").unwrap());

static CHARSET_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";\s]+)"#).unwrap());

/// Thread and message structures from Gmail API documentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListThreadsResponse {
    pub threads: Option<Vec<ThreadRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub snippet: Option<String>,
    pub payload: Option<MessagePayload>,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePartBody {
    #[serde(rename = "attachmentId")]
    attachment_id: Option<String>,
    size: u64,
    // Base64 encoded
    data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "partId")]
    pub part_id: String,
    #[serde(rename = "mimeType")]
    pub mimetype: String,
    pub headers: Option<Vec<MessageHeader>>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub headers: Option<Vec<MessageHeader>>,
    #[serde(rename = "mimeType")]
    pub mimetype: String,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

impl Message {
    pub fn is_unread(&self) -> bool {
        self.label_ids
            .as_ref()
            .is_some_and(|labels| labels.iter().any(|l| l == UNREAD_LABEL))
    }
}

/// The `charset` parameter of the `Content-Type` header, if any
fn content_charset(headers: Option<&[MessageHeader]>) -> Option<&str> {
    headers?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-type"))
        .and_then(|h| CHARSET_PARAM.captures(&h.value))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode base64url body data and convert it from `charset` to UTF-8.
///
/// Gmail returns the raw bytes of the part, so ISO-2022-JP and
/// Shift_JIS mail has to be converted here. Unknown or missing
/// charsets are read as UTF-8.
fn decode_text(message_id: &str, data: &str, charset: Option<&str>) -> Option<String> {
    let bytes = match GMAIL_BASE64.decode(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                "Base64 decode failed for message {} ({} bytes): {}",
                message_id,
                data.len(),
                e
            );
            return None;
        }
    };

    let encoding = charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        tracing::warn!(
            "Body of message {} has invalid {} sequences",
            message_id,
            encoding.name()
        );
    }

    Some(text.into_owned())
}

/// Decode HTML entities in a string
fn html_entity_decode(input: &str) -> String {
    let mut result = input.to_string();

    // Named entities, `&amp;` last so it can't create new entities
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&quot;", "\"");
    result = result.replace("&apos;", "'");
    result = result.replace("&nbsp;", " ");

    // Numeric entities (&#123; or &#x1F600;)
    result = NUMERIC_ENTITY
        .replace_all(&result, |caps: &regex::Captures| {
            let codepoint = match (caps.get(1), caps.get(2)) {
                (Some(decimal), _) => decimal.as_str().parse::<u32>().ok(),
                (_, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
                _ => None,
            };
            match codepoint.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    result.replace("&amp;", "&")
}

/// Normalize line endings and entities in a plain text body
fn clean_text(content: &str) -> String {
    html_entity_decode(&content.replace("\r\n", "\n"))
}

fn html_to_text(html: &str) -> Option<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "img", "svg"])
        .build();
    match converter.convert(html) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("Failed to convert HTML body to text: {}", e);
            None
        }
    }
}

fn part_data(body: &Option<MessagePartBody>) -> Option<&str> {
    let body = body.as_ref()?;
    // Skip attachments
    if body.attachment_id.is_some() {
        return None;
    }
    body.data.as_deref().filter(|data| !data.is_empty())
}

/// Depth first search for the first part with `mimetype` and inline data
fn find_part<'a>(parts: &'a [MessagePart], mimetype: &str) -> Option<&'a MessagePart> {
    parts.iter().find_map(|part| {
        if part.mimetype == mimetype && part_data(&part.body).is_some() {
            return Some(part);
        }
        part.parts
            .as_deref()
            .and_then(|nested| find_part(nested, mimetype))
    })
}

fn decode_part(message: &Message, part: &MessagePart) -> Option<String> {
    let data = part_data(&part.body)?;
    decode_text(&message.id, data, content_charset(part.headers.as_deref()))
}

/// Extract the plain-text body from the Gmail API message payload.
///
/// - The message can either have a `payload.body.data` or one or more
///   (possibly nested) `parts[].body.data`.
/// - A `text/plain` part is preferred, `text/html` is converted to text.
/// - Each part is converted from the charset in its `Content-Type`.
/// - Parts with a `body.attachment_id` are attachments and ignored.
pub fn extract_body(message: &Message) -> String {
    let Some(payload) = &message.payload else {
        return message.snippet.clone().unwrap_or_default();
    };

    if let Some(data) = part_data(&payload.body)
        && let Some(decoded) = decode_text(
            &message.id,
            data,
            content_charset(payload.headers.as_deref()),
        )
    {
        if payload.mimetype == "text/html" {
            return html_to_text(&decoded).unwrap_or_default();
        }
        return clean_text(&decoded);
    }

    if let Some(parts) = &payload.parts {
        if let Some(text) =
            find_part(parts, "text/plain").and_then(|part| decode_part(message, part))
        {
            return clean_text(&text);
        }
        if let Some(text) = find_part(parts, "text/html")
            .and_then(|part| decode_part(message, part))
            .and_then(|html| html_to_text(&html))
        {
            return text;
        }
    }

    // Fall back to the snippet
    if let Some(snippet) = &message.snippet {
        return clean_text(snippet);
    }

    tracing::warn!(
        "Body was empty for message with ID: {} in thread: {}",
        message.id,
        message.thread_id
    );

    String::new()
}

fn find_header(message: &Message, name: &str) -> String {
    message
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .and_then(|headers| {
            headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| html_entity_decode(&h.value))
        })
        .unwrap_or_default()
}

pub fn extract_subject(message: &Message) -> String {
    find_header(message, "subject")
}

pub fn extract_from(message: &Message) -> String {
    find_header(message, "from")
}

impl From<&Message> for CandidateMessage {
    fn from(message: &Message) -> Self {
        CandidateMessage {
            id: message.id.clone(),
            thread_id: message.thread_id.clone(),
            unread: message.is_unread(),
            subject: extract_subject(message),
            body: extract_body(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GmailClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(access_token: &str) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.to_string(),
            base_url: GMAIL_API_URL.to_string(),
        }
    }

    /// Point the client at a different host, used for tests
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, what: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("{} failed: {} ({})", what, status, text);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// List one page of threads matching a Gmail search query
    pub async fn list_threads_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ListThreadsResponse> {
        let mut url = format!(
            "{}/gmail/v1/users/me/threads?q={}",
            self.base_url,
            urlencoding::encode(query)
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        self.get_json(&url, "Thread list").await
    }

    /// Fetch full thread for a given thread ID
    pub async fn fetch_thread(&self, thread_id: &str) -> Result<Thread> {
        let url = format!(
            "{}/gmail/v1/users/me/threads/{}?format=full",
            self.base_url, thread_id
        );
        self.get_json(&url, "Thread fetch").await
    }

    /// Fetch only the IDs and labels of a message
    pub async fn fetch_message_minimal(&self, message_id: &str) -> Result<Message> {
        let url = format!(
            "{}/gmail/v1/users/me/messages/{}?format=minimal",
            self.base_url, message_id
        );
        self.get_json(&url, "Message fetch").await
    }

    pub async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[&str],
        remove_label_ids: &[&str],
    ) -> Result<()> {
        let url = format!(
            "{}/gmail/v1/users/me/messages/{}/modify",
            self.base_url, message_id
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "addLabelIds": add_label_ids,
                "removeLabelIds": remove_label_ids,
            }))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("Label modify failed: {} ({})", status, text);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for GmailClient {
    fn candidates(&self, query: &MessageQuery) -> BoxStream<'static, Result<CandidateMessage>> {
        let gmail = self.clone();
        let filter = query.clone();
        let query = query.to_gmail_query();

        Box::pin(async_stream::try_stream! {
            let mut page_token: Option<String> = None;
            loop {
                let page = gmail.list_threads_page(&query, page_token.as_deref()).await?;

                for thread_ref in page.threads.unwrap_or_default() {
                    let thread = gmail.fetch_thread(&thread_ref.id).await?;

                    // Search matches substrings, e.g. "Re: <subject>" replies
                    let selected = thread.messages.iter().any(|m| {
                        m.is_unread() && filter.matches(&extract_from(m), &extract_subject(m))
                    });
                    if !selected {
                        tracing::debug!(
                            "Skipping thread {} without an unread message from {} titled \"{}\"",
                            thread.id,
                            filter.sender,
                            filter.subject
                        );
                        continue;
                    }
                    tracing::debug!(
                        "Thread {} has {} messages",
                        thread.id,
                        thread.messages.len()
                    );
                    for message in &thread.messages {
                        yield CandidateMessage::from(message);
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        })
    }

    async fn is_unread(&self, message_id: &str) -> Result<bool> {
        let message = self.fetch_message_minimal(message_id).await?;
        Ok(message.is_unread())
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        self.modify_labels(message_id, &[], &[UNREAD_LABEL]).await
    }

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        self.modify_labels(message_id, &[label_id], &[]).await
    }
}
