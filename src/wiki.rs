use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::drops::html;
use crate::dump::{ApiExchange, DumpLog};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("osrs_drops/", env!("CARGO_PKG_VERSION"));

/// Both markups of one wiki page.
#[derive(Debug, Clone)]
pub struct PageMarkup {
    pub title: String,
    pub html: String,
    pub wikitext: String,
}

pub struct WikiClient {
    http: reqwest::Client,
    api_url: String,
    dump: DumpLog,
}

impl WikiClient {
    pub fn new(api_url: &str, dump: DumpLog) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            dump,
        })
    }

    /// All page titles in `Category:<category>`, following continuation.
    pub async fn category_members(&self, category: &str) -> Result<Vec<String>> {
        let cmtitle = format!("Category:{}", category);
        let mut titles = Vec::new();
        let mut cont: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", cmtitle.as_str()),
                ("cmlimit", "500"),
                ("format", "json"),
            ];
            if let Some(c) = cont.as_deref() {
                params.push(("cmcontinue", c));
            }

            let data = self
                .get_json(category, &params)
                .await?
                .with_context(|| format!("Category {} could not be fetched", category))?;
            let (page, next) = parse_category_members(&data)?;
            titles.extend(page);

            match next {
                Some(c) => cont = Some(c),
                None => break,
            }
        }

        debug!("{} members in {}", titles.len(), cmtitle);
        Ok(titles)
    }

    /// Rendered and source markup of `title`. `None` when the wiki refuses the page.
    pub async fn page_markup(&self, title: &str) -> Result<Option<PageMarkup>> {
        let params = [
            ("action", "parse"),
            ("page", title),
            ("format", "json"),
            ("prop", "text|wikitext"),
            ("contentmodel", "wikitext"),
        ];
        let Some(data) = self.get_json(title, &params).await? else {
            return Ok(None);
        };
        Ok(page_markup_from_response(title, &data))
    }

    /// Whether `title` renders a monster infobox. Any failure counts as "no".
    pub async fn is_monster(&self, title: &str) -> bool {
        let params = [
            ("action", "parse"),
            ("page", title),
            ("format", "json"),
            ("prop", "text"),
        ];
        match self.get_json(title, &params).await {
            Ok(Some(data)) => rendered_text(&data).is_some_and(html::has_monster_infobox),
            Ok(None) => false,
            Err(e) => {
                warn!("Error checking {}: {:#}", title, e);
                false
            }
        }
    }

    /// GET the API with retry on 429/5xx. `Ok(None)` for a final non-success status.
    async fn get_json(&self, subject: &str, params: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut attempt = 0;
        loop {
            let response = self
                .http
                .get(&self.api_url)
                .query(params)
                .send()
                .await
                .with_context(|| format!("Request for {} failed", subject))?;
            let status = response.status();

            if is_retryable(status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "HTTP {} for {} (attempt {}/{}), backing off {:.1}s",
                    status.as_u16(),
                    subject,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect();
            let body = response.text().await?;

            if self.dump.is_enabled() {
                self.dump.api_response(
                    subject,
                    &ApiExchange {
                        url: &self.api_url,
                        params: params.iter().copied().collect(),
                        status_code: status.as_u16(),
                        headers,
                        content: &body,
                    },
                );
            }

            if !status.is_success() {
                warn!("Failed to fetch data for {} (HTTP {})", subject, status.as_u16());
                return Ok(None);
            }

            let data = serde_json::from_str(&body)
                .with_context(|| format!("Invalid JSON in response for {}", subject))?;
            return Ok(Some(data));
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Titles on one page of a `categorymembers` query and the continuation token.
pub fn parse_category_members(data: &Value) -> Result<(Vec<String>, Option<String>)> {
    let members = data
        .pointer("/query/categorymembers")
        .and_then(Value::as_array)
        .context("Response has no query.categorymembers")?;

    let titles = members
        .iter()
        .filter_map(|m| m.get("title").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    let next = data
        .pointer("/continue/cmcontinue")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok((titles, next))
}

/// Markups from an `action=parse` response. API errors and missing fields
/// give `None`; a missing half is left empty so extraction simply finds nothing.
pub fn page_markup_from_response(title: &str, data: &Value) -> Option<PageMarkup> {
    if let Some(err) = data.get("error") {
        let info = err.get("info").and_then(Value::as_str).unwrap_or("unknown error");
        warn!("Error fetching data for {}: {}", title, info);
        return None;
    }
    data.get("parse")?;

    Some(PageMarkup {
        title: title.to_string(),
        html: rendered_text(data).unwrap_or_default().to_string(),
        wikitext: data
            .pointer("/parse/wikitext/*")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn rendered_text(data: &Value) -> Option<&str> {
    data.pointer("/parse/text/*").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn category_page_with_continuation() {
        let data = json!({
            "continue": {"cmcontinue": "page|GOBLIN|123", "continue": "-||"},
            "query": {"categorymembers": [
                {"pageid": 1, "ns": 0, "title": "Goblin"},
                {"pageid": 2, "ns": 0, "title": "Hobgoblin"}
            ]}
        });
        let (titles, next) = parse_category_members(&data).unwrap();
        assert_eq!(titles, vec!["Goblin", "Hobgoblin"]);
        assert_eq!(next.as_deref(), Some("page|GOBLIN|123"));
    }

    #[test]
    fn last_category_page() {
        let data = json!({"query": {"categorymembers": []}});
        let (titles, next) = parse_category_members(&data).unwrap();
        assert!(titles.is_empty());
        assert!(next.is_none());
        assert!(parse_category_members(&json!({"batchcomplete": ""})).is_err());
    }

    #[test]
    fn parse_response_markups() {
        let data = json!({"parse": {
            "title": "Goblin",
            "text": {"*": "<table class=\"item-drops\"></table>"},
            "wikitext": {"*": "{{DropTable|item1=Bones}}"}
        }});
        let page = page_markup_from_response("Goblin", &data).unwrap();
        assert_eq!(page.title, "Goblin");
        assert!(page.html.contains("item-drops"));
        assert_eq!(page.wikitext, "{{DropTable|item1=Bones}}");
    }

    #[test]
    fn parse_response_errors() {
        let missing = json!({"error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}});
        assert!(page_markup_from_response("Nope", &missing).is_none());
        assert!(page_markup_from_response("Nope", &json!({})).is_none());

        let partial = json!({"parse": {"text": {"*": "<p>hi</p>"}}});
        let page = page_markup_from_response("Partial", &partial).unwrap();
        assert!(page.wikitext.is_empty());
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::OK));
    }
}
