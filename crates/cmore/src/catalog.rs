use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::{CmoreError, Result};
use crate::session::SessionManager;
use crate::transport::Transport;

/// Top-level page ids known to the backend.
// TODO: fetch these from the page API instead of hardcoding them.
pub const PAGES: [&str; 7] = [
    "start", "movies", "series", "sports", "tv", "programs", "kids",
];

const SEASON_PAGE_SIZE: &str = "999";
const SEASON_PAGE_NUMBER: &str = "1";

/// Read-only catalog access.
///
/// Holds a session handle only to read the current authentication token;
/// credentials are never mutated from here.
pub struct CatalogClient {
    transport: Transport,
    config: Arc<Config>,
    session: SessionManager,
    country: String,
}

impl CatalogClient {
    pub(crate) fn new(
        transport: Transport,
        config: Arc<Config>,
        session: SessionManager,
        country: &str,
    ) -> Self {
        Self {
            transport,
            config,
            session,
            country: country.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String> {
        let credentials = self.session.get_credentials().await?;
        Ok(format!(
            "Bearer {}",
            credentials.jwt_token.unwrap_or_default()
        ))
    }

    /// Fetch a page document and return its `data` field.
    pub async fn get_page(&self, page_id: &str, namespace: &str) -> Result<Value> {
        let url = format!("{}{}", self.config.links.page_api, page_id);
        let request = self
            .transport
            .get(&url)
            .query(&[("locale", self.country.as_str()), ("namespace", namespace)])
            .header(AUTHORIZATION, self.bearer().await?);
        let body = self.transport.execute(request).await?;
        decode_data(&body)
    }

    /// Fetch content details for an asset or series.
    ///
    /// When a season is given, fixed pagination parameters accompany it;
    /// without one, no season or pagination parameters are sent at all.
    pub async fn get_contentdetails(
        &self,
        page_type: &str,
        page_id: &str,
        season: Option<u32>,
    ) -> Result<Value> {
        let url = format!(
            "{}{}/{}",
            self.config.links.content_details_api, page_type, page_id
        );
        let mut params = vec![("locale".to_string(), self.country.clone())];
        if let Some(season) = season {
            params.push(("season".to_string(), season.to_string()));
            params.push(("size".to_string(), SEASON_PAGE_SIZE.to_string()));
            params.push(("page".to_string(), SEASON_PAGE_NUMBER.to_string()));
        }

        let request = self
            .transport
            .get(&url)
            .query(&params)
            .header(AUTHORIZATION, self.bearer().await?);
        let body = self.transport.execute(request).await?;
        decode_data(&body)
    }

    /// Fetch the continue-watching list.
    pub async fn get_unfinished_assets(&self, limit: u32) -> Result<Value> {
        let url = format!(
            "{}unfinished_assets",
            self.config.links.personalization_api
        );
        let request = self
            .transport
            .get(&url)
            .query(&[
                ("limit", limit.to_string().as_str()),
                ("locale", self.country.as_str()),
            ])
            .header(AUTHORIZATION, self.bearer().await?);
        let body = self.transport.execute(request).await?;
        decode_data(&body)
    }

    /// Fetch a page and normalize it into a flat list of navigation items.
    pub async fn parse_page(
        &self,
        page_id: &str,
        namespace: &str,
        main_categories: bool,
    ) -> Result<Vec<Value>> {
        let page = self.get_page(page_id, namespace).await?;
        extract_page_items(&page, main_categories)
    }
}

fn decode_data(body: &str) -> Result<Value> {
    let document: Value = serde_json::from_str(body)?;
    document
        .get("data")
        .cloned()
        .ok_or_else(|| CmoreError::payload("data missing from response"))
}

/// Normalize a page document into a flat list of navigation targets.
///
/// Pages come in three shapes: a direct `targets` list, a page-link
/// container (the top-level categories) and genre containers where each
/// entry is either a real page link or a bare container that gets
/// synthesized into a category record carrying the container's id,
/// attributes and embedded items.
fn extract_page_items(page: &Value, main_categories: bool) -> Result<Vec<Value>> {
    if let Some(targets) = page.get("targets") {
        return as_array(targets, "targets");
    }

    let containers = page
        .get("containers")
        .ok_or_else(|| CmoreError::payload("containers missing from page"))?;
    // A null or non-list pageLinks value counts as no links at all.
    let page_links = containers
        .pointer("/page_link_container/pageLinks")
        .ok_or_else(|| CmoreError::payload("pageLinks missing from page"))?
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    if !page_links.is_empty() && main_categories {
        return Ok(page_links.to_vec());
    }

    let genre_containers = containers
        .get("genre_containers")
        .and_then(Value::as_array)
        .ok_or_else(|| CmoreError::payload("genre_containers missing from page"))?;

    let mut categories = Vec::with_capacity(genre_containers.len());
    for container in genre_containers {
        let page_link = container
            .get("pageLink")
            .ok_or_else(|| CmoreError::payload("pageLink missing from genre container"))?;
        if is_truthy(page_link.get("id")) {
            categories.push(page_link.clone());
        } else {
            categories.push(json!({
                "id": container.get("id").cloned().unwrap_or(Value::Null),
                "attributes": container.get("attributes").cloned().unwrap_or(Value::Null),
                "item_data": container.get("targets").cloned().unwrap_or(Value::Null),
            }));
        }
    }
    Ok(categories)
}

fn as_array(value: &Value, field: &str) -> Result<Vec<Value>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| CmoreError::payload(format!("{field} is not a list")))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_returned_directly() {
        let page = json!({ "targets": [{"id": "a"}, {"id": "b"}] });
        let items = extract_page_items(&page, true).unwrap();
        assert_eq!(items, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[test]
    fn page_links_are_returned_for_main_categories() {
        let page = json!({
            "containers": {
                "page_link_container": { "pageLinks": [{"id": "movies"}] },
                "genre_containers": []
            }
        });
        let items = extract_page_items(&page, true).unwrap();
        assert_eq!(items, vec![json!({"id": "movies"})]);
    }

    #[test]
    fn page_links_are_skipped_when_not_main_categories() {
        let page = json!({
            "containers": {
                "page_link_container": { "pageLinks": [{"id": "movies"}] },
                "genre_containers": [
                    { "id": "g1", "attributes": {}, "targets": [], "pageLink": {"id": "drama"} }
                ]
            }
        });
        let items = extract_page_items(&page, false).unwrap();
        assert_eq!(items, vec![json!({"id": "drama"})]);
    }

    #[test]
    fn genre_fallback_mixes_links_and_synthesized_categories() {
        let page = json!({
            "containers": {
                "page_link_container": { "pageLinks": [] },
                "genre_containers": [
                    {
                        "id": "g1",
                        "attributes": { "title": "Drama" },
                        "targets": [],
                        "pageLink": { "id": "drama-page" }
                    },
                    {
                        "id": "g2",
                        "attributes": { "title": "Comedy" },
                        "targets": [{ "id": "asset-1" }],
                        "pageLink": { "id": "" }
                    }
                ]
            }
        });

        let items = extract_page_items(&page, true).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], json!({ "id": "drama-page" }));
        assert_eq!(
            items[1],
            json!({
                "id": "g2",
                "attributes": { "title": "Comedy" },
                "item_data": [{ "id": "asset-1" }],
            })
        );
    }

    #[test]
    fn null_page_links_fall_through_to_genre_containers() {
        let page = json!({
            "containers": {
                "page_link_container": { "pageLinks": null },
                "genre_containers": [
                    { "id": "g1", "attributes": {}, "targets": [], "pageLink": {"id": "drama"} }
                ]
            }
        });
        let items = extract_page_items(&page, true).unwrap();
        assert_eq!(items, vec![json!({"id": "drama"})]);
    }

    #[test]
    fn null_page_link_id_synthesizes_a_category() {
        let page = json!({
            "containers": {
                "page_link_container": { "pageLinks": [] },
                "genre_containers": [
                    { "id": "g1", "attributes": null, "targets": null, "pageLink": { "id": null } }
                ]
            }
        });
        let items = extract_page_items(&page, true).unwrap();
        assert_eq!(
            items,
            vec![json!({ "id": "g1", "attributes": null, "item_data": null })]
        );
    }

    #[test]
    fn data_field_is_required() {
        assert!(decode_data(r#"{"data":{"x":1}}"#).is_ok());
        assert!(matches!(
            decode_data(r#"{"nope":1}"#),
            Err(CmoreError::UnexpectedPayload(_))
        ));
    }
}
