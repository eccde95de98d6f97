use crate::error::StoreError;
use crate::record::{ListPage, ListQuery, Record};
use crate::traits::{AuthToken, RecordStore};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Page size used when walking a collection for [`RecordStore::full_list`].
pub const FULL_LIST_BATCH: u32 = 500;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// HTTP client for the PocketBase records API.
#[derive(Clone)]
pub struct PocketBaseStore {
    client: Client,
    base_url: String,
}

impl PocketBaseStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Http(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_url(&self, collection: &str) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.records_url(collection), urlencoding::encode(id))
    }

    fn authorize(request: RequestBuilder, auth: Option<&AuthToken>) -> RequestBuilder {
        match auth {
            Some(token) => request.header(AUTHORIZATION, token.as_str()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        record: Option<(&str, &str)>,
    ) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some((collection, id)) = record {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or(text);
        warn!(status = status.as_u16(), %message, "PocketBase request failed");
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        record: Option<(&str, &str)>,
    ) -> Result<T, StoreError> {
        self.send(request, record)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn fetch_page(
        &self,
        collection: &str,
        query: &ListQuery,
        skip_total: bool,
        auth: Option<&AuthToken>,
    ) -> Result<ListPage, StoreError> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("perPage", query.per_page.to_string()),
        ];
        if let Some(filter) = &query.filter {
            params.push(("filter", filter.clone()));
        }
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.clone()));
        }
        if skip_total {
            params.push(("skipTotal", "1".to_string()));
        }

        debug!(collection, page = query.page, filter = ?query.filter, "listing records");
        let request = self.client.get(self.records_url(collection)).query(&params);
        self.send_json(Self::authorize(request, auth), None).await
    }
}

#[async_trait]
impl RecordStore for PocketBaseStore {
    async fn list(
        &self,
        collection: &str,
        query: &ListQuery,
        auth: Option<&AuthToken>,
    ) -> Result<ListPage, StoreError> {
        self.fetch_page(collection, query, false, auth).await
    }

    async fn full_list(
        &self,
        collection: &str,
        filter: Option<&str>,
        sort: Option<&str>,
        auth: Option<&AuthToken>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut query = ListQuery::new(1, FULL_LIST_BATCH);
        query.filter = filter.map(str::to_string);
        query.sort = sort.map(str::to_string);

        loop {
            let page = self.fetch_page(collection, &query, true, auth).await?;
            let fetched = page.items.len();
            records.extend(page.items);
            if fetched < FULL_LIST_BATCH as usize {
                break;
            }
            query.page += 1;
        }
        Ok(records)
    }

    async fn get_one(
        &self,
        collection: &str,
        id: &str,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError> {
        let request = self.client.get(self.record_url(collection, id));
        self.send_json(Self::authorize(request, auth), Some((collection, id)))
            .await
    }

    async fn create(
        &self,
        collection: &str,
        data: &Map<String, Value>,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError> {
        debug!(collection, "creating record");
        let request = self.client.post(self.records_url(collection)).json(data);
        self.send_json(Self::authorize(request, auth), None).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
        auth: Option<&AuthToken>,
    ) -> Result<Record, StoreError> {
        debug!(collection, id, "updating record");
        let request = self.client.patch(self.record_url(collection, id)).json(data);
        self.send_json(Self::authorize(request, auth), Some((collection, id)))
            .await
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        auth: Option<&AuthToken>,
    ) -> Result<(), StoreError> {
        debug!(collection, id, "deleting record");
        let request = self.client.delete(self.record_url(collection, id));
        self.send(Self::authorize(request, auth), Some((collection, id)))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_normalized_and_encoded() {
        let store = PocketBaseStore::with_client("https://pb.example.com/", Client::new());
        assert_eq!(store.base_url(), "https://pb.example.com");
        assert_eq!(
            store.records_url("transactions"),
            "https://pb.example.com/api/collections/transactions/records"
        );
        assert_eq!(
            store.record_url("transactions", "a/b"),
            "https://pb.example.com/api/collections/transactions/records/a%2Fb"
        );
    }
}
