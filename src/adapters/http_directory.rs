use crate::adapters::{fetch_rows, DirectoryRow};
use crate::core::colonia_key::normalize_colonia_name;
use crate::domain::model::{ColoniaKey, ZipCode, ZipCodeRecord};
use crate::domain::ports::ZipCodeDirectory;
use crate::utils::error::{EligibilityError, Result};
use async_trait::async_trait;
use postgrest::Postgrest;
use std::time::Duration;

const COLUMNS: &str = "zip_code,colonia,municipality,state,city,latitude,longitude";

/// Zip code directory served from a hosted PostgREST table.
///
/// Any transport failure, timeout or non-2xx answer is reported as
/// [`EligibilityError::DirectoryUnavailable`], never as an empty result.
pub struct HttpZipDirectory {
    client: Postgrest,
    endpoint: String,
    table: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpZipDirectory {
    pub fn new(endpoint: &str, table: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let mut client = Postgrest::new(endpoint.as_str());
        if let Some(key) = &api_key {
            client = client.insert_header("apikey", key.as_str());
        }
        Self {
            client,
            endpoint,
            table: table.to_string(),
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl ZipCodeDirectory for HttpZipDirectory {
    async fn find_by_zip(&self, zip: &ZipCode) -> Result<Vec<ZipCodeRecord>> {
        let mut request = self.client.from(&self.table);
        if let Some(key) = &self.api_key {
            request = request.auth(key);
        }
        let request = request.eq("zip_code", zip.as_str()).select(COLUMNS);

        tracing::debug!("Making API request to: {}/{} zip_code={}", self.endpoint, self.table, zip);
        let rows: Vec<DirectoryRow> = fetch_rows(request, self.timeout).await.map_err(|e| {
            tracing::warn!("❌ Zip code lookup for {} failed at {}: {}", zip, self.endpoint, e);
            EligibilityError::directory_unavailable(e)
        })?;

        Ok(rows.into_iter().filter_map(DirectoryRow::into_record).collect())
    }

    async fn find_by_colonia_key(&self, key: &ColoniaKey) -> Result<Option<ZipCodeRecord>> {
        // 名稱需正規化後比對，伺服器端無法做到，改以郵遞區號查詢後過濾
        let records = self.find_by_zip(&key.zip_code).await?;
        Ok(records
            .into_iter()
            .find(|r| normalize_colonia_name(&r.colonia) == key.colonia_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::colonia_key;
    use httpmock::prelude::*;

    fn directory(server: &MockServer) -> HttpZipDirectory {
        HttpZipDirectory::new(
            &server.url("/rest/v1/"),
            "zip_codes",
            Some("anon-key".to_string()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_find_by_zip_queries_table() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/zip_codes")
                .query_param("zip_code", "eq.04000")
                .header("apikey", "anon-key")
                .header("authorization", "Bearer anon-key");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([
                    {"zip_code": "04000", "colonia": "Villa Coyoacán", "municipality": "Coyoacán",
                     "state": "Ciudad de México", "city": "Ciudad de México",
                     "latitude": 19.35, "longitude": -99.162},
                    {"zip_code": "04000", "colonia": "Santa Catarina", "municipality": "Coyoacán",
                     "state": "Ciudad de México", "city": null, "latitude": null, "longitude": null}
                ]));
        });

        let records = directory(&server)
            .find_by_zip(&ZipCode::parse("04000").unwrap())
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(records.len(), 2);
        assert!(records[0].centroid.is_some());
        assert_eq!(records[1].city, None);
    }

    #[tokio::test]
    async fn test_find_by_colonia_key_filters_by_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/zip_codes");
            then.status(200).json_body(serde_json::json!([
                {"zip_code": "11000", "colonia": "Lomas de Chapultepec",
                 "municipality": "Miguel Hidalgo", "state": "CDMX"},
                {"zip_code": "11000", "colonia": "Molino del Rey",
                 "municipality": "Miguel Hidalgo", "state": "CDMX"}
            ]));
        });

        let key = colonia_key::decode("molino-del-rey-11000").unwrap();
        let record = directory(&server)
            .find_by_colonia_key(&key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.colonia, "Molino del Rey");
    }

    #[tokio::test]
    async fn test_server_error_is_directory_unavailable() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/rest/v1/zip_codes");
            then.status(503);
        });

        let err = directory(&server)
            .find_by_zip(&ZipCode::parse("11510").unwrap())
            .await
            .unwrap_err();

        api_mock.assert();
        assert!(matches!(err, EligibilityError::DirectoryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_directory_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/zip_codes");
            then.status(200).body("<html>maintenance</html>");
        });

        let err = directory(&server)
            .find_by_zip(&ZipCode::parse("11510").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_directory_unavailable() {
        let directory = HttpZipDirectory::new(
            "http://127.0.0.1:9/rest/v1",
            "zip_codes",
            None,
            Duration::from_millis(500),
        );

        let err = directory
            .find_by_zip(&ZipCode::parse("11510").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EligibilityError::DirectoryUnavailable { .. }));
    }
}
