//! Tushare Pro HTTP adapter.
//!
//! Every call is a JSON `POST` of `{api_name, token, params, fields}` to the
//! API root; responses wrap a columnar `{fields, items}` batch.

use crate::adapters::network_error;
use crate::domain::config::UpstreamConfig;
use crate::domain::error::MarketDataError;
use crate::domain::normalize::RawBatch;
use crate::domain::ohlcv::format_trade_date;
use crate::domain::request::RequestContext;
use crate::domain::trim::DateWindow;
use crate::ports::data_port::{DailyQuery, MarketDataPort, QueryRange};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const ADJ_FACTOR_API: &str = "adj_factor";

#[derive(Serialize)]
struct TushareRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a str>,
}

#[derive(Deserialize)]
struct TushareResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<RawBatch>,
}

pub struct TushareAdapter {
    client: reqwest::Client,
    api_url: String,
}

impl TushareAdapter {
    pub fn new(config: &UpstreamConfig) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Network {
                api: "tushare".to_string(),
                symbol: String::new(),
                timed_out: false,
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_url: config.base_url.clone(),
        })
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        api_name: &str,
        symbol: &str,
        params: Value,
        fields: Option<&str>,
    ) -> Result<RawBatch, MarketDataError> {
        let token = ctx.token().ok_or_else(|| {
            MarketDataError::validation(
                "token",
                "",
                "a Tushare token is required (--token or TUSHARE_TOKEN)",
            )
        })?;

        tracing::debug!(api_name, symbol, %params, "tushare request");
        let body = TushareRequest {
            api_name,
            token,
            params,
            fields,
        };
        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(api_name, symbol, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::api(
                api_name,
                symbol,
                format!("HTTP {}", status),
            ));
        }

        // the client timeout also covers the body read
        let text = response
            .text()
            .await
            .map_err(|e| network_error(api_name, symbol, e))?;
        let parsed: TushareResponse = serde_json::from_str(&text)
            .map_err(|e| MarketDataError::api(api_name, symbol, format!("invalid response: {e}")))?;
        if parsed.code != 0 {
            return Err(MarketDataError::api(
                api_name,
                symbol,
                format!(
                    "code {}: {}",
                    parsed.code,
                    parsed.msg.unwrap_or_else(|| "no message".to_string())
                ),
            ));
        }
        Ok(parsed.data.unwrap_or_default())
    }
}

fn daily_params(query: &DailyQuery) -> Value {
    match query.range {
        QueryRange::Between(window) => json!({
            "ts_code": query.code,
            "start_date": format_trade_date(window.start),
            "end_date": format_trade_date(window.end),
        }),
        QueryRange::OnDate(date) => json!({
            "ts_code": query.code,
            "trade_date": format_trade_date(date),
        }),
    }
}

#[async_trait]
impl MarketDataPort for TushareAdapter {
    async fn fetch_daily(
        &self,
        ctx: &RequestContext,
        query: &DailyQuery,
    ) -> Result<RawBatch, MarketDataError> {
        let api_name = query.market.daily_api().ok_or_else(|| {
            MarketDataError::validation(
                "market_type",
                query.market,
                "not served by the Tushare daily endpoints",
            )
        })?;
        self.call(ctx, api_name, &query.code, daily_params(query), None)
            .await
    }

    async fn fetch_adj_factors(
        &self,
        ctx: &RequestContext,
        code: &str,
        window: DateWindow,
    ) -> Result<RawBatch, MarketDataError> {
        let params = json!({
            "ts_code": code,
            "start_date": format_trade_date(window.start),
            "end_date": format_trade_date(window.end),
        });
        self.call(ctx, ADJ_FACTOR_API, code, params, Some("trade_date,adj_factor"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketType;
    use chrono::NaiveDate;
    use mockito::Matcher;
    use std::time::Duration;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn adapter(url: &str) -> TushareAdapter {
        TushareAdapter::new(&UpstreamConfig {
            base_url: url.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Some("test-token".into()))
    }

    fn query(market: MarketType, range: QueryRange) -> DailyQuery {
        DailyQuery {
            market,
            code: "000001.SZ".into(),
            range,
        }
    }

    #[tokio::test]
    async fn posts_daily_request_and_returns_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "api_name": "daily",
                "token": "test-token",
                "params": {"ts_code": "000001.SZ", "start_date": "20240102", "end_date": "20240105"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "code": 0,
                    "msg": "",
                    "data": {
                        "fields": ["ts_code", "trade_date", "close"],
                        "items": [["000001.SZ", "20240105", 9.5], ["000001.SZ", "20240104", 9.4]]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let window = DateWindow::new(date(2), date(5)).unwrap();
        let batch = adapter(&server.url())
            .fetch_daily(&ctx(), &query(MarketType::Cn, QueryRange::Between(window)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.column("close"), Some(2));
    }

    #[tokio::test]
    async fn single_session_query_uses_trade_date() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "api_name": "opt_daily",
                "params": {"trade_date": "20240105"}
            })))
            .with_status(200)
            .with_body(r#"{"code":0,"data":{"fields":["trade_date"],"items":[]}}"#)
            .create_async()
            .await;

        let batch = adapter(&server.url())
            .fetch_daily(&ctx(), &query(MarketType::Options, QueryRange::OnDate(date(5))))
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn adj_factor_request_names_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "api_name": "adj_factor",
                "fields": "trade_date,adj_factor"
            })))
            .with_status(200)
            .with_body(
                r#"{"code":0,"data":{"fields":["trade_date","adj_factor"],"items":[["20240105",1.3]]}}"#,
            )
            .create_async()
            .await;

        let window = DateWindow::new(date(1), date(5)).unwrap();
        let batch = adapter(&server.url())
            .fetch_adj_factors(&ctx(), "000001.SZ", window)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(batch.items.len(), 1);
    }

    #[tokio::test]
    async fn nonzero_code_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"code":40203,"msg":"insufficient permissions","data":null}"#)
            .create_async()
            .await;

        let window = DateWindow::new(date(1), date(5)).unwrap();
        let err = adapter(&server.url())
            .fetch_daily(&ctx(), &query(MarketType::Us, QueryRange::Between(window)))
            .await
            .unwrap_err();
        match err {
            MarketDataError::Api { api, reason, .. } => {
                assert_eq!(api, "us_daily");
                assert!(reason.contains("40203"));
                assert!(reason.contains("insufficient permissions"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_failure_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(502)
            .create_async()
            .await;

        let window = DateWindow::new(date(1), date(5)).unwrap();
        let err = adapter(&server.url())
            .fetch_daily(&ctx(), &query(MarketType::Hk, QueryRange::Between(window)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[tokio::test]
    async fn stalled_body_is_network_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"code\":0,")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let slow = TushareAdapter::new(&UpstreamConfig {
            base_url: url,
            timeout: Duration::from_millis(500),
        })
        .unwrap();
        let window = DateWindow::new(date(1), date(5)).unwrap();
        let err = slow
            .fetch_daily(&ctx(), &query(MarketType::Us, QueryRange::Between(window)))
            .await
            .unwrap_err();

        assert!(
            matches!(err, MarketDataError::Network { timed_out: true, .. }),
            "unexpected {err:?}"
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn undecodable_body_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let window = DateWindow::new(date(1), date(5)).unwrap();
        let err = adapter(&server.url())
            .fetch_daily(&ctx(), &query(MarketType::Fund, QueryRange::Between(window)))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Api { ref reason, .. } if reason.starts_with("invalid response")));
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_sending() {
        let window = DateWindow::new(date(1), date(5)).unwrap();
        let err = adapter("http://127.0.0.1:9")
            .fetch_daily(
                &RequestContext::anonymous(),
                &query(MarketType::Cn, QueryRange::Between(window)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Validation { ref field, .. } if field == "token"));
    }

    #[tokio::test]
    async fn crypto_is_not_a_tushare_market() {
        let window = DateWindow::new(date(1), date(5)).unwrap();
        let err = adapter("http://127.0.0.1:9")
            .fetch_daily(&ctx(), &query(MarketType::Crypto, QueryRange::Between(window)))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Validation { .. }));
    }
}
