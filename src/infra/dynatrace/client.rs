use anyhow::Result;
use async_trait::async_trait;
use keyreq_report::analyzers::series::{MetricKind, SeriesSpec};
use keyreq_report::analyzers::utility::format_percentile;
use keyreq_report::config::{QueryWindow, SourceConfig};
use keyreq_report::fetch::auth::ApiKey;
use keyreq_report::fetch::{ACCEPT_CSV, BasicClient, HttpClient, fetch_text};
use keyreq_report::services::metrics_api::{MetricsApi, SeriesFetch};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

const SPLIT_DIMENSION: &str = "dt.entity.service_method";
const NAME_DIMENSION: &str = "dt.entity.service_method.name";

/// Metrics v2 query client for key-request series.
pub struct DynatraceClient<C = ApiKey<BasicClient>> {
    http: C,
    base_url: String,
    management_zone: Option<String>,
    resolution: String,
    limit: u32,
    window: QueryWindow,
}

impl DynatraceClient {
    pub fn new(source: &SourceConfig, window: QueryWindow, token: &str) -> Result<Self> {
        let basic = BasicClient::with_options(
            Duration::from_secs(source.timeout_secs),
            source.accept_invalid_certs,
        )?;
        Ok(Self::with_http(ApiKey::api_token(basic, token)?, source, window))
    }
}

impl<C: HttpClient> DynatraceClient<C> {
    pub fn with_http(http: C, source: &SourceConfig, window: QueryWindow) -> Self {
        Self {
            http,
            base_url: source.base_url.trim_end_matches('/').to_string(),
            management_zone: source.management_zone.clone(),
            resolution: source.resolution.clone(),
            limit: source.limit,
            window,
        }
    }

    /// Metric selector for one series, split and sorted by endpoint name.
    pub fn metric_selector(&self, spec: &SeriesSpec) -> String {
        let (metric, aggregation) = match spec.kind {
            MetricKind::Percentile(p) => (
                "builtin:service.keyRequest.response.time",
                format!("percentile({})", format_percentile_selector(p)),
            ),
            MetricKind::Volume => ("builtin:service.keyRequest.count.total", "sum".to_string()),
            MetricKind::ErrorRate => ("builtin:service.keyRequest.errors.server.rate", "avg".to_string()),
        };
        let limit = self.limit;
        format!(
            "({metric}:splitBy(\"{SPLIT_DIMENSION}\"):{aggregation}:names\
             :sort(dimension(\"{NAME_DIMENSION}\",ascending)):limit({limit})):limit({limit}):names"
        )
    }

    pub fn query_url(&self, spec: &SeriesSpec) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/api/v2/metrics/query", self.base_url))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("metricSelector", &self.metric_selector(spec))
                .append_pair("from", &self.window.from_param())
                .append_pair("to", &self.window.to_param())
                .append_pair("resolution", &self.resolution);
            if let Some(zone) = &self.management_zone {
                query.append_pair("mzSelector", &format!("mzId({zone})"));
            }
        }
        Ok(url)
    }

    async fn try_fetch(&self, spec: &SeriesSpec) -> Result<String> {
        let url = self.query_url(spec)?;
        debug!(series = %spec.name(), url = %url, "Querying metrics");
        fetch_text(&self.http, url.as_str(), ACCEPT_CSV).await
    }
}

/// The query language expects a decimal point, e.g. `percentile(50.0)`.
fn format_percentile_selector(p: f64) -> String {
    let s = format_percentile(p);
    if s.contains('.') { s } else { format!("{s}.0") }
}

#[async_trait]
impl<C: HttpClient> MetricsApi for DynatraceClient<C> {
    #[tracing::instrument(skip(self), fields(series = %spec.name()))]
    async fn fetch_series(&self, spec: &SeriesSpec) -> SeriesFetch {
        match self.try_fetch(spec).await {
            Ok(body) => SeriesFetch::from_body(body),
            Err(e) => SeriesFetch::Failed(format!("{e:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use keyreq_report::analyzers::series::Reduction;

    struct Unused;

    #[async_trait]
    impl HttpClient for Unused {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            unreachable!("no requests in selector tests")
        }
    }

    fn client() -> DynatraceClient<Unused> {
        let source = SourceConfig {
            base_url: "https://dt.example.com/e/env-1/".to_string(),
            management_zone: Some("-4139".to_string()),
            resolution: "1d".to_string(),
            limit: 700,
            accept_invalid_certs: false,
            timeout_secs: 30,
        };
        let window = QueryWindow {
            from: Utc.with_ymd_and_hms(2024, 9, 7, 17, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 9, 8, 17, 0, 0).unwrap(),
        };
        DynatraceClient::with_http(Unused, &source, window)
    }

    #[test]
    fn test_percentile_selector() {
        let selector = client().metric_selector(&SeriesSpec::percentile(50.0, Reduction::Mean));
        assert_eq!(
            selector,
            "(builtin:service.keyRequest.response.time:splitBy(\"dt.entity.service_method\")\
             :percentile(50.0):names:sort(dimension(\"dt.entity.service_method.name\",ascending))\
             :limit(700)):limit(700):names"
        );
    }

    #[test]
    fn test_volume_selector_sums() {
        let selector = client().metric_selector(&SeriesSpec::volume());
        assert!(selector.starts_with("(builtin:service.keyRequest.count.total:"));
        assert!(selector.contains(":sum:names"));
    }

    #[test]
    fn test_query_url_params() {
        let url = client().query_url(&SeriesSpec::error_rate()).unwrap();
        assert_eq!(url.path(), "/e/env-1/api/v2/metrics/query");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("from".to_string(), "2024-09-07T17:00:00Z".to_string())));
        assert!(pairs.contains(&("to".to_string(), "2024-09-08T17:00:00Z".to_string())));
        assert!(pairs.contains(&("resolution".to_string(), "1d".to_string())));
        assert!(pairs.contains(&("mzSelector".to_string(), "mzId(-4139)".to_string())));
    }
}
