//! BigQuery warehouse over the v2 REST API.
//!
//! Runs standard-SQL queries through `jobs.query`, then follows
//! `getQueryResults` until the job is complete and every page is read.
//! Results arrive as the generic `{"f": [{"v": ...}]}` row encoding and are
//! typed using the schema returned with the first page.

use super::credentials::{EnvToken, TokenSource};
use super::{Session, Warehouse};
use crate::config::GridfeedConfig;
use crate::domain::{Cell, RawDataset};
use crate::error::GridError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// `jobs.query` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    max_results: u32,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
    job_reference: Option<JobReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// BigQuery warehouse.
pub struct BigQueryWarehouse {
    project: String,
    endpoint: String,
    location: Option<String>,
    timeout: Duration,
    page_size: u32,
    tokens: Arc<dyn TokenSource>,
}

impl BigQueryWarehouse {
    pub fn new(project: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        let defaults = crate::config::WarehouseConfig::default();
        Self {
            project: project.into(),
            endpoint: defaults.endpoint,
            location: defaults.location,
            timeout: Duration::from_secs(defaults.timeout_secs),
            page_size: defaults.page_size,
            tokens,
        }
    }

    /// Build from configuration, reading tokens from `credentials.token_env`.
    pub fn from_config(config: &GridfeedConfig) -> Result<Self, GridError> {
        let tokens: Arc<dyn TokenSource> = Arc::new(EnvToken::new(&config.credentials.token_env));
        Self::from_config_with_tokens(config, tokens)
    }

    pub fn from_config_with_tokens(
        config: &GridfeedConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, GridError> {
        let wh = &config.warehouse;
        Ok(Self {
            project: config.resolve_project()?,
            endpoint: wh.endpoint.trim_end_matches('/').to_string(),
            location: wh.location.clone(),
            timeout: Duration::from_secs(wh.timeout_secs),
            page_size: wh.page_size,
            tokens,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn query_url(&self) -> String {
        format!("{}/projects/{}/queries", self.endpoint, self.project)
    }

    fn results_url(&self, job_id: &str) -> String {
        format!("{}/projects/{}/queries/{job_id}", self.endpoint, self.project)
    }
}

impl Warehouse for BigQueryWarehouse {
    fn name(&self) -> &str {
        "bigquery"
    }

    fn connect(&self) -> Result<Box<dyn Session + '_>, GridError> {
        let token = self.tokens.access_token()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("gridfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GridError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Box::new(BigQuerySession {
            warehouse: self,
            client: Some(client),
            token,
        }))
    }
}

struct BigQuerySession<'a> {
    warehouse: &'a BigQueryWarehouse,
    client: Option<reqwest::blocking::Client>,
    token: String,
}

impl BigQuerySession<'_> {
    fn client(&self) -> Result<&reqwest::blocking::Client, GridError> {
        self.client
            .as_ref()
            .ok_or_else(|| GridError::Connection("session already released".into()))
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<QueryResponse, GridError> {
        let resp = request.bearer_auth(&self.token).send().map_err(|e| {
            if e.is_timeout() {
                GridError::Connection(format!("request timed out: {e}"))
            } else {
                GridError::Connection(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let detail = error_message(resp.text().unwrap_or_default());
            return Err(GridError::Authentication(format!("HTTP {status}: {detail}")));
        }
        if !status.is_success() {
            let detail = error_message(resp.text().unwrap_or_default());
            return Err(GridError::Query(format!("HTTP {status}: {detail}")));
        }

        resp.json::<QueryResponse>()
            .map_err(|e| GridError::ResponseFormat(format!("failed to parse query response: {e}")))
    }
}

impl Session for BigQuerySession<'_> {
    fn query(&mut self, sql: &str) -> Result<RawDataset, GridError> {
        let wh = self.warehouse;
        let wait_ms = server_wait(wh.timeout).as_millis() as u64;
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            max_results: wh.page_size,
            timeout_ms: wait_ms,
            location: wh.location.as_deref(),
        };
        let first = self.send(self.client()?.post(wh.query_url()).json(&body))?;

        let first_job = first.job_reference.as_ref().map(|j| j.job_id.clone());
        let location = first
            .job_reference
            .as_ref()
            .and_then(|j| j.location.clone())
            .or_else(|| wh.location.clone());

        let mut pages = Vec::new();
        let mut current = first;
        loop {
            let next = next_request(&current, first_job.as_deref())?;
            if current.job_complete {
                pages.push(current);
            }
            let NextRequest::Results { job_id, page_token } = next else {
                break;
            };

            let mut params: Vec<(&str, String)> = vec![
                ("maxResults", wh.page_size.to_string()),
                ("timeoutMs", wait_ms.to_string()),
            ];
            if let Some(token) = page_token {
                params.push(("pageToken", token));
            }
            if let Some(loc) = &location {
                params.push(("location", loc.clone()));
            }

            debug!(job_id = %job_id, pages = pages.len(), "fetching query results");
            current = self.send(self.client()?.get(wh.results_url(&job_id)).query(&params))?;
        }

        let ds = parse_pages(pages)?;
        info!(
            project = wh.project(),
            rows = ds.len(),
            columns = ds.columns().len(),
            "query complete"
        );
        Ok(ds)
    }

    fn release(&mut self) {
        self.client = None;
    }
}

/// Headroom left between the server-side wait and the HTTP client timeout.
const CLIENT_HEADROOM: Duration = Duration::from_secs(10);

/// How long BigQuery may hold a request open before answering
/// `jobComplete: false`. Always shorter than the client `timeout`.
pub(crate) fn server_wait(timeout: Duration) -> Duration {
    if timeout > CLIENT_HEADROOM * 2 {
        timeout - CLIENT_HEADROOM
    } else {
        timeout / 2
    }
}

/// Follow-up call after one `jobs.query` or `getQueryResults` response.
#[derive(Debug, PartialEq)]
pub(crate) enum NextRequest {
    /// The job is complete and every page has been read.
    Done,
    /// Poll the job, or read the page at `page_token` once it is complete.
    Results {
        job_id: String,
        page_token: Option<String>,
    },
}

/// Pages of a still-running job carry no rows; they only lead to a poll.
/// `known_job` is the job id from the first response, used when a later
/// page omits its own reference.
pub(crate) fn next_request(
    page: &QueryResponse,
    known_job: Option<&str>,
) -> Result<NextRequest, GridError> {
    if page.job_complete && page.page_token.is_none() {
        return Ok(NextRequest::Done);
    }
    let job_id = page
        .job_reference
        .as_ref()
        .map(|j| j.job_id.as_str())
        .or(known_job)
        .ok_or_else(|| {
            let what = if page.job_complete {
                "paged result"
            } else {
                "incomplete job"
            };
            GridError::ResponseFormat(format!("{what} without a job reference"))
        })?;
    Ok(NextRequest::Results {
        job_id: job_id.to_string(),
        page_token: page.page_token.clone().filter(|_| page.job_complete),
    })
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Assemble result pages into one dataset using the schema of the first page
/// that carries one.
pub(crate) fn parse_pages(pages: Vec<QueryResponse>) -> Result<RawDataset, GridError> {
    let schema = pages
        .iter()
        .find_map(|p| p.schema.as_ref())
        .ok_or_else(|| GridError::ResponseFormat("response has no schema".into()))?;

    let columns: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
    let mut ds = RawDataset::new(columns.iter().cloned());

    for page in &pages {
        for (i, row) in page.rows.iter().enumerate() {
            if row.f.len() != schema.fields.len() {
                return Err(GridError::ResponseFormat(format!(
                    "row {i} has {} cells, schema has {} fields",
                    row.f.len(),
                    schema.fields.len()
                )));
            }
            let cells = schema
                .fields
                .iter()
                .zip(&row.f)
                .map(|(field, cell)| convert_value(field, &cell.v))
                .collect::<Result<Vec<_>, _>>()?;
            ds.push_row(cells);
        }
    }
    Ok(ds)
}

fn convert_value(field: &FieldSchema, value: &serde_json::Value) -> Result<Cell, GridError> {
    use serde_json::Value;

    let text = match value {
        Value::Null => return Ok(Cell::Null),
        Value::String(s) => s.as_str(),
        // Repeated and record fields keep their JSON form.
        other => return Ok(Cell::Text(other.to_string())),
    };
    if field.mode.as_deref() == Some("REPEATED") {
        return Ok(Cell::Text(text.to_string()));
    }

    let bad = |what: &str| {
        GridError::ResponseFormat(format!(
            "column '{}': invalid {what} value '{text}'",
            field.name
        ))
    };

    let cell = match field.field_type.as_str() {
        "INTEGER" | "INT64" => Cell::Int(text.parse().map_err(|_| bad("integer"))?),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            Cell::from_f64(Some(text.parse().map_err(|_| bad("float"))?))
        }
        "BOOLEAN" | "BOOL" => match text {
            "true" | "TRUE" => Cell::Bool(true),
            "false" | "FALSE" => Cell::Bool(false),
            _ => return Err(bad("boolean")),
        },
        "TIMESTAMP" => {
            let secs: f64 = text.parse().map_err(|_| bad("timestamp"))?;
            let micros = (secs * 1_000_000.0).round() as i64;
            let ts = DateTime::from_timestamp_micros(micros).ok_or_else(|| bad("timestamp"))?;
            Cell::Timestamp(ts.naive_utc())
        }
        "DATE" => Cell::Date(
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| bad("date"))?,
        ),
        "DATETIME" => Cell::Timestamp(
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|_| bad("datetime"))?,
        ),
        _ => Cell::Text(text.to_string()),
    };
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    const FIRST_PAGE: &str = r#"{
        "kind": "bigquery#queryResponse",
        "jobComplete": true,
        "jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"},
        "schema": {"fields": [
            {"name": "date", "type": "DATE", "mode": "NULLABLE"},
            {"name": "company", "type": "STRING"},
            {"name": "employees_laid_off", "type": "INTEGER"},
            {"name": "percent_laid_off", "type": "STRING"},
            {"name": "datamachine_load_time", "type": "TIMESTAMP"}
        ]},
        "rows": [
            {"f": [{"v": "2024-01-05"}, {"v": "Acme"}, {"v": "120"}, {"v": "10.5%"}, {"v": "1.7044128E9"}]},
            {"f": [{"v": "2024-01-04"}, {"v": "Globex"}, {"v": null}, {"v": null}, {"v": "1.7044128E9"}]}
        ],
        "pageToken": "tok2",
        "totalRows": "3"
    }"#;

    const SECOND_PAGE: &str = r#"{
        "jobComplete": true,
        "rows": [
            {"f": [{"v": "2024-01-03"}, {"v": "Initech"}, {"v": "7"}, {"v": "1%"}, {"v": "1.7044128E9"}]}
        ]
    }"#;

    #[test]
    fn parses_typed_rows_across_pages() {
        let ds = parse_pages(vec![response(FIRST_PAGE), response(SECOND_PAGE)]).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.columns()[4], "datamachine_load_time");
        assert_eq!(
            ds.rows()[0][0],
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert_eq!(ds.rows()[0][2], Cell::Int(120));
        assert_eq!(ds.rows()[1][2], Cell::Null);
        assert_eq!(ds.rows()[2][1], Cell::from("Initech"));
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(ds.rows()[0][4], Cell::Timestamp(expected));
    }

    #[test]
    fn missing_schema_is_a_format_error() {
        let err = parse_pages(vec![response(r#"{"jobComplete": true}"#)]).unwrap_err();
        assert!(matches!(err, GridError::ResponseFormat(_)));
    }

    #[test]
    fn bad_integer_is_reported_with_column() {
        let page = response(
            r#"{"jobComplete": true,
                "schema": {"fields": [{"name": "n", "type": "INT64"}]},
                "rows": [{"f": [{"v": "twelve"}]}]}"#,
        );
        let err = parse_pages(vec![page]).unwrap_err();
        assert!(err.to_string().contains("column 'n'"), "{err}");
    }

    #[test]
    fn float_and_bool_fields_convert() {
        let field = |t: &str| FieldSchema {
            name: "x".into(),
            field_type: t.into(),
            mode: None,
        };
        let v = |s: &str| serde_json::Value::String(s.into());
        assert_eq!(convert_value(&field("FLOAT64"), &v("31.25")).unwrap(), Cell::Float(31.25));
        assert_eq!(convert_value(&field("NUMERIC"), &v("0")).unwrap(), Cell::Float(0.0));
        assert_eq!(convert_value(&field("BOOL"), &v("true")).unwrap(), Cell::Bool(true));
        assert_eq!(
            convert_value(&field("GEOGRAPHY"), &v("POINT(1 2)")).unwrap(),
            Cell::from("POINT(1 2)")
        );
    }

    #[test]
    fn running_job_is_polled_without_a_page_token() {
        let page = response(
            r#"{"jobComplete": false,
                "jobReference": {"jobId": "job_9"},
                "pageToken": "ignored-until-complete"}"#,
        );
        assert_eq!(
            next_request(&page, None).unwrap(),
            NextRequest::Results {
                job_id: "job_9".into(),
                page_token: None
            }
        );
    }

    #[test]
    fn complete_page_with_token_fetches_the_next_page() {
        assert_eq!(
            next_request(&response(FIRST_PAGE), None).unwrap(),
            NextRequest::Results {
                job_id: "job_1".into(),
                page_token: Some("tok2".into())
            }
        );

        let later = response(r#"{"jobComplete": true, "pageToken": "tok3"}"#);
        assert_eq!(
            next_request(&later, Some("job_1")).unwrap(),
            NextRequest::Results {
                job_id: "job_1".into(),
                page_token: Some("tok3".into())
            }
        );
        assert_eq!(
            next_request(&response(SECOND_PAGE), Some("job_1")).unwrap(),
            NextRequest::Done
        );
    }

    #[test]
    fn complete_job_without_reference_is_done_unless_paged() {
        let single = response(r#"{"jobComplete": true}"#);
        assert_eq!(next_request(&single, None).unwrap(), NextRequest::Done);

        let paged = response(r#"{"jobComplete": true, "pageToken": "tok2"}"#);
        let err = next_request(&paged, None).unwrap_err();
        assert!(err.to_string().contains("paged result"), "{err}");

        let running = response(r#"{"jobComplete": false}"#);
        let err = next_request(&running, None).unwrap_err();
        assert!(matches!(err, GridError::ResponseFormat(_)));
    }

    #[test]
    fn server_wait_stays_below_client_timeout() {
        assert_eq!(server_wait(Duration::from_secs(60)), Duration::from_secs(50));
        assert_eq!(server_wait(Duration::from_secs(10)), Duration::from_secs(5));
        for secs in [1, 15, 21, 60, 600] {
            let timeout = Duration::from_secs(secs);
            assert!(server_wait(timeout) < timeout);
        }
    }

    #[test]
    fn urls_include_project() {
        let wh = BigQueryWarehouse::new(
            "datamachine-407200",
            Arc::new(crate::warehouse::StaticToken::new("t")),
        );
        assert_eq!(wh.project(), "datamachine-407200");
        assert_eq!(
            wh.query_url(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/datamachine-407200/queries"
        );
        assert!(wh.results_url("job_1").ends_with("/queries/job_1"));
    }

    #[test]
    fn connect_fails_without_token() {
        let mut config = GridfeedConfig::default();
        config.warehouse.project = Some("p".into());
        config.credentials.token_env = "GRIDFEED_TEST_UNSET_TOKEN_VAR".into();
        let wh = BigQueryWarehouse::from_config(&config).unwrap();
        let err = wh.connect().err().unwrap();
        assert!(matches!(err, GridError::Authentication(_)));
    }
}
