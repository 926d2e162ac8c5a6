use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::s3::ObjectStore;
use tracing::{error, info};

use crate::clock::{iso8601, Clock};
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::extract::Extractor;
use crate::load::load;
use crate::transform::transform;

pub const SUCCESS_MESSAGE: &str = "ETL pipeline completed successfully";
pub const FAILURE_MESSAGE: &str = "ETL pipeline failed";

/// Proxy-style envelope returned to the invoker. `body` is a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Extracted,
    Transformed,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub records_processed: usize,
    pub s3_key: String,
}

pub struct Pipeline {
    config: Config,
    extractor: Extractor,
    store: Box<dyn ObjectStore>,
    clock: Box<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        store: Box<dyn ObjectStore>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            extractor: Extractor::new(&config)?,
            config,
            store,
            clock,
        })
    }

    /// Runs one invocation. Never fails; errors become a 500 response.
    pub async fn handle(&self) -> Response {
        info!("Starting ETL pipeline execution");

        let mut stage = Stage::Start;
        let result = self.run(&mut stage).await;
        let execution_time = iso8601(self.clock.now());

        match result {
            Ok(outcome) => Response {
                status_code: 200,
                body: json!({
                    "message": SUCCESS_MESSAGE,
                    "records_processed": outcome.records_processed,
                    "s3_key": outcome.s3_key,
                    "execution_time": execution_time,
                })
                .to_string(),
            },
            Err(e) => failure(&e, execution_time),
        }
    }

    /// Drives the stages in order. On error `stage` ends as `Failed`.
    pub async fn run(&self, stage: &mut Stage) -> Result<Outcome> {
        let result = self.stages(stage).await;
        if let Err(e) = &result {
            error!("ETL pipeline failed after {:?} ({}): {}", stage, e.kind(), e);
            *stage = Stage::Failed;
        }
        result
    }

    async fn stages(&self, stage: &mut Stage) -> Result<Outcome> {
        let invoked_at = self.clock.now();

        let products = self.extractor.extract().await?;
        *stage = Stage::Extracted;
        info!("Extracted {} products from API", products.len());

        let transformed = transform(&products, invoked_at)?;
        *stage = Stage::Transformed;
        info!(
            "Transformed data: {} rows, {} columns",
            transformed.summary.rows, transformed.summary.columns
        );

        let s3_key = load(
            self.store.as_ref(),
            &self.config,
            &transformed.rows,
            invoked_at,
        )
        .await?;
        *stage = Stage::Loaded;
        info!("Data successfully loaded to S3: {}", s3_key);

        Ok(Outcome {
            records_processed: products.len(),
            s3_key,
        })
    }
}

/// Answers an invocation when the pipeline could not be built at cold start.
pub fn startup_failure(error: &EtlError, clock: &dyn Clock) -> Response {
    error!("ETL pipeline failed at startup ({}): {}", error.kind(), error);
    failure(error, iso8601(clock.now()))
}

fn failure(error: &EtlError, execution_time: String) -> Response {
    Response {
        status_code: 500,
        body: json!({
            "error": FAILURE_MESSAGE,
            "message": error.to_string(),
            "execution_time": execution_time,
        })
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use shared::s3::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api(status: u16, body: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn pipeline(server: &MockServer, store: MemoryStore) -> Pipeline {
        let config = Config::default()
            .with_base_url(server.uri())
            .with_bucket("shop-etl-data");
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap());
        Pipeline::new(config, Box::new(store), Box::new(clock)).unwrap()
    }

    #[tokio::test]
    async fn run_reaches_loaded() {
        let server = api(200, json!({"products": [{"id": 1}, {"id": 2}]})).await;
        let pipeline = pipeline(&server, MemoryStore::new());

        let mut stage = Stage::Start;
        let outcome = pipeline.run(&mut stage).await.unwrap();

        assert_eq!(stage, Stage::Loaded);
        assert_eq!(outcome.records_processed, 2);
        assert_eq!(
            outcome.s3_key,
            "products/year=2024/month=12/day=31/products_20241231_235958.csv"
        );
    }

    #[tokio::test]
    async fn run_stops_at_the_failing_stage() {
        let server = api(200, json!({"products": [{"id": 1}]})).await;
        let pipeline = pipeline(&server, MemoryStore::failing("bucket is gone"));

        let mut stage = Stage::Start;
        let err = pipeline.run(&mut stage).await.unwrap_err();

        assert_eq!(stage, Stage::Failed);
        assert_eq!(err.kind(), "StorageError");
    }

    #[tokio::test]
    async fn extraction_failure_ends_failed() {
        let server = api(200, json!({"items": []})).await;
        let pipeline = pipeline(&server, MemoryStore::new());

        let mut stage = Stage::Start;
        let err = pipeline.run(&mut stage).await.unwrap_err();

        assert_eq!(stage, Stage::Failed);
        assert_eq!(err.kind(), "FormatError");
    }

    #[tokio::test]
    async fn handle_wraps_failures_in_500() {
        let server = api(500, json!({"message": "boom"})).await;
        let response = pipeline(&server, MemoryStore::new()).handle().await;

        assert_eq!(response.status_code, 500);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["error"], FAILURE_MESSAGE);
        assert!(body["message"].as_str().unwrap().contains("500"));
        assert_eq!(body["execution_time"], "2024-12-31T23:59:58.000000Z");
    }

    #[test]
    fn startup_failure_is_a_500_envelope() {
        let err = Config::from_lookup(|name| {
            (name == "REQUEST_TIMEOUT_SECS").then(|| "abc".to_string())
        })
        .unwrap_err();
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap());

        let response = startup_failure(&err, &clock);

        assert_eq!(response.status_code, 500);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["error"], FAILURE_MESSAGE);
        assert_eq!(
            body["message"],
            "REQUEST_TIMEOUT_SECS must be a positive number of seconds, got \"abc\""
        );
        assert_eq!(body["execution_time"], "2024-12-31T23:59:58.000000Z");
    }

    #[test]
    fn response_uses_lambda_field_names() {
        let response = Response {
            status_code: 200,
            body: "{}".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"statusCode": 200, "body": "{}"})
        );
    }
}
