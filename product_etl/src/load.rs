use chrono::{DateTime, Utc};
use shared::s3::ObjectStore;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::transform::{EnrichedRow, COLUMNS};

pub const CONTENT_TYPE: &str = "text/csv";

/// CSV with a header row, even when there are no rows.
pub fn to_csv(rows: &[EnrichedRow]) -> Result<Vec<u8>> {
    let csv_error = |e: csv::Error| EtlError::Transform(format!("failed to write CSV: {e}"));

    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(COLUMNS).map_err(csv_error)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::Transform(format!("failed to flush CSV: {}", e.error())))
}

/// `products/year=YYYY/month=MM/day=DD/products_YYYYMMDD_HHMMSS.csv`
pub fn partition_key(invoked_at: DateTime<Utc>) -> String {
    invoked_at
        .format("products/year=%Y/month=%m/day=%d/products_%Y%m%d_%H%M%S.csv")
        .to_string()
}

/// Uploads the rows as a single object and returns its key. One attempt.
pub async fn load(
    store: &dyn ObjectStore,
    config: &Config,
    rows: &[EnrichedRow],
    invoked_at: DateTime<Utc>,
) -> Result<String> {
    let body = to_csv(rows)?;
    let key = partition_key(invoked_at);
    let bucket = config.bucket_name().inspect_err(|e| error!("{}", e))?;

    store
        .put(bucket, &key, CONTENT_TYPE, body)
        .await
        .inspect_err(|e| error!("Failed to upload data to S3: {}", e))?;

    info!("Data successfully uploaded to S3: s3://{}/{}", bucket, key);
    Ok(key)
}
