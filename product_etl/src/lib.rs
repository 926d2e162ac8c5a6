//! Product catalog ETL: fetch from the products API, enrich, land in S3 as
//! date-partitioned CSV.

pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod load;
pub mod transform;
