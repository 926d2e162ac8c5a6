use clap::Parser;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use product_etl::clock::SystemClock;
use product_etl::config::Config;
use product_etl::error::EtlError;
use product_etl::handler::{startup_failure, Pipeline, Response};
use serde_json::Value;
use shared::s3::{MemoryStore, ObjectStore, S3Store};
use tracing::info;

/// Product catalog ETL. Runs under the Lambda runtime unless --local is set.
#[derive(Debug, Parser)]
#[command(name = "product_etl", version)]
struct Args {
    /// Run one invocation in-process and print the result.
    #[arg(long, env = "ETL_LOCAL")]
    local: bool,

    /// Keep uploads in memory instead of writing to S3.
    #[arg(long, requires = "local")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    shared::log::init(shared::log::parse_level(
        std::env::var("LOG_LEVEL").ok().as_deref(),
    ));

    let args = Args::parse();
    let pipeline = build(&args).await;

    if args.local {
        let response = func(&pipeline).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let pipeline = &pipeline;
    lambda_runtime::run(service_fn(move |_event: LambdaEvent<Value>| async move {
        Ok::<Response, Error>(func(pipeline).await)
    }))
    .await?;
    Ok(())
}

async fn build(args: &Args) -> Result<Pipeline, EtlError> {
    let config = Config::from_env()?;
    let store: Box<dyn ObjectStore> = if args.dry_run {
        info!("Dry run, uploads stay in memory");
        Box::new(MemoryStore::new())
    } else {
        Box::new(S3Store::from_env(config.upload_timeout).await)
    };

    Pipeline::new(config, store, Box::new(SystemClock))
}

// A cold-start failure still answers every invocation with the 500 envelope.
async fn func(pipeline: &Result<Pipeline, EtlError>) -> Response {
    match pipeline {
        Ok(pipeline) => pipeline.handle().await,
        Err(e) => startup_failure(e, &SystemClock),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_local_dry_run() {
        let args = Args::try_parse_from(["product_etl", "--local", "--dry-run"]).unwrap();
        assert!(args.local);
        assert!(args.dry_run);
    }

    #[test]
    fn dry_run_requires_local() {
        let err = Args::try_parse_from(["product_etl", "--dry-run"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = Args::try_parse_from(["product_etl", "--locl"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
