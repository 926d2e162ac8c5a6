use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::deploy::check_tools;
use crate::runner::{command_line, CommandRunner, Output};
use crate::settings::Settings;

const LOCAL_FILES: [&str; 4] = [
    "terraform.tfstate",
    "terraform.tfstate.backup",
    ".terraform.lock.hcl",
    "output.json",
];
const LOCAL_DIRS: [&str; 2] = [".terraform", "lambda/packages"];

#[derive(Debug, Deserialize)]
struct TerraformOutput {
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectVersions {
    #[serde(default)]
    versions: Vec<VersionRef>,
    #[serde(default)]
    delete_markers: Vec<VersionRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionRef {
    key: String,
    version_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketList {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutions {
    #[serde(default)]
    query_execution_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NamedQueries {
    #[serde(default)]
    named_query_ids: Vec<String>,
}

pub fn confirmed(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Tears everything down. Cleanup steps are best effort; only a failed
/// `terraform destroy` stops the run.
pub fn destroy(runner: &dyn CommandRunner, dir: &Path, settings: &Settings) -> Result<()> {
    check_tools(runner)?;

    let profile = settings.profile(dir);
    info!("Using AWS profile: {}", profile);
    let aws = Aws {
        runner,
        profile: &profile,
    };

    let outputs = terraform_outputs(runner);

    let mut buckets_cleaned = false;
    for name in ["s3_bucket_name", "athena_results_bucket_name"] {
        if let Some(bucket) = output_str(&outputs, name) {
            aws.empty_bucket(bucket);
            buckets_cleaned = true;
        }
    }

    if !buckets_cleaned {
        info!("Terraform outputs not available. Searching for project buckets...");
        for bucket in aws.project_buckets(&settings.bucket_marker) {
            info!("Found project bucket: {}", bucket);
            aws.empty_bucket(&bucket);
            buckets_cleaned = true;
        }
    }
    if !buckets_cleaned {
        warn!("Could not find any project buckets to clean");
    }

    match output_str(&outputs, "athena_workgroup_name") {
        Some(workgroup) => aws.cleanup_workgroup(workgroup, settings.query_history_limit),
        None => warn!("Could not find Athena workgroup name in outputs"),
    }

    destroy_infrastructure(runner)?;
    cleanup_local_files(dir)?;

    info!("Complete cleanup finished");
    Ok(())
}

fn terraform_outputs(runner: &dyn CommandRunner) -> BTreeMap<String, TerraformOutput> {
    info!("Getting Terraform outputs...");
    let Some(output) = attempt(runner, "terraform", &["output", "-json"]) else {
        warn!("Could not get Terraform outputs");
        return BTreeMap::new();
    };
    parse_or_warn(&output.stdout, "Terraform outputs").unwrap_or_default()
}

fn output_str<'a>(outputs: &'a BTreeMap<String, TerraformOutput>, name: &str) -> Option<&'a str> {
    outputs
        .get(name)
        .and_then(|output| output.value.as_str())
        .filter(|value| !value.is_empty())
}

fn destroy_infrastructure(runner: &dyn CommandRunner) -> Result<()> {
    info!("Destroying infrastructure with Terraform...");
    attempt(runner, "terraform", &["init"]);
    attempt(runner, "terraform", &["refresh"]);

    if attempt(runner, "terraform", &["destroy", "-auto-approve"]).is_none() {
        bail!(
            "Failed to destroy infrastructure with Terraform. Resources that may need \
             manual deletion: the Athena workgroup with query history, S3 buckets with objects"
        );
    }
    info!("Infrastructure destroyed");
    Ok(())
}

/// Removes Terraform state and build leftovers from `dir`.
pub fn cleanup_local_files(dir: &Path) -> Result<()> {
    info!("Cleaning up Terraform files...");
    for name in LOCAL_FILES {
        let path = dir.join(name);
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
            info!("Removed {}", name);
        }
    }
    for name in LOCAL_DIRS {
        let path = dir.join(name);
        if path.is_dir() {
            fs::remove_dir_all(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            info!("Removed {} directory", name);
        }
    }
    Ok(())
}

struct Aws<'a> {
    runner: &'a dyn CommandRunner,
    profile: &'a str,
}

impl Aws<'_> {
    fn call(&self, args: &[&str]) -> Option<Output> {
        let mut args = args.to_vec();
        args.extend(["--profile", self.profile]);
        attempt(self.runner, "aws", &args)
    }

    fn call_json<T: DeserializeOwned>(&self, args: &[&str], what: &str) -> Option<T> {
        let output = self.call(args)?;
        if output.stdout.trim().is_empty() {
            return None;
        }
        parse_or_warn(&output.stdout, what)
    }

    fn empty_bucket(&self, bucket: &str) {
        info!("Emptying S3 bucket: {}", bucket);

        let versions: Option<ObjectVersions> = self.call_json(
            &["s3api", "list-object-versions", "--bucket", bucket],
            "object versions",
        );
        if let Some(versions) = versions {
            for version in &versions.versions {
                info!("Deleting version {} of {}", version.version_id, version.key);
                self.delete_version(bucket, version);
            }
            for marker in &versions.delete_markers {
                info!("Deleting delete marker {} of {}", marker.version_id, marker.key);
                self.delete_version(bucket, marker);
            }
        }

        info!("Force deleting all remaining objects...");
        let uri = format!("s3://{bucket}");
        self.call(&["s3", "rm", &uri, "--recursive"]);

        info!("Bucket {} emptied", bucket);
    }

    fn delete_version(&self, bucket: &str, version: &VersionRef) {
        self.call(&[
            "s3api",
            "delete-object",
            "--bucket",
            bucket,
            "--key",
            &version.key,
            "--version-id",
            &version.version_id,
        ]);
    }

    fn project_buckets(&self, marker: &str) -> Vec<String> {
        self.call_json::<BucketList>(&["s3api", "list-buckets"], "S3 buckets list")
            .map(|list| {
                list.buckets
                    .into_iter()
                    .map(|bucket| bucket.name)
                    .filter(|name| name.contains(marker))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn cleanup_workgroup(&self, workgroup: &str, history_limit: usize) {
        info!("Cleaning up Athena workgroup: {}", workgroup);

        let executions: Option<QueryExecutions> = self.call_json(
            &["athena", "list-query-executions", "--work-group", workgroup],
            "query executions",
        );
        for id in executions
            .map(|e| e.query_execution_ids)
            .unwrap_or_default()
            .iter()
            .take(history_limit)
        {
            info!("Stopping query execution: {}", id);
            self.call(&["athena", "stop-query-execution", "--query-execution-id", id]);
        }

        let named: Option<NamedQueries> = self.call_json(
            &["athena", "list-named-queries", "--work-group", workgroup],
            "named queries",
        );
        for id in named.map(|n| n.named_query_ids).unwrap_or_default() {
            info!("Deleting named query: {}", id);
            self.call(&["athena", "delete-named-query", "--named-query-id", &id]);
        }

        info!("Athena workgroup {} cleaned up", workgroup);
    }
}

/// Runs a captured command, logging instead of failing.
fn attempt(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> Option<Output> {
    let line = command_line(program, args);
    info!("Running: {}", line);
    match runner.capture(program, args) {
        Ok(output) if output.success => Some(output),
        Ok(output) => {
            error!("Command failed: {}: {}", line, output.stderr.trim());
            None
        }
        Err(e) => {
            error!("Command failed: {}: {:#}", line, e);
            None
        }
    }
}

fn parse_or_warn<T: DeserializeOwned>(json: &str, what: &str) -> Option<T> {
    serde_json::from_str(json)
        .inspect_err(|e| warn!("Could not parse {}: {}", what, e))
        .ok()
}
