//! [`PageClient`] that shells out to the AWS command line interface.
//!
//! Each page is one `aws <service> <operation> --max-items N` invocation;
//! the CLI reports a `NextToken` when more results exist, which is passed
//! back as `--starting-token` for the following page. Child processes are
//! killed when the fetch is dropped, so abandoning a stream mid-request does
//! not leave a process behind.

use std::process::Stdio;

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr, bail};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::catalog::{Page, PageClient, PageRequest};

const NEXT_TOKEN: &str = "NextToken";

#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    page_size: u32,
    profile: Option<String>,
    region: Option<String>,
}

impl AwsCli {
    pub fn new(program: impl Into<String>, page_size: u32) -> Self {
        Self {
            program: program.into(),
            page_size: page_size.max(1),
            profile: None,
            region: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    fn args(&self, request: &PageRequest) -> Vec<String> {
        let mut args = vec![
            request.service.clone(),
            command_name(&request.operation),
            "--output".to_string(),
            "json".to_string(),
            "--max-items".to_string(),
            self.page_size.to_string(),
        ];
        if let Some(token) = &request.starting_token {
            args.push("--starting-token".to_string());
            args.push(token.clone());
        }
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args
    }
}

#[async_trait]
impl PageClient for AwsCli {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        let args = self.args(request);
        debug!(program = %self.program, ?args, "Fetching page");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .wrap_err_with(|| format!("failed to run '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} {} failed ({}): {}",
                request.service,
                request.operation,
                output.status,
                stderr.trim()
            );
        }

        parse_page(&output.stdout)
    }
}

/// Parse CLI output into a page. Commands with nothing to report print
/// nothing at all, which is treated as an empty page.
fn parse_page(stdout: &[u8]) -> Result<Page> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Ok(Page::default());
    }
    let mut body: Value = serde_json::from_str(&text).wrap_err("failed to parse CLI output")?;
    let next_token = body
        .as_object_mut()
        .and_then(|map| map.remove(NEXT_TOKEN))
        .and_then(|token| token.as_str().map(str::to_string));
    Ok(Page { body, next_token })
}

/// CLI command name of an API operation: `DescribeDBInstances` becomes
/// `describe-db-instances`.
pub fn command_name(operation: &str) -> String {
    let chars: Vec<char> = operation.chars().collect();
    let mut name = String::with_capacity(operation.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                name.push('-');
            }
        }
        name.push(c.to_ascii_lowercase());
    }
    name
}
