use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "craws",
    version,
    about = "Drill down through AWS services, operations and their results"
)]
pub struct Args {
    /// Directory of service models (e.g., "botocore/data")
    #[arg(short, long, value_name = "DIR")]
    pub models: Option<PathBuf>,

    /// AWS CLI profile to run operations with
    #[arg(short, long)]
    pub profile: Option<String>,

    /// AWS region to run operations in
    #[arg(short, long)]
    pub region: Option<String>,
}
