use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::config::Credentials;
use redrive::settings::DEFAULT_REGION;

/// LocalStack's edge endpoint, used by `--local` when no endpoint is given.
const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

/// Where and as whom to talk to SQS.
#[derive(Debug, clap::Args)]
pub struct AwsArgs {
    /// AWS region of the queues
    #[arg(long, global = true, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Override the SQS endpoint
    #[arg(long, global = true, env = "REDRIVE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Talk to LocalStack with static test credentials
    #[arg(long, global = true)]
    pub local: bool,
}

impl AwsArgs {
    pub async fn load(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));

        if self.local {
            loader = loader
                .endpoint_url(self.endpoint.as_deref().unwrap_or(LOCALSTACK_ENDPOINT))
                .credentials_provider(Credentials::new("test", "test", None, None, "static"));
        } else if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        loader.load().await
    }
}
