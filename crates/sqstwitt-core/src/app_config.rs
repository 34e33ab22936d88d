use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub bind_addr: SocketAddr,
    pub queue_name: String,
    pub aws_region: String,
    pub sqs_endpoint_url: Option<String>,
    pub dead_letter_queue_name: Option<String>,
    /// `MaxNumberOfMessages` per receive call, 1..=10.
    pub receive_batch_size: i32,
    /// Long-poll `WaitTimeSeconds`, 0..=20.
    pub receive_wait_secs: i32,
    pub poll_interval_secs: u64,
    pub max_in_flight: usize,
    pub call_timeout_secs: u64,
    pub ack_enabled: bool,
    pub max_receive_count: u32,
    pub batch_classify: bool,
    pub classifier_url: Option<String>,
    pub classifier_token: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &"[redacted]")
            .field("queue_name", &self.queue_name)
            .field("aws_region", &self.aws_region)
            .field("sqs_endpoint_url", &self.sqs_endpoint_url)
            .field("dead_letter_queue_name", &self.dead_letter_queue_name)
            .field("receive_batch_size", &self.receive_batch_size)
            .field("receive_wait_secs", &self.receive_wait_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_in_flight", &self.max_in_flight)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("ack_enabled", &self.ack_enabled)
            .field("max_receive_count", &self.max_receive_count)
            .field("batch_classify", &self.batch_classify)
            .field("classifier_url", &self.classifier_url)
            .field(
                "classifier_token",
                &self.classifier_token.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
