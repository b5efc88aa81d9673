use std::env;
use std::io::Write;
use std::sync::Mutex;

use cronhub_core::config::{AppConfig, MessageQueueType};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{content}").unwrap();
    file
}

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let file = config_file(
        r#"
        [database]
        url = "sqlite://data/from-file.db"

        [management]
        service_id = "from-file"
        "#,
    );

    env::set_var("CRONHUB_DATABASE__URL", "sqlite://data/from-env.db");
    env::set_var("CRONHUB_MANAGEMENT__MAX_EXECUTE_TIMES", "4");
    env::set_var("CRONHUB_MESSAGE_QUEUE__KIND", "rabbitmq");
    let config = AppConfig::load(file.path().to_str());
    env::remove_var("CRONHUB_DATABASE__URL");
    env::remove_var("CRONHUB_MANAGEMENT__MAX_EXECUTE_TIMES");
    env::remove_var("CRONHUB_MESSAGE_QUEUE__KIND");

    let config = config.unwrap();
    assert_eq!(config.database.url, "sqlite://data/from-env.db");
    assert_eq!(config.management.max_execute_times, Some(4));
    assert_eq!(config.management.service_id, "from-file");
    assert_eq!(config.message_queue.kind, MessageQueueType::Rabbitmq);
}

#[test]
fn test_file_values_are_validated() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let file = config_file("[management]\nmax_in_flight = 0\n");
    assert!(AppConfig::load(file.path().to_str()).is_err());
}

#[test]
fn test_shipped_config_is_valid() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/cronhub.toml");
    let config = AppConfig::load(Some(path)).unwrap();

    assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    assert_eq!(config.management.channel_capacity, 1);
    assert_eq!(config.management.max_execute_times, None);
    assert_eq!(
        config.message_queue.topics(),
        [
            "cron.topic.cron.job",
            "cron.topic.immediate.job",
            "cron.topic.job.status"
        ]
    );
}
