use docvector_common::config::DocVectorConfig;
use std::fs;
use tempfile::TempDir;

#[test]
fn loads_overrides_from_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("docvector.toml");

    let config_content = r#"
[storage]
database_url = "postgres://user:pass@db:5432/docvector"
redis_url = "redis://cache:6379/0"
qdrant_url = "http://qdrant:6334"

[embedding]
provider = "local"
model = "local-minilm"
dimension = 384
batch_size = 64
remote_concurrency = 4
cache_ttl_secs = 604800

[chunking]
chunk_size = 800
chunk_overlap = 100
strategy = "fixed"

[crawler]
max_depth = 5
max_pages = 500
concurrent_requests = 8
respect_robots_txt = true
user_agent = "test-agent"
request_timeout_secs = 20

[search]
default_limit = 10
max_limit = 50
vector_weight = 0.7
keyword_weight = 0.3
min_score = 0.1
"#;

    fs::write(&config_path, config_content).unwrap();

    let config = DocVectorConfig::load(config_path.to_str().unwrap()).unwrap();

    assert_eq!(config.storage.database_url, "postgres://user:pass@db:5432/docvector");
    assert_eq!(config.chunking.chunk_size, 800);
    assert_eq!(config.crawler.max_depth, 5);
    assert_eq!(config.search.vector_weight, 0.7);
}

#[test]
fn env_var_overrides_file_value() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("docvector.toml");
    fs::write(&config_path, "").unwrap();

    std::env::set_var("DOCVECTOR_CRAWLER_MAX_PAGES", "42");
    let config = DocVectorConfig::load(config_path.to_str().unwrap()).unwrap();
    std::env::remove_var("DOCVECTOR_CRAWLER_MAX_PAGES");

    assert_eq!(config.crawler.max_pages, 42);
}
