//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use std::io::Write;
use std::path::PathBuf;
use taskloop::config::{ConfigError, PipelineConfig, RoutingStrategy};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[todoist]
api_token_env = "MY_TODOIST_TOKEN"
task_limit = 10

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "MY_OPENAI_KEY"
temperature = 0.5
max_tokens = 1500
system_prompt = "You help with daily tasks."

[routing]
strategy = "static"
max_iterations = 3

[output]
report_dir = "reports"
learning_dir = "notes/learning"
contexts_dir = "ctx"

[prompts]
max_comments = 4
"#,
    );

    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.todoist.api_token_env, "MY_TODOIST_TOKEN");
    assert_eq!(config.todoist.task_limit, Some(10));
    assert_eq!(config.llm.provider, "openai");
    assert_eq!(config.llm.model_name(), "gpt-4o");
    assert_eq!(config.llm.max_tokens, Some(1500));
    assert_eq!(config.routing.strategy, RoutingStrategy::Static);
    assert_eq!(config.routing.max_iterations, 3);
    assert_eq!(config.output.report_dir, PathBuf::from("reports"));
    assert_eq!(config.output.learning_dir, PathBuf::from("notes/learning"));
    assert_eq!(config.prompts.max_comments, 4);
}

#[test]
fn test_empty_file_yields_defaults() {
    let temp_file = write_config("");

    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config, PipelineConfig::default());
    assert_eq!(config.llm.provider, "ollama");
    assert_eq!(config.routing.strategy, RoutingStrategy::Llm);
    assert_eq!(config.routing.max_iterations, 5);
    assert_eq!(config.prompts.max_comments, 2);
    assert_eq!(config.output.report_dir, PathBuf::from("output"));
    assert_eq!(config.output.learning_dir, PathBuf::from("learning_tasks"));
    assert!(config.contexts.is_empty());
}

#[test]
fn test_config_loads_context_table_in_order() {
    let temp_file = write_config(
        r#"
[[contexts]]
file = "fitness.md"
keywords = ["gym", "workout"]

[[contexts]]
file = "learning.md"
keywords = ["learn", "study"]
"#,
    );

    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.contexts.len(), 2);
    assert_eq!(config.contexts[0].file, "fitness.md");
    assert_eq!(config.contexts[1].keywords, vec!["learn", "study"]);
}

#[test]
fn test_config_returns_error_for_invalid_toml_syntax() {
    let temp_file = write_config("[llm\nprovider = ");

    let result = PipelineConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_returns_error_for_unsupported_provider() {
    let temp_file = write_config("[llm]\nprovider = \"palm\"\n");

    let result = PipelineConfig::load_from_file(temp_file.path());
    match result {
        Err(ConfigError::InvalidConfig(message)) => assert!(message.contains("palm")),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_config_rejects_zero_iteration_cap() {
    let temp_file = write_config("[routing]\nmax_iterations = 0\n");

    let result = PipelineConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_rejects_invalid_base_url() {
    let temp_file = write_config("[todoist]\nbase_url = \"not a url\"\n");

    let result = PipelineConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_rejects_context_entry_without_keywords() {
    let temp_file = write_config("[[contexts]]\nfile = \"x.md\"\nkeywords = []\n");

    let result = PipelineConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_returns_error_when_file_not_found() {
    let result = PipelineConfig::load_from_file(std::path::Path::new("/nonexistent/taskloop.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_get_todoist_token_retrieves_from_environment() {
    unsafe {
        std::env::set_var("TASKLOOP_TEST_TODOIST_TOKEN", "todo-123");
    }

    let temp_file = write_config("[todoist]\napi_token_env = \"TASKLOOP_TEST_TODOIST_TOKEN\"\n");
    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.get_todoist_token().unwrap(), "todo-123");

    unsafe {
        std::env::remove_var("TASKLOOP_TEST_TODOIST_TOKEN");
    }
}

#[test]
fn test_get_llm_api_key_returns_error_when_env_var_not_set() {
    unsafe {
        std::env::remove_var("TASKLOOP_TEST_MISSING_KEY");
    }

    let temp_file = write_config(
        "[llm]\nprovider = \"anthropic\"\napi_key_env = \"TASKLOOP_TEST_MISSING_KEY\"\n",
    );
    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    match config.get_llm_api_key() {
        Err(ConfigError::EnvVarNotFound(name)) => assert_eq!(name, "TASKLOOP_TEST_MISSING_KEY"),
        other => panic!("expected EnvVarNotFound, got {other:?}"),
    }
}

#[test]
fn test_ollama_needs_no_api_key() {
    let config = PipelineConfig::default();
    assert_eq!(config.get_llm_api_key().unwrap(), None);
}

#[test]
fn test_search_key_absence_is_not_an_error() {
    unsafe {
        std::env::remove_var("TASKLOOP_TEST_SERPER");
    }

    let temp_file = write_config("[search]\napi_key_env = \"TASKLOOP_TEST_SERPER\"\n");
    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.get_search_api_key(), None);
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let temp_file = write_config("[llm]\nprovider = \"anthropic\"\n\n[prompts]\nmax_comments = 3\n");
    let config = PipelineConfig::load_from_file(temp_file.path()).unwrap();

    let rendered = config.to_toml_string().unwrap();
    let reparsed = PipelineConfig::from_toml_str(&rendered).unwrap();

    assert_eq!(reparsed, config);
}
