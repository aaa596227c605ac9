// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes.

use crate::diagnostic::ConfigError;
use crate::model::{EmbedderKind, MnemoConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MnemoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log.level.to_lowercase().as_str()) {
        invalid(format!(
            "log.level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.log.level
        ));
    }

    if config.storage.data_dir.as_os_str().is_empty() {
        invalid("storage.data_dir must not be empty".to_string());
    }
    if config.storage.database_file.trim().is_empty() {
        invalid("storage.database_file must not be empty".to_string());
    }
    if config.storage.index_file.trim().is_empty() {
        invalid("storage.index_file must not be empty".to_string());
    }
    if config.storage.database_file == config.storage.index_file {
        invalid("storage.database_file and storage.index_file must differ".to_string());
    }

    let memory = &config.memory;
    if memory.dimension == 0 {
        invalid("memory.dimension must be at least 1".to_string());
    }
    if memory.flush_threshold == 0 {
        invalid("memory.flush_threshold must be at least 1".to_string());
    }
    if memory.embedder == EmbedderKind::Onnx && memory.model_path.is_none() {
        invalid("memory.model_path is required when memory.embedder = \"onnx\"".to_string());
    }
    if let Some(min) = memory.min_similarity
        && !(-1.0..=1.0).contains(&min)
    {
        invalid(format!(
            "memory.min_similarity must be within [-1.0, 1.0], got {min}"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
