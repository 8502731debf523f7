//! Compile request construction.

use serde::Serialize;

/// The single source language this deployment compiles.
pub const LANGUAGE: &str = "rust";

/// Wire shape of a compile submission. Built fresh per attempt, immutable
/// once sent. `package_name` uniquely identifies the originating editor
/// within a session; the service derives the artifact name from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileRequest {
    pub source_code: String,
    pub package_name: String,
    pub language: &'static str,
}

/// Pure construction; no validation happens here. The service owns all
/// semantic checks, so even empty source goes out as-is.
pub fn build(source_text: &str, package_name: &str) -> CompileRequest {
    CompileRequest {
        source_code: source_text.to_string(),
        package_name: package_name.to_string(),
        language: LANGUAGE,
    }
}
