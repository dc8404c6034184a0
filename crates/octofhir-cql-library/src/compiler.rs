//! Seam to the external CQL-to-ELM compiler

use crate::content::LibrarySourceLoader;
use crate::diagnostics::{CqlDiagnostic, Severity, errors_to_string};
use crate::elm::CompiledLibrary;
use crate::error::{LibraryError, LibraryResult};
use crate::identifier::VersionedIdentifier;
use crate::model_manager::ModelManager;
use crate::options::TranslatorOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Display;

/// What the compiler produced for one library.
#[derive(Debug, Clone, Default)]
pub struct CompilerOutput {
    /// ELM document, `None` when the compiler could not find the library
    pub library: Option<Value>,
    pub diagnostics: Vec<CqlDiagnostic>,
}

impl CompilerOutput {
    pub fn library(elm: Value) -> Self {
        Self {
            library: Some(elm),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: CqlDiagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

/// Session state lent to the compiler for one compilation.
pub struct CompilationContext<'a> {
    pub options: &'a TranslatorOptions,
    /// Models bound for this session
    pub models: &'a mut ModelManager,
    /// Source text for the library and its includes
    pub sources: &'a LibrarySourceLoader,
}

/// External compiler. Parsing and type checking happen behind this trait.
///
/// Diagnostics are returned in [`CompilerOutput`]; an `Err` means the
/// compiler itself failed.
#[async_trait]
pub trait CqlCompiler: Send + Sync {
    async fn resolve_library(
        &self,
        identifier: &VersionedIdentifier,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput>;

    async fn compile_from_text(
        &self,
        text: &str,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput>;
}

/// Apply the diagnostics policy and convert the output.
///
/// Error diagnostics fail with `Translation`, warnings are logged, a missing
/// library is `NotFound` and an unreadable ELM document is `Conversion`.
pub fn library_from_output(
    library: &impl Display,
    output: CompilerOutput,
) -> LibraryResult<CompiledLibrary> {
    let errors: Vec<&CqlDiagnostic> = output.diagnostics.iter().filter(|d| d.is_error()).collect();
    if !errors.is_empty() {
        return Err(LibraryError::translation(library, errors_to_string(errors)));
    }

    for diagnostic in &output.diagnostics {
        if diagnostic_level(diagnostic) == tracing::Level::WARN {
            tracing::warn!(library = %library, %diagnostic, "CQL compiler reported a warning");
        } else {
            tracing::debug!(library = %library, %diagnostic, "CQL compiler message");
        }
    }

    let elm = output.library.ok_or_else(|| LibraryError::not_found(library))?;
    CompiledLibrary::from_elm(elm).map_err(|e| LibraryError::conversion(library, e.to_string()))
}

/// Log level for a diagnostic that did not abort compilation.
fn diagnostic_level(diagnostic: &CqlDiagnostic) -> tracing::Level {
    match diagnostic.severity {
        Severity::Error | Severity::Warning => tracing::Level::WARN,
        Severity::Info => tracing::Level::DEBUG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Locator;
    use serde_json::json;

    fn elm() -> Value {
        json!({ "library": { "identifier": { "id": "Lib", "version": "1.0.0" } } })
    }

    fn id() -> VersionedIdentifier {
        VersionedIdentifier::new("Lib", Some("1.0.0"))
    }

    #[test]
    fn test_error_diagnostic_aborts() {
        let output = CompilerOutput::library(elm()).with_diagnostic(
            CqlDiagnostic::error("Could not resolve identifier Foo").with_locator(Locator {
                library: Some(id()),
                start_line: 3,
                start_char: 5,
                end_line: 3,
                end_char: 8,
            }),
        );

        let err = library_from_output(&id(), output).unwrap_err();

        assert!(err.is_translation());
        assert_eq!(
            err.to_string(),
            "Translation of library Lib-1.0.0 failed with the following message: \
             [Lib-1.0.0[3:5, 3:8]Could not resolve identifier Foo]"
        );
    }

    #[test]
    fn test_warnings_do_not_abort() {
        let output = CompilerOutput::library(elm())
            .with_diagnostic(CqlDiagnostic::warning("List promotion applied"));

        let library = library_from_output(&id(), output).unwrap();
        assert_eq!(library.identifier, id());
    }

    #[test]
    fn test_missing_library_is_not_found() {
        let err = library_from_output(&id(), CompilerOutput::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unreadable_elm_is_conversion_error() {
        let err = library_from_output(&id(), CompilerOutput::library(json!({ "nope": 1 })))
            .unwrap_err();
        assert!(matches!(err, LibraryError::Conversion { .. }));
    }

    #[test]
    fn test_info_messages_log_below_warnings() {
        let info = CqlDiagnostic {
            severity: Severity::Info,
            message: "Library Lib loaded".to_string(),
            locator: None,
        };

        assert_eq!(diagnostic_level(&info), tracing::Level::DEBUG);
        assert_eq!(diagnostic_level(&CqlDiagnostic::warning("List promotion applied")), tracing::Level::WARN);
        // Info messages never abort
        assert!(library_from_output(&id(), CompilerOutput::library(elm()).with_diagnostic(info)).is_ok());
    }
}
