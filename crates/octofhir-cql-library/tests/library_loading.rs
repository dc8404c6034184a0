//! End-to-end library loading through the public API

use async_trait::async_trait;
use octofhir_cql_library::compiler::{CompilationContext, CompilerOutput, CqlCompiler};
use octofhir_cql_library::config::CqlLibraryConfig;
use octofhir_cql_library::content::{ContentResolutionChain, InMemoryContentProvider, LibraryContentKind};
use octofhir_cql_library::diagnostics::{CqlDiagnostic, Locator};
use octofhir_cql_library::model_manager::{InMemoryModelInfoProvider, ModelInfo};
use octofhir_cql_library::resource::{InMemoryLibraryRepository, LibraryResolutionProvider, LibraryResource};
use octofhir_cql_library::{
    LibraryError, LibraryLoader, LibraryService, TranslatorOption, TranslatorOptions, VersionedIdentifier,
    fingerprint,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_test::block_on;

/// Compiles every library it has source for. Libraries whose source contains
/// `error` produce an error diagnostic.
#[derive(Default)]
struct RecordingCompiler {
    calls: AtomicUsize,
}

impl RecordingCompiler {
    fn elm(identifier: &VersionedIdentifier, options: &TranslatorOptions) -> Value {
        json!({
            "library": {
                "annotation": [{
                    "type": "CqlToElmInfo",
                    "translatorOptions": options.to_string()
                }],
                "identifier": identifier,
                "usings": { "def": [{ "localIdentifier": "FHIR", "uri": "http://hl7.org/fhir", "version": "4.0.1" }] }
            }
        })
    }
}

#[async_trait]
impl CqlCompiler for RecordingCompiler {
    async fn resolve_library(
        &self,
        identifier: &VersionedIdentifier,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = match context.sources.library_source(identifier).await {
            Ok(source) => source,
            Err(e) if e.is_not_found() => return Ok(CompilerOutput::default()),
            Err(e) => return Err(e.into()),
        };
        context
            .models
            .resolve_model(&VersionedIdentifier::new("FHIR", Some("4.0.1")))
            .await?;

        let output = CompilerOutput::library(Self::elm(identifier, context.options));
        if source.contains("error") {
            return Ok(output.with_diagnostic(
                CqlDiagnostic::error("Could not resolve identifier error").with_locator(Locator {
                    library: Some(identifier.clone()),
                    start_line: 2,
                    start_char: 8,
                    end_line: 2,
                    end_char: 12,
                }),
            ));
        }
        Ok(output)
    }

    async fn compile_from_text(
        &self,
        _text: &str,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let identifier = VersionedIdentifier::new("Anonymous", None);
        Ok(CompilerOutput::library(Self::elm(&identifier, context.options)))
    }
}

fn service() -> LibraryService {
    let models = InMemoryModelInfoProvider::new().with_model(ModelInfo::new("FHIR", Some("4.0.1")));
    LibraryService::new(CqlLibraryConfig::default(), Arc::new(models)).unwrap()
}

fn test_lib() -> VersionedIdentifier {
    VersionedIdentifier::new("Lib", Some("1.0.0")).with_system("Test")
}

#[tokio::test]
async fn test_compiled_library_is_cached_under_exact_identifier() {
    let service = service();
    let compiler = Arc::new(RecordingCompiler::default());
    let content = InMemoryContentProvider::new("memory").with_content(
        test_lib(),
        LibraryContentKind::Cql,
        "library Test.Lib version '1.0.0'",
    );
    let loader = service.create_library_loader_with_content(
        ContentResolutionChain::new().with_provider(Arc::new(content)),
        compiler.clone(),
    );

    let library = loader.load(&test_lib()).await.unwrap();

    assert_eq!(library.identifier, test_lib());
    let cached = service.library_cache().get(&test_lib()).unwrap();
    assert!(Arc::ptr_eq(&cached, &library));
    // An unversioned identifier is a different key
    assert!(!service.library_cache().contains_key(&VersionedIdentifier::new("Lib", None).with_system("Test")));
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_precompiled_attachment_reused_when_options_match() {
    let service = service();
    let compiler = Arc::new(RecordingCompiler::default());
    let identifier = VersionedIdentifier::new("Common", Some("2.0.0"));
    let elm = RecordingCompiler::elm(&identifier, service.translator_options()).to_string();
    let repository = Arc::new(InMemoryLibraryRepository::new());
    repository
        .update(
            LibraryResource::new("Common", Some("2.0.0"))
                .with_id("common")
                .with_attachment("text/cql", b"library Common version '2.0.0'")
                .with_attachment("application/elm+json", elm.as_bytes()),
        )
        .await
        .unwrap();
    let loader = service.create_library_loader(repository, compiler.clone());

    let library = loader.load(&identifier).await.unwrap();

    assert_eq!(library.identifier, identifier);
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_option_change_recompiles_through_cache() {
    let service = service();
    let compiler = Arc::new(RecordingCompiler::default());
    let content = InMemoryContentProvider::new("memory").with_content(
        test_lib(),
        LibraryContentKind::Cql,
        "library Test.Lib version '1.0.0'",
    );
    let loader = service.create_library_loader_with_content(
        ContentResolutionChain::new().with_provider(Arc::new(content)),
        compiler.clone(),
    );

    loader.load(&test_lib()).await.unwrap();
    loader.load(&test_lib()).await.unwrap();
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);

    let detailed = TranslatorOptions::default_options().with(TranslatorOption::EnableDetailedErrors);
    loader.inner().set_translator_options(detailed.clone());
    let library = loader.load(&test_lib()).await.unwrap();

    assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fingerprint::recorded_options(&library), Some(detailed));
}

#[tokio::test]
async fn test_translation_error_names_library_and_location() {
    let service = service();
    let content = InMemoryContentProvider::new("memory").with_content(
        test_lib(),
        LibraryContentKind::Cql,
        "library Test.Lib version '1.0.0'\ndefine X: error",
    );
    let loader = service.create_library_loader_with_content(
        ContentResolutionChain::new().with_provider(Arc::new(content)),
        Arc::new(RecordingCompiler::default()),
    );

    let err = loader.load(&test_lib()).await.unwrap_err();

    assert!(matches!(err, LibraryError::Translation { .. }));
    assert_eq!(
        err.to_string(),
        "Translation of library Test.Lib-1.0.0 failed with the following message: \
         [Test.Lib-1.0.0[2:8, 2:12]Could not resolve identifier error]"
    );
    assert!(service.library_cache().is_empty());
}

#[test]
fn test_unknown_library_is_not_found() {
    let service = service();
    let loader = service.create_library_loader(
        Arc::new(InMemoryLibraryRepository::new()),
        Arc::new(RecordingCompiler::default()),
    );

    let result = block_on(loader.load(&VersionedIdentifier::new("Missing", Some("1.0"))));

    assert!(matches!(result, Err(e) if e.is_not_found()));
}

#[tokio::test]
async fn test_repository_lookup_by_canonical_version() {
    let repository = InMemoryLibraryRepository::new();
    for version in ["1.0", "2.0", "1.5"] {
        repository
            .update(
                LibraryResource::new("Versioned", Some(version))
                    .with_id(format!("versioned-{version}"))
                    .with_url("http://example.org/Library/Versioned"),
            )
            .await
            .unwrap();
    }

    let pinned = repository
        .resolve_library_by_canonical_url("http://example.org/Library/Versioned|1.5")
        .await
        .unwrap();
    let absent = repository
        .resolve_library_by_canonical_url("http://example.org/Library/Versioned|3.0")
        .await
        .unwrap();

    assert_eq!(pinned.and_then(|library| library.version), Some("1.5".to_string()));
    assert!(absent.is_none());
}
