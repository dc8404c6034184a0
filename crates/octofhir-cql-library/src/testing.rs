//! Shared fixtures for unit tests

use crate::compiler::{CompilationContext, CompilerOutput, CqlCompiler};
use crate::diagnostics::CqlDiagnostic;
use crate::identifier::VersionedIdentifier;
use crate::model_manager::{GlobalModelCache, InMemoryModelInfoProvider, ModelInfo, ModelManager};
use crate::options::TranslatorOptions;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Compact ELM for `identifier`, fingerprinted with `options` when given.
pub fn elm_document(identifier: &VersionedIdentifier, options: Option<&TranslatorOptions>) -> Value {
    let annotation: Vec<Value> = options
        .map(|options| {
            json!({
                "type": "CqlToElmInfo",
                "translatorVersion": "3.10.0",
                "translatorOptions": options.to_string(),
                "signatureLevel": "Overloads"
            })
        })
        .into_iter()
        .collect();

    json!({
        "library": {
            "annotation": annotation,
            "identifier": identifier,
            "schemaIdentifier": { "id": "urn:hl7-org:elm", "version": "r1" },
            "usings": {
                "def": [
                    { "localIdentifier": "System", "uri": "urn:hl7-org:elm-types:r1" },
                    { "localIdentifier": "FHIR", "uri": "http://hl7.org/fhir", "version": "4.0.1" }
                ]
            }
        }
    })
}

pub fn elm_bytes(identifier: &VersionedIdentifier, options: Option<&TranslatorOptions>) -> Vec<u8> {
    elm_document(identifier, options).to_string().into_bytes()
}

pub fn model_manager() -> ModelManager {
    let provider = InMemoryModelInfoProvider::new()
        .with_model(ModelInfo::new("System", Some("1.0.0")))
        .with_model(ModelInfo::new("FHIR", Some("4.0.1")));
    ModelManager::new(Arc::new(provider), Arc::new(GlobalModelCache::new()))
}

pub enum StubBehaviour {
    Compile,
    Diagnose(CqlDiagnostic),
    Crash,
}

/// Compiles any library whose CQL source is available, recording the active
/// options in the output.
pub struct StubCompiler {
    behaviour: StubBehaviour,
    calls: AtomicUsize,
}

impl StubCompiler {
    pub fn new(behaviour: StubBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn compile(
        &self,
        identifier: &VersionedIdentifier,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let StubBehaviour::Crash = self.behaviour {
            anyhow::bail!("parser stack overflow");
        }

        context
            .models
            .resolve_model(&VersionedIdentifier::new("FHIR", Some("4.0.1")))
            .await?;

        let mut output = CompilerOutput::library(elm_document(identifier, Some(context.options)));
        if let StubBehaviour::Diagnose(diagnostic) = &self.behaviour {
            output = output.with_diagnostic(diagnostic.clone());
        }
        Ok(output)
    }
}

#[async_trait]
impl CqlCompiler for StubCompiler {
    async fn resolve_library(
        &self,
        identifier: &VersionedIdentifier,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput> {
        match context.sources.library_source(identifier).await {
            Ok(source) => anyhow::ensure!(source.starts_with("library"), "not CQL: {source}"),
            Err(e) if e.is_not_found() => return Ok(CompilerOutput::default()),
            Err(e) => return Err(e.into()),
        }
        self.compile(identifier, context).await
    }

    async fn compile_from_text(
        &self,
        text: &str,
        context: CompilationContext<'_>,
    ) -> anyhow::Result<CompilerOutput> {
        // library <Name> version '<version>'
        let mut words = text.split_whitespace().skip(1);
        let name = words.next().unwrap_or("Anonymous");
        let version = words.nth(1).map(|v| v.trim_matches('\''));
        self.compile(&VersionedIdentifier::new(name, version), context).await
    }
}
